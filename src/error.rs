use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Prefix of every per-request failure message.
pub const ERROR_PREFIX: &str = "Error processing image: ";

/// Failures that keep the process from serving at all.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("model not found at {}", .0.display())]
    ModelMissing(PathBuf),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Per-request failures. Every stage maps to the same 400 response.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{0}")]
    Upload(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Preprocess(String),

    #[error("{0}")]
    Inference(String),
}

impl PredictError {
    pub fn stage(&self) -> &'static str {
        match self {
            PredictError::Upload(_) => "upload",
            PredictError::Decode(_) => "decode",
            PredictError::Preprocess(_) => "preprocess",
            PredictError::Inference(_) => "inference",
        }
    }

    pub fn detail(&self) -> String {
        format!("{}{}", ERROR_PREFIX, self)
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.detail(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_stage_is_bad_request() {
        let errors = [
            PredictError::Upload("a".into()),
            PredictError::Decode("b".into()),
            PredictError::Preprocess("c".into()),
            PredictError::Inference("d".into()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.detail().starts_with(ERROR_PREFIX));
        }
    }

    #[test]
    fn test_detail_carries_message() {
        let err = PredictError::Decode("cannot identify image".into());
        assert_eq!(err.detail(), "Error processing image: cannot identify image");
        assert_eq!(err.stage(), "decode");
    }

    #[test]
    fn test_model_missing_names_path() {
        let err = StartupError::ModelMissing(PathBuf::from("/x/model/best_transfer.onnx"));
        assert!(err.to_string().contains("/x/model/best_transfer.onnx"));
    }
}
