//! Hand-gesture image classification service.
//!
//! `POST /predict/` takes a multipart image upload and answers with one of
//! `paper`, `rock`, `scissors`, or `unknown` when the network is not
//! confident enough.

pub mod classifier;
pub mod config;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod models;
pub mod preprocess;

use actix_cors::Cors;

pub use classifier::{Classifier, TractClassifier};
pub use config::{AppConfig, PipelineConfig};
pub use error::{PredictError, StartupError};
pub use handlers::{routes, AppState};
pub use models::{ErrorResponse, LabelResult};

/// Any origin and header, methods limited to POST and GET.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["POST", "GET"])
        .allow_any_header()
}
