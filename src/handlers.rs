use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{Classifier, TractClassifier};
use crate::config::{AppConfig, PipelineConfig};
use crate::decision::decide;
use crate::error::{PredictError, StartupError};
use crate::models::LabelResult;
use crate::preprocess::{decode_image, preprocess};

/// Name of the multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "file";

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub pipeline: PipelineConfig,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classifier>, pipeline: PipelineConfig) -> Self {
        Self {
            classifier,
            pipeline,
        }
    }

    /// Validate the pipeline settings and load the ONNX network. Any failure
    /// here is fatal for the process.
    pub fn load(config: &AppConfig) -> Result<Self, StartupError> {
        config.pipeline.validate()?;
        let classifier = TractClassifier::load(&config.model_path, config.pipeline.input_size)?;
        Ok(Self::new(Arc::new(classifier), config.pipeline.clone()))
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(vec!["/predict/", "/predict"]).route(web::post().to(predict)));
}

pub async fn predict(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let request_id = Uuid::new_v4();

    let bytes = match read_upload(payload, state.pipeline.max_upload_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(%request_id, stage = e.stage(), "Rejected upload: {}", e);
            return Err(e);
        }
    };
    debug!(%request_id, "Received {} bytes", bytes.len());

    let state = state.into_inner();
    let outcome = web::block(move || {
        classify_image(state.classifier.as_ref(), &state.pipeline, &bytes)
    })
    .await
    .map_err(|e| PredictError::Inference(format!("inference worker failed: {}", e)))
    .and_then(|result| result);

    match outcome {
        Ok(result) => {
            info!(
                %request_id,
                "Predicted {} ({:.3})", result.label, result.confidence
            );
            Ok(HttpResponse::Ok().json(result))
        }
        Err(e) => {
            warn!(%request_id, stage = e.stage(), "Failed to process image: {}", e);
            Err(e)
        }
    }
}

/// Collect the `file` field of the upload, draining every other field.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, PredictError> {
    let mut upload: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| PredictError::Upload(format!("malformed multipart body: {}", e)))?;

        let is_upload = upload.is_none()
            && field.content_disposition().get_name() == Some(UPLOAD_FIELD);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| PredictError::Upload(format!("failed to read upload: {}", e)))?;
            if !is_upload {
                continue;
            }
            if data.len() + chunk.len() > max_bytes {
                return Err(PredictError::Upload(format!(
                    "upload exceeds {} bytes",
                    max_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }

        if is_upload {
            upload = Some(data);
        }
    }

    upload.ok_or_else(|| {
        PredictError::Upload(format!("missing form field '{}'", UPLOAD_FIELD))
    })
}

/// Decode, preprocess, infer and decide. Runs to completion without yielding.
pub fn classify_image(
    classifier: &dyn Classifier,
    config: &PipelineConfig,
    bytes: &[u8],
) -> Result<LabelResult, PredictError> {
    let image = decode_image(bytes)?;
    debug!("Decoded image: {}x{}", image.width(), image.height());

    let batch = preprocess(&image, config.input_size)?.into_batch();

    let scores = classifier.predict(&batch)?;
    debug!("Scores: {:?}", scores);

    decide(&scores, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use ndarray::Array4;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct Recording {
        scores: Vec<f32>,
        seen: Mutex<Vec<Vec<usize>>>,
    }

    impl Classifier for Recording {
        fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>, PredictError> {
            self.seen.lock().unwrap().push(batch.shape().to_vec());
            Ok(self.scores.clone())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn predict(&self, _batch: &Array4<f32>) -> Result<Vec<f32>, PredictError> {
            Err(PredictError::Inference("out of memory".to_string()))
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([90, 60, 30]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_classifier_sees_batch_of_one() {
        let classifier = Recording {
            scores: vec![0.1, 0.8, 0.1],
            seen: Mutex::new(Vec::new()),
        };
        let result = classify_image(&classifier, &PipelineConfig::default(), &png(31, 77)).unwrap();
        assert_eq!(result.label, "rock");
        assert_eq!(
            classifier.seen.lock().unwrap().as_slice(),
            &[vec![1, 224, 224, 3]]
        );
    }

    #[test]
    fn test_decode_failure_skips_inference() {
        let classifier = Recording {
            scores: vec![1.0, 0.0, 0.0],
            seen: Mutex::new(Vec::new()),
        };
        let err = classify_image(&classifier, &PipelineConfig::default(), b"garbage").unwrap_err();
        assert!(matches!(err, PredictError::Decode(_)));
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inference_failure_propagates() {
        let err = classify_image(&Failing, &PipelineConfig::default(), &png(4, 4)).unwrap_err();
        assert!(matches!(err, PredictError::Inference(_)));
        assert_eq!(err.detail(), "Error processing image: out of memory");
    }
}
