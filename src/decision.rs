use crate::config::PipelineConfig;
use crate::error::PredictError;
use crate::models::LabelResult;

/// Index and value of the largest probability. On exact ties the lowest
/// index wins.
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in probabilities.iter().enumerate() {
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((index, value)),
        }
    }
    best
}

/// Map a probability vector to a label, rejecting sub-threshold results.
///
/// The reported confidence is always the top-class probability, also when
/// the label is overridden with the reject label.
pub fn decide(probabilities: &[f32], config: &PipelineConfig) -> Result<LabelResult, PredictError> {
    if probabilities.len() != config.labels.len() {
        return Err(PredictError::Inference(format!(
            "model returned {} scores for {} labels",
            probabilities.len(),
            config.labels.len()
        )));
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
        return Err(PredictError::Inference(format!(
            "model returned a non-finite score: {}",
            bad
        )));
    }

    let (index, confidence) = argmax(probabilities)
        .ok_or_else(|| PredictError::Inference("model returned no scores".to_string()))?;

    let label = if confidence < config.threshold {
        config.unknown_label.clone()
    } else {
        config.labels[index].clone()
    };

    Ok(LabelResult { label, confidence })
}
