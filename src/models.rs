use serde::{Deserialize, Serialize};

/// Outcome of one classification: the accepted label (or the reject label)
/// and the raw top-class probability.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LabelResult {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}
