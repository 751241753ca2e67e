//! Classifier capability layer.
//!
//! Each diagnostic track (tumor, breast BIRADS, breast pathological,
//! stroke) is served by one `ClassifierAdapter`: given a decoded image,
//! produce a label from the track's fixed label set, a confidence, and
//! the full probability distribution. Adapters report themselves
//! unavailable at load time rather than failing at call time; the
//! `ModelRegistry` is the single source of truth for availability.

pub mod preprocess;
pub mod registry;

#[cfg(feature = "onnx-models")]
pub mod onnx;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{ModelFidelity, Track};
use self::preprocess::NormalizedImage;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Model artifact not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// One classifier invocation's output. Probabilities in `distribution`
/// sum to 1 within floating tolerance; `label` is the argmax entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationOutput {
    pub label: String,
    pub confidence: f64,
    pub distribution: BTreeMap<String, f64>,
}

/// The capability contract every per-track classifier implements.
///
/// Inference kernels behind this trait are opaque; the orchestrator only
/// cares about the track identity, the declared fidelity, and the output.
pub trait ClassifierAdapter: Send + Sync {
    fn track(&self) -> Track;

    /// Full-fidelity model or an explicitly substituted fallback. Recorded
    /// per track in the persisted envelope so a fallback-produced result
    /// stays identifiable.
    fn fidelity(&self) -> ModelFidelity {
        ModelFidelity::Full
    }

    fn classify(&self, image: &NormalizedImage) -> Result<ClassificationOutput, AdapterError>;
}

impl ClassifierAdapter for Box<dyn ClassifierAdapter> {
    fn track(&self) -> Track {
        (**self).track()
    }

    fn fidelity(&self) -> ModelFidelity {
        (**self).fidelity()
    }

    fn classify(&self, image: &NormalizedImage) -> Result<ClassificationOutput, AdapterError> {
        (**self).classify(image)
    }
}

/// Deterministic classifier for testing — always answers with the
/// configured label/confidence, remaining probability mass spread evenly
/// over the track's other labels.
pub struct MockClassifier {
    track: Track,
    label: String,
    confidence: f64,
    fidelity: ModelFidelity,
    fail: bool,
}

impl MockClassifier {
    pub fn new(track: Track, label: &str, confidence: f64) -> Self {
        Self {
            track,
            label: label.to_string(),
            confidence,
            fidelity: ModelFidelity::Full,
            fail: false,
        }
    }

    pub fn fallback(mut self) -> Self {
        self.fidelity = ModelFidelity::Fallback;
        self
    }

    /// A classifier that errors on every invocation.
    pub fn failing(track: Track) -> Self {
        Self {
            track,
            label: String::new(),
            confidence: 0.0,
            fidelity: ModelFidelity::Full,
            fail: true,
        }
    }
}

impl ClassifierAdapter for MockClassifier {
    fn track(&self) -> Track {
        self.track
    }

    fn fidelity(&self) -> ModelFidelity {
        self.fidelity
    }

    fn classify(&self, _image: &NormalizedImage) -> Result<ClassificationOutput, AdapterError> {
        if self.fail {
            return Err(AdapterError::Inference("mock inference failure".into()));
        }

        let labels = self.track.labels();
        let rest = if labels.len() > 1 {
            (1.0 - self.confidence) / (labels.len() - 1) as f64
        } else {
            0.0
        };
        let distribution = labels
            .iter()
            .map(|&l| {
                let p = if l == self.label { self.confidence } else { rest };
                (l.to_string(), p)
            })
            .collect();

        Ok(ClassificationOutput {
            label: self.label.clone(),
            confidence: self.confidence,
            distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_distribution_sums_to_one() {
        let adapter = MockClassifier::new(Track::Tumor, "glioma", 0.9);
        let image = NormalizedImage::blank(8, 8);
        let out = adapter.classify(&image).unwrap();

        assert_eq!(out.label, "glioma");
        let total: f64 = out.distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(out.distribution.len(), Track::Tumor.labels().len());
    }

    #[test]
    fn failing_mock_reports_inference_error() {
        let adapter = MockClassifier::failing(Track::Stroke);
        let image = NormalizedImage::blank(8, 8);
        assert!(matches!(
            adapter.classify(&image),
            Err(AdapterError::Inference(_))
        ));
    }
}
