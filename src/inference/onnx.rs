//! ONNX-backed classifier adapters — behind the `onnx-models` feature.
//!
//! One exported model file per track lives in the models directory
//! (`tumor.onnx`, `birads.onnx`, `pathological.onnx`, `stroke.onnx`).
//! A `<track>.fallback.onnx` sibling, when present, is loaded instead if
//! the primary artifact is missing or incompatible, and the adapter then
//! reports `ModelFidelity::Fallback` so every persisted result records
//! which variant produced it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

use crate::models::enums::{ModelFidelity, Track};

use super::preprocess::{crop_to_content, resize_square, NormalizedImage};
use super::{AdapterError, ClassificationOutput, ClassifierAdapter};
use super::registry::ModelRegistry;

/// Pixel threshold and padding for the stroke track's content crop.
const STROKE_CROP_THRESHOLD: u8 = 40;
const STROKE_CROP_BUFFER: u32 = 5;

/// Per-track input contract of the exported model.
struct InputSpec {
    side: u32,
    /// Per-channel mean/std; `None` feeds raw 0–255 floats.
    normalize: Option<([f32; 3], [f32; 3])>,
    /// NCHW (torch exports) vs NHWC (keras exports).
    channels_first: bool,
    /// Keras exports already emit probabilities; torch exports emit logits.
    apply_softmax: bool,
    crop_content: bool,
}

fn input_spec(track: Track) -> InputSpec {
    match track {
        Track::Tumor => InputSpec {
            side: 224,
            normalize: Some(([0.5, 0.5, 0.5], [0.5, 0.5, 0.5])),
            channels_first: true,
            apply_softmax: true,
            crop_content: false,
        },
        Track::Birads => InputSpec {
            side: 224,
            normalize: Some(([0.485, 0.456, 0.406], [0.229, 0.224, 0.225])),
            channels_first: true,
            apply_softmax: true,
            crop_content: false,
        },
        Track::Pathological => InputSpec {
            side: 256,
            normalize: Some(([0.233_827, 0.233_822, 0.233_79], [0.201_642, 0.201_643, 0.201_604])),
            channels_first: true,
            apply_softmax: true,
            crop_content: false,
        },
        Track::Stroke => InputSpec {
            side: 224,
            normalize: None,
            channels_first: false,
            apply_softmax: false,
            crop_content: true,
        },
    }
}

/// Image classifier running an exported ONNX model.
///
/// Uses interior mutability (Mutex) because ort::Session::run requires
/// `&mut self` but the ClassifierAdapter trait exposes `&self` for shared
/// registry usage.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    track: Track,
    fidelity: ModelFidelity,
}

impl OnnxClassifier {
    /// Load one track's model from an ONNX file.
    pub fn load(path: &Path, track: Track, fidelity: ModelFidelity) -> Result<Self, AdapterError> {
        if !path.exists() {
            return Err(AdapterError::ModelNotFound(path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| AdapterError::ModelInit(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| AdapterError::ModelInit(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e: ort::Error| AdapterError::ModelInit(format!("ONNX load failed: {e}")))?;

        tracing::info!(
            track = track.as_str(),
            "ONNX classifier loaded from {}",
            path.display()
        );

        Ok(Self {
            session: Mutex::new(session),
            track,
            fidelity,
        })
    }

    fn infer(&self, image: &NormalizedImage) -> Result<ClassificationOutput, AdapterError> {
        let spec = input_spec(self.track);
        let input = build_input(image, &spec);

        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| AdapterError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AdapterError::Inference("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| AdapterError::Inference(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AdapterError::Inference(format!("Output extraction: {e}")))?;

        let labels = self.track.labels();
        let class_count: usize = shape.iter().map(|&d| d as usize).product();
        if class_count != labels.len() {
            return Err(AdapterError::Inference(format!(
                "Unexpected output shape {shape:?}, expected {} classes",
                labels.len()
            )));
        }

        let probs = if spec.apply_softmax {
            softmax(&data[..labels.len()])
        } else {
            data[..labels.len()].iter().map(|&v| v as f64).collect()
        };

        let (best_idx, best_prob) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| AdapterError::Inference("Empty probability vector".into()))?;

        let distribution: BTreeMap<String, f64> = labels
            .iter()
            .zip(probs.iter())
            .map(|(&l, &p)| (l.to_string(), p))
            .collect();

        Ok(ClassificationOutput {
            label: labels[best_idx].to_string(),
            confidence: *best_prob,
            distribution,
        })
    }
}

impl ClassifierAdapter for OnnxClassifier {
    fn track(&self) -> Track {
        self.track
    }

    fn fidelity(&self) -> ModelFidelity {
        self.fidelity
    }

    fn classify(&self, image: &NormalizedImage) -> Result<ClassificationOutput, AdapterError> {
        self.infer(image)
    }
}

/// Preprocess to the model's input tensor: optional content crop, square
/// resize, optional per-channel normalization, NCHW or NHWC layout.
fn build_input(image: &NormalizedImage, spec: &InputSpec) -> Array4<f32> {
    let rgb = if spec.crop_content {
        crop_to_content(image, STROKE_CROP_THRESHOLD, STROKE_CROP_BUFFER)
    } else {
        image.rgb().clone()
    };
    let resized = resize_square(&rgb, spec.side);
    let side = spec.side as usize;

    let shape = if spec.channels_first {
        (1, 3, side, side)
    } else {
        (1, side, side, 3)
    };

    Array4::from_shape_fn(shape, |idx| {
        let (c, y, x) = if spec.channels_first {
            (idx.1, idx.2, idx.3)
        } else {
            (idx.3, idx.1, idx.2)
        };
        let raw = resized.get_pixel(x as u32, y as u32).0[c] as f32;
        match spec.normalize {
            Some((mean, std)) => (raw / 255.0 - mean[c]) / std[c],
            None => raw,
        }
    })
}

fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&v| ((v - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Load every track whose model artifact exists under `models_dir`.
///
/// A missing or incompatible primary artifact falls back to
/// `<track>.fallback.onnx` when present — registered with explicit
/// Fallback fidelity, never silently. A track with no loadable artifact
/// at all stays unregistered and its domain degrades to unavailable.
pub fn load_default_adapters(models_dir: &Path) -> ModelRegistry {
    let mut registry = ModelRegistry::new();

    for track in [Track::Tumor, Track::Birads, Track::Pathological, Track::Stroke] {
        let primary = models_dir.join(format!("{}.onnx", track.as_str()));
        match OnnxClassifier::load(&primary, track, ModelFidelity::Full) {
            Ok(adapter) => {
                registry.register(Box::new(adapter));
                continue;
            }
            Err(e) => {
                tracing::warn!(track = track.as_str(), "primary model unavailable: {e}");
            }
        }

        let fallback = models_dir.join(format!("{}.fallback.onnx", track.as_str()));
        match OnnxClassifier::load(&fallback, track, ModelFidelity::Fallback) {
            Ok(adapter) => registry.register(Box::new(adapter)),
            Err(e) => {
                tracing::warn!(
                    track = track.as_str(),
                    "no fallback either, track stays unavailable: {e}"
                );
            }
        }
    }

    registry
}
