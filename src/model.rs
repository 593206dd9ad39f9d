//! Model-backed frame classification (feature `model`).
//!
//! [`ModelClassifier`] runs a Vision Transformer image classifier with
//! [`candle`](https://crates.io/crates/candle-core). A model directory holds:
//!
//! - `model.safetensors`: the weights,
//! - `config.json`: the ViT configuration plus an `id2label` map,
//! - `preprocessor_config.json` (optional): `image_mean` / `image_std`.
//!
//! Class names from `id2label` go through [`FrameLabel::from_class_name`], so
//! a model trained on `normal` / `black` / `distort` plugs straight into the
//! verdict rules. Extra classes are kept as [`FrameLabel::Other`].
//!
//! The model is placed on a device once, at load time. A GPU hint that cannot
//! be honoured (no CUDA/Metal support compiled in, or no such device) falls
//! back to the CPU with a warning.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playcheck::{BatchScheduler, DeviceHint, FfmpegFrameSource, ModelClassifier};
//!
//! let classifier = ModelClassifier::load("models/playcheck-vit", DeviceHint::Gpu(0))?;
//! let scheduler = BatchScheduler::new(FfmpegFrameSource::new(), Arc::new(classifier));
//! # Ok::<(), playcheck::PlaycheckError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use image::DynamicImage;
use image::imageops::FilterType;
use serde_json::Value;

use crate::classifier::{DeviceHint, FrameClassifier};
use crate::error::PlaycheckError;
use crate::label::FrameLabel;

/// Weights file looked up inside a model directory.
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Configuration file looked up next to the weights.
pub const CONFIG_FILE: &str = "config.json";

const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// ViT checkpoints normalise every channel with mean 0.5 and std 0.5 unless
/// the preprocessor config says otherwise.
const DEFAULT_NORMALIZATION: [f32; 3] = [0.5, 0.5, 0.5];

/// ViT image classifier loaded from safetensors.
pub struct ModelClassifier {
    model: Mutex<vit::Model>,
    device: Device,
    hint: DeviceHint,
    labels: Vec<FrameLabel>,
    image_size: usize,
    mean: [f32; 3],
    std: [f32; 3],
    name: String,
}

impl std::fmt::Debug for ModelClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClassifier")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("labels", &self.labels)
            .field("image_size", &self.image_size)
            .finish_non_exhaustive()
    }
}

impl ModelClassifier {
    /// Load a model from a directory, or from a `.safetensors` file whose
    /// directory also holds `config.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaycheckError::ModelLoad`] if a file is missing or
    /// malformed, `id2label` is absent or has gaps, or the weights do not fit
    /// the configuration.
    pub fn load<P: AsRef<Path>>(path: P, hint: DeviceHint) -> Result<Self, PlaycheckError> {
        let path = path.as_ref();
        let (weights, directory) = if path.is_dir() {
            (path.join(WEIGHTS_FILE), path.to_path_buf())
        } else {
            let directory = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (path.to_path_buf(), directory)
        };
        let load_error = |reason: String| PlaycheckError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        if !weights.is_file() {
            return Err(load_error(format!("{} not found", weights.display())));
        }

        let config_path = directory.join(CONFIG_FILE);
        let raw_config = fs::read_to_string(&config_path)
            .map_err(|error| load_error(format!("{}: {error}", config_path.display())))?;
        let config: vit::Config = serde_json::from_str(&raw_config)
            .map_err(|error| load_error(format!("{}: {error}", config_path.display())))?;
        let config_value: Value = serde_json::from_str(&raw_config)
            .map_err(|error| load_error(format!("{}: {error}", config_path.display())))?;
        let labels = parse_labels(&config_value).map_err(load_error)?;

        let (mean, std) = read_normalization(&directory.join(PREPROCESSOR_FILE));

        let device = select_device(hint);
        log::info!(
            "Loading frame classifier {} on {device:?} ({} classes)",
            weights.display(),
            labels.len()
        );

        // SAFETY: the weights file is memory-mapped read-only and must not be
        // modified while the classifier is alive.
        let var_builder =
            unsafe { VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &device) }
                .map_err(|error| load_error(error.to_string()))?;
        let model = vit::Model::new(&config, labels.len(), var_builder)
            .map_err(|error| load_error(error.to_string()))?;

        let name = directory
            .file_name()
            .and_then(|name| name.to_str())
            .map_or_else(|| "vit".to_string(), |name| format!("vit:{name}"));

        Ok(Self {
            model: Mutex::new(model),
            device,
            hint,
            labels,
            image_size: config.image_size,
            mean,
            std,
            name,
        })
    }

    /// Labels in model output order.
    pub fn labels(&self) -> &[FrameLabel] {
        &self.labels
    }

    /// The device hint the model was loaded with.
    pub fn device_hint(&self) -> DeviceHint {
        self.hint
    }

    /// Resize to the model's input size and lay out as a normalised
    /// `(1, 3, H, W)` tensor.
    fn preprocess(&self, frame: &DynamicImage) -> Result<Tensor, PlaycheckError> {
        let size = self.image_size;
        let rgb = frame
            .resize_exact(size as u32, size as u32, FilterType::Triangle)
            .to_rgb8();

        let plane = size * size;
        let mut data = vec![0f32; 3 * plane];
        for (index, pixel) in rgb.pixels().enumerate() {
            for channel in 0..3 {
                let value = pixel.0[channel] as f32 / 255.0;
                data[channel * plane + index] = (value - self.mean[channel]) / self.std[channel];
            }
        }

        Tensor::from_vec(data, (1, 3, size, size), &self.device).map_err(inference_error)
    }
}

impl FrameClassifier for ModelClassifier {
    fn classify(
        &self,
        frame: &DynamicImage,
        device: &DeviceHint,
    ) -> Result<FrameLabel, PlaycheckError> {
        if *device != self.hint {
            log::trace!("{}: loaded on {}, ignoring hint {device}", self.name, self.hint);
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PlaycheckError::InferenceError(
                "frame has no pixels".to_string(),
            ));
        }

        let input = self.preprocess(frame)?;
        let logits = {
            let model = self
                .model
                .lock()
                .map_err(|error| PlaycheckError::InferenceError(format!("Lock error: {error}")))?;
            model.forward(&input).map_err(inference_error)?
        };

        let probabilities: Vec<f32> = candle_nn::ops::softmax(&logits, 1)
            .and_then(|probabilities| probabilities.flatten_all())
            .and_then(|probabilities| probabilities.to_vec1())
            .map_err(inference_error)?;

        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|left, right| left.1.total_cmp(&right.1))
            .ok_or_else(|| PlaycheckError::InferenceError("model returned no scores".to_string()))?;

        let label = self.labels.get(index).cloned().ok_or_else(|| {
            PlaycheckError::InferenceError(format!("class index {index} has no label"))
        })?;
        log::trace!("{}: {label} ({:.1}%)", self.name, confidence * 100.0);
        Ok(label)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn inference_error(error: candle_core::Error) -> PlaycheckError {
    PlaycheckError::InferenceError(error.to_string())
}

/// Map a device hint to a candle device, falling back to the CPU.
fn select_device(hint: DeviceHint) -> Device {
    let DeviceHint::Gpu(index) = hint else {
        return Device::Cpu;
    };

    #[cfg(feature = "metal")]
    let gpu = Device::new_metal(index as usize);
    #[cfg(not(feature = "metal"))]
    let gpu = Device::new_cuda(index as usize);

    gpu.unwrap_or_else(|error| {
        log::warn!("GPU {index} unavailable ({error}), classifying on the CPU");
        Device::Cpu
    })
}

/// `id2label` as a dense, index-ordered label list.
fn parse_labels(config: &Value) -> Result<Vec<FrameLabel>, String> {
    let Some(map) = config.get("id2label").and_then(Value::as_object) else {
        return Err("config has no id2label map".to_string());
    };

    let mut indexed = Vec::with_capacity(map.len());
    for (key, name) in map {
        let index: usize = key
            .parse()
            .map_err(|_| format!("id2label key {key:?} is not a class index"))?;
        let name = name
            .as_str()
            .ok_or_else(|| format!("id2label[{key}] is not a string"))?;
        indexed.push((index, FrameLabel::from_class_name(name)));
    }
    indexed.sort_by_key(|(index, _)| *index);

    if indexed.is_empty() {
        return Err("id2label is empty".to_string());
    }
    if let Some((position, (index, _))) = indexed
        .iter()
        .enumerate()
        .find(|(position, (index, _))| position != index)
    {
        return Err(format!("id2label skips class {position} (found {index})"));
    }

    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

/// `image_mean` / `image_std` from the preprocessor config, if present.
fn read_normalization(path: &Path) -> ([f32; 3], [f32; 3]) {
    let Ok(raw) = fs::read_to_string(path) else {
        return (DEFAULT_NORMALIZATION, DEFAULT_NORMALIZATION);
    };
    let Ok(value) = serde_json::from_str::<Value>(&raw) else {
        log::warn!("{}: not valid JSON, using default normalisation", path.display());
        return (DEFAULT_NORMALIZATION, DEFAULT_NORMALIZATION);
    };

    let channels = |key: &str| -> Option<[f32; 3]> {
        let values = value.get(key)?.as_array()?;
        match values.as_slice() {
            [r, g, b] => Some([r.as_f64()? as f32, g.as_f64()? as f32, b.as_f64()? as f32]),
            _ => None,
        }
    };

    (
        channels("image_mean").unwrap_or(DEFAULT_NORMALIZATION),
        channels("image_std").unwrap_or(DEFAULT_NORMALIZATION),
    )
}
