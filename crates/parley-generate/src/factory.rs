//! Pipeline construction: mock for dry runs, ONNX model otherwise.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use parley_core::config::GenerationConfig;

use crate::device::resolve_device;
use crate::error::GenerateError;
use crate::mock::MockGenerator;
use crate::SharedGenerator;

/// Device label reported for the mock pipeline.
pub const DRY_RUN_LABEL: &str = "dry";

/// Backend settings that are not part of a single request.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Directory that bare model names are resolved against.
    pub models_dir: PathBuf,
    /// Seed for the sampler's random number generator.
    pub seed: u64,
    /// Maximum sequence length the model accepts.
    pub max_context_tokens: usize,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for BackendOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            models_dir: PathBuf::from(&config.models_dir),
            seed: config.seed,
            max_context_tokens: config.max_context_tokens,
        }
    }
}

/// Resolve a model identifier to the directory holding its files.
///
/// An identifier naming an existing directory is used as-is; anything else
/// is looked up under `models_dir`.
pub fn resolve_model_dir(model_id: &str, models_dir: &Path) -> PathBuf {
    let direct = Path::new(model_id);
    if direct.is_dir() {
        direct.to_path_buf()
    } else {
        models_dir.join(model_id)
    }
}

/// Build a generation pipeline.
///
/// Returns the generator and a label describing where it runs: `"dry"` for
/// the mock, otherwise the resolved device index.
///
/// # Errors
/// `GenerateError::BackendUnavailable` when the real backend is not compiled
/// in, `GenerateError::ModelLoad` when the model cannot be loaded.
pub fn init_pipeline(
    model_id: &str,
    device: &str,
    dry_run: bool,
    options: &BackendOptions,
) -> Result<(SharedGenerator, String), GenerateError> {
    if dry_run {
        return Ok((Arc::new(MockGenerator::new()), DRY_RUN_LABEL.to_string()));
    }

    let device_index = resolve_device(device);
    let model_dir = resolve_model_dir(model_id, &options.models_dir);

    info!(
        model = %model_id,
        device = %device,
        device_index,
        path = %model_dir.display(),
        "Loading model"
    );

    let generator = load_backend(model_id, &model_dir, device_index, options)?;
    Ok((generator, device_index.to_string()))
}

#[cfg(feature = "onnx")]
fn load_backend(
    model_id: &str,
    model_dir: &Path,
    device_index: i32,
    options: &BackendOptions,
) -> Result<SharedGenerator, GenerateError> {
    let generator = crate::onnx::OnnxGenerator::from_directory(
        model_id,
        model_dir,
        device_index,
        options,
    )?;
    Ok(Arc::new(generator))
}

#[cfg(not(feature = "onnx"))]
fn load_backend(
    model_id: &str,
    _model_dir: &Path,
    _device_index: i32,
    _options: &BackendOptions,
) -> Result<SharedGenerator, GenerateError> {
    tracing::error!(
        model = %model_id,
        "Real generation backend not compiled in; rebuild with `--features onnx` or use dry-run"
    );
    Err(GenerateError::BackendUnavailable(
        "built without the `onnx` feature".to_string(),
    ))
}
