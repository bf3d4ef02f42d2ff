//! Cache of constructed pipelines for long-running processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::GenerateError;
use crate::factory::{init_pipeline, BackendOptions};
use crate::SharedGenerator;

/// Identity of a cached pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub model: String,
    pub device: String,
    pub dry_run: bool,
}

impl PipelineKey {
    /// Dry-run pipelines ignore model and device, so they share one key.
    pub fn new(model: &str, device: &str, dry_run: bool) -> Self {
        if dry_run {
            Self {
                model: String::new(),
                device: String::new(),
                dry_run,
            }
        } else {
            Self {
                model: model.to_string(),
                device: device.trim().to_lowercase(),
                dry_run,
            }
        }
    }
}

/// One cache entry. Empty until its pipeline has been built.
type Slot = Arc<Mutex<Option<SharedGenerator>>>;

/// Builds each distinct pipeline once and hands out shared references.
///
/// The map lock is held only to find a key's slot. Construction happens
/// under that slot's own lock, so concurrent requests for the same uncached
/// model wait for one load while other keys stay available. Failed
/// constructions leave the slot empty and are retried on the next request.
pub struct PipelineRegistry {
    options: BackendOptions,
    cache: Mutex<HashMap<PipelineKey, Slot>>,
}

impl PipelineRegistry {
    pub fn new(options: BackendOptions) -> Self {
        Self {
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached pipeline for the key, constructing it if needed.
    ///
    /// Blocks while a model loads; call from a blocking context.
    pub fn get_or_init(
        &self,
        model: &str,
        device: &str,
        dry_run: bool,
    ) -> Result<SharedGenerator, GenerateError> {
        let key = PipelineKey::new(model, device, dry_run);
        self.get_or_init_with(key, || {
            let (generator, label) = init_pipeline(model, device, dry_run, &self.options)?;
            info!(model = %model, device = %label, dry_run, "Pipeline ready");
            Ok(generator)
        })
    }

    fn get_or_init_with<F>(
        &self,
        key: PipelineKey,
        load: F,
    ) -> Result<SharedGenerator, GenerateError>
    where
        F: FnOnce() -> Result<SharedGenerator, GenerateError>,
    {
        let slot = self.slot(&key);
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(generator) = entry.as_ref() {
            debug!(
                model = %key.model,
                device = %key.device,
                dry_run = key.dry_run,
                "Pipeline cache hit"
            );
            return Ok(Arc::clone(generator));
        }

        let generator = load()?;
        *entry = Some(Arc::clone(&generator));
        Ok(generator)
    }

    fn slot(&self, key: &PipelineKey) -> Slot {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(key.clone()).or_default())
    }

    /// Number of pipelines built so far. Loads still in progress are not
    /// counted.
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.try_lock().map(|entry| entry.is_some()).unwrap_or(false))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new(BackendOptions::default())
    }
}
