// ============================================================
// Checkpoint Manager
// ============================================================
// Persists training state in one directory:
//
//   model_epoch_{n}.mpk.gz — weights record after epoch n
//   latest_epoch.json      — which epoch was saved last
//   {name}.json            — any serializable config the task
//                            wants alongside its weights
//
// CompactRecorder serialises a module's record to MessagePack
// and gzips it; loading fails if the stored record does not
// match the module's architecture, which is surfaced as a
// Checkpoint error rather than a panic.

use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};

/// MessagePack + gzip recorder (`.mpk.gz`), matching the
/// documented on-disk checkpoint format.
type CompactRecorder = NamedMpkGzFileRecorder<HalfPrecisionSettings>;
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::error::{Result, TaskError};

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory (and parents) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a module's record for a given epoch and advance the
    /// latest-epoch pointer.
    pub fn save_model<B: Backend, M: Module<B> + Clone>(
        &self,
        model: &M,
        epoch: usize,
    ) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .map_err(|e| {
                TaskError::Checkpoint(format!("cannot save '{}': {e}", path.display()))
            })?;

        let latest = self.dir.join("latest_epoch.json");
        fs::write(&latest, serde_json::to_string(&epoch)?)?;

        tracing::debug!("Saved checkpoint for epoch {}", epoch);
        Ok(())
    }

    /// Restore the latest saved record into `model`. The module
    /// must have the architecture the record was created with.
    pub fn load_latest<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let epoch = self.latest_epoch()?;
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);
        let record: M::Record = CompactRecorder::new().load(path.clone(), device).map_err(|e| {
            TaskError::Checkpoint(format!(
                "cannot load '{}': {e}. Has training been run?",
                path.display()
            ))
        })?;
        Ok(model.load_record(record))
    }

    pub fn has_checkpoint(&self) -> bool {
        self.dir.join("latest_epoch.json").exists()
    }

    /// Persist a task configuration next to the weights.
    pub fn save_config<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        tracing::debug!("Saved '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path).map_err(|e| {
            TaskError::Checkpoint(format!("cannot read '{}': {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join("latest_epoch.json");
        let raw = fs::read_to_string(&path).map_err(|e| {
            TaskError::Checkpoint(format!("cannot read '{}': {e}. Has training been run?", path.display()))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct DummyConfig {
        lr: f64,
        epochs: usize,
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());

        let cfg = DummyConfig { lr: 1e-4, epochs: 3 };
        manager.save_config("task_config.json", &cfg).unwrap();
        let loaded: DummyConfig = manager.load_config("task_config.json").unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        assert!(!manager.has_checkpoint());
        assert!(matches!(
            manager.latest_epoch().unwrap_err(),
            TaskError::Checkpoint(_)
        ));
    }
}
