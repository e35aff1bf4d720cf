// ============================================================
// Layer 6 — Checkpointing
// ============================================================
// Persists model weights with Burn's CompactRecorder and the run
// configuration as JSON next to them. Checkpoint names carry the
// model variant tag and a UNIX-seconds timestamp so successive
// runs in the same directory never clobber each other.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::CompactRecorder;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::variants::ModelKind;

const CONFIG_FILE: &str = "train_config.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `best_model_<variant>_<unix-seconds>` — the name used for the
    /// best validation checkpoint of one training run.
    pub fn best_model_name(kind: ModelKind) -> String {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("best_model_{}_{stamp}", kind.tag())
    }

    /// Save model weights under `<dir>/<name>.mpk`.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: M, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating checkpoint dir {}", self.dir.display()))?;
        let path = self.dir.join(name);
        model
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("saving checkpoint {}", path.display()))?;
        Ok(path.with_extension("mpk"))
    }

    /// Load weights saved by [`save_model`] into a freshly built model
    /// of the same architecture.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model: M,
        name: &str,
        device: &B::Device,
    ) -> Result<M> {
        let path = self.dir.join(name);
        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| format!("loading checkpoint {}", path.display()))
    }

    pub fn save_config<T: Serialize>(&self, config: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating checkpoint dir {}", self.dir.display()))?;
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(config).context("serializing run config")?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.dir.join(CONFIG_FILE);
        let json =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ProbeConfig {
        num_concepts: usize,
        learning_rate: f64,
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = std::env::temp_dir().join(format!("realign-ckpt-test-{}", std::process::id()));
        let manager = CheckpointManager::new(&dir);
        let config = ProbeConfig {
            num_concepts: 50,
            learning_rate: 1e-4,
        };
        manager.save_config(&config).unwrap();
        let loaded: ProbeConfig = manager.load_config().unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn best_model_names_carry_the_variant_tag() {
        let name = CheckpointManager::best_model_name(ModelKind::MultiSequence);
        assert!(name.starts_with("best_model_multi_sequence_"));
    }
}
