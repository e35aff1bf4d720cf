// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// One immutable value object for a whole run, validated once at
// construction and persisted as JSON next to the checkpoints so
// an evaluate run can rebuild the exact same pipeline.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::domain::variants::{InputFormat, ModelKind};
use crate::ml::policy::InterventionPolicy;
use crate::ml::trainer::TrainingSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealignConfig {
    pub model: ModelKind,
    pub input_format: InputFormat,
    pub intervention_policy_train: InterventionPolicy,
    pub intervention_policy_validate: InterventionPolicy,

    // Synthetic data generation.
    pub num_concepts: usize,
    pub num_classes: usize,
    pub num_clusters: usize,
    pub num_samples: usize,
    pub train_fraction: f64,
    pub seed: u64,

    // Architecture.
    pub hidden_size: usize,
    pub num_layers: usize,

    // Optimization.
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub lr_decay_step: usize,
    pub lr_decay_gamma: f64,
    pub max_interventions: usize,
    pub early_stop_patience: usize,

    pub adapter_path: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl RealignConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_concepts == 0 {
            bail!("num_concepts must be positive");
        }
        if self.num_classes == 0 {
            bail!("num_classes must be positive");
        }
        if self.num_clusters == 0 {
            bail!("num_clusters must be positive");
        }
        if self.num_samples == 0 {
            bail!("num_samples must be positive");
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            bail!(
                "train_fraction must lie strictly between 0 and 1, got {}",
                self.train_fraction
            );
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        if self.max_interventions == 0 {
            bail!("max_interventions must be positive");
        }
        if self.model.is_trainable() {
            if self.hidden_size == 0 || self.num_layers == 0 {
                bail!("hidden_size and num_layers must be positive for trainable models");
            }
            if self.epochs == 0 {
                bail!("epochs must be positive");
            }
            if self.lr_decay_step == 0 {
                bail!("lr_decay_step must be positive");
            }
            if self.early_stop_patience == 0 {
                bail!("early_stop_patience must be positive");
            }
        }
        Ok(())
    }

    /// Number of samples that land in the training split.
    pub fn num_train(&self) -> usize {
        (self.num_samples as f64 * self.train_fraction).round() as usize
    }

    pub fn training_settings(&self) -> TrainingSettings {
        TrainingSettings {
            num_epochs: self.epochs,
            learning_rate: self.learning_rate,
            lr_decay_gamma: self.lr_decay_gamma,
            lr_decay_step: self.lr_decay_step,
            weight_decay: self.weight_decay,
            patience: self.early_stop_patience,
            policy: self.intervention_policy_train,
            validation_policy: self.intervention_policy_validate,
            max_interventions: self.max_interventions,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RealignConfig {
        RealignConfig {
            model: ModelKind::Sequence,
            input_format: InputFormat::OriginalAndIntervenedInplace,
            intervention_policy_train: InterventionPolicy::Ucp,
            intervention_policy_validate: InterventionPolicy::Ucp,
            num_concepts: 50,
            num_classes: 5,
            num_clusters: 10,
            num_samples: 12000,
            train_fraction: 10000.0 / 12000.0,
            seed: 42,
            hidden_size: 256,
            num_layers: 5,
            batch_size: 64,
            epochs: 20,
            learning_rate: 1e-4,
            weight_decay: 1e-5,
            lr_decay_step: 30,
            lr_decay_gamma: 0.1,
            max_interventions: 10,
            early_stop_patience: 10,
            adapter_path: None,
            output_dir: PathBuf::from("run"),
        }
    }

    #[test]
    fn default_shape_passes_validation() {
        assert!(valid_config().validate().is_ok());
        assert_eq!(valid_config().num_train(), 10000);
    }

    #[test]
    fn degenerate_fractions_are_rejected() {
        for fraction in [0.0, 1.0, 1.5] {
            let mut config = valid_config();
            config.train_fraction = fraction;
            assert!(config.validate().is_err(), "fraction {fraction} accepted");
        }
    }

    #[test]
    fn baseline_skips_architecture_checks() {
        let mut config = valid_config();
        config.model = ModelKind::Baseline;
        config.hidden_size = 0;
        config.num_layers = 0;
        config.epochs = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_survives_json_round_trip() {
        let config = valid_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: RealignConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.model, config.model);
        assert_eq!(back.num_concepts, config.num_concepts);
        assert_eq!(back.adapter_path, config.adapter_path);
    }
}
