// ============================================================
// Layer 1 — Command Arguments
// ============================================================

use std::path::PathBuf;

use anyhow::Error;
use clap::Args;

use crate::application::config::RealignConfig;

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Corrector variant: baseline, sequence or multi-sequence.
    #[arg(long, default_value = "sequence")]
    pub model: String,

    /// Per-step input blending: original_and_intervened_inplace or
    /// previous_output.
    #[arg(long, default_value = "original_and_intervened_inplace")]
    pub input_format: String,

    /// Concept-selection policy during training.
    #[arg(long, default_value = "ucp")]
    pub policy_train: String,

    /// Concept-selection policy during validation/evaluation.
    #[arg(long, default_value = "ucp")]
    pub policy_validate: String,

    /// Number of concepts per sample (k).
    #[arg(long, default_value_t = 50)]
    pub num_concepts: usize,

    /// Number of target classes in the synthetic data.
    #[arg(long, default_value_t = 5)]
    pub num_classes: usize,

    /// Number of concept clusters.
    #[arg(long, default_value_t = 10)]
    pub num_clusters: usize,

    /// Total synthetic samples before the train/val split.
    #[arg(long, default_value_t = 12000)]
    pub num_samples: usize,

    /// Fraction of samples in the training split.
    #[arg(long, default_value_t = 10_000.0 / 12_000.0)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 256)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 5)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 1e-5)]
    pub weight_decay: f32,

    /// Epochs between learning-rate decays.
    #[arg(long, default_value_t = 30)]
    pub lr_decay_step: usize,

    #[arg(long, default_value_t = 0.1)]
    pub lr_decay_gamma: f64,

    /// Intervention budget per trajectory.
    #[arg(long, default_value_t = 10)]
    pub max_interventions: usize,

    /// Epochs without validation improvement before stopping.
    #[arg(long, default_value_t = 10)]
    pub patience: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Directory holding a frozen pre-trained adapter (optional).
    #[arg(long)]
    pub adapter_path: Option<PathBuf>,

    /// Where checkpoints, config and metrics land.
    #[arg(long, default_value = "runs/realign")]
    pub output_dir: PathBuf,
}

impl TryFrom<TrainArgs> for RealignConfig {
    type Error = Error;

    fn try_from(args: TrainArgs) -> Result<Self, Error> {
        Ok(RealignConfig {
            model: args.model.parse()?,
            input_format: args.input_format.parse()?,
            intervention_policy_train: args.policy_train.parse()?,
            intervention_policy_validate: args.policy_validate.parse()?,
            num_concepts: args.num_concepts,
            num_classes: args.num_classes,
            num_clusters: args.num_clusters,
            num_samples: args.num_samples,
            train_fraction: args.train_fraction,
            seed: args.seed,
            hidden_size: args.hidden_size,
            num_layers: args.num_layers,
            batch_size: args.batch_size,
            epochs: args.epochs,
            learning_rate: args.learning_rate,
            weight_decay: args.weight_decay,
            lr_decay_step: args.lr_decay_step,
            lr_decay_gamma: args.lr_decay_gamma,
            max_interventions: args.max_interventions,
            early_stop_patience: args.patience,
            adapter_path: args.adapter_path,
            output_dir: args.output_dir,
        })
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Run directory containing train_config.json and checkpoints.
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Checkpoint stem to load (defaults to the newest best model).
    #[arg(long)]
    pub checkpoint: Option<String>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::variants::ModelKind;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: TrainArgs,
    }

    #[test]
    fn defaults_build_a_valid_sequence_config() {
        let harness = Harness::parse_from(["test"]);
        let config = RealignConfig::try_from(harness.args).unwrap();
        assert_eq!(config.model, ModelKind::Sequence);
        assert_eq!(config.num_concepts, 50);
        assert_eq!(config.num_train(), 10000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_model_name_is_a_fatal_parse_error() {
        let harness = Harness::parse_from(["test", "--model", "transformer"]);
        assert!(RealignConfig::try_from(harness.args).is_err());
    }

    #[test]
    fn multi_sequence_flag_selects_the_cluster_variant() {
        let harness = Harness::parse_from(["test", "--model", "multi-sequence"]);
        let config = RealignConfig::try_from(harness.args).unwrap();
        assert_eq!(config.model, ModelKind::MultiSequence);
    }
}
