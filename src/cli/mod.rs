// ============================================================
// Layer 1 — CLI
// ============================================================
// Flag parsing only. Variant, input-format and policy names are
// parsed into their typed forms here; the use cases never see a
// raw string.

pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::application::config::RealignConfig;
use crate::application::evaluate_use_case::EvaluateUseCase;
use crate::application::train_use_case::TrainUseCase;
use commands::{EvaluateArgs, TrainArgs};

#[derive(Parser)]
#[command(
    name = "concept-realign",
    version,
    about = "Sequential concept-correction trajectory simulation and training"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate data and train (or, for baseline, evaluate) a corrector.
    Train(TrainArgs),
    /// Re-run the intervention loop against a finished run directory.
    Evaluate(EvaluateArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => {
                let config = RealignConfig::try_from(args)?;
                TrainUseCase::new(config)?.execute()
            }
            Commands::Evaluate(args) => {
                EvaluateUseCase::new(args.run_dir, args.checkpoint).execute()
            }
        }
    }
}
