// ============================================================
// Layer 3 — Corrector Variant and Input Format Selectors
// ============================================================
// The corrector variant and the input blending mode arrive as
// strings (CLI flags, saved config JSON). They are parsed into
// these enums exactly once, when the config is built; an
// unsupported name is a fatal configuration error at that point
// and no later code ever branches on raw strings.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

/// Which concept-corrector variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// No learned correction — replaced concepts keep ground truth,
    /// everything else keeps the original prediction. Never trained.
    Baseline,
    /// One shared recurrent corrector over the full concept vector.
    Sequence,
    /// Independent recurrent sub-models, one per concept cluster.
    MultiSequence,
}

impl ModelKind {
    pub fn is_trainable(self) -> bool {
        !matches!(self, ModelKind::Baseline)
    }

    /// Short name used in checkpoint file names.
    pub fn tag(self) -> &'static str {
        match self {
            ModelKind::Baseline => "baseline",
            ModelKind::Sequence => "sequence",
            ModelKind::MultiSequence => "multi_sequence",
        }
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" => Ok(ModelKind::Baseline),
            "sequence" => Ok(ModelKind::Sequence),
            "multi-sequence" | "multi_sequence" | "multisequence" => Ok(ModelKind::MultiSequence),
            other => bail!(
                "unsupported model type '{other}' (expected baseline, sequence or multi-sequence)"
            ),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How the corrector's per-step input is assembled from the current
/// concept state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// Revealed concepts keep their ground-truth value; everything
    /// else is re-anchored to the original prediction each step.
    /// Avoids compounding the model's own earlier corrections.
    OriginalAndIntervenedInplace,
    /// Feed the model's previous output forward unchanged.
    PreviousOutput,
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "original_and_intervened_inplace" => Ok(InputFormat::OriginalAndIntervenedInplace),
            "previous_output" => Ok(InputFormat::PreviousOutput),
            other => bail!(
                "unsupported input format '{other}' \
                 (expected original_and_intervened_inplace or previous_output)"
            ),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::OriginalAndIntervenedInplace => f.write_str("original_and_intervened_inplace"),
            InputFormat::PreviousOutput => f.write_str("previous_output"),
        }
    }
}
