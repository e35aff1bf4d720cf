// ============================================================
// Layer 5 — Intervention Policy
// ============================================================
// Scores every concept dimension by how informative revealing it
// would be, then the intervene step picks one dimension per
// sample and overwrites it with ground truth.
//
// The default policy is "uncertainty closest to 0.5" (ucp):
// a concept whose current estimate sits near the decision
// boundary is the one the model is least sure about, so
// revealing it carries the most information. Already revealed
// dimensions are forced to a large negative sentinel so they can
// never win the argmax again, even under numerical noise.
//
// Selection runs as a host-side first-occurring-maximum scan:
// ties break to the lowest index, which keeps intervention
// sequences bit-reproducible across runs and backends.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

use crate::domain::concepts::{ConceptMatrix, InterventionMask};

const UCP_EPS: f32 = 1e-8;
const INTERVENED_SENTINEL: f32 = -1e10;

/// Named, pure scoring policy for picking the next concept to reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPolicy {
    /// 1 / (|c - 0.5| + eps): highest importance closest to 0.5.
    Ucp,
}

impl InterventionPolicy {
    /// Importance of every dimension of every sample, same row-major
    /// [batch, k] layout as the inputs. Pure function.
    pub fn score(&self, concepts: &ConceptMatrix, mask: &InterventionMask) -> Vec<f32> {
        match self {
            InterventionPolicy::Ucp => concepts
                .as_flat()
                .iter()
                .enumerate()
                .map(|(idx, &value)| {
                    let (sample, concept) = (
                        idx / concepts.num_concepts(),
                        idx % concepts.num_concepts(),
                    );
                    if mask.is_set(sample, concept) {
                        INTERVENED_SENTINEL
                    } else {
                        1.0 / ((value - 0.5).abs() + UCP_EPS)
                    }
                })
                .collect(),
        }
    }
}

impl FromStr for InterventionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "ucp" => Ok(InterventionPolicy::Ucp),
            other => bail!("unsupported intervention policy '{other}' (expected ucp)"),
        }
    }
}

impl fmt::Display for InterventionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterventionPolicy::Ucp => f.write_str("ucp"),
        }
    }
}

/// Reveal one concept per sample: score with the policy, pick the
/// first-occurring maximum per row, overwrite that dimension with
/// ground truth and set its mask bit. Returns fresh state plus the
/// selected index per sample — recorded snapshots never alias the
/// inputs.
///
/// When every dimension of a row is already masked the scores are
/// all-sentinel and the scan stably picks index 0; the value is
/// re-written with its (identical) ground truth.
pub fn intervene(
    concepts: &ConceptMatrix,
    mask: &InterventionMask,
    groundtruth: &ConceptMatrix,
    policy: InterventionPolicy,
) -> (ConceptMatrix, InterventionMask, Vec<usize>) {
    let scores = policy.score(concepts, mask);
    let (batch, k) = (concepts.batch_size(), concepts.num_concepts());

    let mut new_concepts = concepts.clone();
    let mut new_mask = mask.clone();
    let mut selected = Vec::with_capacity(batch);

    for sample in 0..batch {
        let row = &scores[sample * k..(sample + 1) * k];
        let mut best = 0;
        for (concept, &score) in row.iter().enumerate() {
            if score > row[best] {
                best = concept;
            }
        }
        new_concepts.set(sample, best, groundtruth.get(sample, best));
        new_mask.set(sample, best);
        selected.push(best);
    }

    (new_concepts, new_mask, selected)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: Vec<f32>, k: usize) -> ConceptMatrix {
        let batch = values.len() / k;
        ConceptMatrix::from_flat(values, batch, k)
    }

    #[test]
    fn ucp_scores_peak_at_half() {
        let concepts = matrix(vec![0.5, 0.9, 0.1, 0.5], 4);
        let mask = InterventionMask::new(1, 4);
        let scores = InterventionPolicy::Ucp.score(&concepts, &mask);
        assert!((scores[0] - 1.0 / UCP_EPS).abs() / scores[0] < 1e-3);
        assert!((scores[1] - 2.5).abs() < 1e-5);
        assert!((scores[2] - 2.5).abs() < 1e-5);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn masked_dimensions_get_the_sentinel() {
        let concepts = matrix(vec![0.5, 0.5], 2);
        let mut mask = InterventionMask::new(1, 2);
        mask.set(0, 0);
        let scores = InterventionPolicy::Ucp.score(&concepts, &mask);
        assert_eq!(scores[0], INTERVENED_SENTINEL);
        assert!(scores[1] > 0.0);
    }

    #[test]
    fn first_intervention_breaks_ties_to_lowest_index() {
        // Indices 0 and 3 tie at maximal importance; lowest index wins.
        let concepts = matrix(vec![0.5, 0.9, 0.1, 0.5], 4);
        let mask = InterventionMask::new(1, 4);
        let groundtruth = matrix(vec![1.0, 0.0, 1.0, 0.0], 4);
        let (new_concepts, new_mask, selected) =
            intervene(&concepts, &mask, &groundtruth, InterventionPolicy::Ucp);
        assert_eq!(selected, vec![0]);
        assert_eq!(new_concepts.row(0), &[1.0, 0.9, 0.1, 0.5]);
        assert_eq!(new_mask.row(0), &[true, false, false, false]);
        // The inputs were not mutated.
        assert_eq!(concepts.row(0), &[0.5, 0.9, 0.1, 0.5]);
        assert_eq!(mask.count_set(0), 0);
    }

    #[test]
    fn batched_selection_is_per_sample() {
        let concepts = matrix(vec![0.5, 0.9, 0.9, 0.5], 2);
        let mask = InterventionMask::new(2, 2);
        let groundtruth = matrix(vec![1.0, 1.0, 1.0, 0.0], 2);
        let (_, new_mask, selected) =
            intervene(&concepts, &mask, &groundtruth, InterventionPolicy::Ucp);
        assert_eq!(selected, vec![0, 1]);
        assert!(new_mask.is_set(0, 0) && new_mask.is_set(1, 1));
    }

    #[test]
    fn exhausted_mask_stably_selects_index_zero() {
        let concepts = matrix(vec![1.0, 0.0, 1.0], 3);
        let mut mask = InterventionMask::new(1, 3);
        for c in 0..3 {
            mask.set(0, c);
        }
        let groundtruth = matrix(vec![1.0, 0.0, 1.0], 3);
        let (new_concepts, new_mask, selected) =
            intervene(&concepts, &mask, &groundtruth, InterventionPolicy::Ucp);
        assert_eq!(selected, vec![0]);
        assert_eq!(new_concepts.get(0, 0), 1.0);
        assert_eq!(new_mask.count_set(0), 3);
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!("ucp".parse::<InterventionPolicy>().unwrap(), InterventionPolicy::Ucp);
        assert!("random".parse::<InterventionPolicy>().is_err());
    }
}
