// ============================================================
// Layer 4 — Synthetic Concept Data
// ============================================================
// Stand-in for the upstream concept-bottleneck model. Produces
// the same boundary shape the real pipeline would:
//
//   - groundtruth concepts: per-class Bernoulli prototypes, so
//     samples of the same class share concept structure
//   - predicted concepts:   the ground truth corrupted with
//     bounded uniform noise, clamped to [0, 1] — wrong enough to
//     be worth correcting, biased toward the right side of 0.5
//   - cluster map:          each concept assigned one of m
//     clusters at random (empty clusters can and do occur, and
//     downstream code must tolerate them)
//   - labels:               uniform over J classes, used only to
//     verify class coverage
//
// All draws go through one StdRng seeded from the config, so a
// run is reproducible end to end.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::dataset::ConceptSample;
use crate::domain::clusters::ClusterAssignment;

/// How far a predicted concept may deviate from its ground truth.
/// 0.45 keeps predictions inside [0, 1] around a 0/1 target while
/// still pushing many of them close to the 0.5 decision boundary.
const PREDICTION_NOISE: f32 = 0.45;

/// How many fresh draws to attempt before giving up on covering
/// every target class in the training split.
const MAX_GENERATION_ATTEMPTS: u64 = 5;

#[derive(Debug, Clone)]
pub struct GeneratedData {
    pub samples: Vec<ConceptSample>,
    pub clusters: ClusterAssignment,
}

/// Generate `n_total` observations over `k` concepts, `num_classes`
/// target classes and `num_clusters` concept clusters.
pub fn generate(
    k: usize,
    n_total: usize,
    num_classes: usize,
    num_clusters: usize,
    seed: u64,
) -> Result<GeneratedData> {
    if k == 0 || n_total == 0 || num_classes == 0 {
        bail!("data generation requires k > 0, n_total > 0 and at least one class");
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let concept_to_cluster: Vec<usize> = (0..k).map(|_| rng.gen_range(0..num_clusters)).collect();
    let clusters = ClusterAssignment::new(concept_to_cluster, num_clusters)?;

    // One 0/1 concept prototype per class.
    let prototypes: Vec<Vec<f32>> = (0..num_classes)
        .map(|_| (0..k).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect())
        .collect();

    let samples = (0..n_total)
        .map(|_| {
            let label = rng.gen_range(0..num_classes);
            let groundtruth = prototypes[label].clone();
            let predicted = groundtruth
                .iter()
                .map(|&g| {
                    let noise = rng.gen_range(-PREDICTION_NOISE..=PREDICTION_NOISE);
                    (g + noise).clamp(0.0, 1.0)
                })
                .collect();
            ConceptSample {
                predicted,
                groundtruth,
                label,
            }
        })
        .collect();

    Ok(GeneratedData { samples, clusters })
}

/// Generate data and retry with a bumped seed until the first
/// `n_train` samples cover every target class, escalating to a
/// fatal error once the attempts are exhausted.
pub fn generate_with_class_coverage(
    k: usize,
    n_total: usize,
    n_train: usize,
    num_classes: usize,
    num_clusters: usize,
    seed: u64,
) -> Result<GeneratedData> {
    for attempt in 1..=MAX_GENERATION_ATTEMPTS {
        let data = generate(k, n_total, num_classes, num_clusters, seed + attempt)?;
        let train = &data.samples[..n_train.min(data.samples.len())];
        if all_classes_present(train, num_classes) {
            tracing::info!("Data generation successful on attempt {attempt}");
            return Ok(data);
        }
        tracing::warn!(
            "Attempt {attempt}: not all {num_classes} classes present in training data, regenerating"
        );
    }
    bail!(
        "failed to generate training data covering all {num_classes} classes \
         after {MAX_GENERATION_ATTEMPTS} attempts"
    )
}

fn all_classes_present(samples: &[ConceptSample], num_classes: usize) -> bool {
    let mut seen = vec![false; num_classes];
    for sample in samples {
        seen[sample.label] = true;
    }
    seen.iter().all(|&s| s)
}
