// ============================================================
// Layer 5 — Trajectory Simulator
// ============================================================
// Rolls one minibatch through a full intervention episode:
//
//   1. record the pre-intervention state (snapshot 0),
//   2. one warm-up forward pass with an empty mask,
//   3. repeat min(max_interventions, k) times: pick one concept per
//      sample (policy argmax), overwrite it with ground truth, record
//      the snapshot, run the corrector on the result.
//
// Selection runs host-side on plain Vecs so ties always resolve to
// the lowest concept index, independent of backend. The corrector's
// hidden state threads through the whole episode; the original
// prediction tensor is captured once and fed unchanged to every step.

use anyhow::{anyhow, Result};
use burn::prelude::*;

use crate::domain::clusters::ClusterAssignment;
use crate::domain::concepts::{ConceptMatrix, InterventionMask};
use crate::domain::trajectory::Trajectory;
use crate::ml::corrector::ConceptCorrector;
use crate::ml::policy::{intervene, InterventionPolicy};

pub fn matrix_to_tensor<B: Backend>(matrix: &ConceptMatrix, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(matrix.as_flat(), device)
        .reshape([matrix.batch_size(), matrix.num_concepts()])
}

pub fn mask_to_tensor<B: Backend>(mask: &InterventionMask, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(mask.to_floats().as_slice(), device)
        .reshape([mask.batch_size(), mask.num_concepts()])
}

fn tensor_to_matrix<B: Backend>(tensor: Tensor<B, 2>) -> Result<ConceptMatrix> {
    let [batch, k] = tensor.dims();
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("reading concept tensor back to host failed: {e:?}"))?;
    Ok(ConceptMatrix::from_flat(values, batch, k))
}

/// Simulate one intervention episode for a minibatch and record it.
///
/// `clusters` is the routing hint for cluster-structured correctors:
/// it only drives diagnostics here, the corrector itself recomputes
/// all clusters each step.
pub fn sample_trajectory<B, M>(
    corrector: &M,
    predicted: &ConceptMatrix,
    groundtruth: &ConceptMatrix,
    policy: InterventionPolicy,
    max_interventions: usize,
    clusters: Option<&ClusterAssignment>,
    device: &B::Device,
) -> Result<Trajectory>
where
    B: Backend,
    M: ConceptCorrector<B>,
{
    let (batch, k) = (predicted.batch_size(), predicted.num_concepts());
    let mut trajectory = Trajectory::new(predicted.clone(), groundtruth.clone());
    let mut mask = InterventionMask::new(batch, k);
    trajectory.record(predicted.clone(), mask.clone());

    let original = matrix_to_tensor::<B>(predicted, device);
    let hidden = corrector.prepare_initial_hidden(batch, device);

    // Warm-up pass: the corrector sees the raw predictions before
    // anything is revealed.
    let (out, mut hidden) = corrector.forward_step(
        original.clone(),
        mask_to_tensor::<B>(&mask, device),
        original.clone(),
        hidden,
    );
    let mut concepts = tensor_to_matrix(out)?;

    for _ in 0..max_interventions.min(k) {
        let (intervened, next_mask, selected) = intervene(&concepts, &mask, groundtruth, policy);
        mask = next_mask;
        trajectory.record(intervened.clone(), mask.clone());

        if let Some(assignment) = clusters {
            let mut touched: Vec<usize> = selected
                .iter()
                .map(|&concept| assignment.cluster_of(concept))
                .collect();
            touched.sort_unstable();
            touched.dedup();
            tracing::debug!(?touched, "intervention step touched clusters");
        }

        let (out, next_hidden) = corrector.forward_step(
            matrix_to_tensor::<B>(&intervened, device),
            mask_to_tensor::<B>(&mask, device),
            original.clone(),
            hidden,
        );
        hidden = next_hidden;
        concepts = tensor_to_matrix(out)?;
    }

    if !trajectory.is_in_unit_range() {
        tracing::warn!("simulated trajectory left the unit interval");
    }
    Ok(trajectory)
}
