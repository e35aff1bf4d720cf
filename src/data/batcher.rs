// ============================================================
// Layer 4 — Concept Batcher
// ============================================================
// Implements Burn's Batcher trait to convert a Vec<ConceptSample>
// into backend tensors.
//
// How batching works here:
//   Input:  Vec of N ConceptSamples, each with k concepts
//   Output: ConceptBatch with two [N, k] float tensors
//
//   We flatten all predicted values into one long Vec, then
//   reshape: [s1_c1, ..., s1_ck, s2_c1, ..., sN_ck] → [N, k]
//
// All samples of one run share the same k, so no padding is
// needed. The trajectory simulator additionally wants the batch
// as host data (its per-row argmax scan runs off-tensor), which
// is what the ConceptMatrix accessors provide.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::dataset::ConceptSample;
use crate::domain::concepts::ConceptMatrix;

// ─── ConceptBatch ─────────────────────────────────────────────────────────────
/// A batch of concept samples ready for the corrector.
/// Both tensors have shape [batch_size, num_concepts].
#[derive(Debug, Clone)]
pub struct ConceptBatch<B: Backend> {
    pub predicted: Tensor<B, 2>,
    pub groundtruth: Tensor<B, 2>,
    // Host copies kept alongside the tensors; the simulator's
    // deterministic selection scan works on these directly.
    predicted_host: ConceptMatrix,
    groundtruth_host: ConceptMatrix,
}

impl<B: Backend> ConceptBatch<B> {
    pub fn from_host(
        predicted: ConceptMatrix,
        groundtruth: ConceptMatrix,
        device: &B::Device,
    ) -> Self {
        let (batch, k) = (predicted.batch_size(), predicted.num_concepts());
        let predicted_tensor =
            Tensor::<B, 1>::from_floats(predicted.as_flat(), device).reshape([batch, k]);
        let groundtruth_tensor =
            Tensor::<B, 1>::from_floats(groundtruth.as_flat(), device).reshape([batch, k]);
        Self {
            predicted: predicted_tensor,
            groundtruth: groundtruth_tensor,
            predicted_host: predicted,
            groundtruth_host: groundtruth,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.predicted_host.batch_size()
    }

    pub fn num_concepts(&self) -> usize {
        self.predicted_host.num_concepts()
    }

    pub fn predicted_host(&self) -> &ConceptMatrix {
        &self.predicted_host
    }

    pub fn groundtruth_host(&self) -> &ConceptMatrix {
        &self.groundtruth_host
    }
}

// ─── ConceptBatcher ───────────────────────────────────────────────────────────
/// The batcher struct — holds the target device so tensors are
/// created on the correct backend.
#[derive(Clone, Debug)]
pub struct ConceptBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ConceptBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ConceptSample, ConceptBatch<B>> for ConceptBatcher<B> {
    fn batch(&self, items: Vec<ConceptSample>) -> ConceptBatch<B> {
        let batch_size = items.len();
        let num_concepts = items[0].num_concepts();

        let predicted_flat: Vec<f32> = items.iter().flat_map(|s| s.predicted.clone()).collect();
        let groundtruth_flat: Vec<f32> = items.iter().flat_map(|s| s.groundtruth.clone()).collect();

        ConceptBatch::from_host(
            ConceptMatrix::from_flat(predicted_flat, batch_size, num_concepts),
            ConceptMatrix::from_flat(groundtruth_flat, batch_size, num_concepts),
            &self.device,
        )
    }
}
