// ============================================================
// Layer 5 — Concept Correctors
// ============================================================
// Three interchangeable correction strategies behind one trait:
//
//   BaselineCorrector      — no parameters, no memory. Revealed
//                            concepts keep ground truth, the rest
//                            keep the original prediction. Gives
//                            the "never re-predict" reference loss.
//
//   SequenceCorrector      — one stack of LSTM layers over the
//                            full k-wide concept vector, linear
//                            head, sigmoid squash into [0, 1].
//
//   MultiSequenceCorrector — disjoint concept clusters routed to
//                            independent LSTM stacks (own weights,
//                            own hidden state, width = cluster
//                            size); per-cluster outputs written
//                            back into their original positions.
//                            Empty clusters get no sub-model.
//
// Output contract shared by all variants: a dimension whose mask
// bit is set passes its (ground-truth) input through exactly — the
// model's own estimate only ever fills unmasked dimensions, so a
// revealed concept is never perturbed by later computation.

use burn::{
    module::Ignored,
    nn::{Initializer, Linear, LinearConfig, Lstm, LstmConfig, LstmState},
    prelude::*,
    tensor::activation::sigmoid,
};

use crate::domain::clusters::ClusterAssignment;
use crate::domain::variants::InputFormat;

// ─── Shared contract ──────────────────────────────────────────────────────────

/// Stateful sequence-correction strategy.
///
/// `forward_sequence` consumes a whole stacked trajectory
/// ([batch, time, k] tensors); `forward_step` is the single-timestep
/// convenience used by the simulator. Hidden state is owned by one
/// trajectory's run and never shared across samples.
pub trait ConceptCorrector<B: Backend> {
    type Hidden;

    fn prepare_initial_hidden(&self, batch_size: usize, device: &B::Device) -> Self::Hidden;

    fn forward_sequence(
        &self,
        inputs: Tensor<B, 3>,
        masks: Tensor<B, 3>,
        original_predictions: Tensor<B, 3>,
        hidden: Self::Hidden,
    ) -> (Tensor<B, 3>, Self::Hidden);

    /// One timestep: [batch, k] in, [batch, k] out.
    fn forward_step(
        &self,
        inputs: Tensor<B, 2>,
        mask: Tensor<B, 2>,
        original_predictions: Tensor<B, 2>,
        hidden: Self::Hidden,
    ) -> (Tensor<B, 2>, Self::Hidden) {
        let [batch, k] = inputs.dims();
        let (out, hidden) = self.forward_sequence(
            inputs.reshape([batch, 1, k]),
            mask.reshape([batch, 1, k]),
            original_predictions.reshape([batch, 1, k]),
            hidden,
        );
        (out.reshape([batch, k]), hidden)
    }
}

/// What the model actually sees at each timestep (§ input_format).
fn blend_input<B: Backend, const D: usize>(
    format: InputFormat,
    inputs: Tensor<B, D>,
    masks: Tensor<B, D>,
    original_predictions: Tensor<B, D>,
) -> Tensor<B, D> {
    match format {
        InputFormat::OriginalAndIntervenedInplace => {
            let unmasked = masks.ones_like() - masks.clone();
            masks * inputs + unmasked * original_predictions
        }
        InputFormat::PreviousOutput => inputs,
    }
}

/// Masked dimensions pass the input through; unmasked take the estimate.
fn blend_output<B: Backend, const D: usize>(
    masks: Tensor<B, D>,
    inputs: Tensor<B, D>,
    estimate: Tensor<B, D>,
) -> Tensor<B, D> {
    let unmasked = masks.ones_like() - masks.clone();
    masks * inputs + unmasked * estimate
}

fn xavier() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

/// Run a stack of LSTM layers over a sequence, threading one state
/// per layer.
fn run_lstm_stack<B: Backend>(
    layers: &[Lstm<B>],
    input: Tensor<B, 3>,
    states: Vec<LstmState<B, 2>>,
) -> (Tensor<B, 3>, Vec<LstmState<B, 2>>) {
    let mut hidden_seq = input;
    let mut next_states = Vec::with_capacity(layers.len());
    for (layer, state) in layers.iter().zip(states.into_iter()) {
        let (out, state) = layer.forward(hidden_seq, Some(state));
        hidden_seq = out;
        next_states.push(state);
    }
    (hidden_seq, next_states)
}

fn zero_lstm_states<B: Backend>(
    num_layers: usize,
    batch_size: usize,
    hidden_size: usize,
    device: &B::Device,
) -> Vec<LstmState<B, 2>> {
    (0..num_layers)
        .map(|_| {
            LstmState::new(
                Tensor::zeros([batch_size, hidden_size], device),
                Tensor::zeros([batch_size, hidden_size], device),
            )
        })
        .collect()
}

// ─── Baseline ─────────────────────────────────────────────────────────────────

/// Pure passthrough corrector: no learned transformation, nothing to
/// train, nothing to checkpoint. The engine must never build an
/// optimizer for this variant.
#[derive(Debug, Clone)]
pub struct BaselineCorrector {
    num_concepts: usize,
    input_format: InputFormat,
}

impl BaselineCorrector {
    pub fn new(num_concepts: usize, input_format: InputFormat) -> Self {
        Self {
            num_concepts,
            input_format,
        }
    }

    pub fn num_concepts(&self) -> usize {
        self.num_concepts
    }
}

impl<B: Backend> ConceptCorrector<B> for BaselineCorrector {
    type Hidden = ();

    fn prepare_initial_hidden(&self, _batch_size: usize, _device: &B::Device) -> Self::Hidden {}

    fn forward_sequence(
        &self,
        inputs: Tensor<B, 3>,
        masks: Tensor<B, 3>,
        original_predictions: Tensor<B, 3>,
        _hidden: Self::Hidden,
    ) -> (Tensor<B, 3>, Self::Hidden) {
        // No realignment: the "estimate" is the original prediction.
        let out = blend_output(masks, inputs, original_predictions);
        (out, ())
    }
}

// ─── Sequence (single shared recurrent corrector) ─────────────────────────────

#[derive(Config, Debug)]
pub struct SequenceCorrectorConfig {
    pub num_concepts: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub input_format: InputFormat,
}

impl SequenceCorrectorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceCorrector<B> {
        let layers = (0..self.num_layers)
            .map(|layer| {
                let d_input = if layer == 0 {
                    self.num_concepts
                } else {
                    self.hidden_size
                };
                LstmConfig::new(d_input, self.hidden_size, true)
                    .with_initializer(xavier())
                    .init(device)
            })
            .collect();
        let head = LinearConfig::new(self.hidden_size, self.num_concepts)
            .with_initializer(xavier())
            .init(device);
        SequenceCorrector {
            layers,
            head,
            num_concepts: self.num_concepts,
            hidden_size: self.hidden_size,
            input_format: Ignored(self.input_format),
        }
    }
}

#[derive(Module, Debug)]
pub struct SequenceCorrector<B: Backend> {
    layers: Vec<Lstm<B>>,
    head: Linear<B>,
    num_concepts: usize,
    hidden_size: usize,
    input_format: Ignored<InputFormat>,
}

/// Opaque recurrent memory: one LSTM state per stacked layer.
pub struct RecurrentState<B: Backend> {
    layers: Vec<LstmState<B, 2>>,
}

impl<B: Backend> ConceptCorrector<B> for SequenceCorrector<B> {
    type Hidden = RecurrentState<B>;

    fn prepare_initial_hidden(&self, batch_size: usize, device: &B::Device) -> Self::Hidden {
        RecurrentState {
            layers: zero_lstm_states(self.layers.len(), batch_size, self.hidden_size, device),
        }
    }

    fn forward_sequence(
        &self,
        inputs: Tensor<B, 3>,
        masks: Tensor<B, 3>,
        original_predictions: Tensor<B, 3>,
        hidden: Self::Hidden,
    ) -> (Tensor<B, 3>, Self::Hidden) {
        let x = blend_input(
            self.input_format.0,
            inputs.clone(),
            masks.clone(),
            original_predictions,
        );
        let (lstm_out, next_states) = run_lstm_stack(&self.layers, x, hidden.layers);
        let estimate = sigmoid(self.head.forward(lstm_out));
        let out = blend_output(masks, inputs, estimate);
        (out, RecurrentState { layers: next_states })
    }
}

// ─── MultiSequence (cluster-routed recurrent correctors) ──────────────────────

#[derive(Config, Debug)]
pub struct MultiSequenceCorrectorConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub input_format: InputFormat,
}

impl MultiSequenceCorrectorConfig {
    /// Builds one sub-model per non-empty cluster of `assignment`.
    pub fn init<B: Backend>(
        &self,
        assignment: ClusterAssignment,
        device: &B::Device,
    ) -> MultiSequenceCorrector<B> {
        let clusters = (0..assignment.num_clusters())
            .map(|cluster| {
                let members = assignment.members(cluster);
                if members.is_empty() {
                    return None;
                }
                let width = members.len();
                let layers = (0..self.num_layers)
                    .map(|layer| {
                        let d_input = if layer == 0 { width } else { self.hidden_size };
                        LstmConfig::new(d_input, self.hidden_size, true)
                            .with_initializer(xavier())
                            .init(device)
                    })
                    .collect();
                let head = LinearConfig::new(self.hidden_size, width)
                    .with_initializer(xavier())
                    .init(device);
                Some(ClusterNet {
                    layers,
                    head,
                    members: Ignored(members.to_vec()),
                })
            })
            .collect();
        MultiSequenceCorrector {
            clusters,
            assignment: Ignored(assignment),
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            input_format: Ignored(self.input_format),
        }
    }
}

/// One cluster's private recurrent sub-model.
#[derive(Module, Debug)]
pub struct ClusterNet<B: Backend> {
    layers: Vec<Lstm<B>>,
    head: Linear<B>,
    members: Ignored<Vec<usize>>,
}

#[derive(Module, Debug)]
pub struct MultiSequenceCorrector<B: Backend> {
    // Indexed by cluster id; None for clusters with no concepts.
    clusters: Vec<Option<ClusterNet<B>>>,
    assignment: Ignored<ClusterAssignment>,
    hidden_size: usize,
    num_layers: usize,
    input_format: Ignored<InputFormat>,
}

impl<B: Backend> MultiSequenceCorrector<B> {
    pub fn assignment(&self) -> &ClusterAssignment {
        &self.assignment.0
    }
}

/// One independent state bundle per cluster (empty for empty clusters).
pub struct MultiRecurrentState<B: Backend> {
    clusters: Vec<Vec<LstmState<B, 2>>>,
}

impl<B: Backend> ConceptCorrector<B> for MultiSequenceCorrector<B> {
    type Hidden = MultiRecurrentState<B>;

    fn prepare_initial_hidden(&self, batch_size: usize, device: &B::Device) -> Self::Hidden {
        MultiRecurrentState {
            clusters: self
                .clusters
                .iter()
                .map(|net| match net {
                    Some(_) => {
                        zero_lstm_states(self.num_layers, batch_size, self.hidden_size, device)
                    }
                    None => Vec::new(),
                })
                .collect(),
        }
    }

    fn forward_sequence(
        &self,
        inputs: Tensor<B, 3>,
        masks: Tensor<B, 3>,
        original_predictions: Tensor<B, 3>,
        hidden: Self::Hidden,
    ) -> (Tensor<B, 3>, Self::Hidden) {
        let x = blend_input(
            self.input_format.0,
            inputs.clone(),
            masks.clone(),
            original_predictions,
        );
        let device = x.device();
        let [batch, time, k] = x.dims();
        debug_assert_eq!(k, self.assignment.0.num_concepts());

        let mut out = Tensor::zeros([batch, time, k], &device);
        let mut next_states = Vec::with_capacity(self.clusters.len());
        for (net, states) in self.clusters.iter().zip(hidden.clusters.into_iter()) {
            let Some(net) = net else {
                // Empty cluster: nothing to compute, nothing to update.
                next_states.push(states);
                continue;
            };
            let member_ints: Vec<i32> = net.members.0.iter().map(|&c| c as i32).collect();
            let members = Tensor::<B, 1, Int>::from_ints(member_ints.as_slice(), &device);

            let cluster_x = x.clone().select(2, members.clone());
            let (lstm_out, states) = run_lstm_stack(&net.layers, cluster_x, states);
            let estimate = sigmoid(net.head.forward(lstm_out));
            let cluster_out = blend_output(
                masks.clone().select(2, members.clone()),
                inputs.clone().select(2, members.clone()),
                estimate,
            );
            // Clusters are disjoint and `out` starts at zero, so the
            // additive select_assign acts as a plain scatter-write.
            out = out.select_assign(2, members, cluster_out);
            next_states.push(states);
        }
        (out, MultiRecurrentState { clusters: next_states })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    fn device() -> <TestBackend as Backend>::Device {
        Default::default()
    }

    fn tensor2(values: Vec<f32>, batch: usize, k: usize) -> Tensor<TestBackend, 2> {
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), &device()).reshape([batch, k])
    }

    fn host(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn baseline_keeps_groundtruth_where_masked_and_original_elsewhere() {
        let corrector = BaselineCorrector::new(3, InputFormat::OriginalAndIntervenedInplace);
        let inputs = tensor2(vec![1.0, 0.3, 0.8], 1, 3);
        let mask = tensor2(vec![1.0, 0.0, 0.0], 1, 3);
        let original = tensor2(vec![0.6, 0.3, 0.8], 1, 3);
        let (out, ()) = corrector.forward_step(inputs, mask, original, ());
        assert_eq!(host(out), vec![1.0, 0.3, 0.8]);
    }

    #[test]
    fn sequence_masked_dimensions_pass_through_exactly() {
        let corrector = SequenceCorrectorConfig::new(4, 8, 2, InputFormat::OriginalAndIntervenedInplace)
            .init::<TestBackend>(&device());
        let inputs = tensor2(vec![1.0, 0.9, 0.0, 0.5], 1, 4);
        let mask = tensor2(vec![1.0, 0.0, 1.0, 0.0], 1, 4);
        let original = tensor2(vec![0.2, 0.9, 0.7, 0.5], 1, 4);
        let hidden = corrector.prepare_initial_hidden(1, &device());
        let (out, _) = corrector.forward_step(inputs, mask, original, hidden);
        let out = host(out);
        // Revealed dims are bit-exact inputs; the rest are fresh estimates in [0, 1].
        assert_eq!(out[0], 1.0);
        assert_eq!(out[2], 0.0);
        for value in out {
            assert!((0.0..=1.0).contains(&value), "out of range: {value}");
        }
    }

    #[test]
    fn sequence_step_matches_sequence_forward() {
        // Stepping twice with threaded hidden state must equal one
        // two-timestep sequence pass — training replays trajectories
        // this way.
        let corrector = SequenceCorrectorConfig::new(3, 6, 2, InputFormat::OriginalAndIntervenedInplace)
            .init::<TestBackend>(&device());
        let d = device();
        let inputs_t0 = tensor2(vec![0.4, 0.6, 0.1], 1, 3);
        let inputs_t1 = tensor2(vec![1.0, 0.6, 0.1], 1, 3);
        let mask_t0 = tensor2(vec![0.0, 0.0, 0.0], 1, 3);
        let mask_t1 = tensor2(vec![1.0, 0.0, 0.0], 1, 3);
        let original = tensor2(vec![0.4, 0.6, 0.1], 1, 3);

        let hidden = corrector.prepare_initial_hidden(1, &d);
        let (out0, hidden) = corrector.forward_step(
            inputs_t0.clone(),
            mask_t0.clone(),
            original.clone(),
            hidden,
        );
        let (out1, _) = corrector.forward_step(
            inputs_t1.clone(),
            mask_t1.clone(),
            original.clone(),
            hidden,
        );

        let seq_inputs = Tensor::cat(vec![inputs_t0, inputs_t1], 0).reshape([1, 2, 3]);
        let seq_masks = Tensor::cat(vec![mask_t0, mask_t1], 0).reshape([1, 2, 3]);
        let seq_original = Tensor::cat(vec![original.clone(), original], 0).reshape([1, 2, 3]);
        let hidden = corrector.prepare_initial_hidden(1, &d);
        let (seq_out, _) = corrector.forward_sequence(seq_inputs, seq_masks, seq_original, hidden);
        let seq_out = seq_out.reshape([2, 3]).into_data().to_vec::<f32>().unwrap();

        let stepped: Vec<f32> = host(out0).into_iter().chain(host(out1)).collect();
        for (a, b) in stepped.iter().zip(seq_out.iter()) {
            assert!((a - b).abs() < 1e-5, "step/sequence mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn multi_sequence_routes_every_concept_and_skips_empty_clusters() {
        // Cluster 1 is empty on purpose.
        let assignment = ClusterAssignment::new(vec![0, 2, 0, 2, 2], 3).unwrap();
        let corrector = MultiSequenceCorrectorConfig::new(6, 1, InputFormat::OriginalAndIntervenedInplace)
            .init::<TestBackend>(assignment, &device());
        let inputs = tensor2(vec![0.2, 1.0, 0.7, 0.4, 0.9], 1, 5);
        let mask = tensor2(vec![0.0, 1.0, 0.0, 0.0, 0.0], 1, 5);
        let original = tensor2(vec![0.2, 0.5, 0.7, 0.4, 0.9], 1, 5);
        let hidden = corrector.prepare_initial_hidden(1, &device());
        let (out, _) = corrector.forward_step(inputs, mask, original, hidden);
        let out = host(out);
        // Masked concept 1 passes through; every routed output is in range
        // and actually written (sigmoid output of a fresh LSTM is never
        // exactly zero, so a dropped index would show up as 0.0).
        assert_eq!(out[1], 1.0);
        for (concept, value) in out.iter().enumerate() {
            assert!((0.0..=1.0).contains(value));
            assert!(*value > 0.0, "concept {concept} was never written");
        }
    }

    #[test]
    fn multi_sequence_hidden_state_is_per_cluster() {
        let assignment = ClusterAssignment::new(vec![0, 1, 0, 1], 2).unwrap();
        let corrector = MultiSequenceCorrectorConfig::new(4, 2, InputFormat::OriginalAndIntervenedInplace)
            .init::<TestBackend>(assignment, &device());
        let hidden = corrector.prepare_initial_hidden(3, &device());
        assert_eq!(hidden.clusters.len(), 2);
        for states in &hidden.clusters {
            assert_eq!(states.len(), 2);
            for state in states {
                assert_eq!(state.hidden.dims(), [3, 4]);
            }
        }
    }
}
