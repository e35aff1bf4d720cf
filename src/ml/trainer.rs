// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Trajectory-based training: every batch is first rolled through a
// full intervention episode without gradients (on the inner
// backend), then the recorded trajectory is replayed as one stacked
// sequence forward pass on the autodiff backend and the BCE loss
// against ground truth is backpropagated. AdamW with stepped
// learning-rate decay; validation after every epoch drives early
// stopping and best-checkpoint saving.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use burn::data::dataloader::DataLoader;
use burn::module::AutodiffModule;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use tracing::info;

use crate::data::batcher::ConceptBatch;
use crate::domain::clusters::ClusterAssignment;
use crate::domain::trajectory::Trajectory;
use crate::domain::variants::ModelKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EarlyStopping, EpochMetrics, MetricsLogger};
use crate::ml::corrector::ConceptCorrector;
use crate::ml::policy::InterventionPolicy;
use crate::ml::simulator::sample_trajectory;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
pub type EvalBackend = burn::backend::NdArray<f32>;
pub type Device = <EvalBackend as Backend>::Device;

const METRICS_FILE: &str = "metrics.csv";
const BCE_EPS: f32 = 1e-7;

/// Mean binary cross-entropy between probabilities and 0/1 targets.
/// Predictions are clamped away from {0, 1} so the logs stay finite.
pub fn binary_cross_entropy<B: Backend, const D: usize>(
    prediction: Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    let p = prediction.clamp(BCE_EPS, 1.0 - BCE_EPS);
    let one = p.ones_like();
    let per_element = target.clone() * p.clone().log() + (one.clone() - target) * (one - p).log();
    per_element.mean().neg()
}

/// Replay a recorded trajectory as one stacked sequence pass and
/// score the output against ground truth. On an autodiff backend
/// this is the differentiable half of training.
pub fn trajectory_loss<B, M>(
    corrector: &M,
    trajectory: &Trajectory,
    device: &B::Device,
) -> Tensor<B, 1>
where
    B: Backend,
    M: ConceptCorrector<B>,
{
    let (batch, time, k) = (
        trajectory.batch_size(),
        trajectory.len(),
        trajectory.num_concepts(),
    );
    let stacked = |values: Vec<f32>| {
        Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([batch, time, k])
    };
    let inputs = stacked(trajectory.stacked_inputs());
    let masks = stacked(trajectory.stacked_masks());
    let original = stacked(trajectory.stacked_original_predictions());
    let target = stacked(trajectory.stacked_groundtruth());

    let hidden = corrector.prepare_initial_hidden(batch, device);
    let (out, _) = corrector.forward_sequence(inputs, masks, original, hidden);
    binary_cross_entropy(out, target)
}

#[derive(Debug, Clone)]
pub struct TrainingSettings {
    pub num_epochs: usize,
    pub learning_rate: f64,
    pub lr_decay_gamma: f64,
    pub lr_decay_step: usize,
    pub weight_decay: f32,
    pub patience: usize,
    pub policy: InterventionPolicy,
    pub validation_policy: InterventionPolicy,
    pub max_interventions: usize,
}

#[derive(Debug)]
pub struct TrainReport {
    pub epochs_run: usize,
    pub best_val_loss: f64,
    pub checkpoint: PathBuf,
}

/// Stepped exponential decay: the rate drops by `gamma` every
/// `lr_decay_step` completed epochs.
fn learning_rate_at(settings: &TrainingSettings, epoch: usize) -> f64 {
    let decays = ((epoch - 1) / settings.lr_decay_step) as i32;
    settings.learning_rate * settings.lr_decay_gamma.powi(decays)
}

/// Mean trajectory loss over a whole dataloader, no gradients.
pub fn evaluate<B, M>(
    corrector: &M,
    loader: &Arc<dyn DataLoader<ConceptBatch<B>>>,
    policy: InterventionPolicy,
    max_interventions: usize,
    clusters: Option<&ClusterAssignment>,
    device: &B::Device,
) -> Result<f64>
where
    B: Backend,
    M: ConceptCorrector<B>,
{
    let mut sum = 0.0;
    let mut batches = 0usize;
    for batch in loader.iter() {
        let trajectory = sample_trajectory::<B, _>(
            corrector,
            batch.predicted_host(),
            batch.groundtruth_host(),
            policy,
            max_interventions,
            clusters,
            device,
        )?;
        let loss = trajectory_loss::<B, _>(corrector, &trajectory, device);
        sum += loss.into_scalar().elem::<f64>();
        batches += 1;
    }
    Ok(if batches == 0 { 0.0 } else { sum / batches as f64 })
}

/// Full training run for a trainable corrector. Returns the trained
/// model (as of the last epoch) and a report pointing at the best
/// validation checkpoint.
#[allow(clippy::too_many_arguments)]
pub fn run_training<M>(
    mut model: M,
    kind: ModelKind,
    train_loader: Arc<dyn DataLoader<ConceptBatch<TrainBackend>>>,
    val_loader: Arc<dyn DataLoader<ConceptBatch<EvalBackend>>>,
    clusters: Option<&ClusterAssignment>,
    settings: &TrainingSettings,
    checkpoints: &CheckpointManager,
    device: &Device,
) -> Result<(M, TrainReport)>
where
    M: ConceptCorrector<TrainBackend> + AutodiffModule<TrainBackend>,
    M::InnerModule: ConceptCorrector<EvalBackend>,
{
    let mut optim = AdamWConfig::new()
        .with_weight_decay(settings.weight_decay)
        .init();
    let mut stopper = EarlyStopping::new(settings.patience);
    let logger = MetricsLogger::create(checkpoints.dir().join(METRICS_FILE))?;
    let checkpoint_name = CheckpointManager::best_model_name(kind);
    let mut checkpoint_path = checkpoints.dir().join(&checkpoint_name);

    info!(model = %kind, epochs = settings.num_epochs, "starting training");

    let mut epochs_run = 0;
    for epoch in 1..=settings.num_epochs {
        epochs_run = epoch;
        let lr = learning_rate_at(settings, epoch);

        let mut train_sum = 0.0;
        let mut train_batches = 0usize;
        for batch in train_loader.iter() {
            // Simulation runs gradient-free on the inner backend;
            // only the replay below builds a graph.
            let rollout_model = model.valid();
            let trajectory = sample_trajectory::<EvalBackend, _>(
                &rollout_model,
                batch.predicted_host(),
                batch.groundtruth_host(),
                settings.policy,
                settings.max_interventions,
                clusters,
                device,
            )?;
            let loss = trajectory_loss::<TrainBackend, _>(&model, &trajectory, device);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(lr, model, grads);
            train_sum += loss.into_scalar().elem::<f64>();
            train_batches += 1;
        }
        let train_loss = train_sum / train_batches.max(1) as f64;

        let rollout_model = model.valid();
        let val_loss = evaluate::<EvalBackend, _>(
            &rollout_model,
            &val_loader,
            settings.validation_policy,
            settings.max_interventions,
            clusters,
            device,
        )?;

        logger.log(&EpochMetrics {
            epoch,
            train_loss,
            val_loss,
            learning_rate: lr,
        })?;
        println!(
            "epoch {epoch:>3}/{} | train loss {train_loss:.5} | val loss {val_loss:.5} | lr {lr:.6}",
            settings.num_epochs
        );

        if stopper.observe(val_loss) {
            checkpoint_path = checkpoints.save_model(model.clone(), &checkpoint_name)?;
            info!(epoch, val_loss, "new best model saved");
        }
        if stopper.should_stop() {
            info!(
                epoch,
                patience = settings.patience,
                "early stopping: validation loss stopped improving"
            );
            break;
        }
    }

    Ok((
        model,
        TrainReport {
            epochs_run,
            best_val_loss: stopper.best_loss(),
            checkpoint: checkpoint_path,
        },
    ))
}
