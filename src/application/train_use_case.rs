// ============================================================
// Layer 2 — Train Use Case
// ============================================================
// End-to-end training run: generate the synthetic dataset (with
// class-coverage retries), optionally adapt the raw predictions
// with a frozen pre-trained corrector, split, build the selected
// corrector variant and either train it or, for Baseline, just
// report its intervention loss on both splits.

use anyhow::Result;
use burn::data::dataloader::DataLoaderBuilder;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::application::config::RealignConfig;
use crate::data::batcher::ConceptBatcher;
use crate::data::dataset::{ConceptDataset, ConceptSample};
use crate::data::splitter::split_train_val;
use crate::data::synthetic::generate_with_class_coverage;
use crate::domain::clusters::ClusterAssignment;
use crate::domain::variants::ModelKind;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::adapter::PretrainedAdapter;
use crate::ml::corrector::{
    BaselineCorrector, MultiSequenceCorrectorConfig, SequenceCorrectorConfig,
};
use crate::ml::trainer::{evaluate, run_training, Device, EvalBackend, TrainBackend};

pub struct TrainUseCase {
    config: RealignConfig,
}

impl TrainUseCase {
    pub fn new(config: RealignConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn execute(&self) -> Result<()> {
        let config = &self.config;
        let device = Device::default();

        let generated = generate_with_class_coverage(
            config.num_concepts,
            config.num_samples,
            config.num_train(),
            config.num_classes,
            config.num_clusters,
            config.seed,
        )?;
        let clusters = generated.clusters;
        let mut samples = generated.samples;

        // The adapter must resolve before any training work happens.
        if let Some(path) = &config.adapter_path {
            let adapter = PretrainedAdapter::load(path, &device)?;
            info!(path = %path.display(), "applying pre-trained adapter to raw predictions");
            adapter.apply_to_samples(&mut samples, &device)?;
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let (train, val) = split_train_val(samples, config.train_fraction, &mut rng);
        info!(
            train = train.len(),
            val = val.len(),
            concepts = config.num_concepts,
            "dataset ready"
        );

        let checkpoints = CheckpointManager::new(&config.output_dir);
        checkpoints.save_config(config)?;

        match config.model {
            ModelKind::Baseline => self.run_baseline(train, val, &clusters, &device),
            ModelKind::Sequence => {
                let model = SequenceCorrectorConfig::new(
                    config.num_concepts,
                    config.hidden_size,
                    config.num_layers,
                    config.input_format,
                )
                .init::<TrainBackend>(&device);
                self.run_trainable(model, None, train, val, &checkpoints, &device)
            }
            ModelKind::MultiSequence => {
                let model = MultiSequenceCorrectorConfig::new(
                    config.hidden_size,
                    config.num_layers,
                    config.input_format,
                )
                .init::<TrainBackend>(clusters.clone(), &device);
                self.run_trainable(model, Some(&clusters), train, val, &checkpoints, &device)
            }
        }
    }

    /// Baseline is never trained: one intervention-loss pass per split
    /// is the whole run.
    fn run_baseline(
        &self,
        train: Vec<ConceptSample>,
        val: Vec<ConceptSample>,
        clusters: &ClusterAssignment,
        device: &Device,
    ) -> Result<()> {
        let config = &self.config;
        let corrector = BaselineCorrector::new(config.num_concepts, config.input_format);
        let mut losses = Vec::new();
        for (name, samples) in [("train", train), ("val", val)] {
            let loader = DataLoaderBuilder::new(ConceptBatcher::<EvalBackend>::new(device.clone()))
                .batch_size(config.batch_size)
                .num_workers(1)
                .build(ConceptDataset::new(samples));
            let loss = evaluate::<EvalBackend, _>(
                &corrector,
                &loader,
                config.intervention_policy_validate,
                config.max_interventions,
                Some(clusters),
                device,
            )?;
            println!("baseline {name} intervention loss: {loss:.5}");
            losses.push(loss);
        }
        info!(
            train_loss = losses[0],
            val_loss = losses[1],
            "baseline evaluation finished"
        );
        Ok(())
    }

    fn run_trainable<M>(
        &self,
        model: M,
        clusters: Option<&ClusterAssignment>,
        train: Vec<ConceptSample>,
        val: Vec<ConceptSample>,
        checkpoints: &CheckpointManager,
        device: &Device,
    ) -> Result<()>
    where
        M: crate::ml::corrector::ConceptCorrector<TrainBackend>
            + burn::module::AutodiffModule<TrainBackend>,
        M::InnerModule: crate::ml::corrector::ConceptCorrector<EvalBackend>,
    {
        let config = &self.config;
        let train_loader = DataLoaderBuilder::new(ConceptBatcher::<TrainBackend>::new(device.clone()))
            .batch_size(config.batch_size)
            .shuffle(config.seed)
            .num_workers(1)
            .build(ConceptDataset::new(train));
        let val_loader = DataLoaderBuilder::new(ConceptBatcher::<EvalBackend>::new(device.clone()))
            .batch_size(config.batch_size)
            .num_workers(1)
            .build(ConceptDataset::new(val));

        let (_, report) = run_training(
            model,
            config.model,
            train_loader,
            val_loader,
            clusters,
            &config.training_settings(),
            checkpoints,
            device,
        )?;
        println!(
            "training finished after {} epoch(s), best val loss {:.5}, checkpoint {}",
            report.epochs_run,
            report.best_val_loss,
            report.checkpoint.display()
        );
        Ok(())
    }
}
