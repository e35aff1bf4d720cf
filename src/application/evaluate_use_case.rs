// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Re-runs the intervention loop against a finished run directory:
// loads train_config.json, regenerates the identical dataset and
// split, rebuilds the corrector (loading the newest best checkpoint
// for trainable variants) and reports the trajectory loss on both
// splits.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
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
    BaselineCorrector, ConceptCorrector, MultiSequenceCorrectorConfig, SequenceCorrectorConfig,
};
use crate::ml::trainer::{evaluate, Device, EvalBackend};

pub struct EvaluateUseCase {
    run_dir: PathBuf,
    /// Explicit checkpoint stem; defaults to the newest
    /// `best_model_<variant>_*` file in the run directory.
    checkpoint: Option<String>,
}

impl EvaluateUseCase {
    pub fn new(run_dir: PathBuf, checkpoint: Option<String>) -> Self {
        Self {
            run_dir,
            checkpoint,
        }
    }

    pub fn execute(&self) -> Result<()> {
        let device = Device::default();
        let checkpoints = CheckpointManager::new(&self.run_dir);
        let config: RealignConfig = checkpoints.load_config()?;
        config.validate()?;

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
        if let Some(path) = &config.adapter_path {
            PretrainedAdapter::load(path, &device)?.apply_to_samples(&mut samples, &device)?;
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (train, val) = split_train_val(samples, config.train_fraction, &mut rng);

        match config.model {
            ModelKind::Baseline => {
                let corrector = BaselineCorrector::new(config.num_concepts, config.input_format);
                self.report(&corrector, &config, &clusters, train, val, &device)
            }
            ModelKind::Sequence => {
                let model = SequenceCorrectorConfig::new(
                    config.num_concepts,
                    config.hidden_size,
                    config.num_layers,
                    config.input_format,
                )
                .init::<EvalBackend>(&device);
                let name = self.checkpoint_name(config.model)?;
                info!(checkpoint = %name, "loading trained corrector");
                let model = checkpoints.load_model(model, &name, &device)?;
                self.report(&model, &config, &clusters, train, val, &device)
            }
            ModelKind::MultiSequence => {
                let model = MultiSequenceCorrectorConfig::new(
                    config.hidden_size,
                    config.num_layers,
                    config.input_format,
                )
                .init::<EvalBackend>(clusters.clone(), &device);
                let name = self.checkpoint_name(config.model)?;
                info!(checkpoint = %name, "loading trained corrector");
                let model = checkpoints.load_model(model, &name, &device)?;
                self.report(&model, &config, &clusters, train, val, &device)
            }
        }
    }

    fn report<M>(
        &self,
        corrector: &M,
        config: &RealignConfig,
        clusters: &ClusterAssignment,
        train: Vec<ConceptSample>,
        val: Vec<ConceptSample>,
        device: &Device,
    ) -> Result<()>
    where
        M: ConceptCorrector<EvalBackend>,
    {
        for (name, samples) in [("train", train), ("val", val)] {
            let loader = DataLoaderBuilder::new(ConceptBatcher::<EvalBackend>::new(device.clone()))
                .batch_size(config.batch_size)
                .num_workers(1)
                .build(ConceptDataset::new(samples));
            let loss = evaluate::<EvalBackend, _>(
                corrector,
                &loader,
                config.intervention_policy_validate,
                config.max_interventions,
                Some(clusters),
                device,
            )?;
            println!("{} {name} intervention loss: {loss:.5}", config.model);
        }
        Ok(())
    }

    /// Resolve the checkpoint stem to load: the explicit CLI choice,
    /// or the most recently written best checkpoint of this variant.
    fn checkpoint_name(&self, kind: ModelKind) -> Result<String> {
        if let Some(name) = &self.checkpoint {
            return Ok(name.clone());
        }
        let prefix = format!("best_model_{}_", kind.tag());
        let mut newest: Option<(SystemTime, String)> = None;
        let entries = fs::read_dir(&self.run_dir)
            .with_context(|| format!("reading run dir {}", self.run_dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if stem.starts_with(&prefix) => stem.to_string(),
                _ => continue,
            };
            let modified = entry.metadata()?.modified()?;
            if newest.as_ref().map_or(true, |(when, _)| modified > *when) {
                newest = Some((modified, stem));
            }
        }
        match newest {
            Some((_, stem)) => Ok(stem),
            None => bail!(
                "no {prefix}* checkpoint found in {} (pass one explicitly or train first)",
                self.run_dir.display()
            ),
        }
    }
}
