// ============================================================
// Layer 5 — Pre-trained Adapter
// ============================================================
// An optional, frozen Sequence corrector applied once to the raw
// concept predictions before any simulation or training. It runs
// on the inference backend only and its weights are never touched
// by the optimizer. A configured-but-missing adapter directory is
// a fatal error before training starts.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::config::Config;

use crate::data::dataset::ConceptSample;
use crate::domain::concepts::{ConceptMatrix, InterventionMask};
use crate::ml::corrector::{ConceptCorrector, SequenceCorrector, SequenceCorrectorConfig};
use crate::ml::simulator::{mask_to_tensor, matrix_to_tensor};
use crate::ml::trainer::{Device, EvalBackend};

const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
const ADAPTER_WEIGHTS_FILE: &str = "adapter_model";

#[derive(Debug)]
pub struct PretrainedAdapter {
    corrector: SequenceCorrector<EvalBackend>,
}

impl PretrainedAdapter {
    /// Load a frozen adapter from `dir`, which must hold the
    /// architecture config and the recorded weights.
    pub fn load(dir: &Path, device: &Device) -> Result<Self> {
        if !dir.is_dir() {
            bail!("pre-trained adapter directory not found: {}", dir.display());
        }
        let config = SequenceCorrectorConfig::load(dir.join(ADAPTER_CONFIG_FILE))
            .map_err(|e| anyhow::anyhow!("loading adapter config from {}: {e}", dir.display()))?;
        let corrector = crate::infra::checkpoint::CheckpointManager::new(dir)
            .load_model(config.init::<EvalBackend>(device), ADAPTER_WEIGHTS_FILE, device)
            .with_context(|| format!("loading adapter weights from {}", dir.display()))?;
        Ok(Self { corrector })
    }

    /// Persist an adapter (config + weights) so [`load`] can rebuild it.
    pub fn save(
        config: &SequenceCorrectorConfig,
        corrector: SequenceCorrector<EvalBackend>,
        dir: &Path,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating adapter dir {}", dir.display()))?;
        config
            .save(dir.join(ADAPTER_CONFIG_FILE))
            .map_err(|e| anyhow::anyhow!("saving adapter config to {}: {e}", dir.display()))?;
        crate::infra::checkpoint::CheckpointManager::new(dir)
            .save_model(corrector, ADAPTER_WEIGHTS_FILE)
    }

    /// One corrective pass over raw predictions: empty mask, the
    /// predictions themselves as the original anchor.
    pub fn apply(&self, predicted: &ConceptMatrix, device: &Device) -> Result<ConceptMatrix> {
        let (batch, k) = (predicted.batch_size(), predicted.num_concepts());
        let mask = InterventionMask::new(batch, k);
        let inputs = matrix_to_tensor::<EvalBackend>(predicted, device);
        let hidden = self.corrector.prepare_initial_hidden(batch, device);
        let (out, _) = self.corrector.forward_step(
            inputs.clone(),
            mask_to_tensor::<EvalBackend>(&mask, device),
            inputs,
            hidden,
        );
        let values = out
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("reading adapted predictions back to host: {e:?}"))?;
        Ok(ConceptMatrix::from_flat(values, batch, k))
    }

    /// Rewrite every sample's predicted concepts in place.
    pub fn apply_to_samples(&self, samples: &mut [ConceptSample], device: &Device) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let k = samples[0].num_concepts();
        let flat: Vec<f32> = samples.iter().flat_map(|s| s.predicted.clone()).collect();
        let adapted = self.apply(&ConceptMatrix::from_flat(flat, samples.len(), k), device)?;
        for (sample, row) in samples.iter_mut().enumerate() {
            row.predicted = adapted.row(sample).to_vec();
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::variants::InputFormat;

    fn device() -> Device {
        Default::default()
    }

    #[test]
    fn missing_adapter_directory_is_fatal() {
        let err = PretrainedAdapter::load(Path::new("/nonexistent/adapter"), &device())
            .unwrap_err()
            .to_string();
        assert!(err.contains("not found"), "unexpected error: {err}");
    }

    #[test]
    fn saved_adapter_round_trips_and_keeps_outputs_in_range() {
        let d = device();
        let dir = std::env::temp_dir().join(format!("realign-adapter-test-{}", std::process::id()));
        let config =
            SequenceCorrectorConfig::new(3, 6, 1, InputFormat::OriginalAndIntervenedInplace);
        PretrainedAdapter::save(&config, config.init::<EvalBackend>(&d), &dir).unwrap();

        let adapter = PretrainedAdapter::load(&dir, &d).unwrap();
        let mut samples = vec![ConceptSample {
            predicted: vec![0.2, 0.9, 0.5],
            groundtruth: vec![0.0, 1.0, 1.0],
            label: 1,
        }];
        adapter.apply_to_samples(&mut samples, &d).unwrap();
        assert_eq!(samples[0].predicted.len(), 3);
        for v in &samples[0].predicted {
            assert!((0.0..=1.0).contains(v));
        }
        // Ground truth is untouched.
        assert_eq!(samples[0].groundtruth, vec![0.0, 1.0, 1.0]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
