use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One observation at the engine's input boundary: the noisy predicted
/// concepts, their ground-truth values, and the sample's target class.
/// Predicted values lie in [0, 1]; ground truth is 0/1. The label is
/// only used to check class coverage during data generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSample {
    pub predicted: Vec<f32>,
    pub groundtruth: Vec<f32>,
    pub label: usize,
}

impl ConceptSample {
    pub fn num_concepts(&self) -> usize {
        self.predicted.len()
    }
}

pub struct ConceptDataset {
    samples: Vec<ConceptSample>,
}

impl ConceptDataset {
    pub fn new(samples: Vec<ConceptSample>) -> Self {
        Self { samples }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<ConceptSample> for ConceptDataset {
    fn get(&self, index: usize) -> Option<ConceptSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
