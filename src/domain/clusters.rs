// ============================================================
// Layer 3 — Cluster Assignment
// ============================================================
// A fixed mapping from concept index → cluster id, supplied once
// when the multi-cluster corrector is built and immutable for the
// model's lifetime. Every concept belongs to exactly one cluster;
// clusters are allowed to be empty (the corrector simply skips
// them), so any partition produced by an upstream clustering run
// is accepted as-is.

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    concept_to_cluster: Vec<usize>,
    num_clusters: usize,
    // Precomputed index sets, one per cluster id.
    members: Vec<Vec<usize>>,
}

impl ClusterAssignment {
    /// Validate and index a concept → cluster mapping.
    /// Fails if any cluster id is outside `[0, num_clusters)` or if
    /// the mapping is empty.
    pub fn new(concept_to_cluster: Vec<usize>, num_clusters: usize) -> Result<Self> {
        if concept_to_cluster.is_empty() {
            bail!("cluster assignment must cover at least one concept");
        }
        if num_clusters == 0 {
            bail!("cluster assignment needs at least one cluster");
        }
        let mut members = vec![Vec::new(); num_clusters];
        for (concept, &cluster) in concept_to_cluster.iter().enumerate() {
            if cluster >= num_clusters {
                bail!(
                    "concept {concept} maps to cluster {cluster}, but only {num_clusters} clusters exist"
                );
            }
            members[cluster].push(concept);
        }
        Ok(Self {
            concept_to_cluster,
            num_clusters,
            members,
        })
    }

    pub fn num_concepts(&self) -> usize {
        self.concept_to_cluster.len()
    }

    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub fn cluster_of(&self, concept: usize) -> usize {
        self.concept_to_cluster[concept]
    }

    /// Concept indices belonging to `cluster`, in ascending order.
    pub fn members(&self, cluster: usize) -> &[usize] {
        &self.members[cluster]
    }

    pub fn is_empty_cluster(&self, cluster: usize) -> bool {
        self.members[cluster].is_empty()
    }

    pub fn mapping(&self) -> &[usize] {
        &self.concept_to_cluster
    }
}
