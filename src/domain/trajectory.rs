// ============================================================
// Layer 3 — Trajectory
// ============================================================
// The recorded history of one simulated intervention episode.
//
// The simulator records one snapshot before any intervention and
// one after each intervention step, so a finished trajectory has
// `min(max_interventions, k) + 1` snapshots. Both the concept
// values and the mask are copied at record time — later steps can
// never alias or rewrite an earlier snapshot.
//
// The original prediction and the ground truth are constant over
// the episode, so they are stored once and replicated when the
// trajectory is stacked along the time axis for the sequence
// forward pass.

use crate::domain::concepts::{ConceptMatrix, InterventionMask};

/// One recorded timestep: the post-step concept values and mask.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub concepts: ConceptMatrix,
    pub mask: InterventionMask,
}

#[derive(Debug, Clone)]
pub struct Trajectory {
    snapshots: Vec<Snapshot>,
    original_predictions: ConceptMatrix,
    groundtruth: ConceptMatrix,
}

impl Trajectory {
    /// Start recording an episode. `original_predictions` is the
    /// concept state at simulation start, before any timestep.
    pub fn new(original_predictions: ConceptMatrix, groundtruth: ConceptMatrix) -> Self {
        Self {
            snapshots: Vec::new(),
            original_predictions,
            groundtruth,
        }
    }

    pub fn record(&mut self, concepts: ConceptMatrix, mask: InterventionMask) {
        self.snapshots.push(Snapshot { concepts, mask });
    }

    /// Number of recorded snapshots (interventions performed + 1).
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.original_predictions.batch_size()
    }

    pub fn num_concepts(&self) -> usize {
        self.original_predictions.num_concepts()
    }

    pub fn snapshot(&self, step: usize) -> &Snapshot {
        &self.snapshots[step]
    }

    pub fn original_predictions(&self) -> &ConceptMatrix {
        &self.original_predictions
    }

    pub fn groundtruth(&self) -> &ConceptMatrix {
        &self.groundtruth
    }

    /// True when every recorded concept value lies in `[0, 1]`.
    pub fn is_in_unit_range(&self) -> bool {
        self.snapshots.iter().all(|s| s.concepts.is_in_unit_range())
    }

    /// Recorded concept values stacked as a flat `[batch, time, k]` buffer.
    pub fn stacked_inputs(&self) -> Vec<f32> {
        self.stack(|step, sample| self.snapshots[step].concepts.row(sample).to_vec())
    }

    /// Recorded masks (as 0/1 floats) stacked as `[batch, time, k]`.
    pub fn stacked_masks(&self) -> Vec<f32> {
        self.stack(|step, sample| {
            self.snapshots[step]
                .mask
                .row(sample)
                .iter()
                .map(|&b| if b { 1.0 } else { 0.0 })
                .collect()
        })
    }

    /// The original prediction replicated over the time axis, `[batch, time, k]`.
    pub fn stacked_original_predictions(&self) -> Vec<f32> {
        self.stack(|_, sample| self.original_predictions.row(sample).to_vec())
    }

    /// Ground truth replicated over the time axis, `[batch, time, k]`.
    pub fn stacked_groundtruth(&self) -> Vec<f32> {
        self.stack(|_, sample| self.groundtruth.row(sample).to_vec())
    }

    // Snapshots are stored time-major; the sequence models expect
    // batch-major [batch, time, k], so stacking reorders sample-first.
    fn stack<F>(&self, row: F) -> Vec<f32>
    where
        F: Fn(usize, usize) -> Vec<f32>,
    {
        let (batch, time, k) = (self.batch_size(), self.len(), self.num_concepts());
        let mut out = Vec::with_capacity(batch * time * k);
        for sample in 0..batch {
            for step in 0..time {
                out.extend(row(step, sample));
            }
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: Vec<f32>, batch: usize, k: usize) -> ConceptMatrix {
        ConceptMatrix::from_flat(values, batch, k)
    }

    #[test]
    fn stacking_is_batch_major() {
        // 2 samples, 2 concepts, 2 snapshots.
        let original = matrix(vec![0.1, 0.2, 0.3, 0.4], 2, 2);
        let gt = matrix(vec![1.0, 0.0, 0.0, 1.0], 2, 2);
        let mut traj = Trajectory::new(original.clone(), gt);
        traj.record(original, InterventionMask::new(2, 2));
        let mut mask1 = InterventionMask::new(2, 2);
        mask1.set(0, 0);
        mask1.set(1, 1);
        traj.record(matrix(vec![1.0, 0.2, 0.3, 1.0], 2, 2), mask1);

        // Sample 0: t0 then t1, then sample 1: t0 then t1.
        assert_eq!(
            traj.stacked_inputs(),
            vec![0.1, 0.2, 1.0, 0.2, 0.3, 0.4, 0.3, 1.0]
        );
        assert_eq!(
            traj.stacked_masks(),
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(
            traj.stacked_original_predictions(),
            vec![0.1, 0.2, 0.1, 0.2, 0.3, 0.4, 0.3, 0.4]
        );
    }

    #[test]
    fn snapshots_are_copies_not_aliases() {
        let original = matrix(vec![0.5, 0.5], 1, 2);
        let gt = matrix(vec![1.0, 0.0], 1, 2);
        let mut traj = Trajectory::new(original.clone(), gt);
        let mut live = original;
        traj.record(live.clone(), InterventionMask::new(1, 2));
        live.set(0, 0, 0.9);
        assert_eq!(traj.snapshot(0).concepts.get(0, 0), 0.5);
    }

    #[test]
    fn range_check_covers_all_snapshots() {
        let original = matrix(vec![0.5, 0.5], 1, 2);
        let gt = matrix(vec![1.0, 0.0], 1, 2);
        let mut traj = Trajectory::new(original.clone(), gt);
        traj.record(original, InterventionMask::new(1, 2));
        assert!(traj.is_in_unit_range());
        traj.record(matrix(vec![1.2, 0.0], 1, 2), InterventionMask::new(1, 2));
        assert!(!traj.is_in_unit_range());
    }
}
