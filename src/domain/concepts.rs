// ============================================================
// Layer 3 — Concept Values and Intervention Mask
// ============================================================
// Host-side representations of one minibatch of concept state.
//
// ConceptMatrix holds the model's current belief for every
// concept of every sample in the batch, row-major [batch, k],
// each value in [0, 1]. InterventionMask holds one bit per
// concept: true means "this concept has been overwritten with
// its ground-truth value and must never be re-selected".
//
// These stay plain Vec-backed so the trajectory simulator can
// record snapshots and run its deterministic per-row argmax
// scan without going through a tensor backend.

/// Per-sample concept beliefs for one minibatch.
/// Row-major layout: `values[b * num_concepts + i]` is concept `i`
/// of sample `b`. Every value is expected to lie in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptMatrix {
    values: Vec<f32>,
    batch_size: usize,
    num_concepts: usize,
}

impl ConceptMatrix {
    /// Wrap a flat row-major buffer. The buffer length must equal
    /// `batch_size * num_concepts`.
    pub fn from_flat(values: Vec<f32>, batch_size: usize, num_concepts: usize) -> Self {
        assert_eq!(
            values.len(),
            batch_size * num_concepts,
            "concept buffer length must be batch_size * num_concepts"
        );
        Self {
            values,
            batch_size,
            num_concepts,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_concepts(&self) -> usize {
        self.num_concepts
    }

    pub fn get(&self, sample: usize, concept: usize) -> f32 {
        self.values[sample * self.num_concepts + concept]
    }

    pub fn set(&mut self, sample: usize, concept: usize, value: f32) {
        self.values[sample * self.num_concepts + concept] = value;
    }

    /// One sample's concept vector.
    pub fn row(&self, sample: usize) -> &[f32] {
        let start = sample * self.num_concepts;
        &self.values[start..start + self.num_concepts]
    }

    /// The whole batch as a flat row-major slice.
    pub fn as_flat(&self) -> &[f32] {
        &self.values
    }

    /// True when every value lies in `[0, 1]`.
    pub fn is_in_unit_range(&self) -> bool {
        self.values.iter().all(|v| (0.0..=1.0).contains(v))
    }
}

/// Per-sample boolean "already intervened" bits, same layout as
/// [`ConceptMatrix`]. Bits only ever flip false → true within one
/// trajectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterventionMask {
    bits: Vec<bool>,
    batch_size: usize,
    num_concepts: usize,
}

impl InterventionMask {
    /// All-false mask for a fresh trajectory.
    pub fn new(batch_size: usize, num_concepts: usize) -> Self {
        Self {
            bits: vec![false; batch_size * num_concepts],
            batch_size,
            num_concepts,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_concepts(&self) -> usize {
        self.num_concepts
    }

    pub fn is_set(&self, sample: usize, concept: usize) -> bool {
        self.bits[sample * self.num_concepts + concept]
    }

    pub fn set(&mut self, sample: usize, concept: usize) {
        self.bits[sample * self.num_concepts + concept] = true;
    }

    pub fn row(&self, sample: usize) -> &[bool] {
        let start = sample * self.num_concepts;
        &self.bits[start..start + self.num_concepts]
    }

    /// Number of intervened concepts in one sample.
    pub fn count_set(&self, sample: usize) -> usize {
        self.row(sample).iter().filter(|&&b| b).count()
    }

    /// True when every concept of every sample has been revealed.
    pub fn is_exhausted(&self) -> bool {
        self.bits.iter().all(|&b| b)
    }

    /// The mask as 0.0 / 1.0 floats, the form the correctors blend with.
    pub fn to_floats(&self) -> Vec<f32> {
        self.bits.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()
    }

    /// True if `other` could follow `self` within one trajectory:
    /// no bit flips true → false.
    pub fn is_monotonic_successor(&self, other: &InterventionMask) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .all(|(&before, &after)| !before || after)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_indexing_is_row_major() {
        let m = ConceptMatrix::from_flat(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 3);
        assert_eq!(m.get(0, 2), 0.3);
        assert_eq!(m.get(1, 0), 0.4);
        assert_eq!(m.row(1), &[0.4, 0.5, 0.6]);
    }

    #[test]
    fn unit_range_check() {
        let ok = ConceptMatrix::from_flat(vec![0.0, 0.5, 1.0], 1, 3);
        assert!(ok.is_in_unit_range());
        let bad = ConceptMatrix::from_flat(vec![0.0, 1.5, 1.0], 1, 3);
        assert!(!bad.is_in_unit_range());
    }

    #[test]
    fn mask_monotonic_successor() {
        let mut before = InterventionMask::new(1, 3);
        before.set(0, 1);
        let mut after = before.clone();
        after.set(0, 2);
        assert!(before.is_monotonic_successor(&after));
        // Dropping a bit is not a valid successor.
        let fresh = InterventionMask::new(1, 3);
        assert!(!before.is_monotonic_successor(&fresh));
    }

    #[test]
    fn mask_floats_and_counts() {
        let mut mask = InterventionMask::new(2, 2);
        mask.set(1, 0);
        assert_eq!(mask.to_floats(), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(mask.count_set(0), 0);
        assert_eq!(mask.count_set(1), 1);
        assert!(!mask.is_exhausted());
    }
}
