// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between "raw concept predictions" and tensor batches.
//
// The pipeline flows in this order:
//
//   synthetic generator  → (predicted, groundtruth, cluster map, labels)
//       │
//       ▼
//   split_train_val      → shuffled train / validation sets
//       │
//       ▼
//   ConceptDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   ConceptBatcher       → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader           → feeds batches to the training loop
//
// In the full system the predicted/ground-truth concept tensors
// come from a concept-bottleneck model over an image dataset;
// that acquisition lives outside this crate, so the generator
// here is the stand-in collaborator at the same boundary.

/// Seeded synthetic (predicted, groundtruth, clusters, labels) generator
pub mod synthetic;

/// Implements Burn's Dataset trait for concept samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
