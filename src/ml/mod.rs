// ============================================================
// Layer 5 — Machine Learning
// ============================================================
// Everything that touches Burn tensors and learned parameters:
// the intervention policy, the corrector variants, the trajectory
// simulator, the training loop, and pre-trained adapter loading.
// Host-side domain types cross into tensors here and nowhere else.

pub mod adapter;
pub mod corrector;
pub mod policy;
pub mod simulator;
pub mod trainer;
