// ============================================================
// Layer 6 — Infrastructure
// ============================================================
// Filesystem-facing concerns: model/config persistence and the
// epoch metrics log. Nothing in here knows about correctors or
// trajectories beyond what it is handed to serialize.

pub mod checkpoint;
pub mod metrics;
