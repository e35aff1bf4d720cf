// ============================================================
// Layer 2 — Application
// ============================================================
// Use cases wiring the data pipeline, the correctors and the
// training loop together, driven by one immutable validated
// RealignConfig. The CLI builds the config; everything below
// this layer receives values, never flags.

pub mod config;
pub mod evaluate_use_case;
pub mod train_use_case;
