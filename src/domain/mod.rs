// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// This is the heart of the application — pure Rust structs
// and enums that define the core concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - NO ML-specific code
//   - Only plain Rust structs, enums, and traits
//
// Why keep this layer pure?
//   - Easy to unit test (no tensor backend needed)
//   - Easy to understand (no framework noise)
//   - Easy to swap implementations
//
// Think of this layer as the "dictionary" of the system —
// it defines what things ARE, not how they work.

// Per-batch concept values and the intervention mask
pub mod concepts;

// Fixed concept-index → cluster-id mapping for the multi-cluster corrector
pub mod clusters;

// Recorded intervention episodes (snapshots stacked along a time axis)
pub mod trajectory;

// Typed corrector-variant and input-format selectors
pub mod variants;
