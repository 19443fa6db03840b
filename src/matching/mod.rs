// src/matching/mod.rs
//
// Landmark stream → fixed-length vector.
//
// Signal flow:
//   HandObservation per camera frame → sampler (adaptive gap) → Sequence
//   Sequence → codec (normalizer per frame, flatten) → Vec<f32>
//
// The resulting vector is what the reference store searches on.

pub mod codec;
pub mod normalizer;
pub mod sampler;

pub use codec::VectorCodec;
pub use sampler::{finalize, SampledFrame, SamplerStatus, Sequence, SequenceSampler};
