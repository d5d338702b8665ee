//! ampnet - Real-Time Neural Amp Inference
//!
//! Runs trained WaveNet-style amplifier models sample by sample inside an
//! audio callback.
//!
//! # Architecture
//!
//! - `model`: the immutable model descriptor, its validation and the weight
//!   layout resolver
//! - `engine`: history rings, convolution stages and the inference engine,
//!   plus fault reporting and hot model swap
//! - `cli`: a small host harness that renders WAV files (feature `cli`)
//!
//! Loading validates and allocates everything up front. After that,
//! [`InferenceEngine::process_sample`] and
//! [`InferenceEngine::process_block`] never allocate, lock or panic.

pub mod engine;
pub mod error;
pub mod model;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{EngineState, FaultKind, InferenceEngine};
pub use error::{DescriptorIssue, ModelError, Result};
pub use model::{Activation, LayerSpec, ModelDescriptor, ModelMetadata};
