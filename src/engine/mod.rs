//! Inference Engine Module
//!
//! Real-time side of the amp model:
//! - Per-layer history rings
//! - Causal convolution stages
//! - The sample-by-sample engine and its lifecycle
//! - Fault reporting and hot model swap

mod fault;
mod history;
mod inference;
mod stage;
mod swap;

pub use fault::{FaultKind, FaultMonitor};
pub use history::LayerRuntimeState;
pub use inference::{db_to_linear, EngineState, InferenceEngine};
pub use stage::CausalConvolutionStage;
pub use swap::{swap_channel, EngineLoader, EngineSlot};
