//! Model description
//!
//! Immutable description of a trained network and the resolver that maps
//! weight coordinates into its flat weight array.

mod activation;
mod descriptor;
mod layout;

pub use activation::{sigmoid, Activation, ActivationFn};
pub use descriptor::{LayerSpec, ModelDescriptor, ModelMetadata, MAX_HISTORY_SAMPLES};
pub use layout::{GateSelector, LayerLayout, WeightLayoutResolver};
