//! Error handling for ampnet
//!
//! Load-time problems are returned as [`ModelError`]. Faults raised while
//! processing audio never travel through this type; they are recorded on the
//! engine and polled (see [`crate::engine::FaultKind`]).

use thiserror::Error;

/// Result type alias for ampnet operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Main error type for model loading and engine management
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid model descriptor: {0}")]
    ModelDescriptorInvalid(#[from] DescriptorIssue),

    #[error("A loaded engine is still waiting to be installed by the audio thread")]
    SwapPending,

    #[error("The audio side of the engine slot has been dropped")]
    SlotClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The specific reason a descriptor was rejected at load time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorIssue {
    #[error("model has no layers")]
    NoLayers,

    #[error("unsupported architecture '{0}' (only WaveNet is supported)")]
    UnsupportedArchitecture(String),

    #[error("weight count mismatch: model needs {expected} weights, found {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },

    #[error("layer {layer}: unknown activation '{name}'")]
    UnknownActivation { layer: usize, name: String },

    #[error("layer {layer}: {field} must be at least 1")]
    ZeroDimension { layer: usize, field: &'static str },

    #[error("layer {layer}: dilations must be non-empty, positive and strictly increasing")]
    NonMonotonicDilations { layer: usize },

    #[error("layer {layer}: expects {expected} input channels but receives {actual}")]
    ChannelMismatch {
        layer: usize,
        expected: u32,
        actual: u32,
    },

    #[error("layer {layer}: bias has {actual} values, expected {expected}")]
    BiasLengthMismatch {
        layer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("layer {layer}: dimensions overflow the addressable weight count")]
    DimensionOverflow { layer: usize },

    #[error("layer {layer}: needs {samples} history samples, at most {max} are allowed")]
    HistoryTooLong {
        layer: usize,
        samples: usize,
        max: usize,
    },
}

impl ModelError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ModelError::ModelDescriptorInvalid(_) => "MODEL_DESCRIPTOR_INVALID",
            ModelError::SwapPending => "SWAP_PENDING",
            ModelError::SlotClosed => "SLOT_CLOSED",
            ModelError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Every load-time error can be retried with a different model or once
    /// the audio thread has caught up; only a closed slot is final.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ModelError::SlotClosed)
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ModelError::ModelDescriptorInvalid(DescriptorIssue::WeightCountMismatch { .. }) => vec![
                "The weight array does not match the layer shapes",
                "Re-export the model from the training framework",
            ],
            ModelError::ModelDescriptorInvalid(DescriptorIssue::UnknownActivation { .. }) => vec![
                "Supported activations: Tanh, Fasttanh, Hardtanh, ReLU, Sigmoid, Identity",
            ],
            ModelError::ModelDescriptorInvalid(
                DescriptorIssue::DimensionOverflow { .. } | DescriptorIssue::HistoryTooLong { .. },
            ) => vec![
                "Channel counts, kernel size or dilations are implausibly large",
                "The model file may be corrupted",
            ],
            ModelError::ModelDescriptorInvalid(_) => vec![
                "Check the model file was produced for a WaveNet architecture",
                "Try loading a different model",
            ],
            ModelError::SwapPending => vec![
                "Wait for the audio thread to process at least one block",
                "Make sure the audio callback is running",
            ],
            ModelError::SlotClosed => vec!["Recreate the engine slot"],
            ModelError::Serialization(_) => vec!["The model file is not valid descriptor JSON"],
        }
    }
}
