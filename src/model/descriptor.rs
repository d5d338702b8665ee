//! Model descriptor types
//!
//! A [`ModelDescriptor`] is the in-memory form of a trained amp model: the
//! layer stack, the flat weight array shared by every layer and the level
//! metadata. It is produced by a model loader outside the engine and is
//! never mutated once an engine has been built from it.

use super::activation::Activation;
use super::layout::WeightLayoutResolver;
use crate::error::{DescriptorIssue, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on history samples one layer may hold (all channels together)
pub const MAX_HISTORY_SAMPLES: usize = 1 << 24;

// ============================================================================
// Metadata
// ============================================================================

/// Level information recorded when the model was captured
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    /// Input gain applied before the first layer, in dB
    #[serde(default)]
    pub gain_db: f32,
    /// Loudness normalization applied before the first layer, in dB
    #[serde(default)]
    pub loudness_db: f32,
    /// Sample rate the model was trained at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Human-readable model name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// Layer Spec
// ============================================================================

/// Shape and behaviour of one dilated causal convolution layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSpec {
    pub input_channels: u32,
    pub output_channels: u32,
    pub kernel_size: u32,
    /// Tap spacing per dilation, strictly increasing
    pub dilations: Vec<u32>,
    pub activation: Activation,
    /// Multiply the activation by a sigmoid gate computed from a second weight block
    #[serde(default)]
    pub gated: bool,
    /// Start each accumulator from a bias term
    #[serde(default)]
    pub head_bias: bool,
    /// Bias terms: one per output channel, then one per output channel for
    /// the gate path of gated layers. Empty means zero.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bias: Vec<f32>,
}

impl LayerSpec {
    /// Create an ungated layer without bias
    pub fn new(
        input_channels: u32,
        output_channels: u32,
        kernel_size: u32,
        dilations: Vec<u32>,
        activation: Activation,
    ) -> Self {
        Self {
            input_channels,
            output_channels,
            kernel_size,
            dilations,
            activation,
            gated: false,
            head_bias: false,
            bias: Vec::new(),
        }
    }

    /// Enable the sigmoid gate path
    pub fn with_gate(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Enable the bias term with the given values
    pub fn with_bias(mut self, bias: Vec<f32>) -> Self {
        self.head_bias = true;
        self.bias = bias;
        self
    }

    /// Largest dilation of the layer (0 for an empty list)
    pub fn max_dilation(&self) -> u32 {
        self.dilations.iter().copied().max().unwrap_or(0)
    }

    /// Past samples this layer can see beyond the current one
    pub fn receptive_field(&self) -> usize {
        (self.max_dilation() as usize).saturating_mul(self.kernel_size.saturating_sub(1) as usize)
    }

    /// Length of each per-channel history ring
    pub fn history_len(&self) -> usize {
        self.receptive_field().saturating_add(1)
    }

    /// Number of weight blocks (2 for gated layers)
    pub fn block_count(&self) -> usize {
        if self.gated {
            2
        } else {
            1
        }
    }

    /// Bias length this layer accepts when `head_bias` is set
    pub fn expected_bias_len(&self) -> usize {
        self.output_channels as usize * self.block_count()
    }

    fn validate(&self, index: usize) -> std::result::Result<(), DescriptorIssue> {
        for (field, value) in [
            ("inputChannels", self.input_channels),
            ("outputChannels", self.output_channels),
            ("kernelSize", self.kernel_size),
        ] {
            if value == 0 {
                return Err(DescriptorIssue::ZeroDimension { layer: index, field });
            }
        }

        let increasing = self.dilations.windows(2).all(|pair| pair[0] < pair[1]);
        if self.dilations.is_empty() || self.dilations[0] == 0 || !increasing {
            return Err(DescriptorIssue::NonMonotonicDilations { layer: index });
        }

        if WeightLayoutResolver::checked_layer_weight_count(self).is_none() {
            return Err(DescriptorIssue::DimensionOverflow { layer: index });
        }
        let samples = self
            .history_len()
            .checked_mul(self.input_channels as usize)
            .unwrap_or(usize::MAX);
        if samples > MAX_HISTORY_SAMPLES {
            return Err(DescriptorIssue::HistoryTooLong {
                layer: index,
                samples,
                max: MAX_HISTORY_SAMPLES,
            });
        }

        if !self.activation.is_recognized() {
            return Err(DescriptorIssue::UnknownActivation {
                layer: index,
                name: self.activation.name().to_string(),
            });
        }

        let expected = if self.head_bias {
            self.expected_bias_len()
        } else {
            0
        };
        if !self.bias.is_empty() && self.bias.len() != expected {
            return Err(DescriptorIssue::BiasLengthMismatch {
                layer: index,
                expected,
                actual: self.bias.len(),
            });
        }
        if self.bias.iter().any(|b| !b.is_finite()) {
            return Err(DescriptorIssue::NonFinite { field: "bias" });
        }

        Ok(())
    }
}

// ============================================================================
// Model Descriptor
// ============================================================================

/// A complete trained model, ready to be loaded into an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub architecture: String,
    /// Multiplier applied to the final layer's output
    pub head_scale: f32,
    #[serde(default)]
    pub metadata: ModelMetadata,
    pub layers: Vec<LayerSpec>,
    /// Flat weight array shared by every layer, see [`WeightLayoutResolver`]
    pub weights: Vec<f32>,
}

impl ModelDescriptor {
    /// The only architecture this runtime executes
    pub const WAVENET: &'static str = "WaveNet";

    /// Create a WaveNet descriptor with unity head scale and 0 dB metadata
    pub fn new(layers: Vec<LayerSpec>, weights: Vec<f32>) -> Self {
        Self {
            architecture: Self::WAVENET.to_string(),
            head_scale: 1.0,
            metadata: ModelMetadata::default(),
            layers,
            weights,
        }
    }

    pub fn with_head_scale(mut self, head_scale: f32) -> Self {
        self.head_scale = head_scale;
        self
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check every structural invariant the engine relies on
    ///
    /// Runs in a single pass over the layers and one pass over the weights.
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !self.architecture.eq_ignore_ascii_case(Self::WAVENET) {
            return Err(DescriptorIssue::UnsupportedArchitecture(self.architecture.clone()).into());
        }
        if self.layers.is_empty() {
            return Err(DescriptorIssue::NoLayers.into());
        }

        let mut incoming = 1;
        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate(index)?;
            if layer.input_channels != incoming {
                return Err(DescriptorIssue::ChannelMismatch {
                    layer: index,
                    expected: layer.input_channels,
                    actual: incoming,
                }
                .into());
            }
            incoming = layer.output_channels;
        }

        for (field, value) in [
            ("headScale", self.head_scale),
            ("metadata.gainDb", self.metadata.gain_db),
            ("metadata.loudnessDb", self.metadata.loudness_db),
        ] {
            if !value.is_finite() {
                return Err(DescriptorIssue::NonFinite { field }.into());
            }
        }

        let mut expected: usize = 0;
        for (index, layer) in self.layers.iter().enumerate() {
            expected = WeightLayoutResolver::checked_layer_weight_count(layer)
                .and_then(move |count| expected.checked_add(count))
                .ok_or(DescriptorIssue::DimensionOverflow { layer: index })?;
        }
        if self.weights.len() != expected {
            return Err(DescriptorIssue::WeightCountMismatch {
                expected,
                actual: self.weights.len(),
            }
            .into());
        }
        if self.weights.iter().any(|w| !w.is_finite()) {
            return Err(DescriptorIssue::NonFinite { field: "weights" }.into());
        }

        Ok(())
    }

    /// Samples of past input that can influence one output sample
    pub fn receptive_field(&self) -> usize {
        self.layers
            .iter()
            .map(LayerSpec::receptive_field)
            .fold(0, usize::saturating_add)
    }

    /// Widest channel count anywhere in the stack (at least 1 for the input)
    pub fn max_channels(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.input_channels.max(l.output_channels) as usize)
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Parse a descriptor from its JSON form (no validation)
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the descriptor to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InferenceEngine;
    use crate::error::ModelError;
    use test_case::test_case;

    fn single_tap(weight: f32) -> ModelDescriptor {
        ModelDescriptor::new(
            vec![LayerSpec::new(1, 1, 1, vec![1], Activation::Tanh)],
            vec![weight],
        )
    }

    fn issue(descriptor: &ModelDescriptor) -> DescriptorIssue {
        match descriptor.validate() {
            Err(ModelError::ModelDescriptorInvalid(issue)) => issue,
            other => panic!("expected descriptor issue, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_descriptor() {
        assert!(single_tap(2.0).validate().is_ok());
    }

    #[test]
    fn test_weight_count_one_short() {
        let descriptor = ModelDescriptor::new(
            vec![LayerSpec::new(1, 2, 3, vec![1, 2], Activation::Tanh)],
            vec![0.1; 11],
        );
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::WeightCountMismatch {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let descriptor = ModelDescriptor::new(
            vec![LayerSpec::new(1, 1 << 31, 1 << 31, vec![1, 2], Activation::Tanh).with_gate()],
            Vec::new(),
        );
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::DimensionOverflow { layer: 0 }
        );
        assert!(InferenceEngine::load(descriptor).is_err());
    }

    #[test]
    fn test_history_length_capped() {
        let descriptor = ModelDescriptor::new(
            vec![LayerSpec::new(1, 1, 2, vec![1 << 30], Activation::Tanh)],
            vec![0.1, 0.2],
        );
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::HistoryTooLong {
                layer: 0,
                samples: (1 << 30) + 1,
                max: MAX_HISTORY_SAMPLES,
            }
        );

        let mut wide = ModelDescriptor::new(
            vec![
                LayerSpec::new(1, 64, 1, vec![1], Activation::Tanh),
                LayerSpec::new(64, 1, 2, vec![1 << 19], Activation::Tanh),
            ],
            Vec::new(),
        );
        wide.weights = vec![0.0; WeightLayoutResolver::total_weight_count(&wide.layers)];
        assert!(matches!(
            issue(&wide),
            DescriptorIssue::HistoryTooLong { layer: 1, .. }
        ));
    }

    #[test]
    fn test_weight_count_one_extra() {
        let mut descriptor = single_tap(1.0);
        descriptor.weights.push(0.0);
        assert!(matches!(
            issue(&descriptor),
            DescriptorIssue::WeightCountMismatch { .. }
        ));
    }

    #[test]
    fn test_unknown_activation() {
        let mut descriptor = single_tap(1.0);
        descriptor.layers[0].activation = Activation::from("Swish");
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::UnknownActivation {
                layer: 0,
                name: "Swish".to_string()
            }
        );
    }

    #[test_case(vec![] ; "empty")]
    #[test_case(vec![0, 1] ; "zero dilation")]
    #[test_case(vec![1, 1] ; "repeated")]
    #[test_case(vec![1, 4, 2] ; "decreasing")]
    fn test_bad_dilations(dilations: Vec<u32>) {
        let mut descriptor = single_tap(1.0);
        descriptor.layers[0].dilations = dilations;
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::NonMonotonicDilations { layer: 0 }
        );
    }

    #[test]
    fn test_adjacent_channel_mismatch() {
        let descriptor = ModelDescriptor::new(
            vec![
                LayerSpec::new(1, 2, 1, vec![1], Activation::Tanh),
                LayerSpec::new(3, 1, 1, vec![1], Activation::Tanh),
            ],
            vec![0.0; 5],
        );
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::ChannelMismatch {
                layer: 1,
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_first_layer_must_take_mono_input() {
        let descriptor = ModelDescriptor::new(
            vec![LayerSpec::new(2, 1, 1, vec![1], Activation::Tanh)],
            vec![0.0; 2],
        );
        assert!(matches!(
            issue(&descriptor),
            DescriptorIssue::ChannelMismatch { layer: 0, .. }
        ));
    }

    #[test]
    fn test_zero_kernel() {
        let mut descriptor = single_tap(1.0);
        descriptor.layers[0].kernel_size = 0;
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::ZeroDimension {
                layer: 0,
                field: "kernelSize"
            }
        );
    }

    #[test]
    fn test_bias_length() {
        let mut descriptor = single_tap(1.0);
        descriptor.layers[0] = descriptor.layers[0].clone().with_bias(vec![0.1, 0.2]);
        assert!(matches!(
            issue(&descriptor),
            DescriptorIssue::BiasLengthMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        descriptor.layers[0].bias = vec![0.1];
        assert!(descriptor.validate().is_ok());

        // head bias enabled without values means zero bias
        descriptor.layers[0].bias.clear();
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_bias_without_head_bias_rejected() {
        let mut descriptor = single_tap(1.0);
        descriptor.layers[0].bias = vec![0.5];
        assert!(matches!(
            issue(&descriptor),
            DescriptorIssue::BiasLengthMismatch { expected: 0, .. }
        ));
    }

    #[test]
    fn test_non_finite_values() {
        let mut descriptor = single_tap(f32::NAN);
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::NonFinite { field: "weights" }
        );

        descriptor.weights[0] = 1.0;
        descriptor.head_scale = f32::INFINITY;
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::NonFinite { field: "headScale" }
        );
    }

    #[test]
    fn test_unsupported_architecture() {
        let mut descriptor = single_tap(1.0);
        descriptor.architecture = "LSTM".to_string();
        assert_eq!(
            issue(&descriptor),
            DescriptorIssue::UnsupportedArchitecture("LSTM".to_string())
        );

        descriptor.architecture = "wavenet".to_string();
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_no_layers() {
        let descriptor = ModelDescriptor::new(Vec::new(), Vec::new());
        assert_eq!(issue(&descriptor), DescriptorIssue::NoLayers);
    }

    #[test]
    fn test_receptive_field_and_history() {
        let layer = LayerSpec::new(1, 1, 3, vec![1, 2, 8], Activation::Tanh);
        assert_eq!(layer.max_dilation(), 8);
        assert_eq!(layer.receptive_field(), 16);
        assert_eq!(layer.history_len(), 17);

        let descriptor = ModelDescriptor::new(
            vec![layer, LayerSpec::new(1, 1, 2, vec![1, 4], Activation::Tanh)],
            Vec::new(),
        );
        assert_eq!(descriptor.receptive_field(), 16 + 4);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "architecture": "WaveNet",
            "headScale": 0.02,
            "metadata": { "gainDb": -3.0, "loudnessDb": 1.5, "sampleRate": 48000 },
            "layers": [
                { "inputChannels": 1, "outputChannels": 1, "kernelSize": 2,
                  "dilations": [1, 2], "activation": "Tanh", "gated": false, "headBias": false }
            ],
            "weights": [0.1, 0.2, 0.3, 0.4]
        }"#;
        let descriptor = ModelDescriptor::from_json_str(json).unwrap();
        assert_eq!(descriptor.metadata.sample_rate, Some(48000));
        assert_eq!(descriptor.layers[0].activation, Activation::Tanh);
        assert!(descriptor.validate().is_ok());

        let back = ModelDescriptor::from_json_str(&descriptor.to_json_string().unwrap()).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_json_unknown_activation_parses_but_fails_validation() {
        let json = r#"{
            "architecture": "WaveNet", "headScale": 1.0,
            "layers": [{ "inputChannels": 1, "outputChannels": 1, "kernelSize": 1,
                         "dilations": [1], "activation": "Mish" }],
            "weights": [1.0]
        }"#;
        let descriptor = ModelDescriptor::from_json_str(json).unwrap();
        assert!(matches!(
            issue(&descriptor),
            DescriptorIssue::UnknownActivation { .. }
        ));
    }
}
