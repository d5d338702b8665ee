//! Causal convolution stage
//!
//! One layer's forward step. For every output channel the stage sums
//! `weight * sample` over all dilations, kernel taps and input channels,
//! applies the activation (optionally multiplied by a sigmoid gate) and then
//! pushes the current input frame into the layer's history.
//!
//! The tap at kernel position `k` of dilation `d` looks
//! `d * (kernel_size - 1 - k)` samples into the past; the last tap of every
//! dilation therefore reads the current input directly.

use super::fault::FaultKind;
use super::history::LayerRuntimeState;
use crate::error::{DescriptorIssue, Result};
use crate::model::{sigmoid, ActivationFn, GateSelector, LayerLayout, LayerSpec};

/// Precomputed forward step for one layer
///
/// Holds only what the hot path needs: the resolved weight layout, the
/// activation kernel and the bias terms. Weights are borrowed from the
/// descriptor on each call.
#[derive(Debug, Clone)]
pub struct CausalConvolutionStage {
    layout: LayerLayout,
    dilations: Vec<usize>,
    kernel_size: usize,
    input_channels: usize,
    output_channels: usize,
    activation: ActivationFn,
    gated: bool,
    /// Filter biases followed by gate biases; zeros when the layer has none
    bias: Vec<f32>,
}

impl CausalConvolutionStage {
    /// Build the stage for layer `index` (load time only)
    pub fn new(index: usize, spec: &LayerSpec, layout: LayerLayout) -> Result<Self> {
        let activation = spec
            .activation
            .kernel()
            .ok_or_else(|| DescriptorIssue::UnknownActivation {
                layer: index,
                name: spec.activation.name().to_string(),
            })?;

        let bias = if spec.head_bias && !spec.bias.is_empty() {
            spec.bias.clone()
        } else {
            vec![0.0; spec.expected_bias_len()]
        };

        Ok(Self {
            layout,
            dilations: spec.dilations.iter().map(|&d| d as usize).collect(),
            kernel_size: spec.kernel_size as usize,
            input_channels: spec.input_channels as usize,
            output_channels: spec.output_channels as usize,
            activation,
            gated: spec.gated,
            bias,
        })
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn layout(&self) -> LayerLayout {
        self.layout
    }

    /// Compute `output[..output_channels]` from `input[..input_channels]`
    ///
    /// Real-time safe: no allocation, bounded work. Any out-of-range access
    /// is reported as [`FaultKind::WeightIndexOutOfRange`] and leaves the
    /// history untouched.
    pub fn forward(
        &self,
        weights: &[f32],
        state: &mut LayerRuntimeState,
        input: &[f32],
        output: &mut [f32],
    ) -> std::result::Result<(), FaultKind> {
        let (Some(x), Some(y)) = (
            input.get(..self.input_channels),
            output.get_mut(..self.output_channels),
        ) else {
            return Err(FaultKind::WeightIndexOutOfRange);
        };

        for (c, out) in y.iter_mut().enumerate() {
            let filter = self.accumulate(weights, state, x, c, GateSelector::Filter)?;
            let activated = (self.activation)(filter);
            *out = if self.gated {
                let gate = self.accumulate(weights, state, x, c, GateSelector::Gate)?;
                activated * sigmoid(gate)
            } else {
                activated
            };
        }

        state.push(x);
        Ok(())
    }

    #[inline]
    fn accumulate(
        &self,
        weights: &[f32],
        state: &LayerRuntimeState,
        x: &[f32],
        out_ch: usize,
        gate: GateSelector,
    ) -> std::result::Result<f32, FaultKind> {
        let bias_index = match gate {
            GateSelector::Filter => out_ch,
            GateSelector::Gate => self.output_channels + out_ch,
        };
        let mut acc = self.bias.get(bias_index).copied().unwrap_or(0.0);

        for (d, &dilation) in self.dilations.iter().enumerate() {
            for k in 0..self.kernel_size {
                let lookback = dilation * (self.kernel_size - 1 - k);
                for (i, &current) in x.iter().enumerate() {
                    let sample = if lookback == 0 {
                        current
                    } else {
                        state
                            .at(i, lookback - 1)
                            .ok_or(FaultKind::WeightIndexOutOfRange)?
                    };
                    let weight = weights
                        .get(self.layout.offset(d, k, out_ch, i, gate))
                        .ok_or(FaultKind::WeightIndexOutOfRange)?;
                    acc += weight * sample;
                }
            }
        }

        Ok(acc)
    }
}
