//! Weight layout resolution
//!
//! The model's weights arrive as one flat `f32` array. Every piece of index
//! arithmetic that maps a (layer, dilation, tap, output channel, input
//! channel, gate path) tuple to a position in that array lives here, so the
//! flattening convention has a single point of change.
//!
//! Within a layer the order is output channel, then dilation index, then
//! kernel position, then input channel. Gated layers store a second block of
//! the same shape for the gate path directly after the filter block.
//!
//! This convention has not been checked bit-for-bit against the training
//! framework. Compare against a reference render before trusting a new
//! model family.

use super::descriptor::LayerSpec;

/// Selects which weight block of a gated layer to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSelector {
    /// The activation path (the only block of an ungated layer)
    Filter,
    /// The sigmoid gate path of a gated layer
    Gate,
}

/// Shape and base offset of one layer's weights, resolved at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerLayout {
    base: usize,
    output_channels: usize,
    dilation_count: usize,
    kernel_size: usize,
    input_channels: usize,
    gated: bool,
}

impl LayerLayout {
    /// Resolve the shape of `spec` whose weights start at `base`
    pub fn new(spec: &LayerSpec, base: usize) -> Self {
        Self {
            base,
            output_channels: spec.output_channels as usize,
            dilation_count: spec.dilations.len(),
            kernel_size: spec.kernel_size as usize,
            input_channels: spec.input_channels as usize,
            gated: spec.gated,
        }
    }

    /// Offset of the first weight of this layer in the flat array
    pub fn base(&self) -> usize {
        self.base
    }

    /// Weights in one block (filter or gate)
    #[inline]
    pub fn block_len(&self) -> usize {
        self.output_channels * self.dilation_count * self.kernel_size * self.input_channels
    }

    /// Weights this layer occupies, both blocks included
    #[inline]
    pub fn weight_count(&self) -> usize {
        self.block_len() * if self.gated { 2 } else { 1 }
    }

    /// One past the offset of the last weight of this layer
    pub fn end(&self) -> usize {
        self.base + self.weight_count()
    }

    /// Flat-array offset of a single weight
    #[inline]
    pub fn offset(
        &self,
        dilation_idx: usize,
        kernel_pos: usize,
        out_ch: usize,
        in_ch: usize,
        gate: GateSelector,
    ) -> usize {
        let block = match gate {
            GateSelector::Filter => 0,
            GateSelector::Gate => self.block_len(),
        };
        self.base
            + block
            + (((out_ch * self.dilation_count + dilation_idx) * self.kernel_size + kernel_pos)
                * self.input_channels
                + in_ch)
    }
}

/// Maps weight coordinates to offsets for a whole layer stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightLayoutResolver {
    layouts: Vec<LayerLayout>,
}

impl WeightLayoutResolver {
    /// Compute the cumulative base of every layer
    pub fn new(layers: &[LayerSpec]) -> Self {
        let mut base = 0;
        let layouts = layers
            .iter()
            .map(|spec| {
                let layout = LayerLayout::new(spec, base);
                base = layout.end();
                layout
            })
            .collect();
        Self { layouts }
    }

    /// Number of weights a single layer needs, `None` if it overflows `usize`
    pub fn checked_layer_weight_count(spec: &LayerSpec) -> Option<usize> {
        (spec.output_channels as usize)
            .checked_mul(spec.dilations.len())?
            .checked_mul(spec.kernel_size as usize)?
            .checked_mul(spec.input_channels as usize)?
            .checked_mul(spec.block_count())
    }

    /// Number of weights a single layer needs (saturates at `usize::MAX`)
    pub fn layer_weight_count(spec: &LayerSpec) -> usize {
        Self::checked_layer_weight_count(spec).unwrap_or(usize::MAX)
    }

    /// Number of weights a layer stack needs (saturates at `usize::MAX`)
    pub fn total_weight_count(layers: &[LayerSpec]) -> usize {
        layers
            .iter()
            .map(Self::layer_weight_count)
            .fold(0, usize::saturating_add)
    }

    /// Cached base offset of layer `layer`
    pub fn layer_base(&self, layer: usize) -> Option<usize> {
        self.layouts.get(layer).map(LayerLayout::base)
    }

    /// Resolved layout of layer `layer`
    pub fn layout(&self, layer: usize) -> Option<LayerLayout> {
        self.layouts.get(layer).copied()
    }

    pub fn layouts(&self) -> &[LayerLayout] {
        &self.layouts
    }

    /// Offset of one weight, computed from the layer's own spec and base
    pub fn offset(
        layer_base: usize,
        layer: &LayerSpec,
        dilation_idx: usize,
        kernel_pos: usize,
        out_ch: usize,
        in_ch: usize,
        gate: GateSelector,
    ) -> usize {
        LayerLayout::new(layer, layer_base).offset(dilation_idx, kernel_pos, out_ch, in_ch, gate)
    }
}
