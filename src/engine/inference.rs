//! Inference engine
//!
//! Owns the runtime side of a loaded model: one convolution stage and one
//! history state per layer, plus two channel buffers that carry each layer's
//! output vector into the next layer. Everything is allocated in
//! [`InferenceEngine::load`]; processing never allocates.
//!
//! A freshly loaded engine has already been fed `receptive_field()` zeros,
//! so layers with bias start from their silent steady state rather than from
//! an all-zero history.
//!
//! # Lifecycle
//! ```text
//! Uninitialized --load ok--> Loaded --dispose--> Disposed
//!       ^            |
//!       +--load err--+
//! ```
//! An `InferenceEngine` value only exists once loading succeeded; the
//! `Uninitialized` state belongs to whoever holds the engine (see
//! [`super::EngineSlot`]).

use super::fault::{FaultKind, FaultMonitor};
use super::history::LayerRuntimeState;
use super::stage::CausalConvolutionStage;
use crate::error::Result;
use crate::model::{ModelDescriptor, WeightLayoutResolver};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Observable engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No model loaded yet
    #[default]
    Uninitialized,
    /// Ready to process audio
    Loaded,
    /// Buffers released; audio passes through unchanged
    Disposed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "Uninitialized"),
            EngineState::Loaded => write!(f, "Loaded"),
            EngineState::Disposed => write!(f, "Disposed"),
        }
    }
}

#[derive(Debug)]
struct LayerRuntime {
    stage: CausalConvolutionStage,
    state: LayerRuntimeState,
}

/// Sample-by-sample WaveNet inference for one audio stream
///
/// # Example
/// ```
/// use ampnet::engine::InferenceEngine;
/// use ampnet::model::{Activation, LayerSpec, ModelDescriptor};
///
/// let descriptor = ModelDescriptor::new(
///     vec![LayerSpec::new(1, 1, 1, vec![1], Activation::Tanh)],
///     vec![2.0],
/// );
/// let mut engine = InferenceEngine::load(descriptor).unwrap();
/// let y = engine.process_sample(0.1);
/// assert!((y - 0.2f32.tanh()).abs() < 1e-6);
/// ```
#[derive(Debug)]
pub struct InferenceEngine {
    descriptor: Arc<ModelDescriptor>,
    layers: Vec<LayerRuntime>,
    /// Input vector of the layer about to run
    front: Vec<f32>,
    /// Output vector of the layer currently running
    back: Vec<f32>,
    gain_linear: f32,
    loudness_linear: f32,
    head_scale: f32,
    output_width: usize,
    receptive_field: usize,
    state: EngineState,
    /// Set after an index fault; the engine then passes audio through
    bypassed: bool,
    faults: FaultMonitor,
}

impl InferenceEngine {
    /// Validate `descriptor` and build a ready-to-run engine
    ///
    /// Not real-time safe: call it off the audio thread. On error nothing
    /// is constructed. The returned engine is settled on silence (see
    /// [`InferenceEngine::settle`]).
    pub fn load(descriptor: impl Into<Arc<ModelDescriptor>>) -> Result<Self> {
        let descriptor = descriptor.into();
        if let Err(err) = descriptor.validate() {
            warn!(error = %err, "Rejected model descriptor");
            return Err(err);
        }

        let resolver = WeightLayoutResolver::new(&descriptor.layers);
        let layers = descriptor
            .layers
            .iter()
            .zip(resolver.layouts())
            .enumerate()
            .map(|(index, (spec, &layout))| -> Result<LayerRuntime> {
                debug!(
                    layer = index,
                    inputs = spec.input_channels,
                    outputs = spec.output_channels,
                    kernel = spec.kernel_size,
                    dilations = ?spec.dilations,
                    gated = spec.gated,
                    base = layout.base(),
                    "Prepared layer"
                );
                Ok(LayerRuntime {
                    stage: CausalConvolutionStage::new(index, spec, layout)?,
                    state: LayerRuntimeState::new(spec),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let width = descriptor.max_channels();
        let output_width = layers
            .last()
            .map(|layer| layer.stage.output_channels())
            .unwrap_or(1);
        let receptive_field = descriptor.receptive_field();

        info!(
            layers = layers.len(),
            weights = descriptor.weights.len(),
            receptive_field,
            "Loaded amp model"
        );

        let mut engine = Self {
            gain_linear: db_to_linear(descriptor.metadata.gain_db),
            loudness_linear: db_to_linear(descriptor.metadata.loudness_db),
            head_scale: descriptor.head_scale,
            descriptor,
            layers,
            front: vec![0.0; width],
            back: vec![0.0; width],
            output_width,
            receptive_field,
            state: EngineState::Loaded,
            bypassed: false,
            faults: FaultMonitor::new(),
        };
        engine.settle();
        Ok(engine)
    }

    /// Process one sample
    ///
    /// Real-time safe. A disposed or bypassed engine returns `raw`
    /// unchanged; a non-finite result is replaced by silence and latched as
    /// [`FaultKind::NumericInstability`].
    #[inline]
    pub fn process_sample(&mut self, raw: f32) -> f32 {
        if self.state != EngineState::Loaded || self.bypassed {
            return raw;
        }

        match self.run_layers(raw * self.gain_linear * self.loudness_linear) {
            Ok(head) if head.is_finite() => head,
            Ok(_) => {
                self.faults.raise(FaultKind::NumericInstability);
                0.0
            }
            Err(fault) => {
                self.faults.raise(fault);
                self.bypassed = true;
                raw
            }
        }
    }

    /// Push one gain-adjusted sample through every layer and the head
    #[inline]
    fn run_layers(&mut self, input: f32) -> std::result::Result<f32, FaultKind> {
        let weights = self.descriptor.weights.as_slice();
        if let Some(first) = self.front.first_mut() {
            *first = input;
        }

        for layer in self.layers.iter_mut() {
            layer
                .stage
                .forward(weights, &mut layer.state, &self.front, &mut self.back)?;
            std::mem::swap(&mut self.front, &mut self.back);
        }

        Ok(self.front.iter().take(self.output_width).sum::<f32>() * self.head_scale)
    }

    /// Feed `receptive_field()` zeros so every history holds the response to
    /// silence
    ///
    /// Gain is bypassed, so an extreme input gain cannot poison the history.
    /// Calling `reset()` and then processing the same number of zeros leaves
    /// the engine in exactly this state.
    fn settle(&mut self) {
        for _ in 0..self.receptive_field {
            if let Err(fault) = self.run_layers(0.0) {
                self.faults.raise(fault);
                self.bypassed = true;
                return;
            }
        }
    }

    /// Process `min(input.len(), output.len())` samples in order
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.process_sample(*x);
        }
    }

    /// Process a buffer in place
    pub fn process_in_place(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear all history to zero
    ///
    /// Gains, weights and the fault flag are left alone. For layers with
    /// bias, `receptive_field()` zero samples bring the engine back to the
    /// state it had right after loading.
    pub fn reset(&mut self) {
        for layer in &mut self.layers {
            layer.state.reset();
        }
        self.front.fill(0.0);
        self.back.fill(0.0);
    }

    /// Release the runtime buffers; the engine passes audio through afterwards
    ///
    /// Not real-time safe (frees memory).
    pub fn dispose(&mut self) {
        if self.state == EngineState::Disposed {
            return;
        }
        for layer in &mut self.layers {
            layer.state.release();
        }
        self.layers = Vec::new();
        self.front = Vec::new();
        self.back = Vec::new();
        self.state = EngineState::Disposed;
        debug!("Disposed inference engine");
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// First runtime fault raised by this engine, if any
    pub fn fault(&self) -> Option<FaultKind> {
        self.faults.get()
    }

    /// Handle for polling faults from another thread
    pub fn fault_monitor(&self) -> FaultMonitor {
        self.faults.clone()
    }

    /// True once an index fault has switched the engine to pass-through
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Past samples that can influence the current output
    pub fn receptive_field(&self) -> usize {
        self.receptive_field
    }

    pub fn layer_count(&self) -> usize {
        self.descriptor.layers.len()
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }

    pub fn loudness_linear(&self) -> f32 {
        self.loudness_linear
    }

    /// Sample rate the model was trained at, when the model records it
    pub fn expected_sample_rate(&self) -> Option<u32> {
        self.descriptor.metadata.sample_rate
    }
}
