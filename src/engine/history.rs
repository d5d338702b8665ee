//! Per-layer history rings
//!
//! Each layer keeps the last `history_len - 1` input frames it has seen, one
//! circular buffer per input channel. All channels advance together, so the
//! rings share a single write cursor and live in one flat allocation made at
//! load time.

use crate::model::LayerSpec;

/// History buffers for one layer
#[derive(Debug, Clone)]
pub struct LayerRuntimeState {
    /// Channel-major storage: channel `i` occupies `[i * len, (i + 1) * len)`
    history: Vec<f32>,
    /// Ring length per channel
    len: usize,
    channels: usize,
    /// Next slot to be written (the oldest sample)
    cursor: usize,
}

impl LayerRuntimeState {
    /// Allocate zeroed rings sized for `spec`
    pub fn new(spec: &LayerSpec) -> Self {
        Self::with_shape(spec.input_channels as usize, spec.history_len())
    }

    /// Allocate `channels` zeroed rings of `len` samples each
    pub fn with_shape(channels: usize, len: usize) -> Self {
        let len = len.max(1);
        Self {
            history: vec![0.0; channels * len],
            len,
            channels,
            cursor: 0,
        }
    }

    /// Samples each ring holds
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Read the sample `n` steps before the most recently pushed one
    ///
    /// `at(channel, 0)` is the last pushed sample. Reads past the ring or
    /// outside the channel range return `None`.
    #[inline]
    pub fn at(&self, channel: usize, n: usize) -> Option<f32> {
        if n >= self.len || channel >= self.channels {
            return None;
        }
        // cursor points one past the newest sample
        let back = n + 1;
        let slot = if self.cursor >= back {
            self.cursor - back
        } else {
            self.len - (back - self.cursor)
        };
        self.history.get(channel * self.len + slot).copied()
    }

    /// Push one frame (one sample per channel) and advance the cursor
    ///
    /// Missing channels in `frame` are written as zero.
    #[inline]
    pub fn push(&mut self, frame: &[f32]) {
        for channel in 0..self.channels {
            let sample = frame.get(channel).copied().unwrap_or(0.0);
            if let Some(slot) = self.history.get_mut(channel * self.len + self.cursor) {
                *slot = sample;
            }
        }
        self.cursor += 1;
        if self.cursor == self.len {
            self.cursor = 0;
        }
    }

    /// Zero every ring and rewind the cursor
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.cursor = 0;
    }

    /// Free the storage (not real-time safe)
    pub(crate) fn release(&mut self) {
        self.history = Vec::new();
        self.channels = 0;
        self.cursor = 0;
    }
}
