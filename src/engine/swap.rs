//! Hot model swap
//!
//! Loading a model allocates, so it has to happen away from the audio
//! callback. [`swap_channel`] returns the two halves of the hand-off:
//!
//! - [`EngineLoader`] lives on a control thread. It builds engines and
//!   publishes them, and it drops the engines the audio side has retired.
//! - [`EngineSlot`] lives on the audio thread. At the start of every block it
//!   picks up a published engine, if any, and sends the engine it replaces
//!   back to the loader.
//!
//! The swap happens between two blocks on the audio thread itself, so the
//! retired engine can no longer be in use when it is handed back. Nothing on
//! the audio side allocates, frees or blocks.

use super::fault::{FaultKind, FaultMonitor};
use super::inference::{EngineState, InferenceEngine};
use crate::error::{ModelError, Result};
use crate::model::ModelDescriptor;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Retired engines the audio side can hand back before the loader collects them
const RETIRE_CAPACITY: usize = 4;

/// Create a connected loader/slot pair with an empty slot
pub fn swap_channel() -> (EngineLoader, EngineSlot) {
    // one pending engine at a time keeps publication ordered
    let (install_tx, install_rx) = crossbeam_channel::bounded(1);
    let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRE_CAPACITY);

    (
        EngineLoader {
            install_tx,
            retired_rx,
        },
        EngineSlot {
            active: None,
            parked: None,
            enabled: true,
            install_rx,
            retired_tx,
        },
    )
}

/// Control-thread half: builds, publishes and tears down engines
pub struct EngineLoader {
    install_tx: Sender<InferenceEngine>,
    retired_rx: Receiver<InferenceEngine>,
}

impl EngineLoader {
    /// Build an engine from `descriptor` and publish it to the slot
    ///
    /// Returns the new engine's fault monitor so the caller can keep polling
    /// it once the engine is running. A descriptor error leaves the slot
    /// untouched.
    pub fn load(&self, descriptor: impl Into<Arc<ModelDescriptor>>) -> Result<FaultMonitor> {
        let engine = InferenceEngine::load(descriptor)?;
        let monitor = engine.fault_monitor();
        self.publish(engine)?;
        Ok(monitor)
    }

    /// Publish an already-built engine
    ///
    /// Fails with [`ModelError::SwapPending`] while the slot has not yet
    /// picked up the previous one.
    pub fn publish(&self, engine: InferenceEngine) -> Result<()> {
        match self.install_tx.try_send(engine) {
            Ok(()) => {
                info!("Published engine for hot swap");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!("Hot swap rejected: previous engine not yet installed");
                Err(ModelError::SwapPending)
            }
            Err(TrySendError::Disconnected(_)) => Err(ModelError::SlotClosed),
        }
    }

    /// Dispose of every engine the audio side has retired
    ///
    /// Returns how many were dropped.
    pub fn collect_retired(&self) -> usize {
        let mut collected = 0;
        while let Ok(mut engine) = self.retired_rx.try_recv() {
            engine.dispose();
            collected += 1;
        }
        if collected > 0 {
            debug!(collected, "Collected retired engines");
        }
        collected
    }
}

/// Audio-thread half: runs the current engine and installs new ones
pub struct EngineSlot {
    active: Option<InferenceEngine>,
    /// Retired engine waiting for room in the retire channel
    parked: Option<InferenceEngine>,
    enabled: bool,
    install_rx: Receiver<InferenceEngine>,
    retired_tx: Sender<InferenceEngine>,
}

impl EngineSlot {
    /// Process one block, installing a newly published engine first
    ///
    /// Real-time safe. An empty or disabled slot copies input to output.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        self.retry_parked();
        if self.parked.is_none() {
            match self.install_rx.try_recv() {
                Ok(next) => {
                    if let Some(previous) = self.active.replace(next) {
                        self.retire(previous);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }
        }

        match self.active.as_mut() {
            Some(engine) if self.enabled => engine.process_block(input, output),
            _ => {
                let n = input.len().min(output.len());
                output[..n].copy_from_slice(&input[..n]);
            }
        }
    }

    /// Clear the active engine's history
    pub fn reset(&mut self) {
        if let Some(engine) = self.active.as_mut() {
            engine.reset();
        }
    }

    /// Bypass the engine at block granularity
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Lifecycle state of the active engine (`Uninitialized` when empty)
    pub fn state(&self) -> EngineState {
        self.active
            .as_ref()
            .map(InferenceEngine::state)
            .unwrap_or_default()
    }

    /// Fault raised by the active engine, if any
    pub fn fault(&self) -> Option<FaultKind> {
        self.active.as_ref().and_then(InferenceEngine::fault)
    }

    /// The engine currently processing audio
    pub fn active(&self) -> Option<&InferenceEngine> {
        self.active.as_ref()
    }

    fn retire(&mut self, engine: InferenceEngine) {
        match self.retired_tx.try_send(engine) {
            Ok(()) => {}
            Err(TrySendError::Full(engine)) | Err(TrySendError::Disconnected(engine)) => {
                self.parked = Some(engine);
            }
        }
    }

    fn retry_parked(&mut self) {
        if let Some(engine) = self.parked.take() {
            self.retire(engine);
        }
    }
}
