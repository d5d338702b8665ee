//! Runtime fault reporting
//!
//! Faults raised on the audio thread are never returned as errors. The
//! first one is latched into a shared atomic that any thread can poll, and
//! stays set until a new engine is loaded.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const NO_FAULT: u8 = 0;

/// A problem detected while processing audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultKind {
    /// A weight offset fell outside the weight array. The engine bypasses
    /// itself for the rest of its life.
    WeightIndexOutOfRange = 1,
    /// A sample came out as NaN or infinite and was replaced with silence
    NumericInstability = 2,
}

impl FaultKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FaultKind::WeightIndexOutOfRange),
            2 => Some(FaultKind::NumericInstability),
            _ => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FaultKind::WeightIndexOutOfRange => "WEIGHT_INDEX_OUT_OF_RANGE",
            FaultKind::NumericInstability => "NUMERIC_INSTABILITY",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::WeightIndexOutOfRange => {
                write!(f, "weight index out of range, engine bypassed")
            }
            FaultKind::NumericInstability => write!(f, "non-finite output replaced with silence"),
        }
    }
}

/// Sticky, lock-free fault flag shared between an engine and its observers
#[derive(Debug, Clone, Default)]
pub struct FaultMonitor {
    flag: Arc<AtomicU8>,
}

impl FaultMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch `kind` unless an earlier fault is already recorded
    ///
    /// Real-time safe. Returns true if this call set the flag.
    #[inline]
    pub fn raise(&self, kind: FaultKind) -> bool {
        self.flag
            .compare_exchange(NO_FAULT, kind as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The first fault raised, if any
    pub fn get(&self) -> Option<FaultKind> {
        FaultKind::from_u8(self.flag.load(Ordering::Acquire))
    }

    pub fn is_faulted(&self) -> bool {
        self.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clear() {
        let monitor = FaultMonitor::new();
        assert_eq!(monitor.get(), None);
        assert!(!monitor.is_faulted());
    }

    #[test]
    fn test_first_fault_sticks() {
        let monitor = FaultMonitor::new();
        assert!(monitor.raise(FaultKind::NumericInstability));
        assert!(!monitor.raise(FaultKind::WeightIndexOutOfRange));
        assert_eq!(monitor.get(), Some(FaultKind::NumericInstability));
    }

    #[test]
    fn test_clones_share_the_flag() {
        let monitor = FaultMonitor::new();
        let observer = monitor.clone();
        monitor.raise(FaultKind::WeightIndexOutOfRange);
        assert_eq!(observer.get(), Some(FaultKind::WeightIndexOutOfRange));
    }

    #[test]
    fn test_visible_across_threads() {
        let monitor = FaultMonitor::new();
        let audio = monitor.clone();
        std::thread::spawn(move || {
            audio.raise(FaultKind::NumericInstability);
        })
        .join()
        .unwrap();
        assert!(monitor.is_faulted());
    }
}
