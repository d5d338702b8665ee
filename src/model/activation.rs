//! Layer activation functions
//!
//! Activations arrive by name from the model file. Names the loader could not
//! map are kept as [`Activation::Unrecognized`] so the engine can reject them
//! at load time instead of silently picking a default.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Nonlinearities
// ============================================================================

/// A resolved activation kernel, called once per output channel per sample
pub type ActivationFn = fn(f32) -> f32;

#[inline]
fn tanh(x: f32) -> f32 {
    x.tanh()
}

/// Rational tanh approximation used by amp-modeling runtimes
#[inline]
fn fast_tanh(x: f32) -> f32 {
    let ax = x.abs();
    let x2 = x * x;
    (x * (2.455_507_5 + 2.455_507_5 * ax + (0.893_229_85 + 0.821_226_7 * ax) * x2))
        / (2.445_066_3 + (2.445_066_3 + x2) * (x + 0.814_642_7 * x * ax).abs())
}

#[inline]
fn hard_tanh(x: f32) -> f32 {
    x.clamp(-1.0, 1.0)
}

#[inline]
fn relu(x: f32) -> f32 {
    x.max(0.0)
}

#[inline]
fn identity(x: f32) -> f32 {
    x
}

/// Logistic sigmoid, also used for the gate path of gated layers
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ============================================================================
// Activation
// ============================================================================

/// Activation applied to each layer's filter accumulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Activation {
    /// Hyperbolic tangent, the activation used by every published amp model
    Tanh,
    /// Rational approximation of tanh
    FastTanh,
    /// tanh clipped to a straight line between -1 and 1
    HardTanh,
    Relu,
    Sigmoid,
    /// Pass-through, useful for linear test networks
    Identity,
    /// A name the model file used that this runtime does not implement
    Unrecognized(String),
}

impl Activation {
    /// Map an activation name to its variant (case-insensitive)
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "tanh" => Activation::Tanh,
            "fasttanh" | "fast_tanh" => Activation::FastTanh,
            "hardtanh" | "hard_tanh" => Activation::HardTanh,
            "relu" => Activation::Relu,
            "sigmoid" => Activation::Sigmoid,
            "identity" | "linear" => Activation::Identity,
            _ => Activation::Unrecognized(name.to_string()),
        }
    }

    /// Canonical name, as written back to model files
    pub fn name(&self) -> &str {
        match self {
            Activation::Tanh => "Tanh",
            Activation::FastTanh => "Fasttanh",
            Activation::HardTanh => "Hardtanh",
            Activation::Relu => "ReLU",
            Activation::Sigmoid => "Sigmoid",
            Activation::Identity => "Identity",
            Activation::Unrecognized(name) => name,
        }
    }

    /// The kernel for this activation, or `None` if it is unrecognized
    pub fn kernel(&self) -> Option<ActivationFn> {
        match self {
            Activation::Tanh => Some(tanh),
            Activation::FastTanh => Some(fast_tanh),
            Activation::HardTanh => Some(hard_tanh),
            Activation::Relu => Some(relu),
            Activation::Sigmoid => Some(sigmoid),
            Activation::Identity => Some(identity),
            Activation::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.kernel().is_some()
    }
}

impl From<String> for Activation {
    fn from(name: String) -> Self {
        Activation::parse(&name)
    }
}

impl From<&str> for Activation {
    fn from(name: &str) -> Self {
        Activation::parse(name)
    }
}

impl From<Activation> for String {
    fn from(activation: Activation) -> Self {
        activation.name().to_string()
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test_case("Tanh", Activation::Tanh)]
    #[test_case("tanh", Activation::Tanh)]
    #[test_case("Fasttanh", Activation::FastTanh)]
    #[test_case("Hardtanh", Activation::HardTanh)]
    #[test_case("ReLU", Activation::Relu)]
    #[test_case("Sigmoid", Activation::Sigmoid)]
    #[test_case("Linear", Activation::Identity)]
    fn test_parse_known_names(name: &str, expected: Activation) {
        assert_eq!(Activation::parse(name), expected);
        assert!(Activation::parse(name).is_recognized());
    }

    #[test]
    fn test_unknown_name_is_kept() {
        let activation = Activation::parse("Softsign");
        assert_eq!(activation, Activation::Unrecognized("Softsign".to_string()));
        assert!(activation.kernel().is_none());
        assert_eq!(activation.name(), "Softsign");
    }

    #[test]
    fn test_kernels() {
        let tanh = Activation::Tanh.kernel().unwrap();
        assert_abs_diff_eq!(tanh(0.5), 0.5f32.tanh());

        let hard = Activation::HardTanh.kernel().unwrap();
        assert_eq!(hard(3.0), 1.0);
        assert_eq!(hard(-3.0), -1.0);
        assert_eq!(hard(0.25), 0.25);

        let relu = Activation::Relu.kernel().unwrap();
        assert_eq!(relu(-0.5), 0.0);
        assert_eq!(relu(0.5), 0.5);

        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
    }

    #[test]
    fn test_fast_tanh_tracks_tanh() {
        let fast = Activation::FastTanh.kernel().unwrap();
        for i in -40..=40 {
            let x = i as f32 * 0.1;
            assert_abs_diff_eq!(fast(x), x.tanh(), epsilon = 2e-3);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Activation::Tanh).unwrap();
        assert_eq!(json, "\"Tanh\"");

        let parsed: Activation = serde_json::from_str("\"Mystery\"").unwrap();
        assert_eq!(parsed, Activation::Unrecognized("Mystery".to_string()));
    }
}
