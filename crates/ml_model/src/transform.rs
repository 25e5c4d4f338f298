//! Target transform for the skewed distance-to-failure label.
//!
//! Raw labels are right-skewed with occasional huge spans; capping bounds
//! outlier influence and `log1p` compresses the tail. The transform choice
//! and cap travel with the model artifact so inference inverts it exactly.

use serde::{Deserialize, Serialize};

/// Transform applied to labels before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    None,
    Log1p,
}

/// A monotonic label transform with its cap.
#[derive(Debug, Clone, Copy)]
pub struct TargetTransform {
    kind: TransformKind,
    cap: f64,
}

impl TargetTransform {
    #[must_use]
    pub const fn new(kind: TransformKind, cap: f64) -> Self {
        Self { kind, cap }
    }

    /// Caps the raw label to `[0, cap]` and applies the transform.
    #[must_use]
    pub fn forward(&self, label: f64) -> f64 {
        let capped = label.clamp(0.0, self.cap);
        match self.kind {
            TransformKind::None => capped,
            TransformKind::Log1p => capped.ln_1p(),
        }
    }

    /// Inverts the transform and clamps the result back to `[0, cap]`.
    ///
    /// The output clamp keeps `expm1` blow-up on extrapolated inputs from
    /// escaping into predictions.
    #[must_use]
    pub fn invert(&self, transformed: f64) -> f64 {
        let raw = match self.kind {
            TransformKind::None => transformed,
            TransformKind::Log1p => transformed.exp_m1(),
        };
        raw.clamp(0.0, self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_cap() {
        for kind in [TransformKind::None, TransformKind::Log1p] {
            let transform = TargetTransform::new(kind, 500.0);
            for x in [0.0, 0.5, 1.0, 17.3, 250.0, 499.9, 500.0] {
                let back = transform.invert(transform.forward(x));
                assert!(
                    (back - x).abs() < 1e-9,
                    "{kind:?} failed to round-trip {x}: got {back}"
                );
            }
        }
    }

    #[test]
    fn test_forward_caps_labels() {
        let transform = TargetTransform::new(TransformKind::Log1p, 500.0);
        assert!((transform.forward(10_000.0) - 500.0f64.ln_1p()).abs() < 1e-12);
        assert_eq!(transform.forward(-3.0), 0.0);
    }

    #[test]
    fn test_invert_clamps_blow_up() {
        let transform = TargetTransform::new(TransformKind::Log1p, 500.0);
        // An extrapolated transformed value far outside the label range must
        // come back as the cap, not infinity.
        assert_eq!(transform.invert(1_000.0), 500.0);
        assert_eq!(transform.invert(-4.0), 0.0);
    }
}
