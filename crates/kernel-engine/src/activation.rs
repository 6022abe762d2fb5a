// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Activation fusion: a min/max clamp applied on the store path.

use tensor_core::Activation;

/// Clamp bounds applied to finished accumulators before they are stored.
///
/// `(-inf, +inf)` leaves every value untouched, NaN included.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActivationBounds {
    pub min: f32,
    pub max: f32,
}

impl ActivationBounds {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn identity() -> Self {
        Self::new(f32::NEG_INFINITY, f32::INFINITY)
    }

    pub fn is_identity(&self) -> bool {
        self.min == f32::NEG_INFINITY && self.max == f32::INFINITY
    }

    /// `max(min(v, max), min)`.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if self.is_identity() {
            return value;
        }
        value.min(self.max).max(self.min)
    }

    /// Clamps a contiguous run of values, e.g. a whole imported tensor.
    pub fn apply_in_place(&self, values: &mut [f32]) {
        if self.is_identity() {
            return;
        }
        for v in values {
            *v = v.min(self.max).max(self.min);
        }
    }
}

impl Default for ActivationBounds {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Activation> for ActivationBounds {
    fn from(activation: Activation) -> Self {
        let (min, max) = activation.bounds();
        Self { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_relu_and_bounded() {
        let relu = ActivationBounds::from(Activation::Relu);
        assert_eq!(relu.clamp(-3.0), 0.0);
        assert_eq!(relu.clamp(7.5), 7.5);

        let six = ActivationBounds::from(Activation::BoundedRelu { max: 6.0 });
        let mut values = [-1.0, 3.0, 9.0];
        six.apply_in_place(&mut values);
        assert_eq!(values, [0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_identity_keeps_every_bit() {
        let id = ActivationBounds::identity();
        for v in [f32::NAN, -0.0, f32::INFINITY, f32::MIN_POSITIVE / 2.0] {
            assert_eq!(id.clamp(v).to_bits(), v.to_bits());
        }
        let mut values = [f32::NAN];
        id.apply_in_place(&mut values);
        assert!(values[0].is_nan());
    }

    #[test]
    fn test_matches_activation_apply() {
        let act = Activation::LuBoundedRelu {
            lower: -1.0,
            upper: 1.0,
        };
        let bounds = ActivationBounds::from(act);
        for v in [-4.0, -1.0, 0.25, 1.0, 8.0] {
            assert_eq!(bounds.clamp(v), act.apply(v));
        }
    }

    proptest! {
        #[test]
        fn prop_clamp_stays_in_bounds(
            v in -1e6f32..1e6,
            lo in -100f32..100.0,
            width in 0f32..100.0,
        ) {
            let bounds = ActivationBounds::new(lo, lo + width);
            let out = bounds.clamp(v);
            prop_assert!(out >= bounds.min && out <= bounds.max);
            if v >= bounds.min && v <= bounds.max {
                prop_assert_eq!(out, v);
            }
        }
    }
}
