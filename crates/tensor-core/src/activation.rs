// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Activation descriptors that kernels fuse into their store path.

use crate::TensorError;
use std::fmt;
use std::str::FromStr;

/// A clamp-style activation applied to accumulated values before store.
///
/// Every variant reduces to a `(lower, upper)` pair; see [`Activation::bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Activation {
    /// No activation.
    #[default]
    Identity,
    /// `max(x, 0)`.
    Relu,
    /// `min(max(x, 0), max)`.
    BoundedRelu { max: f32 },
    /// `min(max(x, lower), upper)`.
    LuBoundedRelu { lower: f32, upper: f32 },
}

impl Activation {
    /// Returns the `(lower, upper)` clamp bounds. `Identity` is
    /// `(-inf, +inf)`.
    pub fn bounds(self) -> (f32, f32) {
        match self {
            Activation::Identity => (f32::NEG_INFINITY, f32::INFINITY),
            Activation::Relu => (0.0, f32::INFINITY),
            Activation::BoundedRelu { max } => (0.0, max),
            Activation::LuBoundedRelu { lower, upper } => (lower, upper),
        }
    }

    /// Applies the activation to one value.
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        let (lo, hi) = self.bounds();
        if lo == f32::NEG_INFINITY && hi == f32::INFINITY {
            return value;
        }
        value.min(hi).max(lo)
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Identity => write!(f, "identity"),
            Activation::Relu => write!(f, "relu"),
            Activation::BoundedRelu { max } => write!(f, "brelu:{max}"),
            Activation::LuBoundedRelu { lower, upper } => write!(f, "lubrelu:{lower}:{upper}"),
        }
    }
}

/// Parses `identity`, `relu`, `brelu:<max>` and `lubrelu:<lower>:<upper>`.
impl FromStr for Activation {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || TensorError::Parse {
            what: "activation",
            input: s.to_string(),
        };
        let parse_f32 = |v: &str| v.trim().parse::<f32>().map_err(|_| parse_err());

        let lower = s.trim().to_ascii_lowercase();
        let mut parts = lower.split(':');
        let act = match (parts.next(), parts.next(), parts.next()) {
            (Some("identity" | "none"), None, None) => Activation::Identity,
            (Some("relu"), None, None) => Activation::Relu,
            (Some("brelu"), Some(max), None) => Activation::BoundedRelu {
                max: parse_f32(max)?,
            },
            (Some("lubrelu"), Some(lo), Some(hi)) => Activation::LuBoundedRelu {
                lower: parse_f32(lo)?,
                upper: parse_f32(hi)?,
            },
            _ => return Err(parse_err()),
        };
        if parts.next().is_some() {
            return Err(parse_err());
        }
        Ok(act)
    }
}
