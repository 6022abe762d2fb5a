// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory budget configuration and parsing.
//!
//! A [`MemoryBudget`] caps the bytes a [`crate::MemoryGroup`] may hand out
//! to the tensors it manages.

use crate::MemoryError;
use std::fmt;
use std::str::FromStr;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Suffixes accepted by [`MemoryBudget::parse`], longest first so `"MB"`
/// is tried before `"B"`.
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// A hard byte ceiling for a memory group.
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b = MemoryBudget::from_mb(512);
/// assert_eq!(b.as_mb(), 512);
///
/// let b: MemoryBudget = "1G".parse().unwrap();
/// assert_eq!(b.as_mb(), 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn from_gb(gb: usize) -> Self {
        Self { bytes: gb * GIB }
    }

    /// A budget that never rejects an allocation.
    pub fn unlimited() -> Self {
        Self { bytes: usize::MAX }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the budget in mebibytes (truncated).
    pub fn as_mb(&self) -> usize {
        self.bytes / MIB
    }

    pub fn is_unlimited(&self) -> bool {
        self.bytes == usize::MAX
    }

    /// Parses `"512M"`, `"512MB"`, `"1G"`, `"2048K"`, `"100B"`, a plain
    /// byte count or `"unlimited"`. Case-insensitive, surrounding
    /// whitespace ignored.
    ///
    /// # Errors
    /// [`MemoryError::InvalidBudget`] for malformed or overflowing input and
    /// [`MemoryError::ZeroSizedAllocation`] for a zero budget.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let invalid = |reason: &str| MemoryError::InvalidBudget {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::unlimited());
        }
        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, mult)))
            .unwrap_or((upper.as_str(), 1));

        let value: usize = digits
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number with an optional K/M/G suffix"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("value overflows usize"))?;

        if bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        Ok(Self { bytes })
    }
}

impl FromStr for MemoryBudget {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            return write!(f, "unlimited");
        }
        for (unit, size) in [("GB", GIB), ("MB", MIB), ("KB", KIB)] {
            if self.bytes >= size && self.bytes % size == 0 {
                return write!(f, "{} {unit}", self.bytes / size);
            }
        }
        write!(f, "{} B", self.bytes)
    }
}
