//! Bloom severity levels

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of severity levels the classifier distinguishes
pub const SEVERITY_LEVELS: usize = 4;

/// Human-readable labels, indexed by level
pub const SEVERITY_LABELS: [&str; SEVERITY_LEVELS] = [
    "No algae",
    "Minor algae",
    "Moderate algae",
    "Abundant algae",
];

/// Ordinal algae bloom severity (0 = none, 3 = abundant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const NONE: Severity = Severity(0);
    pub const MINOR: Severity = Severity(1);
    pub const MODERATE: Severity = Severity(2);
    pub const ABUNDANT: Severity = Severity(3);

    /// Returns `None` for levels outside 0..=3
    pub fn new(level: u8) -> Option<Self> {
        if (level as usize) < SEVERITY_LEVELS {
            Some(Self(level))
        } else {
            None
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn label(&self) -> &'static str {
        SEVERITY_LABELS[self.index()]
    }

    /// Any visible algae at all
    pub fn is_present(&self) -> bool {
        self.0 > 0
    }

    pub fn all() -> [Severity; SEVERITY_LEVELS] {
        [Self::NONE, Self::MINOR, Self::MODERATE, Self::ABUNDANT]
    }
}

/// Level outside 0..=3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("severity level {0} is outside 0..=3")]
pub struct InvalidSeverity(pub u8);

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverity;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Severity::new(value).ok_or(InvalidSeverity(value))
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
