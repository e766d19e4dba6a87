//! Risk band and alert level enums.
//!
//! All ordering comparisons between bands go through [`RiskBand::rank`] —
//! never string comparison against band names.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environmental risk band assigned by the ERI classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    /// Numeric rank for threshold comparisons: LOW=0 … CRITICAL=3.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl FromStr for RiskBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("unknown risk band: {other:?}")),
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-facing alert level derived from the risk band at routing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl AlertLevel {
    /// MEDIUM → INFO, HIGH → WARNING, CRITICAL → CRITICAL.
    ///
    /// LOW never reaches the router output; it maps to INFO for completeness.
    pub const fn from_band(band: RiskBand) -> Self {
        match band {
            RiskBand::Low | RiskBand::Medium => Self::Info,
            RiskBand::High => Self::Warning,
            RiskBand::Critical => Self::Critical,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_ranks_are_strictly_ordered() {
        assert!(RiskBand::Low.rank() < RiskBand::Medium.rank());
        assert!(RiskBand::Medium.rank() < RiskBand::High.rank());
        assert!(RiskBand::High.rank() < RiskBand::Critical.rank());
    }

    #[test]
    fn band_parses_case_insensitively() {
        assert_eq!("medium".parse::<RiskBand>(), Ok(RiskBand::Medium));
        assert_eq!("CRITICAL".parse::<RiskBand>(), Ok(RiskBand::Critical));
        assert!("SEVERE".parse::<RiskBand>().is_err());
    }

    #[test]
    fn alert_level_mapping() {
        assert_eq!(AlertLevel::from_band(RiskBand::Medium), AlertLevel::Info);
        assert_eq!(AlertLevel::from_band(RiskBand::High), AlertLevel::Warning);
        assert_eq!(
            AlertLevel::from_band(RiskBand::Critical),
            AlertLevel::Critical
        );
    }

    #[test]
    fn band_serializes_uppercase() {
        let json = serde_json::to_string(&RiskBand::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }
}
