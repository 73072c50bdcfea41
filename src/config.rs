// ==============================================================================
// config.rs - Engine Configuration
// ==============================================================================
// Description: Tunable thresholds and weights for ingestion, scoring and comparison
// Author: Matt Barham
// Created: 2026-01-20
// Modified: 2026-10-19
// Version: 1.0.1
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::RiskLevel;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {details}")]
    InvalidValue { field: &'static str, details: String },
}

/// Full engine configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ingestion: IngestionConfig,
    pub risk: RiskConfig,
    pub comparison: ComparisonConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Calls with quality below this are excluded
    pub min_quality: f64,
    /// Calls with read depth below this are excluded
    pub min_coverage: u32,
    /// Records per chunk for parallel ingestion
    pub parallel_chunk_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            min_quality: 0.8,
            min_coverage: 10,
            parallel_chunk_size: 10_000,
        }
    }
}

/// Lower bounds of each risk level above `low`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub moderate: f64,
    pub high: f64,
    pub very_high: f64,
}

impl Default for RiskThresholds {
    /// low < 0.10 <= moderate < 0.20 <= high < 0.50 <= very_high.
    ///
    /// very_high starts at 0.50 rather than 0.30 so a homozygous MTHFR C677T
    /// call (score 0.35, relative risk ~2.3) classifies as high. Callers
    /// wanting a 0.30 cutoff set `very_high` in the config file.
    fn default() -> Self {
        Self {
            moderate: 0.10,
            high: 0.20,
            very_high: 0.50,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, risk_score: f64) -> RiskLevel {
        if risk_score < self.moderate {
            RiskLevel::Low
        } else if risk_score < self.high {
            RiskLevel::Moderate
        } else if risk_score < self.very_high {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub thresholds: RiskThresholds,
    /// Health score points removed per unit of risk score
    pub deduction_per_score: f64,
    /// Health score points added per low-risk (protective) finding
    pub low_risk_bonus: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            thresholds: RiskThresholds::default(),
            deduction_per_score: 20.0,
            low_risk_bonus: 5.0,
        }
    }
}

/// Family comparison weights. These constants have no cited derivation, so
/// they are configuration rather than code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub variant_weight: f64,
    pub trait_weight: f64,
    pub risk_weight: f64,
    /// Inheritance probability when both risk levels match
    pub same_level_probability: f64,
    /// Inheritance probability when risk levels are one step apart
    pub adjacent_level_probability: f64,
    pub distant_level_probability: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            variant_weight: 0.4,
            trait_weight: 0.3,
            risk_weight: 0.3,
            same_level_probability: 0.8,
            adjacent_level_probability: 0.6,
            distant_level_probability: 0.3,
        }
    }
}

impl ComparisonConfig {
    pub fn inheritance_probability(&self, a: RiskLevel, b: RiskLevel) -> f64 {
        match a.distance(b) {
            0 => self.same_level_probability,
            1 => self.adjacent_level_probability,
            _ => self.distant_level_probability,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ingestion = &self.ingestion;
        if !(0.0..=1.0).contains(&ingestion.min_quality) {
            return Err(invalid("ingestion.min_quality", "must be within [0, 1]"));
        }
        if ingestion.parallel_chunk_size == 0 {
            return Err(invalid("ingestion.parallel_chunk_size", "must be positive"));
        }

        let t = &self.risk.thresholds;
        if !(0.0 < t.moderate && t.moderate < t.high && t.high < t.very_high) {
            return Err(invalid(
                "risk.thresholds",
                "must satisfy 0 < moderate < high < very_high",
            ));
        }
        if self.risk.deduction_per_score < 0.0 || self.risk.low_risk_bonus < 0.0 {
            return Err(invalid("risk", "deduction and bonus must be non-negative"));
        }

        let c = &self.comparison;
        let weights = [c.variant_weight, c.trait_weight, c.risk_weight];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(invalid("comparison", "weights must be non-negative"));
        }
        if (weights.iter().sum::<f64>() - 1.0).abs() > 1e-9 {
            return Err(invalid("comparison", "weights must sum to 1"));
        }
        let probabilities = [
            c.same_level_probability,
            c.adjacent_level_probability,
            c.distant_level_probability,
        ];
        if probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(invalid("comparison", "probabilities must be within [0, 1]"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, details: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        details: details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_classification() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(0.05), RiskLevel::Low);
        assert_eq!(t.classify(0.10), RiskLevel::Moderate);
        assert_eq!(t.classify(0.15), RiskLevel::Moderate);
        assert_eq!(t.classify(0.25), RiskLevel::High);
        assert_eq!(t.classify(0.35), RiskLevel::High);
        assert_eq!(t.classify(0.55), RiskLevel::VeryHigh);
    }

    #[test]
    fn test_very_high_cutoff_is_configurable() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"risk": {{"thresholds": {{"very_high": 0.30}}}}}}"#).unwrap();
        file.flush().unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        let t = config.risk.thresholds;
        assert_eq!(t.high, 0.20);
        assert_eq!(t.classify(0.35), RiskLevel::VeryHigh);
        assert_eq!(RiskThresholds::default().classify(0.35), RiskLevel::High);
    }

    #[test]
    fn test_inheritance_probability() {
        let c = ComparisonConfig::default();
        assert_eq!(c.inheritance_probability(RiskLevel::High, RiskLevel::High), 0.8);
        assert_eq!(c.inheritance_probability(RiskLevel::Low, RiskLevel::Moderate), 0.6);
        assert_eq!(c.inheritance_probability(RiskLevel::Low, RiskLevel::High), 0.3);
        assert_eq!(c.inheritance_probability(RiskLevel::VeryHigh, RiskLevel::Low), 0.3);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"ingestion": {{"min_coverage": 20}}}}"#).unwrap();
        file.flush().unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.ingestion.min_coverage, 20);
        assert_eq!(config.ingestion.min_quality, 0.8);
        assert_eq!(config.comparison, ComparisonConfig::default());
    }

    #[test]
    fn test_rejects_bad_weights() {
        let mut config = EngineConfig::default();
        config.comparison.variant_weight = 0.9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "comparison", .. })
        ));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut config = EngineConfig::default();
        config.risk.thresholds.high = 0.05;
        assert!(config.validate().is_err());
    }
}
