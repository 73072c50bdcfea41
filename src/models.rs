// ==============================================================================
// models.rs - Variant, Risk and Family Data Models
// ==============================================================================
// Description: Data structures shared by ingestion, scoring and comparison
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-19
// Version: 3.1.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::genotype::Genotype;
use crate::knowledge_base::KnowledgeBaseEntry;

/// Strength of the clinical literature backing a variant's effect (A strongest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceLevel {
    A,
    B,
    C,
    D,
}

impl EvidenceLevel {
    /// Multiplier applied to the base confidence of a variant
    pub fn confidence_multiplier(&self) -> f64 {
        match self {
            EvidenceLevel::A => 1.0,
            EvidenceLevel::B => 0.8,
            EvidenceLevel::C => 0.6,
            EvidenceLevel::D => 0.4,
        }
    }

    /// Higher is stronger (A = 4, D = 1)
    pub fn strength(&self) -> u8 {
        match self {
            EvidenceLevel::A => 4,
            EvidenceLevel::B => 3,
            EvidenceLevel::C => 2,
            EvidenceLevel::D => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceLevel::A => "A",
            EvidenceLevel::B => "B",
            EvidenceLevel::C => "C",
            EvidenceLevel::D => "D",
        }
    }
}

/// Ordinal risk classification derived from a risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn ordinal(&self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Moderate => 1,
            RiskLevel::High => 2,
            RiskLevel::VeryHigh => 3,
        }
    }

    /// Absolute ordinal distance between two levels (0-3)
    pub fn distance(&self, other: RiskLevel) -> u8 {
        self.ordinal().abs_diff(other.ordinal())
    }

    /// High or very high
    pub fn is_elevated(&self) -> bool {
        *self >= RiskLevel::High
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::VeryHigh => "very_high",
        }
    }
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalSignificance {
    Pathogenic,
    LikelyPathogenic,
    RiskFactor,
    DrugResponse,
    Association,
    Protective,
    UncertainSignificance,
    LikelyBenign,
    Benign,
}

impl ClinicalSignificance {
    pub fn is_pathogenic(&self) -> bool {
        matches!(
            self,
            ClinicalSignificance::Pathogenic | ClinicalSignificance::LikelyPathogenic
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritancePattern {
    AutosomalDominant,
    AutosomalRecessive,
    Codominant,
    XLinked,
    Mitochondrial,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalClass {
    Missense,
    Nonsense,
    Synonymous,
    Frameshift,
    SpliceSite,
    Intronic,
    Regulatory,
    Intergenic,
}

/// Raw genotype call as delivered by the caller (already genotyped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGenotypeRecord {
    /// Reference SNP identifier (e.g., "rs1801133")
    pub rsid: String,
    /// Chromosome ("1"-"22", "X", "Y", "MT")
    pub chromosome: String,
    /// Base pair position (GRCh37/hg19)
    pub position: u64,
    /// Unordered two-allele call (e.g., "AG", "GA", "--")
    pub genotype: String,
    /// Call quality (0.0-1.0)
    pub quality: f64,
    /// Read depth
    pub coverage: u32,
}

/// Genotype call joined with its knowledge-base annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedVariant {
    pub rsid: String,
    pub chromosome: String,
    pub position: u64,
    pub genotype: Genotype,
    pub quality: f64,
    pub coverage: u32,
    pub annotation: KnowledgeBaseEntry,
    /// Call confidence (0.0-1.0)
    pub confidence: f64,
}

impl ProcessedVariant {
    pub fn gene(&self) -> &str {
        &self.annotation.gene
    }

    pub fn evidence_level(&self) -> EvidenceLevel {
        self.annotation.evidence_level
    }
}

/// Variants in input order, skipping any rsID already seen. A repeated rsID
/// always resolves to its first call.
pub fn first_by_rsid(
    variants: &[ProcessedVariant],
) -> impl Iterator<Item = &ProcessedVariant> + '_ {
    let mut seen = HashSet::new();
    variants.iter().filter(move |v| seen.insert(v.rsid.as_str()))
}

/// Risk of one condition for one individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRisk {
    pub condition: String,
    pub gene: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Population baseline risk for the condition
    pub population_risk: f64,
    /// risk_score / population_risk
    pub relative_risk: f64,
    pub contributing_variants: Vec<String>,
    pub evidence_level: EvidenceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiologicalSex {
    Female,
    Male,
    Unknown,
}

/// Demographic metadata carried alongside a family member's variants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub display_name: String,
    /// Relationship to the account holder (e.g., "mother")
    pub relationship: Option<String>,
    pub birth_year: Option<u16>,
    pub sex: Option<BiologicalSex>,
}

/// Family member and their processed variants (ingestion order)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub id: String,
    pub demographics: Demographics,
    pub variants: Vec<ProcessedVariant>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Individual {
    pub fn new(
        id: impl Into<String>,
        demographics: Demographics,
        variants: Vec<ProcessedVariant>,
    ) -> Self {
        Self {
            id: id.into(),
            demographics,
            variants,
            active: true,
            created_at: Utc::now(),
            deactivated_at: None,
        }
    }

    /// First call for an rsID
    pub fn variant(&self, rsid: &str) -> Option<&ProcessedVariant> {
        self.variants.iter().find(|v| v.rsid == rsid)
    }

    /// Soft-deactivate; the record stays so comparison history keeps resolving
    pub fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            self.deactivated_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_multipliers_are_ordered() {
        let levels = [EvidenceLevel::A, EvidenceLevel::B, EvidenceLevel::C, EvidenceLevel::D];
        for pair in levels.windows(2) {
            assert!(pair[0].confidence_multiplier() > pair[1].confidence_multiplier());
            assert!(pair[0].strength() > pair[1].strength());
        }
    }

    #[test]
    fn test_risk_level_distance() {
        assert_eq!(RiskLevel::Low.distance(RiskLevel::Low), 0);
        assert_eq!(RiskLevel::Moderate.distance(RiskLevel::High), 1);
        assert_eq!(RiskLevel::VeryHigh.distance(RiskLevel::Low), 3);
        assert_eq!(RiskLevel::Low.distance(RiskLevel::VeryHigh), 3);
    }

    #[test]
    fn test_risk_level_serde() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::VeryHigh).unwrap(),
            "\"very_high\""
        );
        assert_eq!(RiskLevel::VeryHigh.as_str(), "very_high");
        assert!(RiskLevel::High.is_elevated());
        assert!(!RiskLevel::Moderate.is_elevated());
    }

    #[test]
    fn test_deactivate_is_soft() {
        let mut member = Individual::new("m1", Demographics::default(), Vec::new());
        assert!(member.active);

        member.deactivate();
        let first = member.deactivated_at;
        assert!(!member.active);
        assert!(first.is_some());

        // Second call keeps the original timestamp
        member.deactivate();
        assert_eq!(member.deactivated_at, first);
    }

    #[test]
    fn test_first_by_rsid_skips_repeats() {
        let kb = crate::knowledge_base::KnowledgeBase::builtin().unwrap();
        let call = |rsid: &str, genotype: &str| ProcessedVariant {
            rsid: rsid.to_string(),
            chromosome: "1".to_string(),
            position: 1,
            genotype: Genotype::parse(genotype).unwrap(),
            quality: 0.95,
            coverage: 30,
            annotation: kb.lookup(rsid).unwrap().clone(),
            confidence: 0.9,
        };
        let variants = vec![
            call("rs1801133", "GG"),
            call("rs429358", "CT"),
            call("rs1801133", "AA"),
        ];

        let first: Vec<_> = first_by_rsid(&variants)
            .map(|v| (v.rsid.as_str(), v.genotype.to_string()))
            .collect();
        assert_eq!(
            first,
            vec![("rs1801133", "GG".to_string()), ("rs429358", "CT".to_string())]
        );
    }
}
