// ==============================================================================
// risk.rs - Condition Risk Scoring
// ==============================================================================
// Description: Rule tables mapping genotypes to per-condition risk and health score
// Author: Matt Barham
// Created: 2026-01-20
// Modified: 2026-10-19
// Version: 1.2.0
// ==============================================================================
// Each rule covers one rsID and scores the risk allele dosage:
//   reference/reference < heterozygous < homozygous risk (strictly)
// Conditions without a matching variant are omitted, never scored as zero:
// "unknown" is not "low risk".
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::config::RiskConfig;
use crate::genotype::{risk_allele_dosage_with_flip, Genotype};
use crate::models::{
    first_by_rsid, EvidenceLevel, HealthRisk, InheritancePattern, ProcessedVariant, RiskLevel,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Rule for {condition} ({rsid}) is not monotonic: reference < heterozygous < homozygous risk required")]
    NotMonotonic { condition: String, rsid: String },

    #[error("Rule for {condition} ({rsid}) has a score outside [0, 1]")]
    ScoreOutOfRange { condition: String, rsid: String },

    #[error("Rule for {condition} has a non-positive population baseline")]
    InvalidBaseline { condition: String },
}

/// Recessive pathogenic finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierStatus {
    /// One risk allele
    Carrier,
    /// Two risk alleles
    Affected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierFinding {
    pub condition: String,
    pub gene: String,
    pub rsid: String,
    pub genotype: Genotype,
    pub status: CarrierStatus,
}

/// Risk score by risk-allele dosage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenotypeScores {
    pub reference: f64,
    pub heterozygous: f64,
    pub homozygous_risk: f64,
}

impl GenotypeScores {
    pub fn for_dosage(&self, dosage: u8) -> f64 {
        match dosage {
            0 => self.reference,
            1 => self.heterozygous,
            _ => self.homozygous_risk,
        }
    }
}

/// Genotype → risk rule for one condition and one rsID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub condition: String,
    pub gene: String,
    pub rsid: String,
    pub reference_allele: char,
    pub risk_allele: char,
    pub scores: GenotypeScores,
    /// Baseline risk of the condition in the general population
    pub population_risk: f64,
    pub evidence_level: EvidenceLevel,
}

impl ConditionRule {
    pub fn validate(&self) -> Result<(), RuleError> {
        let s = &self.scores;
        if [s.reference, s.heterozygous, s.homozygous_risk]
            .iter()
            .any(|v| !(0.0..=1.0).contains(v))
        {
            return Err(RuleError::ScoreOutOfRange {
                condition: self.condition.clone(),
                rsid: self.rsid.clone(),
            });
        }
        if !(s.reference < s.heterozygous && s.heterozygous < s.homozygous_risk) {
            return Err(RuleError::NotMonotonic {
                condition: self.condition.clone(),
                rsid: self.rsid.clone(),
            });
        }
        if !(self.population_risk > 0.0 && self.population_risk <= 1.0) {
            return Err(RuleError::InvalidBaseline {
                condition: self.condition.clone(),
            });
        }
        Ok(())
    }

    /// Score for a genotype, `None` when the call does not fit this site's alleles
    pub fn score_for(&self, genotype: &Genotype) -> Option<f64> {
        risk_allele_dosage_with_flip(genotype, self.reference_allele, self.risk_allele)
            .ok()
            .map(|dosage| self.scores.for_dosage(dosage))
    }
}

#[allow(clippy::too_many_arguments)]
fn rule(
    condition: &str,
    gene: &str,
    rsid: &str,
    reference_allele: char,
    risk_allele: char,
    scores: (f64, f64, f64),
    population_risk: f64,
    evidence_level: EvidenceLevel,
) -> ConditionRule {
    ConditionRule {
        condition: condition.to_string(),
        gene: gene.to_string(),
        rsid: rsid.to_string(),
        reference_allele,
        risk_allele,
        scores: GenotypeScores {
            reference: scores.0,
            heterozygous: scores.1,
            homozygous_risk: scores.2,
        },
        population_risk,
        evidence_level,
    }
}

/// Curated condition rules matching the builtin knowledge base
pub fn standard_rules() -> Vec<ConditionRule> {
    use EvidenceLevel::*;

    vec![
        rule("Hyperhomocysteinemia", "MTHFR", "rs1801133", 'A', 'G', (0.05, 0.15, 0.35), 0.15, A),
        rule("Alzheimer disease", "APOE", "rs429358", 'T', 'C', (0.08, 0.22, 0.55), 0.10, A),
        rule("Cardiovascular disease", "APOE", "rs429358", 'T', 'C', (0.10, 0.15, 0.25), 0.12, B),
        rule("Type 2 diabetes", "TCF7L2", "rs7903146", 'C', 'T', (0.08, 0.12, 0.19), 0.10, A),
        rule("Obesity", "FTO", "rs9939609", 'T', 'A', (0.10, 0.14, 0.20), 0.13, B),
        rule("Venous thromboembolism", "F5", "rs6025", 'C', 'T', (0.02, 0.12, 0.40), 0.02, A),
        rule("Hereditary hemochromatosis", "HFE", "rs1800562", 'G', 'A', (0.01, 0.03, 0.25), 0.005, A),
        rule("Sickle cell disease", "HBB", "rs334", 'T', 'A', (0.001, 0.01, 0.95), 0.003, A),
    ]
}

/// Applies condition rules to an individual's processed variants
#[derive(Debug, Clone)]
pub struct RiskScoringEngine {
    rules: Vec<ConditionRule>,
    config: RiskConfig,
}

impl RiskScoringEngine {
    pub fn new(rules: Vec<ConditionRule>, config: RiskConfig) -> Result<Self, RuleError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules, config })
    }

    pub fn standard(config: RiskConfig) -> Result<Self, RuleError> {
        Self::new(standard_rules(), config)
    }

    pub fn rules(&self) -> &[ConditionRule] {
        &self.rules
    }

    pub fn classify(&self, risk_score: f64) -> RiskLevel {
        self.config.thresholds.classify(risk_score)
    }

    /// One HealthRisk per condition with at least one scorable variant, in
    /// rule order. Several rules for one condition keep the highest score.
    pub fn score_risks(&self, variants: &[ProcessedVariant]) -> Vec<HealthRisk> {
        let by_rsid: HashMap<&str, &ProcessedVariant> =
            first_by_rsid(variants).map(|v| (v.rsid.as_str(), v)).collect();

        let mut risks: Vec<HealthRisk> = Vec::new();

        for rule in &self.rules {
            let Some(variant) = by_rsid.get(rule.rsid.as_str()) else {
                continue;
            };
            if variant.gene() != rule.gene {
                continue;
            }
            let Some(score) = rule.score_for(&variant.genotype) else {
                debug!(
                    "Genotype {} at {} does not fit rule alleles {}/{}",
                    variant.genotype, rule.rsid, rule.reference_allele, rule.risk_allele
                );
                continue;
            };

            match risks.iter_mut().find(|r| r.condition == rule.condition) {
                Some(existing) => {
                    existing.contributing_variants.push(rule.rsid.clone());
                    if rule.evidence_level.strength() > existing.evidence_level.strength() {
                        existing.evidence_level = rule.evidence_level;
                    }
                    if score > existing.risk_score {
                        existing.risk_score = score;
                        existing.gene = rule.gene.clone();
                        existing.population_risk = rule.population_risk;
                        existing.relative_risk = score / rule.population_risk;
                        existing.risk_level = self.classify(score);
                    }
                }
                None => risks.push(HealthRisk {
                    condition: rule.condition.clone(),
                    gene: rule.gene.clone(),
                    risk_score: score,
                    risk_level: self.classify(score),
                    population_risk: rule.population_risk,
                    relative_risk: score / rule.population_risk,
                    contributing_variants: vec![rule.rsid.clone()],
                    evidence_level: rule.evidence_level,
                }),
            }
        }

        for risk in &risks {
            debug!(
                "{}: score {:.3} ({}), relative risk {:.2}",
                risk.condition,
                risk.risk_score,
                risk.risk_level.as_str(),
                risk.relative_risk
            );
        }

        risks
    }

    /// 100 minus the weighted risk burden, plus a bonus per low-risk finding,
    /// clamped to [0, 100]
    pub fn overall_health_score(&self, risks: &[HealthRisk]) -> f64 {
        let score = risks.iter().fold(100.0, |acc, risk| {
            let bonus = if risk.risk_level == RiskLevel::Low {
                self.config.low_risk_bonus
            } else {
                0.0
            };
            acc - risk.risk_score * self.config.deduction_per_score + bonus
        });
        score.clamp(0.0, 100.0)
    }

    /// Carrier screening for recessive pathogenic sites. Reference calls
    /// produce no finding.
    pub fn carrier_status(&self, variants: &[ProcessedVariant]) -> Vec<CarrierFinding> {
        let by_rsid: HashMap<&str, &ProcessedVariant> =
            first_by_rsid(variants).map(|v| (v.rsid.as_str(), v)).collect();

        self.rules
            .iter()
            .filter_map(|rule| {
                let variant = by_rsid.get(rule.rsid.as_str())?;
                let annotation = &variant.annotation;
                if annotation.gene != rule.gene
                    || !annotation.clinical_significance.is_pathogenic()
                    || annotation.inheritance_pattern != InheritancePattern::AutosomalRecessive
                {
                    return None;
                }

                let status = match risk_allele_dosage_with_flip(
                    &variant.genotype,
                    rule.reference_allele,
                    rule.risk_allele,
                ) {
                    Ok(1) => CarrierStatus::Carrier,
                    Ok(2) => CarrierStatus::Affected,
                    _ => return None,
                };

                Some(CarrierFinding {
                    condition: rule.condition.clone(),
                    gene: rule.gene.clone(),
                    rsid: rule.rsid.clone(),
                    genotype: variant.genotype,
                    status,
                })
            })
            .collect()
    }
}
