// ==============================================================================
// family.rs - Family Member Comparison
// ==============================================================================
// Description: Pairwise genetic similarity, inherited traits and joint recommendations
// Author: Matt Barham
// Created: 2026-01-26
// Modified: 2026-10-19
// Version: 1.1.0
// ==============================================================================
// Similarity (0-100) is a weighted sum of three fractions, each computed from
// quantities that do not depend on argument order:
//   variants: identical shared genotypes / max(distinct rsIDs of A, of B)
//   traits:   |phenotypes A ∩ B| / |phenotypes A ∪ B|
//   risks:    conditions at the same level / conditions scored for both
// An empty denominator counts as full agreement, so compare(A, A) = 100.
// A repeated rsID contributes only its first call to every part.
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::advisors::DomainAdvisors;
use crate::config::ComparisonConfig;
use crate::genotype::Genotype;
use crate::models::{first_by_rsid, HealthRisk, Individual, Priority, ProcessedVariant, RiskLevel};
use crate::risk::RiskScoringEngine;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComparisonError {
    #[error("Family member not found: {member_id}")]
    NotFound { member_id: String },

    #[error("Family member is deactivated: {member_id}")]
    Inactive { member_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonVariant {
    pub rsid: String,
    pub gene: String,
    pub member1_genotype: Genotype,
    pub member2_genotype: Genotype,
    pub is_identical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritedTrait {
    pub condition: String,
    pub gene: String,
    pub member1_level: RiskLevel,
    pub member2_level: RiskLevel,
    pub inheritance_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskComparison {
    pub condition: String,
    pub member1_level: RiskLevel,
    pub member2_level: RiskLevel,
    pub member1_score: f64,
    pub member2_score: f64,
    /// Ordinal distance between the two levels (0-3)
    pub risk_difference: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyRecommendationKind {
    JointMonitoring,
    JointLifestyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyRecommendation {
    pub kind: FamilyRecommendationKind,
    pub title: String,
    pub description: String,
    pub condition: Option<String>,
    pub gene: String,
    pub priority: Priority,
}

/// Result of comparing two family members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub id: Uuid,
    pub member1_id: String,
    pub member2_id: String,
    /// Shared rsIDs, sorted by rsID
    pub common_variants: Vec<CommonVariant>,
    pub inherited_traits: Vec<InheritedTrait>,
    pub risk_comparison: Vec<RiskComparison>,
    pub similarity_score: f64,
    pub recommendations: Vec<FamilyRecommendation>,
    pub created_at: DateTime<Utc>,
}

impl Comparison {
    pub fn involves(&self, member_id: &str) -> bool {
        self.member1_id == member_id || self.member2_id == member_id
    }
}

pub struct FamilyComparisonEngine<'a> {
    risk: &'a RiskScoringEngine,
    advisors: &'a DomainAdvisors,
    config: ComparisonConfig,
}

impl<'a> FamilyComparisonEngine<'a> {
    pub fn new(
        risk: &'a RiskScoringEngine,
        advisors: &'a DomainAdvisors,
        config: ComparisonConfig,
    ) -> Self {
        Self {
            risk,
            advisors,
            config,
        }
    }

    /// Compare two members. Comparing a member with itself is valid and
    /// scores 100.
    pub fn compare(
        &self,
        member1: &Individual,
        member2: &Individual,
    ) -> Result<Comparison, ComparisonError> {
        for member in [member1, member2] {
            if !member.active {
                return Err(ComparisonError::Inactive {
                    member_id: member.id.clone(),
                });
            }
        }

        let variants1 = distinct_by_rsid(&member1.variants);
        let variants2 = distinct_by_rsid(&member2.variants);

        let common_variants = common_variants(&variants1, &variants2);

        let risks1 = by_condition(self.risk.score_risks(&member1.variants));
        let risks2 = by_condition(self.risk.score_risks(&member2.variants));
        let risk_comparison = compare_risks(&risks1, &risks2);
        let inherited_traits = self.inherited_traits(&risks1, &risks2);

        let variant_fraction = variant_fraction(&common_variants, variants1.len(), variants2.len());
        let trait_fraction = trait_fraction(&variants1, &variants2);
        let risk_fraction = risk_fraction(&risk_comparison);

        let similarity_score = self.similarity(variant_fraction, trait_fraction, risk_fraction);

        let mut recommendations = joint_monitoring(&risks1, &risks2);
        recommendations.extend(self.joint_lifestyle(&common_variants, &variants1));

        debug!(
            "Compared {} with {}: variants {:.3}, traits {:.3}, risks {:.3} → {:.1}",
            member1.id, member2.id, variant_fraction, trait_fraction, risk_fraction, similarity_score
        );

        Ok(Comparison {
            id: Uuid::new_v4(),
            member1_id: member1.id.clone(),
            member2_id: member2.id.clone(),
            common_variants,
            inherited_traits,
            risk_comparison,
            similarity_score,
            recommendations,
            created_at: Utc::now(),
        })
    }

    fn similarity(&self, variants: f64, traits: f64, risks: f64) -> f64 {
        let c = &self.config;
        let total_weight = c.variant_weight + c.trait_weight + c.risk_weight;
        if total_weight <= 0.0 {
            return 0.0;
        }
        let weighted = c.variant_weight * variants + c.trait_weight * traits + c.risk_weight * risks;
        (weighted / total_weight * 100.0).clamp(0.0, 100.0)
    }

    fn inherited_traits(
        &self,
        risks1: &BTreeMap<String, HealthRisk>,
        risks2: &BTreeMap<String, HealthRisk>,
    ) -> Vec<InheritedTrait> {
        risks1
            .iter()
            .filter_map(|(condition, a)| {
                let b = risks2.get(condition)?;
                if a.gene != b.gene {
                    return None;
                }
                Some(InheritedTrait {
                    condition: condition.clone(),
                    gene: a.gene.clone(),
                    member1_level: a.risk_level,
                    member2_level: b.risk_level,
                    inheritance_probability: self
                        .config
                        .inheritance_probability(a.risk_level, b.risk_level),
                })
            })
            .collect()
    }

    /// Shared identical genotypes that trigger a nutrition or exercise rule
    fn joint_lifestyle(
        &self,
        common: &[CommonVariant],
        variants1: &BTreeMap<&str, &ProcessedVariant>,
    ) -> Vec<FamilyRecommendation> {
        common
            .iter()
            .filter(|c| c.is_identical)
            .filter_map(|c| variants1.get(c.rsid.as_str()).copied())
            .flat_map(|variant| {
                self.advisors
                    .lifestyle_rules_for(variant)
                    .map(move |rule| FamilyRecommendation {
                        kind: FamilyRecommendationKind::JointLifestyle,
                        title: format!("Shared {} plan ({})", rule.title.to_lowercase(), rule.gene),
                        description: format!(
                            "Both members carry {} at {}. {}",
                            variant.genotype, rule.rsid, rule.description
                        ),
                        condition: None,
                        gene: rule.gene.clone(),
                        priority: rule.priority,
                    })
            })
            .collect()
    }
}

/// First occurrence of each rsID
fn distinct_by_rsid(variants: &[ProcessedVariant]) -> BTreeMap<&str, &ProcessedVariant> {
    first_by_rsid(variants)
        .map(|variant| (variant.rsid.as_str(), variant))
        .collect()
}

fn common_variants(
    variants1: &BTreeMap<&str, &ProcessedVariant>,
    variants2: &BTreeMap<&str, &ProcessedVariant>,
) -> Vec<CommonVariant> {
    variants1
        .iter()
        .filter_map(|(rsid, a)| {
            let b = variants2.get(rsid)?;
            Some(CommonVariant {
                rsid: rsid.to_string(),
                gene: a.gene().to_string(),
                member1_genotype: a.genotype,
                member2_genotype: b.genotype,
                is_identical: a.genotype == b.genotype,
            })
        })
        .collect()
}

fn by_condition(risks: Vec<HealthRisk>) -> BTreeMap<String, HealthRisk> {
    risks
        .into_iter()
        .map(|risk| (risk.condition.clone(), risk))
        .collect()
}

fn compare_risks(
    risks1: &BTreeMap<String, HealthRisk>,
    risks2: &BTreeMap<String, HealthRisk>,
) -> Vec<RiskComparison> {
    risks1
        .iter()
        .filter_map(|(condition, a)| {
            let b = risks2.get(condition)?;
            Some(RiskComparison {
                condition: condition.clone(),
                member1_level: a.risk_level,
                member2_level: b.risk_level,
                member1_score: a.risk_score,
                member2_score: b.risk_score,
                risk_difference: a.risk_level.distance(b.risk_level),
            })
        })
        .collect()
}

fn joint_monitoring(
    risks1: &BTreeMap<String, HealthRisk>,
    risks2: &BTreeMap<String, HealthRisk>,
) -> Vec<FamilyRecommendation> {
    risks1
        .iter()
        .filter_map(|(condition, a)| {
            let b = risks2.get(condition)?;
            if !(a.risk_level.is_elevated() && b.risk_level.is_elevated()) {
                return None;
            }
            let priority = if a.risk_level == RiskLevel::VeryHigh || b.risk_level == RiskLevel::VeryHigh {
                Priority::High
            } else {
                Priority::Medium
            };
            Some(FamilyRecommendation {
                kind: FamilyRecommendationKind::JointMonitoring,
                title: format!("Joint monitoring: {}", condition),
                description: format!(
                    "Both members show elevated {} risk ({}). Coordinate screening schedules.",
                    condition, a.gene
                ),
                condition: Some(condition.clone()),
                gene: a.gene.clone(),
                priority,
            })
        })
        .collect()
}

fn variant_fraction(common: &[CommonVariant], distinct1: usize, distinct2: usize) -> f64 {
    let larger = distinct1.max(distinct2);
    if larger == 0 {
        return 1.0;
    }
    let identical = common.iter().filter(|c| c.is_identical).count();
    identical as f64 / larger as f64
}

fn phenotypes<'a>(variants: &BTreeMap<&str, &'a ProcessedVariant>) -> BTreeSet<&'a str> {
    variants
        .values()
        .copied()
        .flat_map(|v| v.annotation.phenotypes.iter().map(String::as_str))
        .collect()
}

fn trait_fraction(
    variants1: &BTreeMap<&str, &ProcessedVariant>,
    variants2: &BTreeMap<&str, &ProcessedVariant>,
) -> f64 {
    let traits1 = phenotypes(variants1);
    let traits2 = phenotypes(variants2);
    let union = traits1.union(&traits2).count();
    if union == 0 {
        return 1.0;
    }
    traits1.intersection(&traits2).count() as f64 / union as f64
}

fn risk_fraction(comparisons: &[RiskComparison]) -> f64 {
    if comparisons.is_empty() {
        return 1.0;
    }
    let matching = comparisons.iter().filter(|c| c.risk_difference == 0).count();
    matching as f64 / comparisons.len() as f64
}
