// ==============================================================================
// engine.rs - Genomic Risk Engine
// ==============================================================================
// Description: Library facade wiring ingestion, scoring, advice and comparison
// Author: Matt Barham
// Created: 2026-01-28
// Modified: 2026-02-09
// Version: 1.1.0
// ==============================================================================
// Construct once at startup with an already-loaded knowledge base and share
// it by reference. The engine holds no member state: members and comparisons
// live in a caller-owned FamilyStore.
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::advisors::{Advice, DomainAdvisors};
use crate::confidence::mean_confidence;
use crate::config::{ConfigError, EngineConfig};
use crate::family::{Comparison, ComparisonError, FamilyComparisonEngine};
use crate::ingestion::{DataQualityGrade, IngestStats, VariantIngestion};
use crate::knowledge_base::KnowledgeBase;
use crate::models::{HealthRisk, Individual, ProcessedVariant, RawGenotypeRecord};
use crate::parsers::ParsedGenotypeFile;
use crate::risk::{CarrierFinding, ConditionRule, RiskScoringEngine, RuleError};
use crate::store::FamilyStore;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule table error: {0}")]
    Rules(#[from] RuleError),
}

/// Everything known about one individual after a single analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub individual_id: String,
    pub stats: IngestStats,
    pub quality_grade: DataQualityGrade,
    pub diagnostics: Vec<String>,
    pub variant_count: usize,
    /// Mean confidence of the processed variants, absent when there are none
    pub mean_confidence: Option<f64>,
    pub risks: Vec<HealthRisk>,
    pub overall_health_score: f64,
    pub advice: Advice,
    pub carrier_status: Vec<CarrierFinding>,
    pub database_version: String,
    pub knowledge_base_checksum: String,
    pub generated_at: DateTime<Utc>,
}

pub struct Engine {
    knowledge_base: Arc<KnowledgeBase>,
    risk: RiskScoringEngine,
    advisors: DomainAdvisors,
    config: EngineConfig,
}

impl Engine {
    /// Engine with the standard condition rules
    pub fn new(knowledge_base: Arc<KnowledgeBase>, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_rules(knowledge_base, config, crate::risk::standard_rules())
    }

    pub fn with_rules(
        knowledge_base: Arc<KnowledgeBase>,
        config: EngineConfig,
        rules: Vec<ConditionRule>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let risk = RiskScoringEngine::new(rules, config.risk.clone())?;

        for rule in risk.rules() {
            if knowledge_base.lookup(&rule.rsid).is_none() {
                warn!(
                    "Rule for {} references {} which is not in knowledge base {}",
                    rule.condition,
                    rule.rsid,
                    knowledge_base.database_version()
                );
            }
        }

        Ok(Self {
            knowledge_base,
            risk,
            advisors: DomainAdvisors::standard(),
            config,
        })
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ingest raw records. Inputs larger than one chunk are processed in
    /// parallel with the same result.
    pub fn ingest(&self, records: &[RawGenotypeRecord]) -> (Vec<ProcessedVariant>, IngestStats) {
        let ingestion = VariantIngestion::new(&self.knowledge_base, self.config.ingestion.clone());
        if records.len() > self.config.ingestion.parallel_chunk_size {
            ingestion.ingest_parallel(records)
        } else {
            ingestion.ingest(records)
        }
    }

    /// Ingest a parsed file, carrying its unreadable line count into the stats
    pub fn ingest_file(&self, parsed: &ParsedGenotypeFile) -> (Vec<ProcessedVariant>, IngestStats) {
        let (variants, mut stats) = self.ingest(&parsed.records);
        stats.unparseable_lines = parsed.malformed.len();
        (variants, stats)
    }

    pub fn score_risks(&self, variants: &[ProcessedVariant]) -> Vec<HealthRisk> {
        self.risk.score_risks(variants)
    }

    pub fn score_overall_health(&self, risks: &[HealthRisk]) -> f64 {
        self.risk.overall_health_score(risks)
    }

    pub fn advise(&self, variants: &[ProcessedVariant]) -> Advice {
        self.advisors.advise(variants)
    }

    pub fn carrier_status(&self, variants: &[ProcessedVariant]) -> Vec<CarrierFinding> {
        self.risk.carrier_status(variants)
    }

    /// Full single-individual analysis of a parsed genotype file
    pub fn analyze(&self, individual_id: &str, parsed: &ParsedGenotypeFile) -> AnalysisReport {
        let (variants, stats) = self.ingest_file(parsed);
        self.report(individual_id, &variants, stats)
    }

    /// Build a report from already-ingested variants
    pub fn report(
        &self,
        individual_id: &str,
        variants: &[ProcessedVariant],
        stats: IngestStats,
    ) -> AnalysisReport {
        let risks = self.score_risks(variants);
        let overall_health_score = self.score_overall_health(&risks);

        info!(
            "Analysis of {}: {} variants, {} conditions, health score {:.1}",
            individual_id,
            variants.len(),
            risks.len(),
            overall_health_score
        );

        AnalysisReport {
            individual_id: individual_id.to_string(),
            quality_grade: stats.quality_grade(),
            diagnostics: stats.diagnostics(),
            stats,
            variant_count: variants.len(),
            mean_confidence: mean_confidence(variants),
            advice: self.advise(variants),
            carrier_status: self.carrier_status(variants),
            risks,
            overall_health_score,
            database_version: self.knowledge_base.database_version().to_string(),
            knowledge_base_checksum: self.knowledge_base.checksum().to_string(),
            generated_at: Utc::now(),
        }
    }

    pub fn compare(
        &self,
        member1: &Individual,
        member2: &Individual,
    ) -> Result<Comparison, ComparisonError> {
        FamilyComparisonEngine::new(&self.risk, &self.advisors, self.config.comparison.clone())
            .compare(member1, member2)
    }

    /// Compare two stored members by id and record the result in the store.
    /// Unknown or deactivated members produce no partial comparison.
    pub fn compare_members(
        &self,
        store: &mut FamilyStore,
        member1_id: &str,
        member2_id: &str,
    ) -> Result<Comparison, ComparisonError> {
        let result = match (store.member(member1_id), store.member(member2_id)) {
            (None, _) => Err(ComparisonError::NotFound {
                member_id: member1_id.to_string(),
            }),
            (_, None) => Err(ComparisonError::NotFound {
                member_id: member2_id.to_string(),
            }),
            (Some(member1), Some(member2)) => self.compare(member1, member2),
        };

        match result {
            Ok(comparison) => Ok(store.record_comparison(comparison).clone()),
            Err(e) => {
                warn!("Comparison {} vs {} rejected: {}", member1_id, member2_id, e);
                store.record_rejection(member1_id, member2_id, &e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEventType;
    use crate::models::{Demographics, RiskLevel};
    use crate::parsers::MalformedLine;

    fn record(rsid: &str, genotype: &str, quality: f64, coverage: u32) -> RawGenotypeRecord {
        RawGenotypeRecord {
            rsid: rsid.to_string(),
            chromosome: "1".to_string(),
            position: 1000,
            genotype: genotype.to_string(),
            quality,
            coverage,
        }
    }

    fn engine() -> Engine {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        Engine::new(kb, EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_analyze_report() {
        let engine = engine();
        let parsed = ParsedGenotypeFile {
            records: vec![
                record("rs1801133", "GG", 0.95, 30),
                record("rs334", "AT", 0.99, 40),
                record("rs999999999", "AA", 0.99, 40),
                record("rs1815739", "CT", 0.50, 40),
            ],
            malformed: vec![MalformedLine {
                line: 7,
                reason: "invalid position 'x'".to_string(),
            }],
        };

        let report = engine.analyze("proband", &parsed);

        assert_eq!(report.variant_count, 2);
        assert_eq!(report.stats.unparseable_lines, 1);
        assert_eq!(report.stats.unknown_rsid, 1);
        assert_eq!(report.stats.quality_filtered, 1);
        assert_eq!(report.database_version, "2026.02-curated");
        assert_eq!(report.knowledge_base_checksum.len(), 64);

        let mthfr = report
            .risks
            .iter()
            .find(|r| r.gene == "MTHFR")
            .unwrap();
        assert_eq!(mthfr.risk_level, RiskLevel::High);
        assert_eq!(report.carrier_status.len(), 1);
        assert!(!report.advice.nutrition.is_empty());
        assert!(report.mean_confidence.is_some());
    }

    #[test]
    fn test_report_includes_trait_predictions() {
        let parsed = ParsedGenotypeFile {
            records: vec![record("rs1805007", "CT", 0.95, 30)],
            malformed: Vec::new(),
        };

        let report = engine().analyze("proband", &parsed);

        assert_eq!(report.advice.traits.len(), 1);
        assert_eq!(report.advice.traits[0].category, "Hair color");
        assert!(report.risks.is_empty());
    }

    #[test]
    fn test_large_input_uses_parallel_path_with_same_result() {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        let mut config = EngineConfig::default();
        config.ingestion.parallel_chunk_size = 2;
        let parallel = Engine::new(kb.clone(), config).unwrap();
        let sequential = Engine::new(kb, EngineConfig::default()).unwrap();

        let records = vec![
            record("rs1801133", "AG", 0.95, 30),
            record("rs429358", "TT", 0.95, 30),
            record("rs1801133", "GG", 0.95, 30),
            record("rs762551", "--", 0.95, 30),
            record("rs4988235", "GG", 0.95, 5),
        ];

        assert_eq!(parallel.ingest(&records), sequential.ingest(&records));
    }

    #[test]
    fn test_compare_members_through_store() {
        let engine = engine();
        let mut store = FamilyStore::new();

        for id in ["mother", "daughter"] {
            let (variants, _) = engine.ingest(&[record("rs1801133", "AG", 0.95, 30)]);
            store
                .add_member(Individual::new(id, Demographics::default(), variants))
                .unwrap();
        }

        let comparison = engine
            .compare_members(&mut store, "mother", "daughter")
            .unwrap();
        assert!(comparison.common_variants[0].is_identical);
        assert_eq!(store.comparisons().len(), 1);

        let missing = engine.compare_members(&mut store, "mother", "uncle");
        assert_eq!(
            missing,
            Err(ComparisonError::NotFound {
                member_id: "uncle".to_string()
            })
        );
        assert_eq!(store.comparisons().len(), 1);

        store.deactivate_member("daughter").unwrap();
        assert!(matches!(
            engine.compare_members(&mut store, "mother", "daughter"),
            Err(ComparisonError::Inactive { .. })
        ));

        let rejected = store
            .audit_events()
            .iter()
            .filter(|e| e.event_type == AuditEventType::ComparisonRejected)
            .count();
        assert_eq!(rejected, 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        let mut config = EngineConfig::default();
        config.comparison.variant_weight = 0.9;
        assert!(matches!(
            Engine::new(kb, config),
            Err(EngineError::Config(_))
        ));
    }
}
