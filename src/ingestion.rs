// ==============================================================================
// ingestion.rs - Variant Ingestion
// ==============================================================================
// Description: Filters raw genotype calls and joins them against the knowledge base
// Author: Matt Barham
// Created: 2026-01-20
// Modified: 2026-10-19
// Version: 1.2.0
// ==============================================================================
// Pipeline per record (pure, order-independent):
//   1. Validate quality/genotype (malformed / no-call)
//   2. Quality filter (quality < min_quality or coverage < min_coverage)
//   3. Knowledge base join (unknown rsIDs are skipped, not errors)
// The reduce step is sequential: it keeps input order, drops repeated rsIDs
// and accumulates IngestStats. Parallel ingestion only changes the map step.
// ==============================================================================

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::IngestionConfig;
use crate::confidence::confidence_score;
use crate::genotype::{Genotype, GenotypeError};
use crate::knowledge_base::KnowledgeBase;
use crate::models::{ProcessedVariant, RawGenotypeRecord};

/// Ingestion counters returned next to the processed variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Records handed to ingestion
    pub total_records: usize,
    /// Lines the file parser could not read (never reached ingestion)
    pub unparseable_lines: usize,
    /// Records with an invalid genotype or quality value
    pub malformed: usize,
    /// Records with a "--" style no-call
    pub no_calls: usize,
    /// Well-formed records removed by the quality filter
    pub quality_filtered: usize,
    pub below_min_quality: usize,
    pub below_min_coverage: usize,
    /// Well-formed records that passed the quality filter
    pub passed_quality: usize,
    pub unknown_rsid: usize,
    /// Repeated rsIDs (first occurrence kept)
    pub duplicates: usize,
    /// Records that became ProcessedVariants
    pub matched: usize,
}

/// Overall data quality of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl IngestStats {
    /// Fraction of well-formed calls removed by the quality filter
    pub fn quality_filtered_fraction(&self) -> f64 {
        let well_formed = self.quality_filtered + self.passed_quality;
        if well_formed == 0 {
            return 0.0;
        }
        self.quality_filtered as f64 / well_formed as f64
    }

    /// Fraction of quality-passing calls found in the knowledge base
    pub fn match_rate(&self) -> f64 {
        if self.passed_quality == 0 {
            return 0.0;
        }
        self.matched as f64 / self.passed_quality as f64
    }

    /// Grade from the share of all input that was usable (well-formed, called
    /// and above the quality filter)
    pub fn quality_grade(&self) -> DataQualityGrade {
        let seen = self.total_records + self.unparseable_lines;
        if seen == 0 {
            return DataQualityGrade::Poor;
        }
        let usable = self.passed_quality as f64 / seen as f64;
        if usable >= 0.95 {
            DataQualityGrade::Excellent
        } else if usable >= 0.80 {
            DataQualityGrade::Good
        } else if usable >= 0.50 {
            DataQualityGrade::Fair
        } else {
            DataQualityGrade::Poor
        }
    }

    /// Human-readable data-quality signals for the presentation layer
    pub fn diagnostics(&self) -> Vec<String> {
        let mut messages = Vec::new();
        let fraction = self.quality_filtered_fraction();
        if self.quality_filtered > 0 {
            messages.push(format!(
                "{:.0}% of called variants were below the required quality or depth",
                fraction * 100.0
            ));
        }
        if self.malformed + self.unparseable_lines > 0 {
            messages.push(format!(
                "{} records could not be read",
                self.malformed + self.unparseable_lines
            ));
        }
        if self.no_calls > 0 {
            messages.push(format!("{} positions were not called", self.no_calls));
        }
        if self.duplicates > 0 {
            messages.push(format!("{} repeated rsIDs were ignored", self.duplicates));
        }
        messages
    }
}

/// Classification of a single raw record
#[derive(Debug, Clone)]
enum RecordOutcome {
    Malformed,
    NoCall,
    LowQuality { quality: bool, coverage: bool },
    UnknownRsid,
    Matched(ProcessedVariant),
}

/// Joins raw genotype calls against a shared knowledge base
pub struct VariantIngestion<'a> {
    knowledge_base: &'a KnowledgeBase,
    config: IngestionConfig,
}

impl<'a> VariantIngestion<'a> {
    pub fn new(knowledge_base: &'a KnowledgeBase, config: IngestionConfig) -> Self {
        Self {
            knowledge_base,
            config,
        }
    }

    /// Ingest records sequentially
    pub fn ingest(&self, records: &[RawGenotypeRecord]) -> (Vec<ProcessedVariant>, IngestStats) {
        let outcomes: Vec<RecordOutcome> = records.iter().map(|r| self.classify(r)).collect();
        self.reduce(records, outcomes)
    }

    /// Ingest records in parallel chunks; the result is identical to `ingest`
    pub fn ingest_parallel(&self, records: &[RawGenotypeRecord]) -> (Vec<ProcessedVariant>, IngestStats) {
        let chunk_size = self.config.parallel_chunk_size.max(1);
        debug!(
            "Ingesting {} records in chunks of {}",
            records.len(),
            chunk_size
        );

        let chunks: Vec<Vec<RecordOutcome>> = records
            .par_chunks(chunk_size)
            .map(|chunk| chunk.iter().map(|r| self.classify(r)).collect())
            .collect();

        self.reduce(records, chunks.into_iter().flatten().collect())
    }

    fn classify(&self, record: &RawGenotypeRecord) -> RecordOutcome {
        if !record.quality.is_finite() || !(0.0..=1.0).contains(&record.quality) {
            return RecordOutcome::Malformed;
        }

        let genotype = match Genotype::parse(&record.genotype) {
            Ok(genotype) => genotype,
            Err(GenotypeError::NoCall(_)) => return RecordOutcome::NoCall,
            Err(_) => return RecordOutcome::Malformed,
        };

        let below_quality = record.quality < self.config.min_quality;
        let below_coverage = record.coverage < self.config.min_coverage;
        if below_quality || below_coverage {
            return RecordOutcome::LowQuality {
                quality: below_quality,
                coverage: below_coverage,
            };
        }

        let Some(entry) = self.knowledge_base.lookup(record.rsid.trim()) else {
            return RecordOutcome::UnknownRsid;
        };

        let confidence = confidence_score(record.quality, record.coverage, entry.evidence_level);

        RecordOutcome::Matched(ProcessedVariant {
            rsid: entry.rsid.clone(),
            chromosome: record.chromosome.clone(),
            position: record.position,
            genotype,
            quality: record.quality,
            coverage: record.coverage,
            annotation: entry.clone(),
            confidence,
        })
    }

    fn reduce(
        &self,
        records: &[RawGenotypeRecord],
        outcomes: Vec<RecordOutcome>,
    ) -> (Vec<ProcessedVariant>, IngestStats) {
        let mut stats = IngestStats {
            total_records: records.len(),
            ..IngestStats::default()
        };
        let mut variants = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for outcome in outcomes {
            match outcome {
                RecordOutcome::Malformed => stats.malformed += 1,
                RecordOutcome::NoCall => stats.no_calls += 1,
                RecordOutcome::LowQuality { quality, coverage } => {
                    stats.quality_filtered += 1;
                    if quality {
                        stats.below_min_quality += 1;
                    }
                    if coverage {
                        stats.below_min_coverage += 1;
                    }
                }
                RecordOutcome::UnknownRsid => {
                    stats.passed_quality += 1;
                    stats.unknown_rsid += 1;
                }
                RecordOutcome::Matched(variant) => {
                    stats.passed_quality += 1;
                    if seen.insert(variant.rsid.clone()) {
                        stats.matched += 1;
                        variants.push(variant);
                    } else {
                        stats.duplicates += 1;
                    }
                }
            }
        }

        info!(
            "Ingested {} records: {} matched, {} unknown rsID, {} quality filtered \
             ({} low quality, {} low depth), {} no-calls, {} malformed, {} duplicates",
            stats.total_records,
            stats.matched,
            stats.unknown_rsid,
            stats.quality_filtered,
            stats.below_min_quality,
            stats.below_min_coverage,
            stats.no_calls,
            stats.malformed,
            stats.duplicates
        );

        (variants, stats)
    }
}
