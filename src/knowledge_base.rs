// ==============================================================================
// knowledge_base.rs - Versioned Variant Knowledge Base
// ==============================================================================
// Description: Read-only rsID → clinical annotation store (JSON or SQLite dataset)
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-19
// Version: 2.1.0
// ==============================================================================
// Loading is all-or-nothing: a malformed dataset is a fatal startup error, the
// engine never serves requests from a partially loaded knowledge base.
// ==============================================================================

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use validator::Validate;

use crate::models::{ClinicalSignificance, EvidenceLevel, FunctionalClass, InheritancePattern};

/// Dataset shipped with the crate
const BUILTIN_DATASET: &str = include_str!("../data/knowledge_base.json");

/// Clinical annotation for a single rsID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KnowledgeBaseEntry {
    #[validate(length(min = 3))]
    pub rsid: String,

    #[validate(length(min = 1))]
    pub gene: String,

    pub functional_class: FunctionalClass,

    /// Protein change, e.g. "p.Ala222Val"
    #[serde(default)]
    pub amino_acid_change: Option<String>,

    /// Risk allele frequency in the reference population
    #[validate(range(min = 0.0, max = 1.0))]
    pub population_frequency: f64,

    pub clinical_significance: ClinicalSignificance,

    pub evidence_level: EvidenceLevel,

    #[serde(default)]
    pub phenotypes: Vec<String>,

    #[serde(default)]
    pub drug_interactions: Vec<String>,

    pub inheritance_pattern: InheritancePattern,
}

/// Errors that can occur while loading a knowledge base
#[derive(Error, Debug)]
pub enum KnowledgeBaseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON dataset error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite dataset error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Duplicate knowledge base entry for {0}")]
    DuplicateRsid(String),

    #[error("Invalid knowledge base entry for {rsid}: {details}")]
    InvalidEntry { rsid: String, details: String },

    #[error("Dataset is missing a database version")]
    MissingVersion,

    #[error("Dataset contains no entries")]
    EmptyDataset,
}

/// On-disk JSON layout
#[derive(Debug, Deserialize)]
struct Dataset {
    database_version: String,
    entries: Vec<KnowledgeBaseEntry>,
}

/// Immutable rsID → annotation map
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    database_version: String,
    checksum: String,
    entries: HashMap<String, KnowledgeBaseEntry>,
}

impl KnowledgeBase {
    /// Build from already-loaded entries, rejecting duplicate or invalid ones
    pub fn from_entries(
        database_version: impl Into<String>,
        entries: Vec<KnowledgeBaseEntry>,
    ) -> Result<Self, KnowledgeBaseError> {
        let database_version = database_version.into();
        if database_version.trim().is_empty() {
            return Err(KnowledgeBaseError::MissingVersion);
        }
        if entries.is_empty() {
            return Err(KnowledgeBaseError::EmptyDataset);
        }

        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            validate_entry(&entry)?;
            if map.contains_key(&entry.rsid) {
                return Err(KnowledgeBaseError::DuplicateRsid(entry.rsid));
            }
            map.insert(entry.rsid.clone(), entry);
        }

        let checksum = compute_checksum(&database_version, &map)?;

        info!(
            "Loaded knowledge base {} ({} entries, sha256 {})",
            database_version,
            map.len(),
            &checksum[..12]
        );

        Ok(Self {
            database_version,
            checksum,
            entries: map,
        })
    }

    /// Parse a JSON dataset: `{"database_version": "...", "entries": [...]}`
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeBaseError> {
        let dataset: Dataset = serde_json::from_str(json)?;
        Self::from_entries(dataset.database_version, dataset.entries)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, KnowledgeBaseError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Load from a SQLite dataset with `metadata(key, value)` and
    /// `knowledge_base(...)` tables. Phenotypes and drug interactions are
    /// stored as JSON arrays.
    pub fn from_sqlite(path: impl AsRef<Path>) -> Result<Self, KnowledgeBaseError> {
        let conn = Connection::open(path.as_ref())?;

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'database_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let version = version.ok_or(KnowledgeBaseError::MissingVersion)?;

        let mut stmt = conn.prepare(
            "SELECT rsid, gene, functional_class, amino_acid_change, population_frequency,
                    clinical_significance, evidence_level, phenotypes, drug_interactions,
                    inheritance_pattern
             FROM knowledge_base
             ORDER BY rsid",
        )?;

        let rows = stmt.query_map([], |row| {
            let phenotypes: String = row.get(7)?;
            let drug_interactions: String = row.get(8)?;

            Ok(KnowledgeBaseEntry {
                rsid: row.get(0)?,
                gene: row.get(1)?,
                functional_class: column_value(2, row.get::<_, String>(2)?)?,
                amino_acid_change: row.get(3)?,
                population_frequency: row.get(4)?,
                clinical_significance: column_value(5, row.get::<_, String>(5)?)?,
                evidence_level: column_value(6, row.get::<_, String>(6)?)?,
                phenotypes: json_column(7, &phenotypes)?,
                drug_interactions: json_column(8, &drug_interactions)?,
                inheritance_pattern: column_value(9, row.get::<_, String>(9)?)?,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        debug!("Read {} rows from SQLite knowledge base", entries.len());

        Self::from_entries(version, entries)
    }

    /// Dataset embedded in the crate
    pub fn builtin() -> Result<Self, KnowledgeBaseError> {
        Self::from_json_str(BUILTIN_DATASET)
    }

    /// Entries are keyed by lowercase rsID; "RS1801133" finds "rs1801133"
    pub fn lookup(&self, rsid: &str) -> Option<&KnowledgeBaseEntry> {
        self.entries
            .get(rsid)
            .or_else(|| self.entries.get(&rsid.to_ascii_lowercase()))
    }

    pub fn database_version(&self) -> &str {
        &self.database_version
    }

    /// SHA-256 over the version and entries (sorted by rsID)
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeBaseEntry> {
        self.entries.values()
    }
}

fn validate_entry(entry: &KnowledgeBaseEntry) -> Result<(), KnowledgeBaseError> {
    let invalid = |details: String| KnowledgeBaseError::InvalidEntry {
        rsid: entry.rsid.clone(),
        details,
    };

    entry.validate().map_err(|e| invalid(e.to_string()))?;
    if !entry.population_frequency.is_finite() {
        return Err(invalid("population_frequency must be finite".to_string()));
    }

    let digits = entry.rsid.strip_prefix("rs").unwrap_or_default();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("rsid must look like rs<digits>".to_string()));
    }

    Ok(())
}

fn compute_checksum(
    version: &str,
    entries: &HashMap<String, KnowledgeBaseEntry>,
) -> Result<String, KnowledgeBaseError> {
    let mut sorted: Vec<&KnowledgeBaseEntry> = entries.values().collect();
    sorted.sort_by(|a, b| a.rsid.cmp(&b.rsid));

    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    hasher.update(serde_json::to_vec(&sorted)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Deserialize a snake_case enum stored as TEXT
fn column_value<T: DeserializeOwned>(index: usize, raw: String) -> rusqlite::Result<T> {
    serde_json::from_value(serde_json::Value::String(raw)).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn json_column(index: usize, raw: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::tempdir;

    fn entry(rsid: &str, gene: &str) -> KnowledgeBaseEntry {
        KnowledgeBaseEntry {
            rsid: rsid.to_string(),
            gene: gene.to_string(),
            functional_class: FunctionalClass::Missense,
            amino_acid_change: None,
            population_frequency: 0.2,
            clinical_significance: ClinicalSignificance::RiskFactor,
            evidence_level: EvidenceLevel::B,
            phenotypes: vec!["Trait".to_string()],
            drug_interactions: Vec::new(),
            inheritance_pattern: InheritancePattern::Complex,
        }
    }

    #[test]
    fn test_builtin_dataset_loads() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert!(!kb.is_empty());
        assert!(!kb.database_version().is_empty());

        let mthfr = kb.lookup("rs1801133").unwrap();
        assert_eq!(mthfr.gene, "MTHFR");
        assert_eq!(mthfr.evidence_level, EvidenceLevel::A);
        assert!(kb.lookup("rs0").is_none());
    }

    #[test]
    fn test_lookup_ignores_rsid_case() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert_eq!(kb.lookup("RS1801133").unwrap().rsid, "rs1801133");
        assert_eq!(kb.lookup("Rs1801133").unwrap().gene, "MTHFR");
    }

    #[test]
    fn test_duplicate_rsid_rejected() {
        let result = KnowledgeBase::from_entries(
            "test-1",
            vec![entry("rs1", "GENE1"), entry("rs1", "GENE2")],
        );
        assert!(matches!(result, Err(KnowledgeBaseError::DuplicateRsid(r)) if r == "rs1"));
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let mut bad_freq = entry("rs1", "GENE1");
        bad_freq.population_frequency = 1.5;
        assert!(matches!(
            KnowledgeBase::from_entries("v1", vec![bad_freq]),
            Err(KnowledgeBaseError::InvalidEntry { .. })
        ));

        let bad_rsid = entry("chr1:123", "GENE1");
        assert!(matches!(
            KnowledgeBase::from_entries("v1", vec![bad_rsid]),
            Err(KnowledgeBaseError::InvalidEntry { .. })
        ));

        let no_gene = entry("rs5", "");
        assert!(matches!(
            KnowledgeBase::from_entries("v1", vec![no_gene]),
            Err(KnowledgeBaseError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_empty_or_unversioned_dataset_rejected() {
        assert!(matches!(
            KnowledgeBase::from_entries("v1", Vec::new()),
            Err(KnowledgeBaseError::EmptyDataset)
        ));
        assert!(matches!(
            KnowledgeBase::from_entries("  ", vec![entry("rs1", "G")]),
            Err(KnowledgeBaseError::MissingVersion)
        ));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        assert!(matches!(
            KnowledgeBase::from_json_str("{\"database_version\": \"v1\", \"entries\": [{"),
            Err(KnowledgeBaseError::Json(_))
        ));
    }

    #[test]
    fn test_checksum_is_order_independent() {
        let a = KnowledgeBase::from_entries("v1", vec![entry("rs1", "A"), entry("rs2", "B")]).unwrap();
        let b = KnowledgeBase::from_entries("v1", vec![entry("rs2", "B"), entry("rs1", "A")]).unwrap();
        let c = KnowledgeBase::from_entries("v2", vec![entry("rs1", "A"), entry("rs2", "B")]).unwrap();

        assert_eq!(a.checksum(), b.checksum());
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_load_from_sqlite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.db");

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE knowledge_base (
                 rsid TEXT PRIMARY KEY, gene TEXT NOT NULL, functional_class TEXT NOT NULL,
                 amino_acid_change TEXT, population_frequency REAL NOT NULL,
                 clinical_significance TEXT NOT NULL, evidence_level TEXT NOT NULL,
                 phenotypes TEXT NOT NULL, drug_interactions TEXT NOT NULL,
                 inheritance_pattern TEXT NOT NULL
             );
             INSERT INTO metadata VALUES ('database_version', 'sqlite-2026.1');",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO knowledge_base VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                "rs334",
                "HBB",
                "missense",
                "p.Glu7Val",
                0.01,
                "pathogenic",
                "A",
                "[\"Sickle cell anemia\"]",
                "[]",
                "autosomal_recessive"
            ],
        )
        .unwrap();
        drop(conn);

        let kb = KnowledgeBase::from_sqlite(&path).unwrap();
        assert_eq!(kb.database_version(), "sqlite-2026.1");
        assert_eq!(kb.len(), 1);

        let hbb = kb.lookup("rs334").unwrap();
        assert_eq!(hbb.clinical_significance, ClinicalSignificance::Pathogenic);
        assert_eq!(hbb.inheritance_pattern, InheritancePattern::AutosomalRecessive);
        assert_eq!(hbb.phenotypes, vec!["Sickle cell anemia".to_string()]);
    }

    #[test]
    fn test_sqlite_bad_enum_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.db");

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE knowledge_base (
                 rsid TEXT, gene TEXT, functional_class TEXT, amino_acid_change TEXT,
                 population_frequency REAL, clinical_significance TEXT, evidence_level TEXT,
                 phenotypes TEXT, drug_interactions TEXT, inheritance_pattern TEXT
             );
             INSERT INTO metadata VALUES ('database_version', 'v1');
             INSERT INTO knowledge_base VALUES
                 ('rs1', 'G', 'missense', NULL, 0.1, 'pathogenic', 'Z', '[]', '[]', 'complex');",
        )
        .unwrap();
        drop(conn);

        assert!(matches!(
            KnowledgeBase::from_sqlite(&path),
            Err(KnowledgeBaseError::Sqlite(_))
        ));
    }
}
