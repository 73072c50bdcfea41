// ==============================================================================
// lib.rs - Genomic Risk Engine Library
// ==============================================================================
// Description: Variant classification, risk scoring and family comparison
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================

pub mod advisors;
pub mod audit;
pub mod confidence;
pub mod config;
pub mod engine;
pub mod family;
pub mod genotype;
pub mod ingestion;
pub mod knowledge_base;
pub mod models;
pub mod parsers;
pub mod risk;
pub mod store;
pub mod validator;

pub use engine::{AnalysisReport, Engine, EngineError};
pub use family::{Comparison, ComparisonError};
pub use knowledge_base::KnowledgeBase;
pub use store::FamilyStore;
