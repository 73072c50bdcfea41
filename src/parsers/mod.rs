// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for raw genotype call files
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================

pub mod genotype_file;

pub use genotype_file::{
    ArrayCallDefaults, GenotypeFileError, GenotypeFileParser, MalformedLine, ParsedGenotypeFile,
};
