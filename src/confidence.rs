// ==============================================================================
// confidence.rs - Variant Call Confidence
// ==============================================================================
// Description: Deterministic confidence from call quality, depth and evidence
// Author: Matt Barham
// Created: 2026-01-20
// Modified: 2026-01-20
// Version: 1.0.0
// ==============================================================================
// confidence = clamp(0.5 + 0.3·quality + 0.2·min(coverage/50, 1), 0, 1)
//              × evidence multiplier (A 1.0, B 0.8, C 0.6, D 0.4)
// ==============================================================================

use crate::models::{EvidenceLevel, ProcessedVariant};

const BASE_CONFIDENCE: f64 = 0.5;
const QUALITY_WEIGHT: f64 = 0.3;
const COVERAGE_WEIGHT: f64 = 0.2;
/// Read depth at which the coverage term saturates
const COVERAGE_SATURATION: f64 = 50.0;

/// Confidence in [0, 1] for a single call
pub fn confidence_score(quality: f64, coverage: u32, evidence: EvidenceLevel) -> f64 {
    let quality = if quality.is_finite() {
        quality.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let depth = (coverage as f64 / COVERAGE_SATURATION).min(1.0);

    let base = (BASE_CONFIDENCE + QUALITY_WEIGHT * quality + COVERAGE_WEIGHT * depth).clamp(0.0, 1.0);
    base * evidence.confidence_multiplier()
}

/// Mean confidence across a variant set, `None` when empty
pub fn mean_confidence(variants: &[ProcessedVariant]) -> Option<f64> {
    if variants.is_empty() {
        return None;
    }
    let total: f64 = variants.iter().map(|v| v.confidence).sum();
    Some(total / variants.len() as f64)
}
