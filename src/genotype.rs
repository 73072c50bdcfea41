// ==============================================================================
// genotype.rs - Genotype Normalization and Risk Allele Dosage
// ==============================================================================
// Description: Normalizes unordered two-allele genotype calls and counts risk alleles
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================
// Algorithm:
//   Genotype calls are unordered, so alleles are stored sorted:
//   - "GA", "AG", "A/G", "g|a" → AG
//   - "--" / "00" (no call) → GenotypeError::NoCall
//   Risk allele dosage given REF and RISK alleles:
//   - REF/REF → 0, REF/RISK → 1, RISK/RISK → 2
//   - Mismatch on the forward strand is retried on the reverse complement
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Alleles accepted in a genotype call (D/I are array indel calls)
const VALID_ALLELES: [char; 6] = ['A', 'C', 'G', 'T', 'D', 'I'];

/// Errors that can occur while reading a genotype call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenotypeError {
    #[error("No-call genotype '{0}'")]
    NoCall(String),

    #[error("Invalid genotype format: '{0}' (expected 2 alleles)")]
    InvalidFormat(String),

    #[error("Invalid allele '{allele}' in genotype '{genotype}'")]
    InvalidAllele { genotype: String, allele: char },

    #[error("Genotype '{genotype}' does not match REF '{ref_allele}' or RISK '{risk_allele}' alleles")]
    AllelesMismatch {
        genotype: String,
        ref_allele: char,
        risk_allele: char,
    },
}

/// Normalized diploid genotype. Allele order is not significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Genotype {
    alleles: [char; 2],
}

impl Genotype {
    /// Parse and normalize a raw genotype string
    ///
    /// # Examples
    /// ```
    /// use genomic_risk_engine::genotype::Genotype;
    ///
    /// let a = Genotype::parse("GA").unwrap();
    /// let b = Genotype::parse("A/G").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.to_string(), "AG");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, GenotypeError> {
        let cleaned: Vec<char> = raw
            .trim()
            .chars()
            .filter(|c| *c != '/' && *c != '|')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.is_empty() || cleaned.iter().all(|c| *c == '-' || *c == '0') {
            return Err(GenotypeError::NoCall(raw.to_string()));
        }

        if cleaned.len() != 2 {
            return Err(GenotypeError::InvalidFormat(raw.to_string()));
        }

        for allele in &cleaned {
            if !VALID_ALLELES.contains(allele) {
                return Err(GenotypeError::InvalidAllele {
                    genotype: raw.to_string(),
                    allele: *allele,
                });
            }
        }

        Ok(Self::from_alleles(cleaned[0], cleaned[1]))
    }

    pub(crate) fn from_alleles(first: char, second: char) -> Self {
        let mut alleles = [first, second];
        alleles.sort_unstable();
        Self { alleles }
    }

    pub fn alleles(&self) -> (char, char) {
        (self.alleles[0], self.alleles[1])
    }

    pub fn is_homozygous(&self) -> bool {
        self.alleles[0] == self.alleles[1]
    }

    pub fn is_heterozygous(&self) -> bool {
        !self.is_homozygous()
    }

    /// Number of copies (0-2) of `allele` in this genotype
    pub fn allele_count(&self, allele: char) -> u8 {
        let allele = allele.to_ascii_uppercase();
        self.alleles.iter().filter(|a| **a == allele).count() as u8
    }

    /// Reverse complement (strand flip). Indel calls are left as-is.
    pub fn flip_strand(&self) -> Self {
        Self::from_alleles(complement(self.alleles[0]), complement(self.alleles[1]))
    }
}

fn complement(allele: char) -> char {
    match allele {
        'A' => 'T',
        'T' => 'A',
        'C' => 'G',
        'G' => 'C',
        other => other,
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.alleles[0], self.alleles[1])
    }
}

impl TryFrom<String> for Genotype {
    type Error = GenotypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Genotype::parse(&value)
    }
}

impl From<Genotype> for String {
    fn from(genotype: Genotype) -> Self {
        genotype.to_string()
    }
}

/// Count risk alleles in a genotype given the reference and risk alleles
///
/// # Returns
/// * `Ok(0)` - Homozygous reference
/// * `Ok(1)` - Heterozygous
/// * `Ok(2)` - Homozygous risk
/// * `Err(GenotypeError::AllelesMismatch)` - An allele is neither REF nor RISK
pub fn risk_allele_dosage(
    genotype: &Genotype,
    ref_allele: char,
    risk_allele: char,
) -> Result<u8, GenotypeError> {
    let mut risk_count = 0;

    for allele in genotype.alleles {
        if allele == risk_allele {
            risk_count += 1;
        } else if allele != ref_allele {
            return Err(GenotypeError::AllelesMismatch {
                genotype: genotype.to_string(),
                ref_allele,
                risk_allele,
            });
        }
    }

    Ok(risk_count)
}

/// Count risk alleles, retrying on the reverse complement when the call was
/// reported on the opposite strand
pub fn risk_allele_dosage_with_flip(
    genotype: &Genotype,
    ref_allele: char,
    risk_allele: char,
) -> Result<u8, GenotypeError> {
    match risk_allele_dosage(genotype, ref_allele, risk_allele) {
        Ok(dosage) => Ok(dosage),
        Err(GenotypeError::AllelesMismatch { .. }) if !is_palindromic(ref_allele, risk_allele) => {
            risk_allele_dosage(&genotype.flip_strand(), ref_allele, risk_allele)
        }
        Err(e) => Err(e),
    }
}

/// A/T and C/G sites read the same on both strands, so flipping them is ambiguous
fn is_palindromic(ref_allele: char, risk_allele: char) -> bool {
    complement(ref_allele) == risk_allele
}
