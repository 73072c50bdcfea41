// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Validates genotype call files and knowledge base datasets before loading
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-02-09
// Version: 2.0.0
// Security: Allowlist-only file types, magic number verification
// ==============================================================================

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024; // 500 MB

const NO_MAGIC: &[u8] = &[];
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b, 0x08];
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file path")]
    InvalidPath,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid filename after sanitization")]
    InvalidFilename,

    #[error("Invalid file type: {0}")]
    UnsupportedType(String),

    #[error("Magic number mismatch for .{0} file")]
    MagicMismatch(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),
}

/// What a validated file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    GenotypeCalls,
    KnowledgeBaseJson,
    KnowledgeBaseSqlite,
}

#[derive(Debug)]
pub struct ValidatedFile {
    pub original_name: String,
    pub safe_name: String,
    pub extension: String,
    pub kind: FileKind,
    pub size: u64,
    pub hash_sha256: String,
    pub validated_at: chrono::DateTime<chrono::Utc>,
}

pub struct FileValidator {
    max_file_size: u64,
    allowed_types: HashMap<&'static str, (FileKind, &'static [u8])>,
}

impl FileValidator {
    pub fn new() -> Self {
        let mut allowed_types = HashMap::new();

        // Tab-delimited genotype calls (plain text, no magic number)
        allowed_types.insert("txt", (FileKind::GenotypeCalls, NO_MAGIC));
        allowed_types.insert("tsv", (FileKind::GenotypeCalls, NO_MAGIC));

        // Gzip compressed genotype calls
        allowed_types.insert("txt.gz", (FileKind::GenotypeCalls, GZIP_MAGIC));
        allowed_types.insert("tsv.gz", (FileKind::GenotypeCalls, GZIP_MAGIC));

        // Knowledge base datasets
        allowed_types.insert("json", (FileKind::KnowledgeBaseJson, NO_MAGIC));
        allowed_types.insert("db", (FileKind::KnowledgeBaseSqlite, SQLITE_MAGIC));

        Self {
            max_file_size: MAX_FILE_SIZE,
            allowed_types,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub async fn validate(&self, file_path: &Path) -> Result<ValidatedFile, ValidationError> {
        let file_name = file_path
            .file_name()
            .ok_or(ValidationError::InvalidPath)?
            .to_string_lossy()
            .to_string();

        info!("Validating file: {}", file_name);

        // 1. Size check
        let metadata = tokio::fs::metadata(file_path).await?;
        let size = metadata.len();
        if size > self.max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Filename sanitization
        let safe_name = sanitize_filename(&file_name)?;
        debug!("Sanitized filename: {}", safe_name);

        // 3. Extension check (allowlist)
        let ext = get_extension(&safe_name)?;
        let (kind, expected_magic) = self
            .allowed_types
            .get(ext.as_str())
            .copied()
            .ok_or_else(|| ValidationError::UnsupportedType(ext.clone()))?;
        debug!("Extension check passed: {}", ext);

        // 4. Magic number verification
        if !expected_magic.is_empty() {
            let actual_magic = read_magic_number(file_path, expected_magic.len()).await?;
            if actual_magic != expected_magic {
                return Err(ValidationError::MagicMismatch(ext));
            }
            debug!("Magic number check passed");
        }

        // 5. Content validation (basic format check)
        if kind == FileKind::GenotypeCalls {
            let file = std::fs::File::open(file_path)?;
            if ext.ends_with(".gz") {
                validate_genotype_calls(BufReader::new(GzDecoder::new(file)))?;
            } else {
                validate_genotype_calls(BufReader::new(file))?;
            }
            debug!("Content validation passed");
        }

        // 6. Compute SHA-256 hash
        let hash = compute_sha256(file_path).await?;
        debug!("SHA-256: {}", hash);

        Ok(ValidatedFile {
            original_name: file_name,
            safe_name,
            extension: ext,
            kind,
            size,
            hash_sha256: hash,
            validated_at: chrono::Utc::now(),
        })
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize_filename(name: &str) -> Result<String, ValidationError> {
    // Remove path separators, null bytes, control characters
    let safe = name
        .replace(['/', '\\', '\0'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '-')
        .take(255)
        .collect::<String>();

    if safe.is_empty() {
        return Err(ValidationError::InvalidFilename);
    }

    Ok(safe)
}

fn get_extension(filename: &str) -> Result<String, ValidationError> {
    let lower = filename.to_lowercase();

    // Compound extensions first
    for compound in ["txt.gz", "tsv.gz"] {
        if lower.ends_with(&format!(".{}", compound)) {
            return Ok(compound.to_string());
        }
    }

    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Ok(ext.to_string()),
        _ => Err(ValidationError::UnsupportedType(String::from("(none)"))),
    }
}

async fn read_magic_number(path: &Path, len: usize) -> Result<Vec<u8>, ValidationError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buffer = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

/// The first data line must have 4 or 6 tab-delimited columns
fn validate_genotype_calls<R: Read>(reader: BufReader<R>) -> Result<(), ValidationError> {
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let columns = trimmed.split('\t').count();
        return match columns {
            4 | 6 => Ok(()),
            n => Err(ValidationError::InvalidContent(format!(
                "expected 4 or 6 tab-delimited columns, found {}",
                n
            ))),
        };
    }

    Err(ValidationError::InvalidContent("no data lines".to_string()))
}

async fn compute_sha256(path: &Path) -> Result<String, ValidationError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
