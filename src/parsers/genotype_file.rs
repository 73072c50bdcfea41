// ==============================================================================
// genotype_file.rs - Raw Genotype Call File Parser
// ==============================================================================
// Description: Reads tab-delimited genotype calls with quality and read depth
// Author: Matt Barham
// Created: 2025-11-04
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================
// Format: Tab-delimited text with '#' header comments, optionally gzipped
// Example:
//   # rsid    chromosome    position    genotype    quality    coverage
//   rs1801133    1    11856378    AG    0.97    34
//   rs429358    19    45411941    TT    0.91    28
// Four-column array exports (no quality/coverage) are accepted only when
// ArrayCallDefaults are configured.
// ==============================================================================

use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::RawGenotypeRecord;

/// Quality and depth assumed for array calls that do not report them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayCallDefaults {
    pub quality: f64,
    pub coverage: u32,
}

/// A line that could not be turned into a record
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedLine {
    pub line: u64,
    pub reason: String,
}

/// Parsed records plus everything that was skipped
#[derive(Debug, Clone, Default)]
pub struct ParsedGenotypeFile {
    pub records: Vec<RawGenotypeRecord>,
    pub malformed: Vec<MalformedLine>,
}

/// Errors that abort parsing. Individual bad lines are never fatal.
#[derive(Error, Debug)]
pub enum GenotypeFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("File is empty or contains only comments")]
    EmptyFile,
}

/// Parser for raw genotype call files
#[derive(Debug, Clone, Default)]
pub struct GenotypeFileParser {
    /// Chromosomes to include. If empty, includes all chromosomes
    pub include_chromosomes: Vec<String>,
    pub array_defaults: Option<ArrayCallDefaults>,
}

impl GenotypeFileParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser that only includes autosomal chromosomes (1-22)
    pub fn autosomal_only() -> Self {
        Self {
            include_chromosomes: (1..=22).map(|n| n.to_string()).collect(),
            array_defaults: None,
        }
    }

    pub fn with_array_defaults(mut self, defaults: ArrayCallDefaults) -> Self {
        self.array_defaults = Some(defaults);
        self
    }

    /// Parse a file; paths ending in `.gz` are decompressed
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<ParsedGenotypeFile, GenotypeFileError> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let is_gzip = path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(".gz"))
            .unwrap_or(false);

        if is_gzip {
            self.parse_reader(GzDecoder::new(BufReader::new(file)))
        } else {
            self.parse_reader(BufReader::new(file))
        }
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<ParsedGenotypeFile, GenotypeFileError> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut parsed = ParsedGenotypeFile::default();
        let mut filtered_by_chromosome = 0usize;

        for result in csv_reader.records() {
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(GenotypeFileError::Csv(e)),
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    parsed.malformed.push(MalformedLine {
                        line,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if is_header(&record) {
                continue;
            }

            match self.parse_record(&record) {
                Ok(raw) => {
                    if !self.include_chromosomes.is_empty()
                        && !self.include_chromosomes.contains(&raw.chromosome)
                    {
                        filtered_by_chromosome += 1;
                        continue;
                    }
                    parsed.records.push(raw);
                }
                Err(reason) => parsed.malformed.push(MalformedLine { line, reason }),
            }
        }

        if parsed.records.is_empty() && parsed.malformed.is_empty() && filtered_by_chromosome == 0 {
            return Err(GenotypeFileError::EmptyFile);
        }

        if !parsed.malformed.is_empty() {
            warn!("Skipped {} malformed genotype lines", parsed.malformed.len());
        }
        debug!(
            "Parsed {} genotype records ({} filtered by chromosome)",
            parsed.records.len(),
            filtered_by_chromosome
        );

        Ok(parsed)
    }

    /// Turn one row into a record, or explain why it cannot be
    fn parse_record(&self, record: &StringRecord) -> Result<RawGenotypeRecord, String> {
        let (quality, coverage) = match (record.len(), self.array_defaults) {
            (6, _) => (parse_quality(&record[4])?, parse_coverage(&record[5])?),
            (4, Some(defaults)) => (defaults.quality, defaults.coverage),
            (4, None) => {
                return Err("missing quality/coverage columns (array file without defaults)".to_string())
            }
            (n, _) => return Err(format!("expected 6 tab-delimited fields, found {}", n)),
        };

        let rsid = record[0].to_string();
        if rsid.is_empty() {
            return Err("empty rsid".to_string());
        }

        let position = record[2]
            .parse::<u64>()
            .map_err(|_| format!("invalid position '{}'", &record[2]))?;

        Ok(RawGenotypeRecord {
            rsid,
            chromosome: record[1].to_string(),
            position,
            genotype: record[3].to_string(),
            quality,
            coverage,
        })
    }
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|field| field.eq_ignore_ascii_case("rsid"))
        .unwrap_or(false)
}

fn parse_quality(raw: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(q) if q.is_finite() => Ok(q),
        _ => Err(format!("invalid quality '{}'", raw)),
    }
}

fn parse_coverage(raw: &str) -> Result<u32, String> {
    raw.parse::<u32>()
        .map_err(|_| format!("invalid coverage '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn create_test_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_valid_file() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype\tquality\tcoverage
rs1801133\t1\t11856378\tAG\t0.97\t34
rs429358\t19\t45411941\tTT\t0.91\t28
rs334\t11\t5248232\t--\t0.99\t40
";
        let file = create_test_file(contents);
        let parsed = GenotypeFileParser::new().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 3);
        assert!(parsed.malformed.is_empty());

        assert_eq!(parsed.records[0].rsid, "rs1801133");
        assert_eq!(parsed.records[0].chromosome, "1");
        assert_eq!(parsed.records[0].position, 11856378);
        assert_eq!(parsed.records[0].genotype, "AG");
        assert_eq!(parsed.records[0].quality, 0.97);
        assert_eq!(parsed.records[0].coverage, 34);

        // No-calls are passed through for ingestion to count
        assert_eq!(parsed.records[2].genotype, "--");
    }

    #[test]
    fn test_malformed_lines_are_skipped_and_counted() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype\tquality\tcoverage
rs1\t1\t100\tAA\t0.9\t20
rs2\t1\tNOT_A_NUMBER\tAG\t0.9\t20
rs3\t1\t300\tGG\tbad\t20
rs4\t1\t400\tCC
rs5\t1\t500\tTT\t0.9\t-3
rs6\t1\t600\tAG\t0.95\t25
";
        let file = create_test_file(contents);
        let parsed = GenotypeFileParser::new().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].rsid, "rs1");
        assert_eq!(parsed.records[1].rsid, "rs6");

        assert_eq!(parsed.malformed.len(), 4);
        assert!(parsed.malformed.windows(2).all(|w| w[0].line < w[1].line));
        assert!(parsed.malformed[0].reason.contains("position"));
        assert!(parsed.malformed[1].reason.contains("quality"));
        assert!(parsed.malformed[3].reason.contains("coverage"));
    }

    #[test]
    fn test_array_file_with_defaults() {
        let contents = "\
# This data file generated by 23andMe
# rsid\tchromosome\tposition\tgenotype
rs548049170\t1\t69869\tTT
rs9283150\t1\t565508\tAA
";
        let file = create_test_file(contents);

        let strict = GenotypeFileParser::new().parse(file.path()).unwrap();
        assert!(strict.records.is_empty());
        assert_eq!(strict.malformed.len(), 2);

        let parser = GenotypeFileParser::new().with_array_defaults(ArrayCallDefaults {
            quality: 0.99,
            coverage: 30,
        });
        let parsed = parser.parse(file.path()).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].quality, 0.99);
        assert_eq!(parsed.records[0].coverage, 30);
    }

    #[test]
    fn test_autosomal_only() {
        let contents = "\
rs1\t1\t100\tAA\t0.9\t20
rs2\tX\t200\tAG\t0.9\t20
rs3\t22\t300\tCC\t0.9\t20
rs4\tMT\t400\tAA\t0.9\t20
";
        let file = create_test_file(contents);
        let parsed = GenotypeFileParser::autosomal_only().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].chromosome, "1");
        assert_eq!(parsed.records[1].chromosome, "22");
    }

    #[test]
    fn test_header_row_and_whitespace() {
        let contents = "\
rsid\tchromosome\tposition\tgenotype\tquality\tcoverage
  rs1801133  \t  1  \t  11856378  \t  GA  \t 0.95 \t 30
";
        let file = create_test_file(contents);
        let parsed = GenotypeFileParser::new().parse(file.path()).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.malformed.is_empty());
        assert_eq!(parsed.records[0].rsid, "rs1801133");
        assert_eq!(parsed.records[0].genotype, "GA");
    }

    #[test]
    fn test_empty_file() {
        let file = create_test_file("# rsid\tchromosome\tposition\tgenotype\n# nothing here\n");
        let result = GenotypeFileParser::new().parse(file.path());
        assert!(matches!(result, Err(GenotypeFileError::EmptyFile)));
    }

    #[test]
    fn test_gzip_input() {
        let mut file = Builder::new().suffix(".txt.gz").tempfile().unwrap();
        {
            let mut encoder = GzEncoder::new(&mut file, Compression::default());
            encoder
                .write_all(b"rs1801133\t1\t11856378\tGG\t0.95\t30\n")
                .unwrap();
            encoder.finish().unwrap();
        }
        file.flush().unwrap();

        let parsed = GenotypeFileParser::new().parse(file.path()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].genotype, "GG");
    }
}
