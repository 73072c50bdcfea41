// ==============================================================================
// main.rs - Genomic Risk CLI Entry Point
// ==============================================================================
// Description: Analyze genotype call files and compare family members
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genomic_risk_engine::audit::AuditEventType;
use genomic_risk_engine::config::EngineConfig;
use genomic_risk_engine::models::{Demographics, Individual};
use genomic_risk_engine::parsers::{ArrayCallDefaults, GenotypeFileParser, ParsedGenotypeFile};
use genomic_risk_engine::validator::{FileKind, FileValidator};
use genomic_risk_engine::{Engine, FamilyStore, KnowledgeBase};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Knowledge base dataset (.json or SQLite .db); builtin dataset if omitted
    #[arg(long, env = "GENOMIC_RISK_KNOWLEDGE_BASE", global = true)]
    knowledge_base: Option<PathBuf>,

    /// Engine configuration JSON; defaults if omitted
    #[arg(long, env = "GENOMIC_RISK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Quality to assume for four-column array files
    #[arg(long, global = true)]
    assume_array_quality: Option<f64>,

    /// Read depth to assume for four-column array files
    #[arg(long, default_value_t = 30, global = true)]
    assume_array_coverage: u32,

    /// Only read autosomal chromosomes (1-22)
    #[arg(long, global = true)]
    autosomal_only: bool,

    /// Write the JSON report here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Risk, advice and carrier report for one genotype file
    Analyze {
        /// Genotype call file (.txt, .tsv, optionally .gz)
        file: PathBuf,

        /// Identifier used in the report
        #[arg(long, default_value = "individual")]
        id: String,
    },

    /// Compare two family members' genotype files
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genomic_risk_engine=info,genomic_risk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("Genomic risk engine starting...");

    let config = match &cli.common.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    // Knowledge base load failure is fatal
    let knowledge_base = Arc::new(load_knowledge_base(cli.common.knowledge_base.clone()).await?);
    let engine = Engine::new(knowledge_base.clone(), config).context("Failed to build engine")?;

    let mut store = FamilyStore::new();
    store.record_event(
        AuditEventType::KnowledgeBaseLoaded,
        Some(knowledge_base.database_version().to_string()),
        serde_json::json!({
            "entries": knowledge_base.len(),
            "sha256": knowledge_base.checksum(),
        }),
    );

    match &cli.command {
        Command::Analyze { file, id } => {
            let parsed = read_genotype_file(&cli.common, file).await?;
            let report = engine.analyze(id, &parsed);
            store.record_event(
                AuditEventType::AnalysisCompleted,
                Some(id.clone()),
                serde_json::json!({
                    "variants": report.variant_count,
                    "conditions": report.risks.len(),
                }),
            );
            write_json(&report, cli.common.output.as_deref())?;
        }
        Command::Compare { first, second } => {
            for (id, path) in [("member1", first), ("member2", second)] {
                let parsed = read_genotype_file(&cli.common, path).await?;
                let (variants, stats) = engine.ingest_file(&parsed);
                store.record_event(
                    AuditEventType::VariantsIngested,
                    Some(id.to_string()),
                    serde_json::to_value(&stats)?,
                );
                let demographics = Demographics {
                    display_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| id.to_string()),
                    ..Demographics::default()
                };
                store.add_member(Individual::new(id, demographics, variants))?;
            }

            let comparison = engine.compare_members(&mut store, "member1", "member2")?;
            info!(
                "Similarity {:.1} over {} shared variants",
                comparison.similarity_score,
                comparison.common_variants.len()
            );
            write_json(&comparison, cli.common.output.as_deref())?;
        }
    }

    info!("Done ({} audit events)", store.audit_events().len());
    Ok(())
}

async fn load_knowledge_base(path: Option<PathBuf>) -> Result<KnowledgeBase> {
    let Some(path) = path else {
        return KnowledgeBase::builtin().context("Failed to load builtin knowledge base");
    };

    let validated = FileValidator::new()
        .validate(&path)
        .await
        .with_context(|| format!("Rejected knowledge base {}", path.display()))?;

    let kind = validated.kind;
    tokio::task::spawn_blocking(move || match kind {
        FileKind::KnowledgeBaseSqlite => KnowledgeBase::from_sqlite(&path),
        _ => KnowledgeBase::from_json_path(&path),
    })
    .await?
    .context("Failed to load knowledge base")
}

async fn read_genotype_file(common: &CommonArgs, path: &Path) -> Result<ParsedGenotypeFile> {
    let validated = FileValidator::new()
        .validate(path)
        .await
        .with_context(|| format!("Rejected genotype file {}", path.display()))?;
    anyhow::ensure!(
        validated.kind == FileKind::GenotypeCalls,
        "{} is not a genotype call file",
        validated.safe_name
    );
    info!("Reading {} (sha256 {})", validated.safe_name, validated.hash_sha256);

    let mut parser = if common.autosomal_only {
        GenotypeFileParser::autosomal_only()
    } else {
        GenotypeFileParser::new()
    };
    if let Some(quality) = common.assume_array_quality {
        parser = parser.with_array_defaults(ArrayCallDefaults {
            quality,
            coverage: common.assume_array_coverage,
        });
    }

    let path = path.to_path_buf();
    let parsed = tokio::task::spawn_blocking(move || parser.parse(&path))
        .await?
        .context("Failed to parse genotype file")?;
    Ok(parsed)
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
