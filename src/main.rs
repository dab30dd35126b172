//! # Contract Harness CLI (`conq`)
//!
//! The `conq` binary drives the contract ingestion pipeline from the command
//! line: validating uploads, running hybrid extraction, inspecting chunker
//! output, and ingesting documents into the in-memory retrieval index.
//!
//! ## Usage
//!
//! ```bash
//! conq --config ./config/conq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `conq validate <file>` | Check that a .txt or .docx upload is processable |
//! | `conq extract <file>` | Run hybrid extraction on a .docx, print record + report |
//! | `conq chunk <file>` | Chunk a document and print the chunk listing |
//! | `conq ingest <file>` | Run the full pipeline on one file into the index |
//! | `conq sync` | Ingest every document under the corpus root |

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use contract_harness::chunker::chunk_contract;
use contract_harness::config::{self, Config};
use contract_harness::index::{MemoryIndex, VectorIndex};
use contract_harness::loader::{scan_documents, DocumentKind};
use contract_harness::merge::extract_contract_from_docx;
use contract_harness::models::ExtractionReport;
use contract_harness::narrative::create_strategy;
use contract_harness::upload::{
    process_docx_upload, process_text_upload, validate_docx_upload, validate_text_upload,
    UploadValidation,
};

/// Contract Harness CLI — clause-aware ingestion and extraction for federal
/// contract documents.
#[derive(Parser)]
#[command(
    name = "conq",
    about = "Contract Harness — clause-aware ingestion and extraction for federal contract documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults are used when the file
    /// does not exist.
    #[arg(long, global = true, default_value = "./config/conq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that an upload is processable.
    ///
    /// Text files are validated against the canonical contract layout;
    /// .docx files are validated by attempting the structural parse.
    Validate {
        /// Path to a .txt or .docx file.
        file: PathBuf,
    },

    /// Run hybrid extraction on a Word document.
    ///
    /// Prints the structured contract record as JSON followed by the
    /// extraction report (field origins, confidence, warnings).
    Extract {
        /// Path to a .docx file.
        file: PathBuf,
    },

    /// Chunk a document and print the chunk listing.
    ///
    /// Text files are chunked directly; .docx files are extracted first and
    /// the rendered canonical text is chunked.
    Chunk {
        /// Path to a .txt or .docx file.
        file: PathBuf,
    },

    /// Run the full pipeline on one file into the in-memory index.
    Ingest {
        /// Path to a .txt or .docx file.
        file: PathBuf,
    },

    /// Ingest every document under the configured corpus root.
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;

    match cli.command {
        Commands::Validate { file } => {
            let verdict = match extension(&file).as_str() {
                "docx" => {
                    let bytes = read_bytes(&file)?;
                    validate_docx_upload(&bytes, cfg.extraction.min_document_chars)
                }
                _ => {
                    let content = read_text(&file)?;
                    validate_text_upload(&content)
                }
            };
            match verdict {
                UploadValidation::Valid => println!("{}: valid", file.display()),
                UploadValidation::Invalid(reason) => {
                    println!("{}: INVALID — {}", file.display(), reason);
                    std::process::exit(1);
                }
            }
        }

        Commands::Extract { file } => {
            if extension(&file) != "docx" {
                bail!("extract expects a .docx file; text documents are already canonical");
            }
            let bytes = read_bytes(&file)?;
            let strategy = create_strategy(&cfg.narrative)?;
            let filename = file_name(&file);
            let outcome =
                extract_contract_from_docx(&bytes, &filename, &cfg, strategy.as_ref()).await;
            if !outcome.is_valid {
                bail!(
                    "Extraction failed: {}",
                    outcome.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            println!("{}", serde_json::to_string_pretty(&outcome.record)?);
            print_report(&outcome.report);
        }

        Commands::Chunk { file } => {
            let text = canonical_text(&file, &cfg).await?;
            let chunks = chunk_contract(&text);
            println!("{} chunks from {}", chunks.len(), file.display());
            let mut by_type = std::collections::BTreeMap::new();
            for chunk in &chunks {
                *by_type.entry(chunk.chunk_type.as_str()).or_insert(0usize) += 1;
            }
            for (chunk_type, count) in &by_type {
                println!("  {chunk_type}: {count}");
            }
            println!();
            for (i, chunk) in chunks.iter().enumerate() {
                let first_line = chunk.text.lines().nth(1).unwrap_or("").trim();
                println!(
                    "[{i:>3}] {:<12} {:<26} {}",
                    chunk.chunk_type.as_str(),
                    chunk.section.as_str(),
                    first_line
                );
            }
        }

        Commands::Ingest { file } => {
            let index = MemoryIndex::new();
            let stats = ingest_file(&file, &cfg, &index).await?;
            print_stats(&file, &stats);
        }

        Commands::Sync => {
            let index = MemoryIndex::new();
            let documents = scan_documents(&cfg.documents)?;
            if documents.is_empty() {
                println!(
                    "No documents found under {}",
                    cfg.documents.root.display()
                );
                return Ok(());
            }

            let strategy = create_strategy(&cfg.narrative)?;
            let mut total_chunks = 0;
            let mut failures = 0;
            for doc in &documents {
                let result = match &doc.kind {
                    DocumentKind::Text(content) => {
                        process_text_upload(content, &doc.relative_path, &cfg, &index).await
                    }
                    DocumentKind::Docx(bytes) => {
                        process_docx_upload(
                            bytes,
                            &doc.relative_path,
                            &cfg,
                            strategy.as_ref(),
                            &index,
                        )
                        .await
                    }
                };
                match result {
                    Ok(stats) => {
                        println!(
                            "  {} -> {} ({} chunks)",
                            doc.relative_path, stats.contract_number, stats.num_chunks
                        );
                        total_chunks += stats.num_chunks;
                    }
                    Err(err) => {
                        println!("  {} -> FAILED: {err:#}", doc.relative_path);
                        failures += 1;
                    }
                }
            }
            println!(
                "\nSynced {} documents, {} chunks indexed, {} failures.",
                documents.len() - failures,
                total_chunks,
                failures
            );
            println!("Index holds {} entries.", index.len().await?);
        }
    }

    Ok(())
}

/// Load config from the given path, falling back to defaults when the file
/// does not exist (an explicitly-passed broken file is still an error).
fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

async fn ingest_file(
    file: &Path,
    cfg: &Config,
    index: &dyn VectorIndex,
) -> Result<contract_harness::upload::UploadStats> {
    let filename = file_name(file);
    if extension(file) == "docx" {
        let bytes = read_bytes(file)?;
        let strategy = create_strategy(&cfg.narrative)?;
        process_docx_upload(&bytes, &filename, cfg, strategy.as_ref(), index).await
    } else {
        let content = read_text(file)?;
        process_text_upload(&content, &filename, cfg, index).await
    }
}

fn print_stats(file: &Path, stats: &contract_harness::upload::UploadStats) {
    println!("Ingested {}", file.display());
    println!("  contract number: {}", stats.contract_number);
    println!("  saved to:        {}", stats.saved_path.display());
    println!(
        "  chunks:          {} ({} new in index)",
        stats.num_chunks, stats.num_entries_added
    );
    for (chunk_type, count) in &stats.chunk_types {
        println!("    {chunk_type}: {count}");
    }
    if let Some(report) = &stats.report {
        print_report(report);
    }
}

fn print_report(report: &ExtractionReport) {
    println!(
        "\nExtraction report: {} fields ({} pattern, {} narrative, {} defaulted), avg confidence {:.3}",
        report.total_fields,
        report.pattern_extracted,
        report.narrative_extracted,
        report.defaulted,
        report.confidence_avg
    );
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

/// Resolve the canonical text of a file: .txt as-is, .docx through hybrid
/// extraction.
async fn canonical_text(file: &Path, cfg: &Config) -> Result<String> {
    if extension(file) == "docx" {
        let bytes = read_bytes(file)?;
        let strategy = create_strategy(&cfg.narrative)?;
        let outcome =
            extract_contract_from_docx(&bytes, &file_name(file), cfg, strategy.as_ref()).await;
        if !outcome.is_valid {
            bail!(
                "Extraction failed: {}",
                outcome.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(outcome.document_text)
    } else {
        read_text(file)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}
