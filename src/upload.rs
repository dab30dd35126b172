//! Upload validation and ingestion orchestration.
//!
//! Two upload paths share one pipeline tail:
//! - `.txt` files are expected to already be in canonical contract layout;
//!   they are validated for structural markers and chunked directly.
//! - `.docx` files go through hybrid extraction first; the rendered canonical
//!   text is what gets chunked.
//!
//! Either way the chunks become index entries and land in the caller's
//! [`VectorIndex`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::chunker::chunk_contract;
use crate::config::Config;
use crate::docx;
use crate::index::{chunks_to_entries, VectorIndex};
use crate::merge::extract_contract_from_docx;
use crate::models::ExtractionReport;
use crate::narrative::NarrativeStrategy;

/// Structural marker every canonical text contract must carry.
const REQUIRED_MARKER: &str = "CONTRACT NUMBER:";

/// At least one of these section headers must be present.
const SECTION_MARKERS: &[&str] = &[
    "--- APPLICABLE FAR CLAUSES ---",
    "--- APPLICABLE DFARS CLAUSES ---",
    "--- STATEMENT OF WORK ---",
    "--- CONTRACT LINE ITEMS",
    "--- CONTRACTOR INFORMATION ---",
    "--- SUBCONTRACTOR REQUIREMENTS ---",
    "--- SECURITY REQUIREMENTS ---",
    "--- SPECIAL CONTRACT PROVISIONS ---",
];

/// Outcome of upload validation: valid, or a reason the uploader can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadValidation {
    Valid,
    Invalid(String),
}

impl UploadValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, UploadValidation::Valid)
    }
}

/// Validate the text form of an upload against the canonical layout.
pub fn validate_text_upload(content: &str) -> UploadValidation {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return UploadValidation::Invalid("File is empty.".to_string());
    }
    if trimmed.len() < 100 {
        return UploadValidation::Invalid(
            "File is too short to be a valid contract document.".to_string(),
        );
    }
    if !content.contains(REQUIRED_MARKER) {
        return UploadValidation::Invalid(
            "Missing required field: 'CONTRACT NUMBER'. Uploaded documents should \
             follow the standard contract format with a CONTRACT NUMBER field."
                .to_string(),
        );
    }
    if !SECTION_MARKERS.iter().any(|m| content.contains(m)) {
        return UploadValidation::Invalid(
            "No recognized contract sections found. Expected at least one section \
             such as FAR CLAUSES, STATEMENT OF WORK, or CONTRACT LINE ITEMS."
                .to_string(),
        );
    }
    UploadValidation::Valid
}

/// Validate a .docx upload by attempting the structural parse.
pub fn validate_docx_upload(bytes: &[u8], min_chars: usize) -> UploadValidation {
    match docx::validate_docx(bytes, min_chars) {
        Ok(_) => UploadValidation::Valid,
        Err(err) => UploadValidation::Invalid(err.to_string()),
    }
}

/// Persist an uploaded file, appending a timestamp to the name rather than
/// overwriting an existing file.
pub fn save_uploaded_file(content: &[u8], filename: &str, directory: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

    let mut path = directory.join(filename);
    if path.exists() {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("txt")
            .to_string();
        path = directory.join(format!("{stem}_{timestamp}.{ext}"));
    }

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write upload: {}", path.display()))?;
    Ok(path)
}

/// Summary of one processed upload.
#[derive(Debug, Clone, Default)]
pub struct UploadStats {
    pub saved_path: PathBuf,
    pub contract_number: String,
    pub num_chunks: usize,
    pub num_entries_added: usize,
    /// Chunk count by chunk type name.
    pub chunk_types: BTreeMap<String, usize>,
    /// Present for the .docx path only.
    pub report: Option<ExtractionReport>,
}

/// Ingest a canonical-layout text upload: save, chunk, index.
pub async fn process_text_upload(
    content: &str,
    filename: &str,
    config: &Config,
    index: &dyn VectorIndex,
) -> Result<UploadStats> {
    if let UploadValidation::Invalid(reason) = validate_text_upload(content) {
        anyhow::bail!("Invalid upload: {}", reason);
    }

    let saved_path = save_uploaded_file(content.as_bytes(), filename, &config.documents.root)?;
    let chunks = chunk_contract(content);
    if chunks.is_empty() {
        anyhow::bail!("No chunks could be extracted from the document");
    }

    let contract_number = chunks[0].contract_number.clone();
    let chunk_types = count_chunk_types(&chunks);
    let entries = chunks_to_entries(&chunks);
    let num_chunks = entries.len();
    let num_entries_added = index.add_documents(entries).await?;

    Ok(UploadStats {
        saved_path,
        contract_number,
        num_chunks,
        num_entries_added,
        chunk_types,
        report: None,
    })
}

/// Ingest a .docx upload: save the original, run hybrid extraction, persist
/// the rendered canonical text next to it, chunk, index.
pub async fn process_docx_upload(
    bytes: &[u8],
    filename: &str,
    config: &Config,
    strategy: &dyn NarrativeStrategy,
    index: &dyn VectorIndex,
) -> Result<UploadStats> {
    let upload_dir = config.documents.root.join("uploads");
    let saved_path = save_uploaded_file(bytes, filename, &upload_dir)?;

    let outcome = extract_contract_from_docx(bytes, filename, config, strategy).await;
    if !outcome.is_valid {
        anyhow::bail!(
            "Extraction failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    // The rendered text is the persistent form; re-ingest later treats it
    // like any other canonical document.
    let text_name = format!("{}.txt", outcome.record.contract_number);
    save_uploaded_file(
        outcome.document_text.as_bytes(),
        &text_name,
        &config.documents.root,
    )?;

    let chunks = chunk_contract(&outcome.document_text);
    if chunks.is_empty() {
        anyhow::bail!("No chunks could be extracted from the generated text");
    }

    let chunk_types = count_chunk_types(&chunks);
    let entries = chunks_to_entries(&chunks);
    let num_chunks = entries.len();
    let num_entries_added = index.add_documents(entries).await?;

    Ok(UploadStats {
        saved_path,
        contract_number: outcome.record.contract_number,
        num_chunks,
        num_entries_added,
        chunk_types,
        report: Some(outcome.report),
    })
}

fn count_chunk_types(chunks: &[crate::models::ContractChunk]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for chunk in chunks {
        *counts.entry(chunk.chunk_type.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}
