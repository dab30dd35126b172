//! Clause-aware document chunker for federal contracts.
//!
//! Unlike generic text splitters, this chunker understands the structure of
//! canonical contract documents and splits along meaningful boundaries:
//!
//! | Section                  | Strategy                         |
//! |--------------------------|----------------------------------|
//! | FAR / DFARS clauses      | one chunk per clause             |
//! | CLINs                    | one chunk per line item          |
//! | Subcontractor blocks     | one chunk per subcontractor      |
//! | Everything else          | one chunk per section            |
//!
//! Contract-level metadata (officer, agency, type, monetary fields) is
//! propagated onto every chunk, and a compact context header is prepended to
//! every chunk's text so embedding-based retrieval can answer contract-level
//! questions from any chunk.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use crate::models::{ChunkType, ContractChunk, Metadata, Section};
use crate::render::compact_dollars;

/// Section markers in canonical document order. Matching is first-hit per
/// line; a line matching none of these belongs to the current section.
const SECTION_MARKERS: &[(&str, Section)] = &[
    ("--- CONTRACTOR INFORMATION ---", Section::ContractorInfo),
    ("--- TOTAL CONTRACT VALUE ---", Section::Value),
    ("--- PERIOD OF PERFORMANCE ---", Section::PeriodOfPerformance),
    ("--- STATEMENT OF WORK ---", Section::ScopeOfWork),
    ("--- CONTRACT LINE ITEMS (CLINs) ---", Section::Clins),
    ("--- APPLICABLE FAR CLAUSES ---", Section::FarClauses),
    ("--- APPLICABLE DFARS CLAUSES ---", Section::DfarsClauses),
    (
        "--- SUBCONTRACTOR REQUIREMENTS ---",
        Section::SubcontractorRequirements,
    ),
    ("--- SECURITY REQUIREMENTS ---", Section::SecurityRequirements),
    (
        "--- SPECIAL CONTRACT PROVISIONS ---",
        Section::SpecialProvisions,
    ),
];

const END_MARKER: &str = "--- END OF CONTRACT ---";

static CONTRACT_NUMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^CONTRACT NUMBER:\s*(.+?)\s*$").unwrap());
static OFFICER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^CONTRACTING OFFICER:\s*(.+?)\s*$").unwrap());
static AGENCY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^CONTRACTING AGENCY:\s*(.+?)\s*$").unwrap());
static TYPE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^CONTRACT TYPE:\s*(.+?)\s*$").unwrap());
static FUNDED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Funded Amount:\s*(.+?)\s*$").unwrap());
static BASE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Base Period Value:\s*(.+?)\s*$").unwrap());
static CEILING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Contract Ceiling:\s*(.+?)\s*$").unwrap());
static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d,]+(?:\.\d+)?").unwrap());

// Individual clause lines inside a FAR/DFARS section.
static CLAUSE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s+((?:FAR|DFARS)\s+[\d.]+-\d+)\s+-\s+(.+?)\s*$").unwrap()
});
static CLIN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s+CLIN\s+(\d+):").unwrap());
static SUBCONTRACTOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s+Subcontractor:\s+(.+?)\s*$").unwrap());

/// Chunk a canonical contract document.
///
/// Extracts the contract number and contract-level metadata, splits the text
/// into named sections, applies the per-section strategies, then propagates
/// metadata to every chunk and prepends the context header. Prefixing is
/// idempotent: a chunk whose text already carries a context header is left
/// alone.
pub fn chunk_contract(text: &str) -> Vec<ContractChunk> {
    let contract_number = extract_contract_number(text);
    let contract_metadata = extract_contract_metadata(text);
    let context_prefix = build_context_prefix(&contract_number, &contract_metadata);

    let mut chunks = Vec::new();
    for (section, section_text) in split_into_sections(text) {
        if section_text.trim().is_empty() {
            continue;
        }

        match section {
            Section::FarClauses | Section::DfarsClauses => {
                chunks.extend(chunk_clause_section(&section_text, &contract_number, section));
            }
            Section::Clins => {
                chunks.extend(chunk_clins_section(&section_text, &contract_number));
            }
            Section::SubcontractorRequirements => {
                chunks.extend(chunk_subcontractor_section(&section_text, &contract_number));
            }
            _ => {
                let chunk_type = match section {
                    Section::ScopeOfWork => ChunkType::ScopeOfWork,
                    Section::SecurityRequirements => ChunkType::SecurityRequirements,
                    _ => ChunkType::General,
                };
                chunks.push(ContractChunk {
                    text: section_text.trim().to_string(),
                    contract_number: contract_number.clone(),
                    section,
                    chunk_type,
                    clause_number: None,
                    clause_title: None,
                    metadata: Metadata::new(),
                });
            }
        }
    }

    for chunk in &mut chunks {
        chunk
            .metadata
            .extend(contract_metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        if !chunk.text.starts_with("[Contract:") {
            chunk.text = format!("{context_prefix}{}", chunk.text);
        }
    }

    chunks
}

/// Pull the contract number off the header line, `UNKNOWN` when absent.
pub fn extract_contract_number(text: &str) -> String {
    CONTRACT_NUMBER_LINE
        .captures(text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Extract contract-level metadata propagated to every chunk.
///
/// Monetary fields are stored as JSON numbers so the index can range-filter
/// them; `value_label` is a human-scale string (e.g. `"$18.2M funded"`)
/// derived from whichever monetary field is present, preferring funded over
/// base over ceiling.
pub fn extract_contract_metadata(text: &str) -> Metadata {
    let mut metadata = Metadata::new();

    for (key, pattern) in [
        ("contracting_officer", &*OFFICER_LINE),
        ("contracting_agency", &*AGENCY_LINE),
        ("contract_type", &*TYPE_LINE),
    ] {
        if let Some(caps) = pattern.captures(text) {
            metadata.insert(key.to_string(), json!(caps[1].trim()));
        }
    }

    for (key, pattern) in [
        ("funded_amount", &*FUNDED_LINE),
        ("base_value", &*BASE_LINE),
        ("ceiling_value", &*CEILING_LINE),
    ] {
        if let Some(caps) = pattern.captures(text) {
            if let Some(amount) = parse_dollar_amount(&caps[1]) {
                metadata.insert(key.to_string(), json!(amount));
            }
        }
    }

    let label = ["funded_amount", "base_value", "ceiling_value"]
        .iter()
        .zip(["funded", "base value", "ceiling"])
        .find_map(|(key, qualifier)| {
            metadata
                .get(*key)
                .and_then(|v| v.as_f64())
                .map(|amount| format!("{} {qualifier}", compact_dollars(amount)))
        });
    if let Some(label) = label {
        metadata.insert("value_label".to_string(), json!(label));
    }

    metadata
}

fn parse_dollar_amount(raw: &str) -> Option<f64> {
    let matched = DOLLAR_AMOUNT.find(raw)?;
    matched
        .as_str()
        .replace(['$', ','], "")
        .parse::<f64>()
        .ok()
}

/// Build the context line prepended to each chunk. Keeps contract-level
/// context (officer, agency, type, value scale) inside every chunk's
/// embedding.
pub fn build_context_prefix(contract_number: &str, metadata: &Metadata) -> String {
    let mut parts = vec![format!("Contract: {contract_number}")];

    for (key, label) in [
        ("contracting_officer", "Officer"),
        ("contracting_agency", "Agency"),
        ("contract_type", "Type"),
        ("value_label", "Value"),
    ] {
        if let Some(value) = metadata.get(key).and_then(|v| v.as_str()) {
            parts.push(format!("{label}: {value}"));
        }
    }

    format!("[{}]\n", parts.join(" | "))
}

/// Split a document into named sections. Everything before the first marker
/// is the header; anything after the end marker is ignored.
pub fn split_into_sections(text: &str) -> Vec<(Section, String)> {
    let mut sections = Vec::new();
    let mut current_section = Section::Header;
    let mut current_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim() == END_MARKER {
            break;
        }

        let marker = SECTION_MARKERS
            .iter()
            .find(|(marker, _)| line.contains(marker));
        match marker {
            Some((_, section)) => {
                if !current_lines.is_empty() {
                    sections.push((current_section, current_lines.join("\n")));
                }
                current_section = *section;
                current_lines = vec![line];
            }
            None => current_lines.push(line),
        }
    }

    if !current_lines.is_empty() {
        sections.push((current_section, current_lines.join("\n")));
    }

    sections
}

/// One chunk per clause line; the chunk body runs to the next clause line or
/// the end of the section. A clause section with no recognizable clause lines
/// becomes a single whole-section chunk.
fn chunk_clause_section(
    section_text: &str,
    contract_number: &str,
    section: Section,
) -> Vec<ContractChunk> {
    let clause_type = match section {
        Section::DfarsClauses => "DFARS",
        _ => "FAR",
    };

    let matches: Vec<_> = CLAUSE_LINE.captures_iter(section_text).collect();
    if matches.is_empty() {
        if section_text.trim().is_empty() {
            return Vec::new();
        }
        return vec![ContractChunk {
            text: section_text.trim().to_string(),
            contract_number: contract_number.to_string(),
            section,
            chunk_type: ChunkType::Clause,
            clause_number: None,
            clause_title: None,
            metadata: Metadata::new(),
        }];
    }

    let starts: Vec<usize> = matches
        .iter()
        .map(|caps| caps.get(0).unwrap().start())
        .collect();

    matches
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let end = starts.get(i + 1).copied().unwrap_or(section_text.len());
            let clause_text = section_text[starts[i]..end].trim().to_string();
            let number = caps[1]
                .trim()
                .trim_start_matches("FAR ")
                .trim_start_matches("DFARS ")
                .to_string();

            let mut metadata = Metadata::new();
            metadata.insert("clause_type".to_string(), json!(clause_type));
            metadata.insert(
                "flowdown".to_string(),
                json!(clause_text.contains("[MANDATORY FLOWDOWN]")),
            );

            ContractChunk {
                text: clause_text,
                contract_number: contract_number.to_string(),
                section,
                chunk_type: ChunkType::Clause,
                clause_number: Some(number),
                clause_title: Some(caps[2].trim().to_string()),
                metadata,
            }
        })
        .collect()
}

/// One chunk per CLIN entry, whole-section fallback when none parse.
fn chunk_clins_section(section_text: &str, contract_number: &str) -> Vec<ContractChunk> {
    let matches: Vec<_> = CLIN_LINE.captures_iter(section_text).collect();
    if matches.is_empty() {
        if section_text.trim().is_empty() {
            return Vec::new();
        }
        return vec![ContractChunk {
            text: section_text.trim().to_string(),
            contract_number: contract_number.to_string(),
            section: Section::Clins,
            chunk_type: ChunkType::Clin,
            clause_number: None,
            clause_title: None,
            metadata: Metadata::new(),
        }];
    }

    let starts: Vec<usize> = matches
        .iter()
        .map(|caps| caps.get(0).unwrap().start())
        .collect();

    matches
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let end = starts.get(i + 1).copied().unwrap_or(section_text.len());
            let mut metadata = Metadata::new();
            metadata.insert("clin_number".to_string(), json!(&caps[1]));
            ContractChunk {
                text: section_text[starts[i]..end].trim().to_string(),
                contract_number: contract_number.to_string(),
                section: Section::Clins,
                chunk_type: ChunkType::Clin,
                clause_number: None,
                clause_title: None,
                metadata,
            }
        })
        .collect()
}

/// One chunk per subcontractor block, whole-section fallback when none parse.
fn chunk_subcontractor_section(section_text: &str, contract_number: &str) -> Vec<ContractChunk> {
    let matches: Vec<_> = SUBCONTRACTOR_LINE.captures_iter(section_text).collect();
    if matches.is_empty() {
        if section_text.trim().is_empty() {
            return Vec::new();
        }
        return vec![ContractChunk {
            text: section_text.trim().to_string(),
            contract_number: contract_number.to_string(),
            section: Section::SubcontractorRequirements,
            chunk_type: ChunkType::Subcontractor,
            clause_number: None,
            clause_title: None,
            metadata: Metadata::new(),
        }];
    }

    let starts: Vec<usize> = matches
        .iter()
        .map(|caps| caps.get(0).unwrap().start())
        .collect();

    matches
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let end = starts.get(i + 1).copied().unwrap_or(section_text.len());
            let name = caps[1].split('(').next().unwrap_or(&caps[1]).trim();
            let mut metadata = Metadata::new();
            metadata.insert("subcontractor_name".to_string(), json!(name));
            ContractChunk {
                text: section_text[starts[i]..end].trim().to_string(),
                contract_number: contract_number.to_string(),
                section: Section::SubcontractorRequirements,
                chunk_type: ChunkType::Subcontractor,
                clause_number: None,
                clause_title: None,
                metadata,
            }
        })
        .collect()
}
