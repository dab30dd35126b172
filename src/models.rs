//! Core data models used throughout Contract Harness.
//!
//! These types represent the contract records, extraction results, and chunks
//! that flow through the ingestion and retrieval pipeline. Every stage's input
//! and output is one of these concrete types — no untyped maps between stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form chunk metadata. Values use `serde_json::Value` so numeric fields
/// stay numeric for downstream range filtering. `BTreeMap` keeps serialization
/// deterministic.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Contract pricing arrangement codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "FFP")]
    Ffp,
    #[serde(rename = "CPFF")]
    Cpff,
    #[serde(rename = "CPAF")]
    Cpaf,
    #[serde(rename = "T&M")]
    TimeAndMaterials,
    #[serde(rename = "LH")]
    LaborHour,
    #[serde(rename = "IDIQ")]
    Idiq,
    #[serde(rename = "BPA")]
    Bpa,
    #[serde(untagged)]
    Other(String),
}

impl ContractType {
    /// Short code as it appears in contract text (e.g. `"FFP"`).
    pub fn code(&self) -> &str {
        match self {
            ContractType::Ffp => "FFP",
            ContractType::Cpff => "CPFF",
            ContractType::Cpaf => "CPAF",
            ContractType::TimeAndMaterials => "T&M",
            ContractType::LaborHour => "LH",
            ContractType::Idiq => "IDIQ",
            ContractType::Bpa => "BPA",
            ContractType::Other(code) => code,
        }
    }

    /// Full spelled-out name (e.g. `"Firm-Fixed-Price"`).
    pub fn full_name(&self) -> &str {
        match self {
            ContractType::Ffp => "Firm-Fixed-Price",
            ContractType::Cpff => "Cost-Plus-Fixed-Fee",
            ContractType::Cpaf => "Cost-Plus-Award-Fee",
            ContractType::TimeAndMaterials => "Time-and-Materials",
            ContractType::LaborHour => "Labor-Hour",
            ContractType::Idiq => "Indefinite Delivery/Indefinite Quantity",
            ContractType::Bpa => "Blanket Purchase Agreement",
            ContractType::Other(code) => code,
        }
    }
}

/// Issuing agency: stable code plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub code: String,
    pub name: String,
}

/// Prime contractor identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contractor {
    pub name: String,
    /// CAGE code (5 alphanumeric characters) or empty if unknown.
    pub cage: String,
    /// Business size class: "small", "large", "8a", ... or "unknown".
    pub size: String,
    /// SAM UEI / DUNS identifier or empty if unknown.
    pub uei: String,
}

/// One option period inside a period of performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPeriod {
    pub option_number: u32,
    /// ISO date (`YYYY-MM-DD`).
    pub start_date: String,
    pub end_date: String,
    pub months: u32,
}

/// Base period dates plus ordered option periods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodOfPerformance {
    pub base_period_start: String,
    pub base_period_end: String,
    pub base_period_months: u32,
    pub option_periods: Vec<OptionPeriod>,
}

/// A FAR or DFARS clause reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Clause number, e.g. `52.204-21` (FAR) or `252.204-7012` (DFARS).
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Set when the clause must flow down to subcontractors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flowdown: Option<bool>,
}

/// The two parallel regulatory regimes referenced by a contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clauses {
    pub far: Vec<Clause>,
    pub dfars: Vec<Clause>,
}

/// A contract line item (CLIN): a priced, quantified unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clin {
    /// Four-digit CLIN number, e.g. `0001`.
    pub clin_number: String,
    pub description: String,
    pub clin_type: String,
    pub quantity: u32,
    pub unit: String,
    pub unit_price: f64,
    pub total_price: f64,
    /// Columns from a source table that did not map to a known field,
    /// carried through untyped.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Default for Clin {
    fn default() -> Self {
        Self {
            clin_number: "0000".to_string(),
            description: String::new(),
            clin_type: "FFP".to_string(),
            quantity: 1,
            unit: "Lot".to_string(),
            unit_price: 0.0,
            total_price: 0.0,
            extra: BTreeMap::new(),
        }
    }
}

/// A subcontractor requirement block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubcontractorRequirement {
    pub subcontractor_name: String,
    pub cage_code: String,
    pub business_size: String,
    pub estimated_value: f64,
    pub scope: String,
    /// Clause numbers the prime must flow down to this subcontractor.
    pub flowdown_clauses: Vec<String>,
}

/// Contract domain classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Cybersecurity,
    ItModernization,
    Engineering,
    Consulting,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Cybersecurity => "cybersecurity",
            Domain::ItModernization => "it_modernization",
            Domain::Engineering => "engineering",
            Domain::Consulting => "consulting",
        }
    }
}

/// Normalized representation of one contract.
///
/// Owns its nested line items, clauses, and subcontractor entries by value.
/// Produced either by the hybrid extractor (from a .docx) or assumed for
/// documents already in canonical text layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Contract number — required and unique within a corpus. Synthesized
    /// from the source filename when the document does not state one.
    pub contract_number: String,
    pub contract_type: ContractType,
    pub agency: Agency,
    /// May be empty when the document does not name one.
    pub contracting_officer: String,
    pub contractor: Contractor,
    pub naics_code: String,
    pub psc_code: String,
    /// Base period value in dollars, if stated.
    pub value: Option<f64>,
    pub ceiling_value: Option<f64>,
    pub funded_amount: Option<f64>,
    pub period_of_performance: PeriodOfPerformance,
    pub scope_of_work: String,
    pub clins: Vec<Clin>,
    pub clauses: Clauses,
    pub subcontractor_requirements: Vec<SubcontractorRequirement>,
    pub security_requirements: Vec<String>,
    pub special_provisions: Vec<String>,
    pub domain: Option<Domain>,
    /// Derived from the resolved agency code, never extracted directly.
    pub is_dod: bool,
}

impl Default for ContractRecord {
    fn default() -> Self {
        Self {
            contract_number: String::new(),
            contract_type: ContractType::Ffp,
            agency: Agency {
                code: "UNKNOWN".to_string(),
                name: "Unknown Agency".to_string(),
            },
            contracting_officer: String::new(),
            contractor: Contractor {
                name: "Unknown Contractor".to_string(),
                size: "unknown".to_string(),
                ..Default::default()
            },
            naics_code: String::new(),
            psc_code: String::new(),
            value: None,
            ceiling_value: None,
            funded_amount: None,
            period_of_performance: PeriodOfPerformance::default(),
            scope_of_work: String::new(),
            clins: Vec::new(),
            clauses: Clauses::default(),
            subcontractor_requirements: Vec::new(),
            security_requirements: Vec::new(),
            special_provisions: Vec::new(),
            domain: None,
            is_dod: false,
        }
    }
}

/// Provenance marker on an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    /// Recovered by a deterministic pattern extractor.
    Pattern,
    /// Inferred by the narrative strategy (heuristic or generative).
    Narrative,
    /// Filled by the defaulting policy.
    Default,
}

/// Result of one field extraction: optional typed value, confidence in
/// `[0, 1]`, and the raw matched span for audit. The field's origin is not
/// carried here; the merge stage records it per field in
/// [`ExtractionReport::field_origins`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extracted<T> {
    pub value: Option<T>,
    pub confidence: f64,
    pub raw_match: String,
}

impl<T> Extracted<T> {
    /// A successful extraction.
    pub fn found(value: T, confidence: f64, raw_match: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            confidence,
            raw_match: raw_match.into(),
        }
    }

    /// No match: value absent, confidence zero.
    pub fn absent() -> Self {
        Self {
            value: None,
            confidence: 0.0,
            raw_match: String::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for Extracted<T> {
    fn default() -> Self {
        Self::absent()
    }
}

/// Summary of one document's extraction: per-origin counts, overall
/// confidence, warnings, and a field → origin map. Created fresh per
/// extraction call and fully populated by the merge stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub total_fields: usize,
    pub pattern_extracted: usize,
    pub narrative_extracted: usize,
    pub defaulted: usize,
    pub confidence_avg: f64,
    pub warnings: Vec<String>,
    pub field_origins: BTreeMap<String, FieldOrigin>,
}

impl ExtractionReport {
    pub(crate) fn record(&mut self, field: &str, origin: FieldOrigin) {
        match origin {
            FieldOrigin::Pattern => self.pattern_extracted += 1,
            FieldOrigin::Narrative => self.narrative_extracted += 1,
            FieldOrigin::Default => self.defaulted += 1,
        }
        self.field_origins.insert(field.to_string(), origin);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Named contract sections recognized by the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Header,
    ContractorInfo,
    Value,
    PeriodOfPerformance,
    ScopeOfWork,
    Clins,
    FarClauses,
    DfarsClauses,
    SubcontractorRequirements,
    SecurityRequirements,
    SpecialProvisions,
    General,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::ContractorInfo => "contractor_info",
            Section::Value => "value",
            Section::PeriodOfPerformance => "period_of_performance",
            Section::ScopeOfWork => "scope_of_work",
            Section::Clins => "clins",
            Section::FarClauses => "far_clauses",
            Section::DfarsClauses => "dfars_clauses",
            Section::SubcontractorRequirements => "subcontractor_requirements",
            Section::SecurityRequirements => "security_requirements",
            Section::SpecialProvisions => "special_provisions",
            Section::General => "general",
        }
    }
}

/// Granularity class of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Clause,
    Clin,
    Subcontractor,
    ScopeOfWork,
    SecurityRequirements,
    General,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Clause => "clause",
            ChunkType::Clin => "clin",
            ChunkType::Subcontractor => "subcontractor",
            ChunkType::ScopeOfWork => "scope_of_work",
            ChunkType::SecurityRequirements => "security_requirements",
            ChunkType::General => "general",
        }
    }
}

/// A retrieval-ready chunk of a contract document.
///
/// Holds a copy of contract-level metadata, not a reference — every chunk
/// stays independently retrievable after the parent record is discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractChunk {
    /// Chunk body, prefixed with a compact contract-context header.
    pub text: String,
    pub contract_number: String,
    pub section: Section,
    pub chunk_type: ChunkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_title: Option<String>,
    pub metadata: Metadata,
}
