//! Hybrid extraction orchestrator.
//!
//! Ties the stages together for one uploaded document:
//! 1. Validate and parse the .docx
//! 2. Run the pattern extractors over text and tables
//! 3. Run the narrative strategy over the text
//! 4. Merge by field origin: pattern fields gated by the confidence floor,
//!    narrative fields taken as-is, defaults filled last with warnings
//! 5. Render the canonical document text for the chunker
//!
//! Every field's origin lands in the report, so a caller can always tell
//! whether a value was extracted, inferred, or assumed.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::docx;
use crate::models::{
    Agency, ContractRecord, ContractType, ExtractionReport, Extracted, FieldOrigin,
};
use crate::narrative::{NarrativeFields, NarrativeStrategy};
use crate::patterns::{self, PatternFields, DOD_AGENCIES};
use crate::render::render_document;

/// Complete output of one document extraction.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub record: ContractRecord,
    /// Canonical document text, ready for the chunker.
    pub document_text: String,
    pub report: ExtractionReport,
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ExtractionOutcome {
    fn invalid(error: String) -> Self {
        Self {
            record: ContractRecord::default(),
            document_text: String::new(),
            report: ExtractionReport::default(),
            is_valid: false,
            error: Some(error),
        }
    }
}

/// Extract a contract record from raw .docx bytes.
///
/// A document that fails validation produces an invalid outcome with the
/// validation message, not an error: malformed uploads are an expected input,
/// not a pipeline fault.
pub async fn extract_contract_from_docx(
    bytes: &[u8],
    filename: &str,
    config: &Config,
    strategy: &dyn NarrativeStrategy,
) -> ExtractionOutcome {
    let content = match docx::validate_docx(bytes, config.extraction.min_document_chars) {
        Ok(content) => content,
        Err(err) => return ExtractionOutcome::invalid(err.to_string()),
    };

    let text = content.combined_text();
    let pattern_fields = patterns::extract_all(
        &text,
        &content.tables,
        config.extraction.flowdown_window_chars,
    );
    let narrative_fields = strategy.infer(&text).await;

    let mut report = ExtractionReport::default();
    if let Some(err) = &narrative_fields.provider_error {
        report.warn(format!(
            "Narrative provider failed, heuristic fallback used: {err}"
        ));
    }

    let confidences = collect_confidences(&pattern_fields, &narrative_fields);

    let mut record = merge_fields(
        pattern_fields,
        narrative_fields,
        config.extraction.min_confidence,
        &mut report,
    );
    fill_defaults(&mut record, filename, &mut report);

    report.confidence_avg = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };
    report.total_fields =
        report.pattern_extracted + report.narrative_extracted + report.defaulted;

    let document_text = render_document(&record);

    ExtractionOutcome {
        record,
        document_text,
        report,
        is_valid: true,
        error: None,
    }
}

/// Accept a pattern field if it cleared the confidence floor, recording its
/// origin; below-floor and absent fields are treated identically.
fn take<T>(
    field: Extracted<T>,
    name: &str,
    floor: f64,
    report: &mut ExtractionReport,
) -> Option<T> {
    match field.value {
        Some(value) if field.confidence >= floor => {
            report.record(name, FieldOrigin::Pattern);
            Some(value)
        }
        _ => None,
    }
}

fn take_narrative<T>(
    field: Extracted<T>,
    name: &str,
    report: &mut ExtractionReport,
) -> Option<T> {
    field.value.inspect(|_| {
        report.record(name, FieldOrigin::Narrative);
    })
}

fn merge_fields(
    p: PatternFields,
    n: NarrativeFields,
    floor: f64,
    report: &mut ExtractionReport,
) -> ContractRecord {
    let mut record = ContractRecord {
        contract_number: take(p.contract_number, "contract_number", floor, report)
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        contract_type: take(p.contract_type, "contract_type", floor, report)
            .unwrap_or(ContractType::Ffp),
        agency: take(p.agency, "agency", floor, report).unwrap_or(Agency {
            code: "UNKNOWN".to_string(),
            name: "Unknown Agency".to_string(),
        }),
        contracting_officer: take(p.contracting_officer, "contracting_officer", floor, report)
            .unwrap_or_default(),
        naics_code: take(p.naics_code, "naics_code", floor, report).unwrap_or_default(),
        psc_code: take(p.psc_code, "psc_code", floor, report).unwrap_or_default(),
        value: take(p.value, "value", floor, report),
        ceiling_value: take(p.ceiling_value, "ceiling_value", floor, report),
        funded_amount: take(p.funded_amount, "funded_amount", floor, report),
        clins: take(p.clins, "clins", floor, report).unwrap_or_default(),
        subcontractor_requirements: take(p.subcontractors, "subcontractors", floor, report)
            .unwrap_or_default(),
        scope_of_work: take_narrative(n.scope_of_work, "scope_of_work", report)
            .unwrap_or_default(),
        security_requirements: take_narrative(
            n.security_requirements,
            "security_requirements",
            report,
        )
        .unwrap_or_default(),
        special_provisions: take_narrative(n.special_provisions, "special_provisions", report)
            .unwrap_or_default(),
        domain: take_narrative(n.domain, "domain", report),
        ..ContractRecord::default()
    };

    record.contractor.name = take(p.contractor_name, "contractor_name", floor, report)
        .unwrap_or_else(|| "Unknown Contractor".to_string());
    record.contractor.cage = take(p.cage, "cage", floor, report).unwrap_or_default();
    record.contractor.uei = take(p.uei, "uei", floor, report).unwrap_or_default();
    record.contractor.size =
        take(p.size, "size", floor, report).unwrap_or_else(|| "unknown".to_string());

    record.clauses.far = take(p.far_clauses, "far_clauses", floor, report).unwrap_or_default();
    record.clauses.dfars =
        take(p.dfars_clauses, "dfars_clauses", floor, report).unwrap_or_default();

    let pop = &mut record.period_of_performance;
    pop.base_period_start =
        take(p.base_period_start, "base_period_start", floor, report).unwrap_or_default();
    pop.base_period_end =
        take(p.base_period_end, "base_period_end", floor, report).unwrap_or_default();
    pop.base_period_months =
        take(p.base_period_months, "base_period_months", floor, report).unwrap_or(12);
    pop.option_periods = take(p.option_periods, "option_periods", floor, report)
        .unwrap_or_default();

    // A stated base value stands in for funding when no funded amount was
    // extracted.
    if record.funded_amount.is_none() {
        record.funded_amount = record.value;
    }

    record
}

/// Fill required defaults, derive `is_dod`, and warn about gaps a reviewer
/// should know about.
fn fill_defaults(record: &mut ContractRecord, filename: &str, report: &mut ExtractionReport) {
    if record.contract_number == "UNKNOWN" {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        if stem.len() > 5 {
            record.contract_number = stem.to_string();
            report.warn(format!(
                "Contract number not found in text; using filename: {stem}"
            ));
        }
        report.record("contract_number", FieldOrigin::Default);
    }

    record.is_dod = DOD_AGENCIES.contains(&record.agency.code.as_str());

    if record.contracting_officer.is_empty() {
        report.warn("Contracting officer name not found");
        report.record("contracting_officer", FieldOrigin::Default);
    }

    if record.value.is_none() {
        report.warn("Contract dollar value not found");
        report.record("value", FieldOrigin::Default);
    }

    if record.clins.is_empty() {
        report.warn("No CLINs found — contract may be a summary document");
    }

    if record.scope_of_work.is_empty() {
        report.warn("Scope of work not found — the generative strategy may extract more");
        report.record("scope_of_work", FieldOrigin::Default);
    }

    if record.period_of_performance.base_period_start.is_empty() {
        report.warn("Period of performance dates not found");
    }

    if let (Some(funded), Some(ceiling)) = (record.funded_amount, record.ceiling_value) {
        if funded > ceiling {
            report.warn(format!(
                "Funded amount (${funded:.2}) exceeds contract ceiling (${ceiling:.2})"
            ));
        }
    }

    for clause in &record.clauses.far {
        if !FAR_NUMBER_SHAPE.is_match(&clause.number) {
            report.warn(format!("Unusual FAR clause number: {}", clause.number));
        }
    }
    for clause in &record.clauses.dfars {
        if !DFARS_NUMBER_SHAPE.is_match(&clause.number) {
            report.warn(format!("Unusual DFARS clause number: {}", clause.number));
        }
    }
}

static FAR_NUMBER_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^52\.\d{3}-\d{1,4}$").unwrap());
static DFARS_NUMBER_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^252\.\d{3}-\d{1,4}$").unwrap());

/// Non-zero confidences across all extractor outputs, gated or not. The
/// narrative strategy contributes once, at its per-strategy confidence.
fn collect_confidences(p: &PatternFields, n: &NarrativeFields) -> Vec<f64> {
    let pattern = [
        p.contract_number.confidence,
        p.agency.confidence,
        p.contract_type.confidence,
        p.contracting_officer.confidence,
        p.naics_code.confidence,
        p.psc_code.confidence,
        p.value.confidence,
        p.ceiling_value.confidence,
        p.funded_amount.confidence,
        p.base_period_start.confidence,
        p.base_period_end.confidence,
        p.base_period_months.confidence,
        p.option_periods.confidence,
        p.far_clauses.confidence,
        p.dfars_clauses.confidence,
        p.clins.confidence,
        p.contractor_name.confidence,
        p.cage.confidence,
        p.uei.confidence,
        p.size.confidence,
        p.subcontractors.confidence,
    ];

    let narrative = [
        n.scope_of_work.confidence,
        n.security_requirements.confidence,
        n.special_provisions.confidence,
        n.domain.confidence,
    ]
    .into_iter()
    .fold(0.0_f64, f64::max);

    pattern
        .into_iter()
        .chain(std::iter::once(narrative))
        .filter(|c| *c > 0.0)
        .collect()
}
