//! Pattern-based extractors for structured contract fields.
//!
//! Each extractor is a pure function over raw text (and optionally parsed
//! tables) that evaluates an ordered list of candidate patterns — most
//! specific labeled form first, progressively looser forms after — and
//! returns the first match. Confidence is inversely related to pattern
//! looseness: explicit labeled fields score 0.9–0.95, generic fallbacks
//! 0.5–0.7, no match 0.0 with an absent value.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::docx::Table;
use crate::models::{
    Agency, Clause, Clin, ContractType, Extracted, OptionPeriod, SubcontractorRequirement,
};

/// Known federal agencies, in lookup priority order. Free text is normalized
/// against this list; anything else lands in the `OTHER` bucket with the
/// literal text preserved.
pub const KNOWN_AGENCIES: &[(&str, &str)] = &[
    ("Department of Defense", "DOD"),
    ("Department of the Army", "ARMY"),
    ("U.S. Army", "ARMY"),
    ("United States Army", "ARMY"),
    ("U.S. Navy", "NAVY"),
    ("United States Navy", "NAVY"),
    ("U.S. Air Force", "USAF"),
    ("United States Air Force", "USAF"),
    ("Department of Homeland Security", "DHS"),
    ("Department of Veterans Affairs", "VA"),
    ("Department of Energy", "DOE"),
    ("National Aeronautics and Space Administration", "NASA"),
    ("Defense Information Systems Agency", "DISA"),
    ("Defense Logistics Agency", "DLA"),
    ("General Services Administration", "GSA"),
    ("Department of Health and Human Services", "HHS"),
    ("Department of Justice", "DOJ"),
    ("Department of the Interior", "DOI"),
    ("Department of State", "DOS"),
    ("Department of Transportation", "DOT"),
    ("Department of Commerce", "DOC"),
    ("Department of Education", "ED"),
    ("Department of Labor", "DOL"),
    ("Department of Treasury", "TREAS"),
];

/// Agency codes considered DoD/defense-affiliated.
pub const DOD_AGENCIES: &[&str] = &["DOD", "ARMY", "NAVY", "USAF", "DISA", "DLA"];

/// Contract type spellings, most specific first.
const CONTRACT_TYPES: &[(&str, ContractType)] = &[
    ("Firm-Fixed-Price", ContractType::Ffp),
    ("FFP", ContractType::Ffp),
    ("Cost-Plus-Fixed-Fee", ContractType::Cpff),
    ("CPFF", ContractType::Cpff),
    ("Cost-Plus-Award-Fee", ContractType::Cpaf),
    ("CPAF", ContractType::Cpaf),
    ("Time-and-Materials", ContractType::TimeAndMaterials),
    ("T&M", ContractType::TimeAndMaterials),
    ("Labor-Hour", ContractType::LaborHour),
    ("LH", ContractType::LaborHour),
    (
        "Indefinite Delivery/Indefinite Quantity",
        ContractType::Idiq,
    ),
    ("IDIQ", ContractType::Idiq),
    ("Blanket Purchase Agreement", ContractType::Bpa),
    ("BPA", ContractType::Bpa),
];

/// All pattern extraction results for one document, one typed slot per field
/// family.
#[derive(Debug, Clone, Default)]
pub struct PatternFields {
    pub contract_number: Extracted<String>,
    pub agency: Extracted<Agency>,
    pub contract_type: Extracted<ContractType>,
    pub contracting_officer: Extracted<String>,
    pub naics_code: Extracted<String>,
    pub psc_code: Extracted<String>,
    pub value: Extracted<f64>,
    pub ceiling_value: Extracted<f64>,
    pub funded_amount: Extracted<f64>,
    pub base_period_start: Extracted<String>,
    pub base_period_end: Extracted<String>,
    pub base_period_months: Extracted<u32>,
    pub option_periods: Extracted<Vec<OptionPeriod>>,
    pub far_clauses: Extracted<Vec<Clause>>,
    pub dfars_clauses: Extracted<Vec<Clause>>,
    pub clins: Extracted<Vec<Clin>>,
    pub contractor_name: Extracted<String>,
    pub cage: Extracted<String>,
    pub uei: Extracted<String>,
    pub size: Extracted<String>,
    pub subcontractors: Extracted<Vec<SubcontractorRequirement>>,
}

/// Run every pattern extractor over the document text.
///
/// `tables` come from the .docx structural parse; pass an empty slice for
/// plain-text input. `flowdown_window` is the DFARS flowdown locality window
/// in characters.
pub fn extract_all(text: &str, tables: &[Table], flowdown_window: usize) -> PatternFields {
    let dollars = extract_dollar_values(text);
    let dates = extract_dates(text);
    let contractor = extract_contractor_info(text);

    PatternFields {
        contract_number: extract_contract_number(text),
        agency: extract_agency(text),
        contract_type: extract_contract_type(text),
        contracting_officer: extract_contracting_officer(text),
        naics_code: extract_naics_code(text),
        psc_code: extract_psc_code(text),
        value: dollars.value,
        ceiling_value: dollars.ceiling_value,
        funded_amount: dollars.funded_amount,
        base_period_start: dates.base_period_start,
        base_period_end: dates.base_period_end,
        base_period_months: dates.base_period_months,
        option_periods: dates.option_periods,
        far_clauses: extract_far_clauses(text),
        dfars_clauses: extract_dfars_clauses(text, flowdown_window),
        clins: extract_clins(text, tables),
        contractor_name: contractor.name,
        cage: contractor.cage,
        uei: contractor.uei,
        size: contractor.size,
        subcontractors: extract_subcontractors(text),
    }
}

// ============ Identifier ============

static CONTRACT_NUMBER_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)CONTRACT\s+(?:NUMBER|NO|#)[:\s]+([A-Z0-9][A-Z0-9\-]{5,25})").unwrap()
});
// Standard federal shape, e.g. W911NF-25-D-0001, FA8650-24-C-1234.
static CONTRACT_NUMBER_STANDARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{1,6}\d{2,4}-[0-9]{2}-[A-Z]-[0-9]{4,6})\b").unwrap());
// DOE shape, e.g. DE-AC05-23-D-1215.
static CONTRACT_NUMBER_DOE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(DE-[A-Z]{2}\d{2}-\d{2}-[A-Z]-\d{4})\b").unwrap());

/// Extract the contract number: labeled form at 0.95, then the two standard
/// alphanumeric-hyphenated shapes at 0.85.
pub fn extract_contract_number(text: &str) -> Extracted<String> {
    let candidates: [(&Regex, f64); 3] = [
        (&CONTRACT_NUMBER_LABELED, 0.95),
        (&CONTRACT_NUMBER_STANDARD, 0.85),
        (&CONTRACT_NUMBER_DOE, 0.85),
    ];
    for (pattern, confidence) in candidates {
        if let Some(caps) = pattern.captures(text) {
            return Extracted::found(
                caps[1].trim().to_string(),
                confidence,
                caps[0].to_string(),
            );
        }
    }
    Extracted::absent()
}

// ============ Dollar values ============

static VALUE_BASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Base\s+Period\s+Value|Total\s+Contract\s+Value|Contract\s+Value|Base\s+Value)[:\s]*\$?([\d,]+(?:\.\d{2})?)",
    )
    .unwrap()
});
static VALUE_CEILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Contract\s+Ceiling|Ceiling\s+Value|Ceiling\s+Amount|Maximum\s+Value)[:\s]*\$?([\d,]+(?:\.\d{2})?)",
    )
    .unwrap()
});
static VALUE_FUNDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Funded\s+Amount|Amount\s+Funded|Obligated\s+Amount|Funded\s+Value)[:\s]*\$?([\d,]+(?:\.\d{2})?)",
    )
    .unwrap()
});
static ANY_DOLLARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([\d,]+(?:\.\d{2})?)").unwrap());

#[derive(Debug, Default)]
pub struct DollarFields {
    pub value: Extracted<f64>,
    pub ceiling_value: Extracted<f64>,
    pub funded_amount: Extracted<f64>,
}

/// Extract the three labeled monetary figures independently at 0.9. If none
/// is labeled, the single largest dollar figure anywhere in the text becomes
/// a 0.5-confidence guess for the base value only — never for ceiling or
/// funded, since an unlabeled maximum cannot be safely attributed to them.
pub fn extract_dollar_values(text: &str) -> DollarFields {
    let mut fields = DollarFields::default();

    for (pattern, slot) in [
        (&VALUE_BASE, &mut fields.value),
        (&VALUE_CEILING, &mut fields.ceiling_value),
        (&VALUE_FUNDED, &mut fields.funded_amount),
    ] {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(amount) = caps[1].replace(',', "").parse::<f64>() {
                *slot = Extracted::found(amount, 0.9, caps[0].to_string());
            }
        }
    }

    if !fields.value.is_found()
        && !fields.ceiling_value.is_found()
        && !fields.funded_amount.is_found()
    {
        let max = ANY_DOLLARS
            .captures_iter(text)
            .filter_map(|caps| {
                caps[1]
                    .replace(',', "")
                    .parse::<f64>()
                    .ok()
                    .map(|amount| (amount, caps[0].to_string()))
            })
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((amount, raw)) = max {
            fields.value = Extracted::found(amount, 0.5, raw);
        }
    }

    fields
}

// ============ Dates and period of performance ============

static POP_ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Base\s+Period|Period\s+of\s+Performance)[:\s]*(\d{4}[-/]\d{2}[-/]\d{2})\s+(?:through|to|-)\s+(\d{4}[-/]\d{2}[-/]\d{2})",
    )
    .unwrap()
});
static POP_US: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Base\s+Period|Period\s+of\s+Performance)[:\s]*(\d{1,2}/\d{1,2}/\d{2,4})\s+(?:through|to|-)\s+(\d{1,2}/\d{1,2}/\d{2,4})",
    )
    .unwrap()
});
static DURATION_MONTHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\((\d+)\s+months?\)").unwrap());
static OPTION_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)Option\s+(?:Period\s+)?(\d+)[:\s]*(\d{4}[-/]\d{2}[-/]\d{2})\s+(?:through|to|-)\s+(\d{4}[-/]\d{2}[-/]\d{2})(?:\s*\((\d+)\s+months?\))?",
    )
    .unwrap()
});

#[derive(Debug, Default)]
pub struct DateFields {
    /// ISO date strings (`YYYY-MM-DD`).
    pub base_period_start: Extracted<String>,
    pub base_period_end: Extracted<String>,
    pub base_period_months: Extracted<u32>,
    pub option_periods: Extracted<Vec<OptionPeriod>>,
}

/// Normalize a `M/D/YYYY` or `M/D/YY` date to ISO. Two-digit years are
/// assumed to be 2000s. Returns `None` for impossible dates.
fn normalize_us_date(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Extract the base period dates (ISO form preferred over US form), the
/// parenthetical month duration, and the repeating option-period group.
/// Options without an explicit duration default to 12 months.
pub fn extract_dates(text: &str) -> DateFields {
    let mut fields = DateFields::default();

    if let Some(caps) = POP_ISO.captures(text) {
        fields.base_period_start =
            Extracted::found(caps[1].replace('/', "-"), 0.9, caps[0].to_string());
        fields.base_period_end =
            Extracted::found(caps[2].replace('/', "-"), 0.9, caps[0].to_string());
    } else if let Some(caps) = POP_US.captures(text) {
        if let (Some(start), Some(end)) = (normalize_us_date(&caps[1]), normalize_us_date(&caps[2]))
        {
            fields.base_period_start = Extracted::found(start, 0.85, caps[0].to_string());
            fields.base_period_end = Extracted::found(end, 0.85, caps[0].to_string());
        }
    }

    if let Some(caps) = DURATION_MONTHS.captures(text) {
        if let Ok(months) = caps[1].parse::<u32>() {
            fields.base_period_months = Extracted::found(months, 0.85, caps[0].to_string());
        }
    }

    let options: Vec<OptionPeriod> = OPTION_PERIOD
        .captures_iter(text)
        .filter_map(|caps| {
            Some(OptionPeriod {
                option_number: caps[1].parse().ok()?,
                start_date: caps[2].replace('/', "-"),
                end_date: caps[3].replace('/', "-"),
                months: caps
                    .get(4)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(12),
            })
        })
        .collect();
    if !options.is_empty() {
        fields.option_periods = Extracted::found(options, 0.85, String::new());
    }

    fields
}

// ============ Clause tables ============

static FAR_CLAUSE_TITLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:FAR\s+)?(52\.\d{3}-\d{1,4})\s*[-–—]\s*([^\n]+)").unwrap());
static FAR_CLAUSE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(52\.\d{3}-\d{1,4})\b").unwrap());
static DFARS_CLAUSE_TITLED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:DFARS\s+)?(252\.\d{3}-\d{1,4})\s*[-–—]\s*([^\n]+)").unwrap());
static DFARS_CLAUSE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(252\.\d{3}-\d{1,4})\b").unwrap());
static FLOWDOWN_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:MANDATORY\s+FLOWDOWN|shall\s+flow\s+down|apply\s+to\s+subcontract)")
        .unwrap()
});

fn strip_flowdown_marker(title: &str) -> String {
    title.replace("[MANDATORY FLOWDOWN]", "").trim().to_string()
}

/// Extract FAR clauses as "NUMBER - TITLE" lines at 0.9; when no titled line
/// is present, fall back to bare deduplicated clause numbers with empty
/// titles — degraded, but clause presence still matters for flowdown queries.
pub fn extract_far_clauses(text: &str) -> Extracted<Vec<Clause>> {
    extract_clause_family(text, &FAR_CLAUSE_TITLED, &FAR_CLAUSE_BARE, None)
}

/// Extract DFARS clauses like [`extract_far_clauses`], additionally flagging
/// a clause as mandatory-flowdown when a flowdown-indicating phrase occurs
/// within `window` characters of the match.
pub fn extract_dfars_clauses(text: &str, window: usize) -> Extracted<Vec<Clause>> {
    extract_clause_family(text, &DFARS_CLAUSE_TITLED, &DFARS_CLAUSE_BARE, Some(window))
}

fn extract_clause_family(
    text: &str,
    titled: &Regex,
    bare: &Regex,
    flowdown_window: Option<usize>,
) -> Extracted<Vec<Clause>> {
    let mut clauses: Vec<Clause> = titled
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            let flowdown = flowdown_window.map(|window| {
                let vicinity = char_window(text, whole.start(), whole.end(), window);
                FLOWDOWN_PHRASE.is_match(vicinity)
            });
            Clause {
                number: caps[1].to_string(),
                title: strip_flowdown_marker(caps[2].trim()),
                text: String::new(),
                flowdown: flowdown.filter(|f| *f),
            }
        })
        .collect();

    if clauses.is_empty() {
        let numbers: BTreeSet<String> = bare
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect();
        clauses = numbers
            .into_iter()
            .map(|number| Clause {
                number,
                ..Default::default()
            })
            .collect();
    }

    if clauses.is_empty() {
        Extracted::absent()
    } else {
        Extracted::found(clauses, 0.9, String::new())
    }
}

/// Slice `text` to roughly `window` characters either side of a match,
/// clamped to UTF-8 character boundaries.
fn char_window(text: &str, start: usize, end: usize, window: usize) -> &str {
    let mut lo = start.saturating_sub(window);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + window).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi]
}

// ============ Line items (CLINs) ============

static CLIN_PROSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*CLIN\s+(\d{4})[:\s]+([^\n]+?)\s*$(?:\n\s*Type:\s*([^|\n]+?)\s*\|\s*Qty:\s*([\d.]+)\s*(\w+)\s*\|\s*Unit\s+Price:\s*\$([\d,.]+)\s*\|\s*Total:\s*\$([\d,.]+))?",
    )
    .unwrap()
});
static CLIN_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

const CLIN_TABLE_INDICATORS: &[&str] = &["clin", "line item", "description", "quantity", "price"];

/// Extract line items. A qualifying table (headers containing line-item,
/// quantity, or price indicators) is preferred; prose-pattern matching over
/// the raw text is the fallback when no such table exists.
pub fn extract_clins(text: &str, tables: &[Table]) -> Extracted<Vec<Clin>> {
    let mut clins: Vec<Clin> = Vec::new();

    for table in tables {
        let header_text = table.headers.join(" ").to_lowercase();
        if CLIN_TABLE_INDICATORS
            .iter()
            .any(|ind| header_text.contains(ind))
        {
            for row in &table.rows {
                if let Some(clin) = parse_clin_row(row) {
                    clins.push(clin);
                }
            }
        }
    }

    if clins.is_empty() {
        for caps in CLIN_PROSE.captures_iter(text) {
            clins.push(Clin {
                clin_number: caps[1].to_string(),
                description: caps[2].trim().to_string(),
                clin_type: caps
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_else(|| "FFP".to_string()),
                quantity: caps
                    .get(4)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .map(|q| q as u32)
                    .unwrap_or(1),
                unit: caps
                    .get(5)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "Lot".to_string()),
                unit_price: caps
                    .get(6)
                    .and_then(|m| parse_money(m.as_str()))
                    .unwrap_or(0.0),
                total_price: caps
                    .get(7)
                    .and_then(|m| parse_money(m.as_str()))
                    .unwrap_or(0.0),
                extra: BTreeMap::new(),
            });
        }
    }

    if clins.is_empty() {
        Extracted::absent()
    } else {
        Extracted::found(clins, 0.85, String::new())
    }
}

/// Parse one table row into a line item, tolerating column reordering.
/// Unrecognized columns are carried through untyped in `extra`.
fn parse_clin_row(row: &BTreeMap<String, String>) -> Option<Clin> {
    let mut clin = Clin::default();
    let mut saw_number = false;
    let mut saw_description = false;

    for (header, value) in row {
        let hl = header.to_lowercase();
        let vl = value.trim();
        if vl.is_empty() {
            continue;
        }

        if hl.contains("clin") || hl.contains("line item") {
            clin.clin_number = CLIN_DIGITS
                .find(vl)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| vl.to_string());
            saw_number = true;
        } else if hl.contains("description") || hl.contains("title") {
            clin.description = vl.to_string();
            saw_description = true;
        } else if hl.contains("type") {
            clin.clin_type = vl.to_string();
        } else if hl.contains("qty") || hl.contains("quantity") {
            clin.quantity = vl.replace(',', "").parse::<f64>().map(|q| q as u32).unwrap_or(1);
        } else if hl.contains("unit price") || hl.contains("unit cost") {
            clin.unit_price = parse_money(vl).unwrap_or(0.0);
        } else if hl.contains("unit") && !hl.contains("price") {
            clin.unit = vl.to_string();
        } else if hl.contains("total") || hl.contains("amount") || hl.contains("extended") {
            clin.total_price = parse_money(vl).unwrap_or(0.0);
        } else {
            clin.extra.insert(header.clone(), vl.to_string());
        }
    }

    if !saw_number && !saw_description {
        return None;
    }
    Some(clin)
}

fn parse_money(raw: &str) -> Option<f64> {
    raw.replace(['$', ','], "").trim().parse::<f64>().ok()
}

// ============ Party / contractor info ============

static CONTRACTOR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Contractor|Prime\s+Contractor|Vendor|Offeror)[:\s]+([^\n]+)").unwrap()
});
static CAGE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CAGE\s*(?:Code|#)?[:\s]*([A-Z0-9]{5})").unwrap());
static UEI_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:UEI|DUNS|DUNS/UEI|SAM\s+UEI)[:\s]*([A-Z0-9]{8,13})").unwrap());
static BUSINESS_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Business\s+Size|Size\s+Standard|Size\s+Status)[:\s]*(small\s+business|large\s+business|small|large|mid|8\(?a\)?|sdvosb|wosb|hubzone)",
    )
    .unwrap()
});

#[derive(Debug, Default)]
pub struct ContractorFields {
    pub name: Extracted<String>,
    pub cage: Extracted<String>,
    pub uei: Extracted<String>,
    pub size: Extracted<String>,
}

/// Extract contractor name, CAGE code, UEI/DUNS, and normalized size class.
pub fn extract_contractor_info(text: &str) -> ContractorFields {
    let mut fields = ContractorFields::default();

    if let Some(caps) = CONTRACTOR_NAME.captures(text) {
        fields.name = Extracted::found(caps[1].trim().to_string(), 0.85, caps[0].to_string());
    }
    if let Some(caps) = CAGE_CODE.captures(text) {
        fields.cage = Extracted::found(caps[1].to_string(), 0.9, caps[0].to_string());
    }
    if let Some(caps) = UEI_CODE.captures(text) {
        fields.uei = Extracted::found(caps[1].to_string(), 0.9, caps[0].to_string());
    }
    if let Some(caps) = BUSINESS_SIZE.captures(text) {
        let size = normalize_size(&caps[1]);
        fields.size = Extracted::found(size, 0.85, caps[0].to_string());
    }

    fields
}

fn normalize_size(raw: &str) -> String {
    let size = raw.trim().to_lowercase();
    if size.contains("small business") {
        "small".to_string()
    } else if size.contains("large business") {
        "large".to_string()
    } else if size.contains('8') {
        "8a".to_string()
    } else {
        size
    }
}

// ============ Agency, type, officer, classification codes ============

static AGENCY_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:CONTRACTING\s+AGENCY|Awarding\s+Agency|Issuing\s+Office)[:\s]+([^\n]+)")
        .unwrap()
});

/// Extract the issuing agency: labeled text normalized against the known
/// agency list (0.9), labeled but unrecognized text into the `OTHER` bucket
/// with the literal preserved (0.7), then an anywhere-in-text name scan (0.6).
pub fn extract_agency(text: &str) -> Extracted<Agency> {
    if let Some(caps) = AGENCY_LABELED.captures(text) {
        let agency_text = caps[1].trim();
        let lower = agency_text.to_lowercase();
        for (name, code) in KNOWN_AGENCIES {
            if lower.contains(&name.to_lowercase()) {
                return Extracted::found(
                    Agency {
                        code: code.to_string(),
                        name: name.to_string(),
                    },
                    0.9,
                    caps[0].to_string(),
                );
            }
        }
        return Extracted::found(
            Agency {
                code: "OTHER".to_string(),
                name: agency_text.to_string(),
            },
            0.7,
            caps[0].to_string(),
        );
    }

    let lower = text.to_lowercase();
    for (name, code) in KNOWN_AGENCIES {
        if lower.contains(&name.to_lowercase()) {
            return Extracted::found(
                Agency {
                    code: code.to_string(),
                    name: name.to_string(),
                },
                0.6,
                String::new(),
            );
        }
    }

    Extracted::absent()
}

static CONTRACT_TYPE_LABELED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CONTRACT\s+TYPE[:\s]+([^\n]+)").unwrap());

/// Extract the contract type code: labeled line matched against the known
/// spellings (0.9), then a whole-text keyword scan over the spelled-out
/// names only (0.6).
pub fn extract_contract_type(text: &str) -> Extracted<ContractType> {
    if let Some(caps) = CONTRACT_TYPE_LABELED.captures(text) {
        let lower = caps[1].to_lowercase();
        for (name, code) in CONTRACT_TYPES {
            if lower.contains(&name.to_lowercase()) {
                return Extracted::found(code.clone(), 0.9, caps[0].to_string());
            }
        }
    }

    let lower = text.to_lowercase();
    for (name, code) in CONTRACT_TYPES {
        if name.len() > 3 && lower.contains(&name.to_lowercase()) {
            return Extracted::found(code.clone(), 0.6, String::new());
        }
    }

    Extracted::absent()
}

static OFFICER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:CONTRACTING\s+OFFICER|Contracting\s+Officer\s+Representative|COR)[:\s]+([A-Z][a-z]*\.?[ \t]+(?:[A-Z][a-z]+[ \t.]*)+)",
    )
    .unwrap()
});

pub fn extract_contracting_officer(text: &str) -> Extracted<String> {
    match OFFICER.captures(text) {
        Some(caps) => Extracted::found(caps[1].trim().to_string(), 0.85, caps[0].to_string()),
        None => Extracted::absent(),
    }
}

static NAICS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)NAICS\s*(?:CODE|#)?[:\s]*(\d{6})").unwrap());
static PSC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PSC\s*(?:CODE|#)?[:\s]*([A-Z]\d{3})").unwrap());

pub fn extract_naics_code(text: &str) -> Extracted<String> {
    match NAICS.captures(text) {
        Some(caps) => Extracted::found(caps[1].to_string(), 0.9, caps[0].to_string()),
        None => Extracted::absent(),
    }
}

pub fn extract_psc_code(text: &str) -> Extracted<String> {
    match PSC.captures(text) {
        Some(caps) => Extracted::found(caps[1].to_string(), 0.9, caps[0].to_string()),
        None => Extracted::absent(),
    }
}

// ============ Subcontractors ============

static SUB_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*Subcontractor[:\s]+([^\n]+)").unwrap());
static SUB_CAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(?CAGE[:\s]*([A-Z0-9]{5})\)?").unwrap());
static SUB_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Business\s+Size[:\s]*(\w+)").unwrap());
static SUB_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:Estimated\s+)?Value[:\s]*\$([\d,.]+)").unwrap());
static SUB_SCOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Scope[:\s]*([^\n]+)").unwrap());
static SUB_FLOWDOWN_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Flowdown\s+Clauses?[:\s]*((?:(?:52|252)\.\d{3}-\d{1,4}[,\s]*)+)").unwrap()
});
static CLAUSE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"((?:52|252)\.\d{3}-\d{1,4})").unwrap());

/// Extract subcontractor requirement blocks. Each `Subcontractor:` line
/// starts a block running to the next one (or end of text); CAGE, size,
/// value, scope, and the flowdown clause list are read from within the block.
pub fn extract_subcontractors(text: &str) -> Extracted<Vec<SubcontractorRequirement>> {
    let headers: Vec<_> = SUB_HEADER.captures_iter(text).collect();
    if headers.is_empty() {
        return Extracted::absent();
    }

    let starts: Vec<usize> = headers
        .iter()
        .map(|caps| caps.get(0).unwrap().start())
        .collect();

    let subs: Vec<SubcontractorRequirement> = headers
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let block_end = starts.get(i + 1).copied().unwrap_or(text.len());
            let block = &text[starts[i]..block_end];
            let name_line = caps[1].trim();
            let name = name_line
                .split('(')
                .next()
                .unwrap_or(name_line)
                .trim()
                .to_string();

            SubcontractorRequirement {
                subcontractor_name: name,
                cage_code: SUB_CAGE
                    .captures(block)
                    .map(|c| c[1].to_string())
                    .unwrap_or_default(),
                business_size: SUB_SIZE
                    .captures(block)
                    .map(|c| c[1].to_lowercase())
                    .unwrap_or_else(|| "small".to_string()),
                estimated_value: SUB_VALUE
                    .captures(block)
                    .and_then(|c| parse_money(&c[1]))
                    .unwrap_or(0.0),
                scope: SUB_SCOPE
                    .captures(block)
                    .map(|c| c[1].trim().to_string())
                    .unwrap_or_default(),
                flowdown_clauses: SUB_FLOWDOWN_LIST
                    .captures(block)
                    .map(|c| {
                        CLAUSE_NUMBER
                            .captures_iter(&c[1])
                            .map(|n| n[1].to_string())
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect();

    Extracted::found(subs, 0.8, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_number_prefers_labeled_form() {
        let text = "CONTRACT NUMBER: W911NF-25-D-0001\nAnother id FA8650-24-C-1234 appears later.";
        let result = extract_contract_number(text);
        assert_eq!(result.value.as_deref(), Some("W911NF-25-D-0001"));
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn contract_number_falls_back_to_standard_shape() {
        let result = extract_contract_number("Awarded under N00024-22-C-6615 last year.");
        assert_eq!(result.value.as_deref(), Some("N00024-22-C-6615"));
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn contract_number_recognizes_doe_shape() {
        let result = extract_contract_number("Reference DE-AC05-23-D-1215 herein.");
        assert_eq!(result.value.as_deref(), Some("DE-AC05-23-D-1215"));
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn contract_number_absent_when_nothing_matches() {
        let result = extract_contract_number("No identifiers here.");
        assert!(!result.is_found());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn labeled_base_value_leaves_funded_absent() {
        let text = "Base Period Value: $18,172,478.80\nSome other text.";
        let fields = extract_dollar_values(text);
        assert_eq!(fields.value.value, Some(18_172_478.80));
        assert!(fields.value.confidence >= 0.85);
        // Funded is NOT defaulted to the base value at the extraction stage.
        assert!(!fields.funded_amount.is_found());
        assert!(!fields.ceiling_value.is_found());
    }

    #[test]
    fn unlabeled_max_is_a_low_confidence_base_guess() {
        let text = "Payment of $5,000.00 then $1,200,000.00 then $300.00.";
        let fields = extract_dollar_values(text);
        assert_eq!(fields.value.value, Some(1_200_000.0));
        assert_eq!(fields.value.confidence, 0.5);
        assert!(!fields.ceiling_value.is_found());
        assert!(!fields.funded_amount.is_found());
    }

    #[test]
    fn iso_dates_preferred_over_us_form() {
        let text = "Period of Performance: 2025-01-01 through 2025-12-31 (12 months)";
        let fields = extract_dates(text);
        assert_eq!(fields.base_period_start.value.as_deref(), Some("2025-01-01"));
        assert_eq!(fields.base_period_end.value.as_deref(), Some("2025-12-31"));
        assert_eq!(fields.base_period_start.confidence, 0.9);
        assert_eq!(fields.base_period_months.value, Some(12));
    }

    #[test]
    fn us_dates_normalize_two_digit_years() {
        let text = "Base Period: 1/15/25 through 12/31/26";
        let fields = extract_dates(text);
        assert_eq!(fields.base_period_start.value.as_deref(), Some("2025-01-15"));
        assert_eq!(fields.base_period_end.value.as_deref(), Some("2026-12-31"));
        assert_eq!(fields.base_period_start.confidence, 0.85);
    }

    #[test]
    fn option_period_without_duration_defaults_to_twelve_months() {
        let text = "Option Period 1: 2026-01-01 through 2026-12-31\n\
                    Option Period 2: 2027-01-01 through 2027-06-30 (6 months)";
        let fields = extract_dates(text);
        let options = fields.option_periods.value.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].months, 12);
        assert_eq!(options[1].months, 6);
    }

    #[test]
    fn far_clauses_with_titles() {
        let text = "  FAR 52.204-21 - Basic Safeguarding of Covered Contractor Information Systems\n\
                      FAR 52.219-8 - Utilization of Small Business Concerns\n";
        let result = extract_far_clauses(text);
        let clauses = result.value.unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].number, "52.204-21");
        assert_eq!(
            clauses[0].title,
            "Basic Safeguarding of Covered Contractor Information Systems"
        );
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn far_clauses_bare_number_fallback_deduplicates() {
        let text = "Flowdown applies to 52.219-8 and 52.222-50 and again 52.219-8.";
        let clauses = extract_far_clauses(text).value.unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses.iter().all(|c| c.title.is_empty()));
    }

    #[test]
    fn dfars_flowdown_flag_depends_on_window() {
        let text = format!(
            "  DFARS 252.204-7012 - Safeguarding Covered Defense Information [MANDATORY FLOWDOWN]\n{}\
             \n  DFARS 252.225-7001 - Buy American and Balance of Payments Program\n",
            " ".repeat(400)
        );
        let clauses = extract_dfars_clauses(&text, 200).value.unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].flowdown, Some(true));
        assert_eq!(clauses[1].flowdown, None);
    }

    #[test]
    fn clins_prefer_qualifying_table() {
        let mut row = BTreeMap::new();
        row.insert("CLIN".to_string(), "Item 0001".to_string());
        row.insert("Description".to_string(), "Systems engineering".to_string());
        row.insert("Qty".to_string(), "2".to_string());
        row.insert("Unit Price".to_string(), "$1,500.00".to_string());
        row.insert("Total".to_string(), "$3,000.00".to_string());
        row.insert("Notes".to_string(), "priority".to_string());
        let table = Table {
            headers: vec![
                "CLIN".into(),
                "Description".into(),
                "Qty".into(),
                "Unit Price".into(),
                "Total".into(),
                "Notes".into(),
            ],
            rows: vec![row.clone()],
            raw_rows: vec![],
        };
        // Prose CLINs also present, but the table wins.
        let text = "CLIN 9999: Should not be used";
        let clins = extract_clins(text, &[table]).value.unwrap();
        assert_eq!(clins.len(), 1);
        assert_eq!(clins[0].clin_number, "0001");
        assert_eq!(clins[0].quantity, 2);
        assert_eq!(clins[0].unit_price, 1500.0);
        assert_eq!(clins[0].total_price, 3000.0);
        assert_eq!(clins[0].extra.get("Notes").unwrap(), "priority");
    }

    #[test]
    fn clins_prose_fallback() {
        let text = "  CLIN 0001: Program management support\n\
                    Type: FFP | Qty: 12 Months | Unit Price: $85,000.00 | Total: $1,020,000.00\n";
        let clins = extract_clins(text, &[]).value.unwrap();
        assert_eq!(clins.len(), 1);
        assert_eq!(clins[0].clin_number, "0001");
        assert_eq!(clins[0].description, "Program management support");
        assert_eq!(clins[0].quantity, 12);
        assert_eq!(clins[0].total_price, 1_020_000.0);
    }

    #[test]
    fn agency_normalizes_known_names() {
        let result = extract_agency("CONTRACTING AGENCY: Defense Information Systems Agency\n");
        let agency = result.value.unwrap();
        assert_eq!(agency.code, "DISA");
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn agency_unknown_goes_to_other_bucket_preserving_text() {
        let result = extract_agency("CONTRACTING AGENCY: Bureau of Reclamation\n");
        let agency = result.value.unwrap();
        assert_eq!(agency.code, "OTHER");
        assert_eq!(agency.name, "Bureau of Reclamation");
        assert_eq!(result.confidence, 0.7);
    }

    #[test]
    fn contract_type_labeled_then_keyword() {
        let labeled = extract_contract_type("CONTRACT TYPE: Cost-Plus-Fixed-Fee (CPFF)\n");
        assert_eq!(labeled.value, Some(ContractType::Cpff));
        assert_eq!(labeled.confidence, 0.9);

        let keyword = extract_contract_type("This Firm-Fixed-Price award covers one year.");
        assert_eq!(keyword.value, Some(ContractType::Ffp));
        assert_eq!(keyword.confidence, 0.6);
    }

    #[test]
    fn officer_name_stops_at_end_of_line() {
        let text = "CONTRACTING OFFICER: Maj. Sarah Chen\nContractor: Apex Federal Solutions LLC\n";
        let result = extract_contracting_officer(text);
        assert_eq!(result.value.as_deref(), Some("Maj. Sarah Chen"));
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn contractor_info_normalizes_size() {
        let text = "Contractor: Apex Federal Solutions LLC\n\
                    CAGE Code: 1AB23\nDUNS/UEI: ABCD1234EFGH\nBusiness Size: Small Business\n";
        let fields = extract_contractor_info(text);
        assert_eq!(
            fields.name.value.as_deref(),
            Some("Apex Federal Solutions LLC")
        );
        assert_eq!(fields.cage.value.as_deref(), Some("1AB23"));
        assert_eq!(fields.uei.value.as_deref(), Some("ABCD1234EFGH"));
        assert_eq!(fields.size.value.as_deref(), Some("small"));
    }

    #[test]
    fn subcontractor_blocks_with_flowdown_lists() {
        let text = "  Subcontractor: CyberShield Inc (CAGE: 9ZY87)\n\
                    Business Size: Small\n\
                    Estimated Value: $450,000.00\n\
                    Scope: Vulnerability assessment support\n\
                    Flowdown Clauses: 52.219-8, 252.204-7012\n\
                    Subcontractor: DataWorks LLC\n\
                    Scope: Reporting\n";
        let subs = extract_subcontractors(text).value.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].subcontractor_name, "CyberShield Inc");
        assert_eq!(subs[0].cage_code, "9ZY87");
        assert_eq!(subs[0].estimated_value, 450_000.0);
        assert_eq!(
            subs[0].flowdown_clauses,
            vec!["52.219-8".to_string(), "252.204-7012".to_string()]
        );
        assert_eq!(subs[1].subcontractor_name, "DataWorks LLC");
        assert!(subs[1].flowdown_clauses.is_empty());
        assert_eq!(subs[1].business_size, "small");
    }
}
