//! Canonical contract document renderer.
//!
//! Produces the single text layout the rest of the pipeline understands:
//! header lines, `--- SECTION ---` markers, indented clause/CLIN/
//! subcontractor entries, and a terminal `--- END OF CONTRACT ---` line.
//! A rendered record re-chunks to the same identifiers the record holds, so
//! extraction output can be stored as plain text and re-ingested later.

use std::fmt::Write;

use crate::models::ContractRecord;

/// Render a contract record into canonical document text.
pub fn render_document(record: &ContractRecord) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "CONTRACT NUMBER: {}", record.contract_number);
    let _ = writeln!(
        out,
        "CONTRACT TYPE: {} ({})",
        record.contract_type.full_name(),
        record.contract_type.code()
    );
    let _ = writeln!(
        out,
        "CONTRACTING AGENCY: {} ({})",
        record.agency.name, record.agency.code
    );
    let _ = writeln!(out, "CONTRACTING OFFICER: {}", record.contracting_officer);
    out.push('\n');

    let _ = writeln!(out, "--- CONTRACTOR INFORMATION ---");
    let _ = writeln!(out, "Contractor: {}", record.contractor.name);
    if !record.contractor.cage.is_empty() {
        let _ = writeln!(out, "CAGE Code: {}", record.contractor.cage);
    }
    let _ = writeln!(out, "Business Size: {}", record.contractor.size);
    if !record.contractor.uei.is_empty() {
        let _ = writeln!(out, "DUNS/UEI: {}", record.contractor.uei);
    }
    out.push('\n');

    if !record.naics_code.is_empty() {
        let _ = writeln!(out, "NAICS CODE: {}", record.naics_code);
    }
    if !record.psc_code.is_empty() {
        let _ = writeln!(out, "PSC CODE: {}", record.psc_code);
    }
    if !record.naics_code.is_empty() || !record.psc_code.is_empty() {
        out.push('\n');
    }

    let _ = writeln!(out, "--- TOTAL CONTRACT VALUE ---");
    if let Some(value) = record.value {
        let _ = writeln!(out, "Base Period Value: ${}", format_dollars(value));
    }
    if let Some(ceiling) = record.ceiling_value {
        let _ = writeln!(out, "Contract Ceiling: ${}", format_dollars(ceiling));
    }
    if let Some(funded) = record.funded_amount {
        let _ = writeln!(out, "Funded Amount: ${}", format_dollars(funded));
    }
    out.push('\n');

    let _ = writeln!(out, "--- PERIOD OF PERFORMANCE ---");
    let pop = &record.period_of_performance;
    if !pop.base_period_start.is_empty() {
        let end = if pop.base_period_end.is_empty() {
            "TBD"
        } else {
            &pop.base_period_end
        };
        let _ = writeln!(
            out,
            "Base Period: {} through {} ({} months)",
            pop.base_period_start, end, pop.base_period_months
        );
    }
    for opt in &pop.option_periods {
        let _ = writeln!(
            out,
            "Option Period {}: {} through {} ({} months)",
            opt.option_number, opt.start_date, opt.end_date, opt.months
        );
    }
    out.push('\n');

    let _ = writeln!(out, "--- STATEMENT OF WORK ---");
    if record.scope_of_work.is_empty() {
        let _ = writeln!(out, "Not available.");
    } else {
        let _ = writeln!(out, "{}", record.scope_of_work);
    }
    out.push('\n');

    let _ = writeln!(out, "--- CONTRACT LINE ITEMS (CLINs) ---");
    for clin in &record.clins {
        let _ = writeln!(out, "  CLIN {}: {}", clin.clin_number, clin.description);
        let _ = writeln!(
            out,
            "    Type: {} | Qty: {} {} | Unit Price: ${} | Total: ${}",
            clin.clin_type,
            clin.quantity,
            clin.unit,
            format_dollars(clin.unit_price),
            format_dollars(clin.total_price)
        );
    }
    if record.clins.is_empty() {
        let _ = writeln!(out, "  No CLINs extracted.");
    }
    out.push('\n');

    let _ = writeln!(out, "--- APPLICABLE FAR CLAUSES ---");
    for clause in &record.clauses.far {
        let _ = writeln!(out, "  FAR {} - {}", clause.number, clause.title);
        if !clause.text.is_empty() {
            let _ = writeln!(out, "    {}", clause.text);
        }
        out.push('\n');
    }
    if record.clauses.far.is_empty() {
        let _ = writeln!(out, "  No FAR clauses extracted.");
        out.push('\n');
    }

    let _ = writeln!(out, "--- APPLICABLE DFARS CLAUSES ---");
    for clause in &record.clauses.dfars {
        let flowdown = if clause.flowdown == Some(true) {
            " [MANDATORY FLOWDOWN]"
        } else {
            ""
        };
        let _ = writeln!(out, "  DFARS {} - {}{}", clause.number, clause.title, flowdown);
        if !clause.text.is_empty() {
            let _ = writeln!(out, "    {}", clause.text);
        }
        out.push('\n');
    }
    if record.clauses.dfars.is_empty() {
        let _ = writeln!(out, "  No DFARS clauses extracted.");
        out.push('\n');
    }

    if !record.subcontractor_requirements.is_empty() {
        let _ = writeln!(out, "--- SUBCONTRACTOR REQUIREMENTS ---");
        for sub in &record.subcontractor_requirements {
            if sub.cage_code.is_empty() {
                let _ = writeln!(out, "  Subcontractor: {}", sub.subcontractor_name);
            } else {
                let _ = writeln!(
                    out,
                    "  Subcontractor: {} (CAGE: {})",
                    sub.subcontractor_name, sub.cage_code
                );
            }
            let _ = writeln!(out, "    Business Size: {}", sub.business_size);
            if sub.estimated_value > 0.0 {
                let _ = writeln!(
                    out,
                    "    Estimated Value: ${}",
                    format_dollars(sub.estimated_value)
                );
            }
            if !sub.scope.is_empty() {
                let _ = writeln!(out, "    Scope: {}", sub.scope);
            }
            if !sub.flowdown_clauses.is_empty() {
                let _ = writeln!(
                    out,
                    "    Flowdown Clauses: {}",
                    sub.flowdown_clauses.join(", ")
                );
            }
            out.push('\n');
        }
    }

    if !record.security_requirements.is_empty() {
        let _ = writeln!(out, "--- SECURITY REQUIREMENTS ---");
        for req in &record.security_requirements {
            let _ = writeln!(out, "  - {}", req);
        }
        out.push('\n');
    }

    if !record.special_provisions.is_empty() {
        let _ = writeln!(out, "--- SPECIAL CONTRACT PROVISIONS ---");
        for provision in &record.special_provisions {
            let _ = writeln!(out, "  {}", provision);
        }
        out.push('\n');
    }

    out.push_str("--- END OF CONTRACT ---");
    out
}

/// Format a dollar amount with thousands separators and two decimal places,
/// without the `$` sign: `18172478.8` → `18,172,478.80`.
pub(crate) fn format_dollars(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac:02}")
}

/// Compact dollar label for chunk context headers: `$1.3B`, `$18.2M`, `$450K`.
pub(crate) fn compact_dollars(amount: f64) -> String {
    if amount >= 1e9 {
        format!("${:.1}B", amount / 1e9)
    } else if amount >= 1e6 {
        format!("${:.1}M", amount / 1e6)
    } else if amount >= 1e3 {
        format!("${:.0}K", amount / 1e3)
    } else {
        format!("${amount:.0}")
    }
}
