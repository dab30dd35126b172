//! Narrative field inference: scope of work, security requirements, special
//! provisions, and domain classification.
//!
//! These fields live in prose, not labeled lines, so they go through a
//! [`NarrativeStrategy`] rather than the pattern extractors. Two strategies
//! exist:
//! - **Heuristic** — keyword and section scanning, always available, fixed
//!   confidence 0.3.
//! - **Generative** — calls a messages API and parses a strict-JSON reply at
//!   confidence 0.85. Any failure (network, non-retryable status, exhausted
//!   retries, malformed JSON) falls back to the heuristic output with the
//!   error recorded in `provider_error`; the fallback never raises.
//!
//! # Retry Strategy
//!
//! The generative strategy uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use regex::Regex;

use crate::config::NarrativeConfig;
use crate::models::{Domain, Extracted};

const HEURISTIC_CONFIDENCE: f64 = 0.3;
const GENERATIVE_CONFIDENCE: f64 = 0.85;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// All narrative inference results for one document.
#[derive(Debug, Clone, Default)]
pub struct NarrativeFields {
    pub scope_of_work: Extracted<String>,
    pub security_requirements: Extracted<Vec<String>>,
    pub special_provisions: Extracted<Vec<String>>,
    pub domain: Extracted<Domain>,
    /// Set when the generative strategy failed and the heuristic filled in.
    pub provider_error: Option<String>,
}

/// Strategy boundary for narrative inference.
#[async_trait]
pub trait NarrativeStrategy: Send + Sync {
    async fn infer(&self, text: &str) -> NarrativeFields;
    fn name(&self) -> &str;
}

/// Build the strategy named by the config. Selection is explicit; a
/// generative config with no model is a configuration error, not a silent
/// downgrade.
pub fn create_strategy(config: &NarrativeConfig) -> Result<Box<dyn NarrativeStrategy>> {
    match config.provider.as_str() {
        "heuristic" => Ok(Box::new(HeuristicStrategy)),
        "generative" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| anyhow!("narrative.model must be set for the generative strategy"))?;
            Ok(Box::new(GenerativeStrategy {
                model,
                url: config
                    .url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                timeout: Duration::from_secs(config.timeout_secs),
                max_retries: config.max_retries,
                max_prompt_chars: config.max_prompt_chars,
            }))
        }
        other => bail!("Unknown narrative provider: '{}'", other),
    }
}

// ============ Heuristic strategy ============

/// Keyword and section scanning. No I/O, no failure modes.
pub struct HeuristicStrategy;

#[async_trait]
impl NarrativeStrategy for HeuristicStrategy {
    async fn infer(&self, text: &str) -> NarrativeFields {
        infer_heuristic(text)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

fn infer_heuristic(text: &str) -> NarrativeFields {
    NarrativeFields {
        scope_of_work: infer_scope(text),
        security_requirements: infer_security_requirements(text),
        special_provisions: infer_special_provisions(text),
        domain: infer_domain(text),
        provider_error: None,
    }
}

static SOW_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?:---\s*STATEMENT\s+OF\s+WORK\s*---|STATEMENT\s+OF\s+WORK[:\s]|SCOPE\s+OF\s+WORK[:\s])\s*(.+?)(?:\n\s*---|\z)",
    )
    .unwrap()
});

const SCOPE_KEYWORDS: &[&str] = &[
    "shall provide",
    "shall perform",
    "services include",
    "scope of",
    "work includes",
    "deliverables",
];

const SCOPE_MAX_CHARS: usize = 500;

/// Pull the scope from a statement-of-work section when one exists; otherwise
/// collect up to three sentences that sound like scope language.
fn infer_scope(text: &str) -> Extracted<String> {
    if let Some(caps) = SOW_SECTION.captures(text) {
        let body = normalize_whitespace(&caps[1]);
        if body.len() > 20 {
            return Extracted::found(
                truncate_chars(&body, SCOPE_MAX_CHARS).to_string(),
                HEURISTIC_CONFIDENCE,
                String::new(),
            );
        }
    }

    let mut sentences = Vec::new();
    for sentence in text.split(['.', '\n']) {
        let sentence = sentence.trim();
        let lower = sentence.to_lowercase();
        if sentence.len() > 20
            && sentence.len() < SCOPE_MAX_CHARS
            && SCOPE_KEYWORDS.iter().any(|kw| lower.contains(kw))
        {
            sentences.push(sentence);
            if sentences.len() == 3 {
                break;
            }
        }
    }
    if sentences.is_empty() {
        return Extracted::absent();
    }
    let joined = normalize_whitespace(&sentences.join(". "));
    Extracted::found(
        truncate_chars(&joined, SCOPE_MAX_CHARS).to_string(),
        HEURISTIC_CONFIDENCE,
        String::new(),
    )
}

static CLEARANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(TOP\s+SECRET|SECRET)\b.{0,40}?clearance").unwrap());
static CMMC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CMMC\s+Level\s+(\d)").unwrap());
static NIST_171: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)NIST\s+SP\s+800-171").unwrap());
static NIST_53: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)NIST\s+SP\s+800-53").unwrap());
static FEDRAMP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bFedRAMP\b").unwrap());
static FISMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bFISMA\b").unwrap());
static DD254: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bDD[-\s]?254\b").unwrap());
static ITAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bITAR\b").unwrap());

/// Recognize security requirement mentions and emit them in a normalized
/// form, one string per requirement.
fn infer_security_requirements(text: &str) -> Extracted<Vec<String>> {
    let mut requirements = Vec::new();

    if let Some(caps) = CLEARANCE.captures(text) {
        requirements.push(format!(
            "{} clearance required",
            normalize_whitespace(&caps[1]).to_uppercase()
        ));
    }
    if let Some(caps) = CMMC.captures(text) {
        requirements.push(format!("CMMC Level {}", &caps[1]));
    }
    if NIST_171.is_match(text) {
        requirements.push("NIST SP 800-171 compliance".to_string());
    }
    if NIST_53.is_match(text) {
        requirements.push("NIST SP 800-53 compliance".to_string());
    }
    if FEDRAMP.is_match(text) {
        requirements.push("FedRAMP authorization".to_string());
    }
    if FISMA.is_match(text) {
        requirements.push("FISMA compliance".to_string());
    }
    if DD254.is_match(text) {
        requirements.push("DD-254 required".to_string());
    }
    if ITAR.is_match(text) {
        requirements.push("ITAR restrictions apply".to_string());
    }

    if requirements.is_empty() {
        Extracted::absent()
    } else {
        Extracted::found(requirements, HEURISTIC_CONFIDENCE, String::new())
    }
}

static KEY_PERSONNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Key\s+Personnel[:\s]+([^\n]+)").unwrap());
static EVMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bEVMS\b|Earned\s+Value\s+Management").unwrap()
});
static GFE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bGFE\b|Government[-\s]Furnished\s+Equipment").unwrap()
});
static DEVSECOPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bDevSecOps\b").unwrap());
static STATUS_REPORTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:monthly|quarterly|weekly)\s+(?:status|progress)\s+reports?").unwrap()
});
static OCI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bOCI\b|Organizational\s+Conflicts?\s+of\s+Interest").unwrap()
});
static TRANSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Transition(?:-in|-out)?\s+plan").unwrap());

fn infer_special_provisions(text: &str) -> Extracted<Vec<String>> {
    let mut provisions = Vec::new();

    if let Some(caps) = KEY_PERSONNEL.captures(text) {
        provisions.push(format!("Key Personnel: {}", caps[1].trim()));
    }
    if EVMS.is_match(text) {
        provisions.push("Earned Value Management System (EVMS) required".to_string());
    }
    if GFE.is_match(text) {
        provisions.push("Government-Furnished Equipment (GFE) provided".to_string());
    }
    if DEVSECOPS.is_match(text) {
        provisions.push("DevSecOps practices required".to_string());
    }
    if let Some(m) = STATUS_REPORTS.find(text) {
        provisions.push(normalize_whitespace(m.as_str()));
    }
    if OCI.is_match(text) {
        provisions.push("Organizational Conflict of Interest (OCI) provisions apply".to_string());
    }
    if TRANSITION.is_match(text) {
        provisions.push("Transition plan required".to_string());
    }

    if provisions.is_empty() {
        Extracted::absent()
    } else {
        Extracted::found(provisions, HEURISTIC_CONFIDENCE, String::new())
    }
}

/// Domain keyword vocabularies. Highest total hit count wins; all-zero means
/// no classification.
const DOMAIN_VOCABULARIES: &[(Domain, &[&str])] = &[
    (
        Domain::Cybersecurity,
        &[
            "cybersecurity",
            "security operations",
            "penetration test",
            "vulnerability",
            "incident response",
            "zero trust",
            "threat intelligence",
            "soc ",
        ],
    ),
    (
        Domain::ItModernization,
        &[
            "cloud migration",
            "modernization",
            "legacy system",
            "software development",
            "devsecops",
            "data center",
            "digital transformation",
        ],
    ),
    (
        Domain::Engineering,
        &[
            "systems engineering",
            "hardware",
            "integration",
            "technical services",
            "prototyping",
            "test and evaluation",
            "manufacturing",
        ],
    ),
    (
        Domain::Consulting,
        &[
            "advisory",
            "consulting",
            "program management",
            "strategic planning",
            "analysis support",
            "staff augmentation",
            "training services",
        ],
    ),
];

fn infer_domain(text: &str) -> Extracted<Domain> {
    let lower = text.to_lowercase();
    let mut best: Option<(Domain, usize)> = None;

    for (domain, vocabulary) in DOMAIN_VOCABULARIES {
        let score: usize = vocabulary
            .iter()
            .map(|kw| lower.matches(kw).count())
            .sum();
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((*domain, score));
        }
    }

    match best {
        Some((domain, _)) => Extracted::found(domain, HEURISTIC_CONFIDENCE, String::new()),
        None => Extracted::absent(),
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` bytes, clamped to a character boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============ Generative strategy ============

/// Calls a messages API and parses a strict-JSON reply. Falls back to the
/// heuristic strategy on any failure, recording the error.
pub struct GenerativeStrategy {
    model: String,
    url: String,
    timeout: Duration,
    max_retries: u32,
    max_prompt_chars: usize,
}

#[async_trait]
impl NarrativeStrategy for GenerativeStrategy {
    async fn infer(&self, text: &str) -> NarrativeFields {
        match self.infer_generative(text).await {
            Ok(fields) => fields,
            Err(err) => {
                // Transparent downgrade: heuristic output at heuristic
                // confidence, never a hard failure.
                let mut fields = infer_heuristic(text);
                fields.provider_error = Some(err.to_string());
                fields
            }
        }
    }

    fn name(&self) -> &str {
        "generative"
    }
}

impl GenerativeStrategy {
    async fn infer_generative(&self, text: &str) -> Result<NarrativeFields> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY not set"))?;

        let prompt = build_prompt(truncate_chars(text, self.max_prompt_chars));
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 1024,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&self.url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let reply = json["content"][0]["text"]
                            .as_str()
                            .ok_or_else(|| anyhow!("Malformed messages API response"))?;
                        return parse_generative_reply(reply);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("API returned {}", status));
                        continue;
                    }

                    bail!("API returned {}", status);
                }
                Err(err) => {
                    last_err = Some(anyhow!("Request failed: {}", err));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("All retries exhausted")))
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "Analyze the following federal contract text and respond with ONLY a JSON object \
         (no prose, no code fences) with these keys:\n\
         - \"scope_of_work\": string, 1-3 sentence summary of the work\n\
         - \"security_requirements\": array of strings (clearances, compliance frameworks)\n\
         - \"special_provisions\": array of strings (key personnel, reporting, GFE, etc.)\n\
         - \"domain\": one of \"cybersecurity\", \"it_modernization\", \"engineering\", \
         \"consulting\", or null\n\n\
         Contract text:\n{text}"
    )
}

/// Parse the model reply into narrative fields at generative confidence.
/// Tolerates a fenced code block around the JSON.
fn parse_generative_reply(reply: &str) -> Result<NarrativeFields> {
    let cleaned = strip_code_fences(reply);
    let json: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|err| anyhow!("Reply was not valid JSON: {}", err))?;

    let mut fields = NarrativeFields::default();

    if let Some(scope) = json["scope_of_work"].as_str() {
        if !scope.trim().is_empty() {
            fields.scope_of_work = Extracted::found(
                scope.trim().to_string(),
                GENERATIVE_CONFIDENCE,
                String::new(),
            );
        }
    }
    if let Some(reqs) = json["security_requirements"].as_array() {
        let reqs: Vec<String> = reqs
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !reqs.is_empty() {
            fields.security_requirements =
                Extracted::found(reqs, GENERATIVE_CONFIDENCE, String::new());
        }
    }
    if let Some(provisions) = json["special_provisions"].as_array() {
        let provisions: Vec<String> = provisions
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !provisions.is_empty() {
            fields.special_provisions =
                Extracted::found(provisions, GENERATIVE_CONFIDENCE, String::new());
        }
    }
    if let Some(domain) = json["domain"].as_str() {
        if let Ok(domain) = serde_json::from_value::<Domain>(serde_json::json!(domain)) {
            fields.domain = Extracted::found(domain, GENERATIVE_CONFIDENCE, String::new());
        }
    }

    Ok(fields)
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line (which may carry a language tag) and the closing fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim().trim_end_matches("```").trim()
}
