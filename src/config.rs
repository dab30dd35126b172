use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

/// Where the contract corpus lives on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("./data/documents")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.docx".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Confidence floor below which a pattern result is treated as absent
    /// by the merge stage.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Locality window (characters either side of a DFARS clause match)
    /// scanned for flowdown-indicating phrases. A heuristic, not a protocol
    /// constant.
    #[serde(default = "default_flowdown_window")]
    pub flowdown_window_chars: usize,
    /// Minimum text length for a document to be considered parseable.
    #[serde(default = "default_min_document_chars")]
    pub min_document_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            flowdown_window_chars: default_flowdown_window(),
            min_document_chars: default_min_document_chars(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.5
}
fn default_flowdown_window() -> usize {
    200
}
fn default_min_document_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct NarrativeConfig {
    /// Narrative inference strategy: `"heuristic"` or `"generative"`.
    /// Selection is always explicit — there is no ambient downgrade based
    /// on which credentials happen to be present.
    #[serde(default = "default_narrative_provider")]
    pub provider: String,
    /// Model identifier, required when `provider = "generative"`.
    #[serde(default)]
    pub model: Option<String>,
    /// Endpoint override; defaults to the Anthropic messages API.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Contract text beyond this length is truncated before being sent
    /// to the generative service.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            provider: default_narrative_provider(),
            model: None,
            url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_narrative_provider() -> String {
    "heuristic".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_max_prompt_chars() -> usize {
    8000
}

impl NarrativeConfig {
    pub fn is_generative(&self) -> bool {
        self.provider == "generative"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if !(0.0..=1.0).contains(&config.extraction.min_confidence) {
        anyhow::bail!("extraction.min_confidence must be in [0.0, 1.0]");
    }

    if config.extraction.flowdown_window_chars == 0 {
        anyhow::bail!("extraction.flowdown_window_chars must be > 0");
    }

    match config.narrative.provider.as_str() {
        "heuristic" => {}
        "generative" => {
            if config.narrative.model.is_none() {
                anyhow::bail!("narrative.model must be specified when provider is 'generative'");
            }
        }
        other => anyhow::bail!(
            "Unknown narrative provider: '{}'. Must be heuristic or generative.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.extraction.min_confidence, 0.5);
        assert_eq!(config.extraction.flowdown_window_chars, 200);
        assert_eq!(config.narrative.provider, "heuristic");
        assert!(!config.narrative.is_generative());
    }

    #[test]
    fn rejects_unknown_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conq.toml");
        std::fs::write(&path, "[narrative]\nprovider = \"oracle\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unknown narrative provider"));
    }

    #[test]
    fn generative_requires_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conq.toml");
        std::fs::write(&path, "[narrative]\nprovider = \"generative\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("narrative.model"));
    }

    #[test]
    fn parses_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conq.toml");
        std::fs::write(
            &path,
            r#"
[documents]
root = "./contracts"
include_globs = ["**/*.txt"]

[extraction]
min_confidence = 0.6
flowdown_window_chars = 150

[narrative]
provider = "generative"
model = "claude-sonnet-4-5"
timeout_secs = 10
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.extraction.min_confidence, 0.6);
        assert_eq!(config.extraction.flowdown_window_chars, 150);
        assert_eq!(config.narrative.timeout_secs, 10);
        assert!(config.narrative.is_generative());
    }
}
