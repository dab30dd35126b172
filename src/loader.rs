//! Corpus directory scanner.
//!
//! Walks the configured documents root and returns every contract file
//! matching the include globs. Text documents are read eagerly; .docx files
//! are returned as raw bytes for the hybrid extractor to handle.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::config::DocumentsConfig;

/// One discovered corpus file.
#[derive(Debug, Clone)]
pub struct CorpusDocument {
    pub path: PathBuf,
    /// Path relative to the corpus root, used as a stable identifier.
    pub relative_path: String,
    pub kind: DocumentKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    /// Canonical-layout contract text, read into memory.
    Text(String),
    /// Word document, raw bytes for the extractor.
    Docx(Vec<u8>),
}

/// Scan the corpus root for contract documents, deterministically ordered by
/// relative path.
pub fn scan_documents(config: &DocumentsConfig) -> Result<Vec<CorpusDocument>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Documents root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("docx") => DocumentKind::Docx(std::fs::read(path)?),
            _ => DocumentKind::Text(std::fs::read_to_string(path)?),
        };

        documents.push(CorpusDocument {
            path: path.to_path_buf(),
            relative_path: rel_str,
            kind,
        });
    }

    documents.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_respects_include_and_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "contract a").unwrap();
        std::fs::write(dir.path().join("b.docx"), b"not really a docx").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("drafts/c.txt"), "contract c").unwrap();

        let config = DocumentsConfig {
            root: dir.path().to_path_buf(),
            include_globs: vec!["**/*.txt".to_string(), "**/*.docx".to_string()],
            exclude_globs: vec!["drafts/**".to_string()],
        };

        let documents = scan_documents(&config).unwrap();
        let names: Vec<&str> = documents.iter().map(|d| d.relative_path.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.docx"]);
        assert!(matches!(&documents[0].kind, DocumentKind::Text(t) if t == "contract a"));
        assert!(matches!(&documents[1].kind, DocumentKind::Docx(_)));
    }

    #[test]
    fn missing_root_is_an_error() {
        let config = DocumentsConfig {
            root: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        let err = scan_documents(&config).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
