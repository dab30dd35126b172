//! # Contract Harness
//!
//! A clause-aware ingestion and extraction pipeline for federal contract
//! documents.
//!
//! Contract Harness turns uploaded contract files (.docx or canonical-layout
//! .txt) into structured [`models::ContractRecord`]s and retrieval-ready
//! chunks. Structured fields (contract numbers, dollar values, FAR/DFARS
//! clauses, CLINs) are recovered by confidence-scored pattern extractors;
//! prose fields (scope of work, security requirements) go through a pluggable
//! narrative strategy; the merged record is rendered back to a canonical text
//! layout that the chunker splits along contract structure rather than
//! character counts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────┐   ┌──────────┐
//! │  .docx   │──▶│   patterns +   │──▶│  merge   │──▶│  render   │
//! │  parse   │   │   narrative    │   │ +report  │   │ canonical │
//! └──────────┘   └───────────────┘   └─────────┘   └────┬─────┘
//!                                                        │
//!   .txt (already canonical) ───────────────────────────┤
//!                                                        ▼
//!                                                  ┌──────────┐   ┌─────────┐
//!                                                  │ chunker  │──▶│  index  │
//!                                                  └──────────┘   └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! conq validate contract.docx        # can we parse this?
//! conq extract contract.docx        # structured record + report as JSON
//! conq chunk contract.txt           # chunk listing with type stats
//! conq ingest contract.docx         # full pipeline into the memory index
//! conq sync                         # ingest the whole corpus directory
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`docx`] | Word document structural parse |
//! | [`patterns`] | Pattern-based field extractors |
//! | [`narrative`] | Scope/security/provisions inference strategies |
//! | [`merge`] | Hybrid extraction orchestration and defaulting |
//! | [`render`] | Canonical document text renderer |
//! | [`chunker`] | Clause-aware chunking |
//! | [`index`] | Retrieval index boundary and in-memory implementation |
//! | [`upload`] | Upload validation and ingestion pipeline |
//! | [`loader`] | Corpus directory scanning |

pub mod chunker;
pub mod config;
pub mod docx;
pub mod index;
pub mod loader;
pub mod merge;
pub mod models;
pub mod narrative;
pub mod patterns;
pub mod render;
pub mod upload;
