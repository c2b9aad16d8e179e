//! Tree-sitter grammar preparation.
//!
//! Reads a `languages.toml`-style grammar manifest, materializes each
//! grammar's source tree and highlight query on disk, and generates the two
//! sources a consuming crate needs to compile and look the grammars up: a
//! `build.rs` and a registry module. Both are rendered from one
//! [`GrammarSet`], so they always agree on which grammars exist.
//!
//! The stages run through [`Pipeline`]; each is also usable on its own.

#![deny(clippy::print_stderr)]
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub mod codegen;
pub mod config;
pub mod fetch;
pub mod http;
pub mod manifest;
pub mod pipeline;
pub mod pool;
pub mod query;
mod utils;
pub mod validity;

pub use codegen::{CodegenOptions, GeneratedArtifacts, GrammarEntry, GrammarSet, generate};
pub use config::{PrepConfig, Transport};
pub use fetch::{FetchError, FetchStatus, GrammarFetcher};
pub use http::{HttpClient, HttpResponse, ReqwestClient, TransportError};
pub use manifest::{GrammarSpec, Manifest, load_manifest, parse_manifest};
pub use pipeline::{Pipeline, PipelineError, RunReport, narrow};
pub use query::{QueryFetcher, QueryOutcome, QueryTier};
pub use utils::write_if_changed;
pub use validity::valid_grammars;
