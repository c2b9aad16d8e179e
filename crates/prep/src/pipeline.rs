//! Stage orchestration.
//!
//! A run parses the manifest, applies exclusions, fetches grammar trees, then
//! highlight queries, recomputes the valid set from disk and writes the
//! generated sources plus `grammar_info.json`. Per-grammar failures are
//! collected into a [`RunReport`]; only configuration, manifest and output
//! write failures abort a run.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::codegen::{GrammarSet, generate};
use crate::config::{ConfigError, PrepConfig};
use crate::fetch::{FetchStatus, GrammarFetcher};
use crate::http::HttpClient;
use crate::manifest::{GrammarSpec, Manifest, ManifestError, load_manifest};
use crate::pool::{ProgressCallback, run_bounded};
use crate::query::{QueryFetcher, QueryOutcome, QueryTier};
use crate::utils::write_all_if_changed;
use crate::validity::valid_grammars;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
	/// The configuration is unusable.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The manifest could not be read.
	#[error(transparent)]
	Manifest(#[from] ManifestError),
	/// A generated artifact or the grammar record could not be written.
	#[error("failed to write {path}: {error}")]
	Write {
		/// Output path.
		path: PathBuf,
		/// The underlying I/O error.
		#[source]
		error: std::io::Error,
	},
	/// The grammar record could not be serialized.
	#[error("failed to serialize grammar record: {0}")]
	Record(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// One entry of `grammar_info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarInfo {
	/// Directory holding `src/` inside the grammar tree.
	pub subpath: String,
}

/// Outcome of the grammar fetch stage, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
	/// Per-grammar status or truncated failure reason.
	pub outcomes: Vec<(String, std::result::Result<FetchStatus, String>)>,
}

impl FetchReport {
	fn count(&self, status: FetchStatus) -> usize {
		self.outcomes.iter().filter(|(_, o)| *o == Ok(status)).count()
	}

	/// Grammars whose fetch failed, with reasons.
	pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
		self.outcomes
			.iter()
			.filter_map(|(name, o)| o.as_ref().err().map(|e| (name.as_str(), e.as_str())))
	}
}

impl fmt::Display for FetchReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(
			f,
			"grammars: {} fetched, {} already present, {} failed",
			self.count(FetchStatus::Fetched),
			self.count(FetchStatus::AlreadyPresent),
			self.failures().count()
		)?;
		for (name, reason) in self.failures() {
			writeln!(f, "  failed {name}: {reason}")?;
		}
		Ok(())
	}
}

/// Outcome of the query fetch stage, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryReport {
	/// Per-grammar outcome or truncated failure reason.
	pub outcomes: Vec<(String, std::result::Result<QueryOutcome, String>)>,
}

impl QueryReport {
	fn count(&self, outcome: QueryOutcome) -> usize {
		self.outcomes.iter().filter(|(_, o)| *o == Ok(outcome)).count()
	}

	/// Grammars whose query could not be written, with reasons.
	pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
		self.outcomes
			.iter()
			.filter_map(|(name, o)| o.as_ref().err().map(|e| (name.as_str(), e.as_str())))
	}
}

impl fmt::Display for QueryReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(
			f,
			"queries: {} bundled, {} runtime, {} placeholder, {} already present",
			self.count(QueryOutcome::Resolved(QueryTier::Bundled)),
			self.count(QueryOutcome::Resolved(QueryTier::Runtime)),
			self.count(QueryOutcome::Resolved(QueryTier::Placeholder)),
			self.count(QueryOutcome::AlreadyPresent)
		)?;
		let unresolved = self.count(QueryOutcome::Unresolved);
		if unresolved > 0 {
			writeln!(f, "  {unresolved} unresolved")?;
		}
		for (name, reason) in self.failures() {
			writeln!(f, "  failed {name}: {reason}")?;
		}
		Ok(())
	}
}

/// Outcome of validity filtering and generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
	/// Grammars emitted into both artifacts, sorted.
	pub valid: Vec<String>,
	/// Manifest grammars without `parser.c`, sorted.
	pub invalid: Vec<String>,
	/// Valid grammars missing from the previous record.
	pub added: Vec<String>,
	/// Grammars in the previous record that are no longer valid.
	pub removed: Vec<String>,
	/// Whether the build plan's contents changed.
	pub build_plan_written: bool,
	/// Whether the registry's contents changed.
	pub registry_written: bool,
}

impl fmt::Display for GenerationReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "generated: {} valid, {} invalid", self.valid.len(), self.invalid.len())?;
		if !self.invalid.is_empty() {
			writeln!(f, "  invalid (no parser.c): {}", self.invalid.join(", "))?;
		}
		if !self.added.is_empty() {
			writeln!(f, "  added: {}", self.added.join(", "))?;
		}
		if !self.removed.is_empty() {
			writeln!(f, "  removed: {}", self.removed.join(", "))?;
		}
		let changed = |written| if written { "updated" } else { "unchanged" };
		writeln!(
			f,
			"  build plan {}, registry {}",
			changed(self.build_plan_written),
			changed(self.registry_written)
		)
	}
}

/// Summary of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
	/// Grammars removed by the exclusion set.
	pub excluded: Vec<String>,
	/// Grammar fetch stage.
	pub fetch: FetchReport,
	/// Query fetch stage.
	pub queries: QueryReport,
	/// Generation stage.
	pub generation: GenerationReport,
}

impl RunReport {
	/// True when no grammar or query failed.
	pub fn is_clean(&self) -> bool {
		self.fetch.failures().next().is_none() && self.queries.failures().next().is_none()
	}
}

impl fmt::Display for RunReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if !self.excluded.is_empty() {
			writeln!(f, "excluded: {}", self.excluded.join(", "))?;
		}
		write!(f, "{}{}{}", self.fetch, self.queries, self.generation)
	}
}

/// Runs the preparation stages against one configuration.
pub struct Pipeline {
	config: PrepConfig,
	client: Arc<dyn HttpClient>,
	progress: Option<ProgressCallback>,
}

impl Pipeline {
	/// Validates `config` and creates a pipeline using `client` for all HTTP.
	pub fn new(config: PrepConfig, client: Arc<dyn HttpClient>) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			client,
			progress: None,
		})
	}

	/// Reports each grammar as its fetch or query task completes.
	pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
		self.progress = Some(progress);
		self
	}

	/// The configuration in use.
	pub fn config(&self) -> &PrepConfig {
		&self.config
	}

	/// Loads the manifest and applies the exclusion set.
	///
	/// Returns the manifest and the names that were excluded.
	pub fn load_manifest(&self) -> Result<(Manifest, Vec<String>)> {
		let mut manifest = load_manifest(&self.config.manifest)?;
		let parsed = manifest.len();
		let excluded = manifest.exclude(&self.config.exclude);
		info!(parsed, excluded = excluded.len(), "Loaded grammar manifest");
		Ok((manifest, excluded))
	}

	/// Fetches every grammar tree not yet present.
	pub fn fetch_grammars(&self, manifest: &Manifest) -> FetchReport {
		let fetcher = GrammarFetcher::new(&self.config.grammars_dir, self.client.clone())
			.with_transport(self.config.transport)
			.with_timeout(self.config.timeout());

		let results = run_bounded(
			specs(manifest),
			self.config.jobs,
			|spec| fetcher.fetch(spec),
			|spec, result| {
				if let Err(error) = result {
					warn!(grammar = %spec.name, %error, "Grammar fetch failed");
				}
				self.report_progress(&spec.name, match result {
					Ok(FetchStatus::AlreadyPresent) => "already present",
					Ok(FetchStatus::Fetched) => "fetched",
					Err(_) => "error",
				});
			},
		);

		let mut outcomes: Vec<_> = results
			.into_iter()
			.map(|(spec, result)| (spec.name, result.map_err(|e| e.diagnostic())))
			.collect();
		outcomes.sort_by(|a, b| a.0.cmp(&b.0));
		FetchReport { outcomes }
	}

	/// Materializes a highlight query for every grammar.
	pub fn fetch_queries(&self, manifest: &Manifest) -> QueryReport {
		let fetcher = QueryFetcher::standard(
			&self.config.queries_dir,
			&self.config.grammars_dir,
			self.config.runtime_url.as_str(),
			self.client.clone(),
		);

		let results = run_bounded(
			specs(manifest),
			self.config.jobs,
			|spec| fetcher.fetch(spec),
			|spec, result| {
				if let Err(error) = result {
					warn!(grammar = %spec.name, %error, "Writing highlight query failed");
				}
				self.report_progress(&spec.name, match result {
					Ok(QueryOutcome::AlreadyPresent) => "already present",
					Ok(QueryOutcome::Resolved(QueryTier::Bundled)) => "bundled",
					Ok(QueryOutcome::Resolved(QueryTier::Runtime)) => "runtime",
					Ok(QueryOutcome::Resolved(QueryTier::Placeholder)) => "placeholder",
					Ok(QueryOutcome::Unresolved) => "unresolved",
					Err(_) => "error",
				});
			},
		);

		let mut outcomes: Vec<_> = results
			.into_iter()
			.map(|(spec, result)| (spec.name, result.map_err(|e| e.diagnostic())))
			.collect();
		outcomes.sort_by(|a, b| a.0.cmp(&b.0));
		QueryReport { outcomes }
	}

	/// Recomputes the valid set from disk and writes both artifacts and the record.
	///
	/// The three files are replaced together or not at all. Files whose contents
	/// would not change are left untouched.
	pub fn generate(&self, manifest: &Manifest) -> Result<GenerationReport> {
		let set = valid_grammars(&self.config.grammars_dir, manifest);
		let artifacts = generate(&set, &self.config.codegen);

		let previous = read_record(&self.config.grammar_info);
		let record = grammar_record(&set);
		let json = serde_json::to_string_pretty(&record)? + "\n";

		let written = write_all_if_changed(&[
			(self.config.build_plan.as_path(), artifacts.build_plan.as_str()),
			(self.config.registry.as_path(), artifacts.registry.as_str()),
			(self.config.grammar_info.as_path(), json.as_str()),
		])
		.map_err(|failure| PipelineError::Write {
			path: failure.path,
			error: failure.error,
		})?;
		let (build_plan_written, registry_written) = (written[0], written[1]);

		let valid: Vec<String> = set.names().into_iter().map(String::from).collect();
		let mut invalid: Vec<String> = manifest
			.iter()
			.filter(|spec| !set.contains(&spec.name))
			.map(|spec| spec.name.clone())
			.collect();
		invalid.sort();

		let report = GenerationReport {
			added: previous.as_ref().map_or_else(Vec::new, |prev| {
				record.keys().filter(|name| !prev.contains_key(*name)).cloned().collect()
			}),
			removed: previous.as_ref().map_or_else(Vec::new, |prev| {
				prev.keys().filter(|name| !record.contains_key(*name)).cloned().collect()
			}),
			valid,
			invalid,
			build_plan_written,
			registry_written,
		};
		info!(
			valid = report.valid.len(),
			invalid = report.invalid.len(),
			build_plan_written,
			registry_written,
			"Generated grammar sources"
		);
		Ok(report)
	}

	/// Runs every stage.
	///
	/// A non-empty `only` narrows fetching to those grammars. Generation always
	/// covers the whole post-exclusion manifest so grammars already on disk stay
	/// in the artifacts.
	pub fn run(&self, only: &[String]) -> Result<RunReport> {
		let (manifest, excluded) = self.load_manifest()?;
		let targets = narrow(&manifest, only);

		let fetch = self.fetch_grammars(&targets);
		let queries = self.fetch_queries(&targets);
		let generation = self.generate(&manifest)?;

		Ok(RunReport {
			excluded,
			fetch,
			queries,
			generation,
		})
	}

	fn report_progress(&self, grammar: &str, status: &str) {
		if let Some(progress) = &self.progress {
			progress(grammar, status);
		}
	}
}

/// `manifest` restricted to `only`, or all of it when `only` is empty.
pub fn narrow(manifest: &Manifest, only: &[String]) -> Manifest {
	let mut targets = manifest.clone();
	if !only.is_empty() {
		targets.retain_only(only);
	}
	targets
}

fn specs(manifest: &Manifest) -> Vec<GrammarSpec> {
	manifest.iter().cloned().collect()
}

fn grammar_record(set: &GrammarSet) -> BTreeMap<String, GrammarInfo> {
	set.iter()
		.map(|entry| {
			(entry.name.clone(), GrammarInfo {
				subpath: entry.subpath.clone(),
			})
		})
		.collect()
}

/// Previous record, or `None` if absent or unreadable.
fn read_record(path: &Path) -> Option<BTreeMap<String, GrammarInfo>> {
	let text = fs::read_to_string(path).ok()?;
	match serde_json::from_str(&text) {
		Ok(record) => Some(record),
		Err(error) => {
			warn!(path = %path.display(), %error, "Ignoring unreadable grammar record");
			None
		}
	}
}
