//! Highlight query acquisition.
//!
//! Every grammar ends up with exactly one `<queries_dir>/<name>/highlights.scm`.
//! The file comes from the first [`QueryResolver`] that produces one:
//!
//! 1. [`BundledQueries`]: the grammar tree's own `queries/` directory.
//! 2. [`RuntimeQueries`]: the curated runtime served over HTTPS.
//! 3. [`PlaceholderQuery`]: a comment-only file, so downstream code can
//!    always open the query.
//!
//! A failing tier is logged and skipped. An existing target is never
//! overwritten and no tier is consulted for it.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::http::{HttpClient, TransportError};
use crate::manifest::GrammarSpec;
use crate::utils::{DIAGNOSTIC_LIMIT, truncate};

/// File name of the highlight query.
pub const HIGHLIGHTS_FILE: &str = "highlights.scm";

/// Companion query fetched alongside a runtime highlight query.
pub const INJECTIONS_FILE: &str = "injections.scm";

/// Content written when no tier has a highlight query.
pub const PLACEHOLDER_QUERY: &str = "; No highlights available\n";

/// Curated query runtime used when the config names none.
pub const DEFAULT_RUNTIME_URL: &str =
	"https://raw.githubusercontent.com/helix-editor/helix/master/runtime/queries";

/// Errors raised by a resolver tier, or while writing the resolved files.
#[derive(Debug, Error)]
pub enum QueryError {
	/// The runtime answered with a status other than success or 404.
	#[error("HTTP {status} from {url}")]
	Http {
		/// Response status.
		status: u16,
		/// Requested URL.
		url: String,
	},
	/// The runtime could not be reached.
	#[error("network error: {0}")]
	Network(String),
	/// The runtime request exceeded the per-task timeout.
	#[error("timed out")]
	Timeout,
	/// Reading bundled queries or writing the target failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl QueryError {
	/// Display form truncated for the run summary.
	pub fn diagnostic(&self) -> String {
		truncate(&self.to_string(), DIAGNOSTIC_LIMIT)
	}
}

impl From<TransportError> for QueryError {
	fn from(error: TransportError) -> Self {
		match error {
			TransportError::Timeout => Self::Timeout,
			TransportError::Network(message) => Self::Network(message),
		}
	}
}

/// Which tier produced a grammar's highlight query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryTier {
	/// Copied from the grammar's own `queries/` directory.
	Bundled,
	/// Downloaded from the query runtime.
	Runtime,
	/// Comment-only placeholder.
	Placeholder,
}

impl fmt::Display for QueryTier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Bundled => "bundled",
			Self::Runtime => "runtime",
			Self::Placeholder => "placeholder",
		})
	}
}

/// Result of fetching one grammar's query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
	/// The target file already existed.
	AlreadyPresent,
	/// A tier produced the query and it was written.
	Resolved(QueryTier),
	/// Every configured tier declined. Only possible without a placeholder tier.
	Unresolved,
}

/// Query files produced by a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFiles {
	/// Contents of `highlights.scm`.
	pub highlights: Vec<u8>,
	/// Sibling query files, as paths relative to the query directory.
	pub companions: Vec<(PathBuf, Vec<u8>)>,
}

impl QueryFiles {
	/// Highlights only, without companions.
	pub fn highlights(contents: impl Into<Vec<u8>>) -> Self {
		Self {
			highlights: contents.into(),
			companions: Vec::new(),
		}
	}
}

/// One query source tier.
pub trait QueryResolver: Send + Sync {
	/// Tier reported when this resolver wins.
	fn tier(&self) -> QueryTier;

	/// Returns the grammar's query files, or `None` if this tier has none.
	fn resolve(&self, spec: &GrammarSpec) -> Result<Option<QueryFiles>, QueryError>;
}

/// Reads queries shipped inside the fetched grammar tree.
#[derive(Debug, Clone)]
pub struct BundledQueries {
	grammars_dir: PathBuf,
}

impl BundledQueries {
	/// Looks for trees under `grammars_dir`.
	pub fn new(grammars_dir: impl Into<PathBuf>) -> Self {
		Self {
			grammars_dir: grammars_dir.into(),
		}
	}

	/// `<tree>/queries` first, then `<tree>/<subpath>/queries`.
	fn candidates(&self, spec: &GrammarSpec) -> Vec<PathBuf> {
		let tree = self.grammars_dir.join(&spec.name);
		let mut dirs = vec![tree.join("queries")];
		if let Some(subpath) = spec.subpath() {
			dirs.push(tree.join(subpath).join("queries"));
		}
		dirs
	}
}

impl QueryResolver for BundledQueries {
	fn tier(&self) -> QueryTier {
		QueryTier::Bundled
	}

	fn resolve(&self, spec: &GrammarSpec) -> Result<Option<QueryFiles>, QueryError> {
		let Some(dir) = self
			.candidates(spec)
			.into_iter()
			.find(|dir| dir.join(HIGHLIGHTS_FILE).is_file())
		else {
			return Ok(None);
		};

		let highlights = fs::read(dir.join(HIGHLIGHTS_FILE))?;
		let mut companions = Vec::new();
		for entry in WalkDir::new(&dir).sort_by_file_name() {
			let entry = entry.map_err(std::io::Error::from)?;
			if !entry.file_type().is_file() {
				continue;
			}
			let relative = entry.path().strip_prefix(&dir).map_err(std::io::Error::other)?;
			if relative == Path::new(HIGHLIGHTS_FILE) {
				continue;
			}
			companions.push((relative.to_path_buf(), fs::read(entry.path())?));
		}

		Ok(Some(QueryFiles {
			highlights,
			companions,
		}))
	}
}

/// Downloads queries from the curated runtime.
#[derive(Clone)]
pub struct RuntimeQueries {
	base_url: String,
	client: Arc<dyn HttpClient>,
}

impl RuntimeQueries {
	/// Serves `<base_url>/<name>/<file>`.
	pub fn new(base_url: impl Into<String>, client: Arc<dyn HttpClient>) -> Self {
		Self {
			base_url: base_url.into(),
			client,
		}
	}

	fn url(&self, name: &str, file: &str) -> String {
		format!("{}/{name}/{file}", self.base_url.trim_end_matches('/'))
	}
}

impl QueryResolver for RuntimeQueries {
	fn tier(&self) -> QueryTier {
		QueryTier::Runtime
	}

	fn resolve(&self, spec: &GrammarSpec) -> Result<Option<QueryFiles>, QueryError> {
		let url = self.url(&spec.name, HIGHLIGHTS_FILE);
		let response = self.client.get(&url)?;
		if response.status == 404 {
			debug!(grammar = %spec.name, "Runtime has no highlight query");
			return Ok(None);
		}
		if !response.is_success() {
			return Err(QueryError::Http {
				status: response.status,
				url,
			});
		}

		let mut files = QueryFiles::highlights(response.body);

		// Optional companion; any failure leaves it out.
		match self.client.get(&self.url(&spec.name, INJECTIONS_FILE)) {
			Ok(injections) if injections.is_success() => {
				files.companions.push((PathBuf::from(INJECTIONS_FILE), injections.body));
			}
			Ok(_) => {}
			Err(error) => debug!(grammar = %spec.name, %error, "Skipping runtime injections"),
		}

		Ok(Some(files))
	}
}

/// Always resolves to [`PLACEHOLDER_QUERY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderQuery;

impl QueryResolver for PlaceholderQuery {
	fn tier(&self) -> QueryTier {
		QueryTier::Placeholder
	}

	fn resolve(&self, _spec: &GrammarSpec) -> Result<Option<QueryFiles>, QueryError> {
		Ok(Some(QueryFiles::highlights(PLACEHOLDER_QUERY)))
	}
}

/// Materializes highlight queries under one root using an ordered tier list.
pub struct QueryFetcher {
	queries_dir: PathBuf,
	resolvers: Vec<Box<dyn QueryResolver>>,
}

impl QueryFetcher {
	/// Creates a fetcher consulting `resolvers` in order.
	pub fn new(queries_dir: impl Into<PathBuf>, resolvers: Vec<Box<dyn QueryResolver>>) -> Self {
		Self {
			queries_dir: queries_dir.into(),
			resolvers,
		}
	}

	/// Bundled, then runtime, then placeholder.
	pub fn standard(
		queries_dir: impl Into<PathBuf>,
		grammars_dir: impl Into<PathBuf>,
		runtime_url: impl Into<String>,
		client: Arc<dyn HttpClient>,
	) -> Self {
		Self::new(
			queries_dir,
			vec![
				Box::new(BundledQueries::new(grammars_dir)),
				Box::new(RuntimeQueries::new(runtime_url, client)),
				Box::new(PlaceholderQuery),
			],
		)
	}

	/// Where `spec`'s highlight query lives.
	pub fn target_file(&self, spec: &GrammarSpec) -> PathBuf {
		self.queries_dir.join(&spec.name).join(HIGHLIGHTS_FILE)
	}

	/// Resolves and writes `spec`'s highlight query unless it already exists.
	///
	/// Tier failures degrade to the next tier. The only error is failing to
	/// write the winning tier's files.
	pub fn fetch(&self, spec: &GrammarSpec) -> Result<QueryOutcome, QueryError> {
		let target = self.target_file(spec);
		if target.exists() {
			debug!(grammar = %spec.name, "Highlight query already present");
			return Ok(QueryOutcome::AlreadyPresent);
		}

		for resolver in &self.resolvers {
			let tier = resolver.tier();
			match resolver.resolve(spec) {
				Ok(Some(files)) => {
					write_query_files(&target, &files)?;
					info!(grammar = %spec.name, %tier, "Wrote highlight query");
					return Ok(QueryOutcome::Resolved(tier));
				}
				Ok(None) => {}
				Err(error) => {
					warn!(grammar = %spec.name, %tier, %error, "Query tier failed, trying next");
				}
			}
		}

		warn!(grammar = %spec.name, "No query tier produced a highlight query");
		Ok(QueryOutcome::Unresolved)
	}
}

/// Writes companions first (never replacing existing files), then
/// `highlights.scm` through a temporary file so it only appears complete.
fn write_query_files(target: &Path, files: &QueryFiles) -> Result<(), QueryError> {
	let Some(dir) = target.parent() else {
		return Err(std::io::Error::other(format!("{} has no parent", target.display())).into());
	};
	fs::create_dir_all(dir)?;

	for (relative, contents) in &files.companions {
		let path = dir.join(relative);
		if path.exists() {
			continue;
		}
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(&path, contents)?;
	}

	let mut staged = tempfile::NamedTempFile::new_in(dir)?;
	staged.write_all(&files.highlights)?;
	staged.persist(target).map_err(|e| e.error)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn spec(name: &str, subpath: &str) -> GrammarSpec {
		GrammarSpec {
			name: name.into(),
			source_url: format!("https://github.com/org/{name}"),
			revision: "main".into(),
			subpath: subpath.into(),
		}
	}

	struct Failing;

	impl QueryResolver for Failing {
		fn tier(&self) -> QueryTier {
			QueryTier::Runtime
		}

		fn resolve(&self, _spec: &GrammarSpec) -> Result<Option<QueryFiles>, QueryError> {
			Err(QueryError::Network("connection reset".into()))
		}
	}

	struct Counting(Arc<AtomicUsize>);

	impl QueryResolver for Counting {
		fn tier(&self) -> QueryTier {
			QueryTier::Bundled
		}

		fn resolve(&self, _spec: &GrammarSpec) -> Result<Option<QueryFiles>, QueryError> {
			self.0.fetch_add(1, Ordering::SeqCst);
			Ok(None)
		}
	}

	#[test]
	fn bundled_queries_copy_companions() {
		let dir = tempfile::tempdir().unwrap();
		let grammars = dir.path().join("grammars");
		let queries = grammars.join("rust/queries");
		fs::create_dir_all(&queries).unwrap();
		fs::write(queries.join(HIGHLIGHTS_FILE), "(identifier) @variable").unwrap();
		fs::write(queries.join("locals.scm"), "(block) @local.scope").unwrap();

		let fetcher = QueryFetcher::new(
			dir.path().join("queries"),
			vec![Box::new(BundledQueries::new(&grammars)), Box::new(PlaceholderQuery)],
		);
		let rust = spec("rust", "");

		assert_eq!(fetcher.fetch(&rust).unwrap(), QueryOutcome::Resolved(QueryTier::Bundled));
		let out = dir.path().join("queries/rust");
		let written = fs::read_to_string(out.join(HIGHLIGHTS_FILE)).unwrap();
		assert_eq!(written, "(identifier) @variable");
		assert!(out.join("locals.scm").is_file());
	}

	#[test]
	fn bundled_queries_under_subpath() {
		let dir = tempfile::tempdir().unwrap();
		let queries = dir.path().join("typescript/tsx/queries");
		fs::create_dir_all(&queries).unwrap();
		fs::write(queries.join(HIGHLIGHTS_FILE), "tsx").unwrap();

		let files = BundledQueries::new(dir.path())
			.resolve(&spec("typescript", "tsx"))
			.unwrap()
			.expect("subpath queries found");
		assert_eq!(files.highlights, b"tsx");
	}

	#[test]
	fn failing_tier_degrades_to_placeholder() {
		let dir = tempfile::tempdir().unwrap();
		let tiers: Vec<Box<dyn QueryResolver>> = vec![Box::new(Failing), Box::new(PlaceholderQuery)];
		let fetcher = QueryFetcher::new(dir.path(), tiers);
		let demo = spec("demo", "");

		assert_eq!(fetcher.fetch(&demo).unwrap(), QueryOutcome::Resolved(QueryTier::Placeholder));
		assert_eq!(fs::read_to_string(fetcher.target_file(&demo)).unwrap(), PLACEHOLDER_QUERY);
	}

	#[test]
	fn existing_target_consults_no_tier() {
		let dir = tempfile::tempdir().unwrap();
		let calls = Arc::new(AtomicUsize::new(0));
		let fetcher = QueryFetcher::new(
			dir.path(),
			vec![Box::new(Counting(calls.clone())), Box::new(PlaceholderQuery)],
		);
		let demo = spec("demo", "");
		fs::create_dir_all(dir.path().join("demo")).unwrap();
		fs::write(fetcher.target_file(&demo), "; mine\n").unwrap();

		assert_eq!(fetcher.fetch(&demo).unwrap(), QueryOutcome::AlreadyPresent);
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert_eq!(fs::read_to_string(fetcher.target_file(&demo)).unwrap(), "; mine\n");
	}

	#[test]
	fn no_placeholder_tier_leaves_query_unresolved() {
		let dir = tempfile::tempdir().unwrap();
		let fetcher = QueryFetcher::new(dir.path(), vec![Box::new(Failing)]);
		let demo = spec("demo", "");

		assert_eq!(fetcher.fetch(&demo).unwrap(), QueryOutcome::Unresolved);
		assert!(!fetcher.target_file(&demo).exists());
	}

	#[test]
	fn runtime_tier_against_real_client() {
		let mut server = mockito::Server::new();
		let _highlights = server
			.mock("GET", "/rust/highlights.scm")
			.with_status(200)
			.with_body("(macro_invocation) @function.macro")
			.create();
		let _injections = server
			.mock("GET", "/rust/injections.scm")
			.with_status(200)
			.with_body("(line_comment) @injection.content")
			.create();
		let _missing = server.mock("GET", "/zig/highlights.scm").with_status(404).create();
		let _broken = server.mock("GET", "/nim/highlights.scm").with_status(500).create();

		let client = crate::http::ReqwestClient::new(std::time::Duration::from_secs(5)).unwrap();
		let runtime = RuntimeQueries::new(format!("{}/", server.url()), Arc::new(client));

		let files = runtime.resolve(&spec("rust", "")).unwrap().expect("rust query served");
		assert_eq!(files.highlights, b"(macro_invocation) @function.macro");
		assert_eq!(files.companions, vec![(
			PathBuf::from(INJECTIONS_FILE),
			b"(line_comment) @injection.content".to_vec()
		)]);

		assert_eq!(runtime.resolve(&spec("zig", "")).unwrap(), None);
		assert!(matches!(
			runtime.resolve(&spec("nim", "")),
			Err(QueryError::Http { status: 500, .. })
		));
	}
}
