//! Grammar source fetching.
//!
//! A grammar is materialized at `<grammars_dir>/<name>`. The directory's
//! existence is the cache key: an existing tree is never re-fetched or checked
//! for freshness. To keep "present" meaning "complete", every transport writes
//! into a temporary sibling directory that is renamed into place only once the
//! tree is fully written; any failure drops (and deletes) the staging directory.

mod archive;
mod git;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use archive::extract_archive;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::Transport;
use crate::http::{HttpClient, TransportError};
use crate::manifest::GrammarSpec;
use crate::utils::{DIAGNOSTIC_LIMIT, truncate};

/// Errors that can occur while fetching one grammar.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The source URL's host has no known archive layout.
	#[error("unsupported git host: {0}")]
	UnsupportedHost(String),
	/// The archive request returned a non-success status.
	#[error("HTTP {status} from {url}")]
	Http {
		/// Response status.
		status: u16,
		/// Requested URL.
		url: String,
	},
	/// Connection or body read failure.
	#[error("network error: {0}")]
	Network(String),
	/// The request or git command exceeded the per-task timeout.
	#[error("timed out")]
	Timeout,
	/// The downloaded archive is corrupt or lacks the expected entries.
	#[error("invalid archive: {0}")]
	Archive(String),
	/// A git command exited unsuccessfully.
	#[error("git command failed: {0}")]
	Git(String),
	/// The fetched tree has no `src` directory where one was expected.
	#[error("no src directory found in {0}")]
	NoSourceDir(String),
	/// Filesystem failure while staging or installing the tree.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl FetchError {
	/// Display form truncated for the run summary.
	pub fn diagnostic(&self) -> String {
		truncate(&self.to_string(), DIAGNOSTIC_LIMIT)
	}
}

impl From<TransportError> for FetchError {
	fn from(error: TransportError) -> Self {
		match error {
			TransportError::Timeout => Self::Timeout,
			TransportError::Network(message) => Self::Network(message),
		}
	}
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Outcome of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
	/// The target tree already existed; nothing was touched.
	AlreadyPresent,
	/// The tree was downloaded and installed.
	Fetched,
}

/// Materializes grammar source trees under one root.
#[derive(Clone)]
pub struct GrammarFetcher {
	grammars_dir: PathBuf,
	client: Arc<dyn HttpClient>,
	transport: Transport,
	timeout: Duration,
}

impl GrammarFetcher {
	/// Creates an archive-transport fetcher rooted at `grammars_dir`.
	pub fn new(grammars_dir: impl Into<PathBuf>, client: Arc<dyn HttpClient>) -> Self {
		Self {
			grammars_dir: grammars_dir.into(),
			client,
			transport: Transport::Archive,
			timeout: Duration::from_secs(120),
		}
	}

	/// Selects the source transport.
	pub fn with_transport(mut self, transport: Transport) -> Self {
		self.transport = transport;
		self
	}

	/// Bounds each git command. HTTP timeouts live in the client.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Where `spec`'s tree lives.
	pub fn target_dir(&self, spec: &GrammarSpec) -> PathBuf {
		self.grammars_dir.join(&spec.name)
	}

	/// Fetches `spec` unless its tree already exists.
	///
	/// # Errors
	///
	/// * [`FetchError::UnsupportedHost`] if the archive transport cannot map the URL.
	/// * [`FetchError::Http`], [`FetchError::Network`], [`FetchError::Timeout`] on download failure.
	/// * [`FetchError::Archive`] / [`FetchError::NoSourceDir`] if the download lacks the grammar.
	pub fn fetch(&self, spec: &GrammarSpec) -> Result<FetchStatus> {
		let target = self.target_dir(spec);
		if target.exists() {
			debug!(grammar = %spec.name, "Grammar already present");
			return Ok(FetchStatus::AlreadyPresent);
		}

		fs::create_dir_all(&self.grammars_dir)?;
		let staging = tempfile::Builder::new()
			.prefix(&format!(".tmp-{}-", spec.name))
			.tempdir_in(&self.grammars_dir)?;

		match self.transport {
			Transport::Archive => self.fetch_archive(spec, staging.path())?,
			Transport::Git => git::fetch_with_git(spec, staging.path(), self.timeout)?,
		}

		// The staging directory no longer exists after the rename; dropping it is a no-op.
		fs::rename(staging.path(), &target)?;
		info!(grammar = %spec.name, path = %target.display(), "Fetched grammar");
		Ok(FetchStatus::Fetched)
	}

	fn fetch_archive(&self, spec: &GrammarSpec, staging: &Path) -> Result<()> {
		let url = archive_url(&spec.source_url, &spec.revision)?;
		info!(grammar = %spec.name, %url, "Downloading grammar archive");

		let response = self.client.get(&url)?;
		if !response.is_success() {
			return Err(FetchError::Http {
				status: response.status,
				url,
			});
		}

		let files = extract_archive(&response.body, spec.subpath(), staging)?;
		debug!(grammar = %spec.name, files, "Extracted grammar archive");
		Ok(())
	}
}

/// Builds the zip archive URL for a repository revision.
///
/// * `https://github.com/<owner>/<repo>` → `.../archive/<rev>.zip`
/// * `https://gitlab.com/<group>/<repo>` → `.../-/archive/<rev>/<repo>-<rev>.zip`
pub fn archive_url(source_url: &str, revision: &str) -> Result<String> {
	let repo = source_url.trim_end_matches('/');
	let repo = repo.strip_suffix(".git").unwrap_or(repo);
	let parsed = Url::parse(repo).map_err(|_| FetchError::UnsupportedHost(source_url.to_owned()))?;

	match parsed.host_str() {
		Some("github.com") => Ok(format!("{repo}/archive/{revision}.zip")),
		Some("gitlab.com") => {
			let name = repo.rsplit('/').next().unwrap_or(repo);
			Ok(format!("{repo}/-/archive/{revision}/{name}-{revision}.zip"))
		}
		_ => Err(FetchError::UnsupportedHost(source_url.to_owned())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::http::HttpResponse;

	#[test]
	fn github_archive_url() {
		assert_eq!(
			archive_url("https://github.com/org/demo", "main").unwrap(),
			"https://github.com/org/demo/archive/main.zip"
		);
		assert_eq!(
			archive_url("https://github.com/org/demo.git/", "v1.2.0").unwrap(),
			"https://github.com/org/demo/archive/v1.2.0.zip"
		);
	}

	#[test]
	fn gitlab_archive_url() {
		assert_eq!(
			archive_url("https://gitlab.com/group/tree-sitter-foo", "abc123").unwrap(),
			"https://gitlab.com/group/tree-sitter-foo/-/archive/abc123/tree-sitter-foo-abc123.zip"
		);
	}

	#[test]
	fn other_hosts_are_unsupported() {
		for url in [
			"https://git.sr.ht/~someone/tree-sitter-x",
			"https://codeberg.org/x/y",
			"git@github.com:org/demo.git",
		] {
			assert!(
				matches!(archive_url(url, "main"), Err(FetchError::UnsupportedHost(_))),
				"{url} should be unsupported"
			);
		}
	}

	struct TimedOut;

	impl HttpClient for TimedOut {
		fn get(&self, _url: &str) -> std::result::Result<HttpResponse, TransportError> {
			Err(TransportError::Timeout)
		}
	}

	#[test]
	fn timed_out_download_leaves_no_tree() {
		let dir = tempfile::tempdir().unwrap();
		let fetcher = GrammarFetcher::new(dir.path(), Arc::new(TimedOut));
		let spec = GrammarSpec {
			name: "slow".into(),
			source_url: "https://github.com/org/slow".into(),
			revision: "main".into(),
			subpath: String::new(),
		};

		assert!(matches!(fetcher.fetch(&spec), Err(FetchError::Timeout)));
		assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
	}

	#[test]
	fn diagnostics_are_truncated() {
		let error = FetchError::Git("x".repeat(500));
		assert_eq!(error.diagnostic().chars().count(), DIAGNOSTIC_LIMIT);
	}
}
