//! Pipeline configuration.
//!
//! Every component receives its roots, limits and exclusion set from
//! [`PrepConfig`]; nothing reads ambient globals. The config is loaded from an
//! optional `tsprep.toml`, every key defaulted:
//!
//! ```toml
//! manifest = "languages.toml"
//! grammars_dir = "grammars"
//! queries_dir = "queries"
//! exclude = ["wren", "gemini"]
//! jobs = 8
//! transport = "archive"
//!
//! [codegen]
//! grammars_dir = "grammars"
//! host_build_hook = "tauri_build::build()"
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, thread};

use serde::Deserialize;
use thiserror::Error;

use crate::codegen::CodegenOptions;
use crate::query::DEFAULT_RUNTIME_URL;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The config file could not be read.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The config file is not valid TOML or has unknown keys.
	#[error("failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value is out of range.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// How grammar sources are retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
	/// Download and extract a host-generated zip archive.
	#[default]
	Archive,
	/// Shallow `git clone`, keeping only `src/` and `queries/`.
	Git,
}

impl std::str::FromStr for Transport {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"archive" => Ok(Self::Archive),
			"git" => Ok(Self::Git),
			other => Err(ConfigError::Invalid(format!(
				"unknown transport '{other}' (expected 'archive' or 'git')"
			))),
		}
	}
}

/// Explicit configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
	/// Grammar manifest (`languages.toml`).
	pub manifest: PathBuf,
	/// Root holding one directory per grammar.
	pub grammars_dir: PathBuf,
	/// Root holding one query directory per grammar.
	pub queries_dir: PathBuf,
	/// Output path of the generated build script.
	pub build_plan: PathBuf,
	/// Output path of the generated registry module.
	pub registry: PathBuf,
	/// Output path of the valid-grammar JSON record.
	pub grammar_info: PathBuf,
	/// Base URL of the remote query runtime.
	pub runtime_url: String,
	/// Grammar names dropped after parsing.
	pub exclude: BTreeSet<String>,
	/// Worker threads per fetch stage.
	pub jobs: usize,
	/// Per-task network timeout in seconds.
	pub timeout_secs: u64,
	/// Grammar source transport.
	pub transport: Transport,
	/// Options baked into the generated sources.
	pub codegen: CodegenOptions,
}

impl Default for PrepConfig {
	fn default() -> Self {
		Self {
			manifest: PathBuf::from("languages.toml"),
			grammars_dir: PathBuf::from("grammars"),
			queries_dir: PathBuf::from("queries"),
			build_plan: PathBuf::from("build.rs"),
			registry: PathBuf::from("src/highlight/registry.rs"),
			grammar_info: PathBuf::from("grammar_info.json"),
			runtime_url: DEFAULT_RUNTIME_URL.to_owned(),
			exclude: ["wren", "gemini"].into_iter().map(String::from).collect(),
			jobs: default_jobs(),
			timeout_secs: 120,
			transport: Transport::Archive,
			codegen: CodegenOptions::default(),
		}
	}
}

/// Available parallelism capped at 8, matching the fetch pool's sweet spot.
fn default_jobs() -> usize {
	thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8)
}

impl PrepConfig {
	/// Parses a config from TOML text.
	pub fn from_toml(text: &str) -> Result<Self> {
		Ok(toml::from_str(text)?)
	}

	/// Loads a config file; relative paths inside it resolve against its directory.
	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let mut config = Self::from_toml(&text)?;
		if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			config.rebase(base);
		}
		Ok(config)
	}

	/// Resolves every relative path against `base`.
	pub fn rebase(&mut self, base: &Path) {
		for path in [
			&mut self.manifest,
			&mut self.grammars_dir,
			&mut self.queries_dir,
			&mut self.build_plan,
			&mut self.registry,
			&mut self.grammar_info,
		] {
			if path.is_relative() {
				*path = base.join(&*path);
			}
		}
	}

	/// Rejects values no run could succeed with.
	pub fn validate(&self) -> Result<()> {
		if self.jobs == 0 {
			return Err(ConfigError::Invalid("jobs must be at least 1".into()));
		}
		if self.timeout_secs == 0 {
			return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
		}
		if self.runtime_url.is_empty() {
			return Err(ConfigError::Invalid("runtime_url must not be empty".into()));
		}
		Ok(())
	}

	/// Per-task network timeout.
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_config_uses_defaults() {
		let config = PrepConfig::from_toml("").unwrap();
		assert_eq!(config, PrepConfig::default());
		assert!(config.exclude.contains("wren"));
		assert!(config.validate().is_ok());
	}

	#[test]
	fn overrides_and_nested_codegen_table() {
		let config = PrepConfig::from_toml(
			r#"
jobs = 2
transport = "git"
exclude = ["tablegen"]

[codegen]
grammars_dir = "../grammars"
host_build_hook = "tauri_build::build()"
"#,
		)
		.unwrap();

		assert_eq!(config.jobs, 2);
		assert_eq!(config.transport, Transport::Git);
		assert_eq!(config.exclude, BTreeSet::from(["tablegen".to_string()]));
		assert_eq!(config.codegen.grammars_dir, "../grammars");
		assert_eq!(config.codegen.host_build_hook.as_deref(), Some("tauri_build::build()"));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		assert!(matches!(
			PrepConfig::from_toml("grammar_dir = \"typo\""),
			Err(ConfigError::Parse(_))
		));
	}

	#[test]
	fn zero_jobs_is_invalid() {
		let config = PrepConfig {
			jobs: 0,
			..PrepConfig::default()
		};
		assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
	}

	#[test]
	fn load_rebases_relative_paths() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tsprep.toml");
		fs::write(&path, "grammars_dir = \"vendor/grammars\"\nqueries_dir = \"/abs/queries\"\n").unwrap();

		let config = PrepConfig::load(&path).unwrap();
		assert_eq!(config.grammars_dir, dir.path().join("vendor/grammars"));
		assert_eq!(config.queries_dir, PathBuf::from("/abs/queries"));
		assert_eq!(config.manifest, dir.path().join("languages.toml"));
	}

	#[test]
	fn transport_parses_from_cli_strings() {
		assert_eq!("git".parse::<Transport>().unwrap(), Transport::Git);
		assert!("svn".parse::<Transport>().is_err());
	}
}
