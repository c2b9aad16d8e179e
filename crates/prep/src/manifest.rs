//! Grammar manifest parsing.
//!
//! The manifest is a `languages.toml`-style file of `[[grammar]]` records:
//!
//! ```toml
//! [[grammar]]
//! name = "rust"
//! source = { git = "https://github.com/tree-sitter/tree-sitter-rust", rev = "v0.23.0" }
//! ```
//!
//! Records are scanned line by line instead of deserializing the whole document,
//! so one malformed record (or an unrelated section a strict TOML parser would
//! reject) never costs the rest of the manifest.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
	/// The manifest file could not be read.
	#[error("failed to read manifest {path}: {error}")]
	Read {
		/// Path of the manifest.
		path: PathBuf,
		/// The underlying I/O error.
		#[source]
		error: std::io::Error,
	},
}

/// One `[[grammar]]` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarSpec {
	/// Unique grammar name, also the on-disk directory name.
	pub name: String,
	/// Origin repository URL (`git` field).
	pub source_url: String,
	/// Tag, branch or commit (`rev` field). Opaque.
	pub revision: String,
	/// Location of the grammar inside a multi-grammar repository, or empty.
	pub subpath: String,
}

impl GrammarSpec {
	/// Returns the subpath, or `None` when the grammar lives at the repository root.
	pub fn subpath(&self) -> Option<&str> {
		let subpath = self.subpath.trim_matches('/');
		(!subpath.is_empty()).then_some(subpath)
	}
}

/// Parsed manifest: grammar name to spec, in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
	grammars: IndexMap<String, GrammarSpec>,
}

impl Manifest {
	/// Inserts a spec, replacing any earlier spec of the same name in place.
	pub fn insert(&mut self, spec: GrammarSpec) {
		self.grammars.insert(spec.name.clone(), spec);
	}

	/// Returns the spec registered under `name`.
	pub fn get(&self, name: &str) -> Option<&GrammarSpec> {
		self.grammars.get(name)
	}

	/// Iterates specs in manifest order.
	pub fn iter(&self) -> impl Iterator<Item = &GrammarSpec> {
		self.grammars.values()
	}

	/// Returns the specs sorted by name.
	pub fn sorted(&self) -> Vec<&GrammarSpec> {
		let mut specs: Vec<_> = self.grammars.values().collect();
		specs.sort_by(|a, b| a.name.cmp(&b.name));
		specs
	}

	/// Number of grammars.
	pub fn len(&self) -> usize {
		self.grammars.len()
	}

	/// Returns true if the manifest holds no grammar.
	pub fn is_empty(&self) -> bool {
		self.grammars.is_empty()
	}

	/// Removes every grammar named in `excluded`, returning the removed names.
	pub fn exclude(&mut self, excluded: &BTreeSet<String>) -> Vec<String> {
		let mut removed = Vec::new();
		self.grammars.retain(|name, _| {
			let keep = !excluded.contains(name);
			if !keep {
				removed.push(name.clone());
			}
			keep
		});
		removed
	}

	/// Keeps only the grammars named in `only`.
	pub fn retain_only(&mut self, only: &[String]) {
		self.grammars.retain(|name, _| only.iter().any(|n| n == name));
	}
}

impl FromIterator<GrammarSpec> for Manifest {
	fn from_iter<I: IntoIterator<Item = GrammarSpec>>(iter: I) -> Self {
		let mut manifest = Self::default();
		for spec in iter {
			manifest.insert(spec);
		}
		manifest
	}
}

/// Reads and parses the manifest at `path`.
pub fn load_manifest(path: &Path) -> Result<Manifest, ManifestError> {
	let text = fs::read_to_string(path).map_err(|error| ManifestError::Read {
		path: path.to_path_buf(),
		error,
	})?;
	Ok(parse_manifest(&text))
}

/// `key = "value"` or `key = 'value'` inside a source descriptor.
static SOURCE_FIELD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("source field pattern is valid")
});

#[derive(Default)]
struct RawRecord {
	name: Option<String>,
	git: Option<String>,
	rev: Option<String>,
	subpath: Option<String>,
}

impl RawRecord {
	fn into_spec(self) -> Option<GrammarSpec> {
		let name = self.name.filter(|n| is_valid_name(n))?;
		let source_url = self.git.filter(|g| !g.is_empty())?;
		let revision = self.rev.filter(|r| !r.is_empty())?;
		Some(GrammarSpec {
			name,
			source_url,
			revision,
			subpath: self.subpath.unwrap_or_default(),
		})
	}

	fn read_source(&mut self, descriptor: &str) {
		for caps in SOURCE_FIELD.captures_iter(descriptor) {
			let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str().to_owned());
			match &caps[1] {
				"git" => self.git = value,
				"rev" => self.rev = value,
				"subpath" => self.subpath = value,
				_ => {}
			}
		}
	}
}

/// Parses manifest text into a [`Manifest`].
///
/// Only `name` and the `git`/`rev`/`subpath` fields of `source` are read.
/// Records without a name, git URL or revision are dropped. Never fails.
pub fn parse_manifest(text: &str) -> Manifest {
	let mut manifest = Manifest::default();
	let mut lines = text.lines().map(str::trim).peekable();
	let in_record = |line: &&str| !line.starts_with('[');

	while let Some(line) = lines.next() {
		if line != "[[grammar]]" {
			continue;
		}

		let mut record = RawRecord::default();
		while let Some(line) = lines.next_if(in_record) {
			if line.starts_with('#') {
				continue;
			}

			if let Some(value) = assignment(line, "name") {
				record.name = string_value(value);
			} else if let Some(value) = assignment(line, "source") {
				let mut descriptor = value.to_owned();
				while !descriptor.contains('}') {
					let Some(next) = lines.next_if(in_record) else {
						break;
					};
					descriptor.push(' ');
					descriptor.push_str(next);
				}
				record.read_source(&descriptor);
			}
		}

		let name = record.name.clone();
		match record.into_spec() {
			Some(spec) => manifest.insert(spec),
			None => debug!(name = ?name, "Skipping grammar record without name, git or rev"),
		}
	}

	manifest
}

/// Returns the right-hand side of `key = ...`, or `None` if `line` assigns another key.
fn assignment<'a>(line: &'a str, key: &str) -> Option<&'a str> {
	line.strip_prefix(key)?.trim_start().strip_prefix('=').map(str::trim)
}

/// Extracts a quoted string, ignoring anything after the closing quote.
fn string_value(value: &str) -> Option<String> {
	let quote = value.chars().next().filter(|c| matches!(c, '"' | '\''))?;
	let rest = &value[1..];
	let end = rest.find(quote)?;
	Some(rest[..end].to_owned())
}

/// Names double as directory names, so they must be a single plain path segment.
fn is_valid_name(name: &str) -> bool {
	!name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_single_line_source() {
		let manifest = parse_manifest(
			r#"
[[grammar]]
name = "rust"
source = { git = "https://github.com/tree-sitter/tree-sitter-rust", rev = "v0.23.0" }
"#,
		);

		let rust = manifest.get("rust").expect("rust record");
		assert_eq!(rust.source_url, "https://github.com/tree-sitter/tree-sitter-rust");
		assert_eq!(rust.revision, "v0.23.0");
		assert_eq!(rust.subpath(), None);
	}

	#[test]
	fn accumulates_wrapped_source_descriptor() {
		let manifest = parse_manifest(
			r#"
[[grammar]]
name = "typescript"
source = { git = "https://github.com/tree-sitter/tree-sitter-typescript",
           rev = "abc123",
           subpath = "typescript" }
"#,
		);

		let ts = manifest.get("typescript").expect("typescript record");
		assert_eq!(ts.revision, "abc123");
		assert_eq!(ts.subpath(), Some("typescript"));
	}

	#[test]
	fn drops_records_missing_required_fields() {
		let manifest = parse_manifest(
			r#"
[[grammar]]
name = "no-rev"
source = { git = "https://github.com/org/no-rev" }

[[grammar]]
source = { git = "https://github.com/org/anon", rev = "main" }

[[grammar]]
name = "local"
source = { path = "/home/me/tree-sitter-local" }

[[grammar]]
name = "ok"
source = { git = "https://github.com/org/ok", rev = "main" }
"#,
		);

		assert_eq!(manifest.len(), 1);
		assert!(manifest.get("ok").is_some());
		for spec in manifest.iter() {
			assert!(!spec.name.is_empty());
			assert!(!spec.source_url.is_empty());
			assert!(!spec.revision.is_empty());
		}
	}

	#[test]
	fn ignores_other_sections_and_unknown_fields() {
		let manifest = parse_manifest(
			r#"
[[language]]
name = "rust"
scope = "source.rust"

[[grammar]]
name = "rust"
# pinned
source = { git = "https://github.com/tree-sitter/tree-sitter-rust", rev = "v1", depth = "1" } # trailing

[language-server.rust-analyzer]
name = "hijack"
source = { git = "https://example.com/x", rev = "y" }
"#,
		);

		assert_eq!(manifest.len(), 1);
		let rust = manifest.get("rust").expect("rust record");
		assert_eq!(rust.revision, "v1");
		assert!(manifest.get("hijack").is_none());
	}

	#[test]
	fn unterminated_descriptor_does_not_swallow_next_record() {
		let manifest = parse_manifest(
			r#"
[[grammar]]
name = "broken"
source = { git = "https://github.com/org/broken",

[[grammar]]
name = "fine"
source = { git = "https://github.com/org/fine", rev = "main" }
"#,
		);

		assert!(manifest.get("broken").is_none());
		assert!(manifest.get("fine").is_some());
	}

	#[test]
	fn rejects_path_like_names() {
		let manifest = parse_manifest(
			r#"
[[grammar]]
name = "../escape"
source = { git = "https://github.com/org/escape", rev = "main" }
"#,
		);
		assert!(manifest.is_empty());
	}

	#[test]
	fn duplicate_name_keeps_first_position_with_last_value() {
		let manifest = parse_manifest(
			r#"
[[grammar]]
name = "a"
source = { git = "https://github.com/org/a", rev = "one" }

[[grammar]]
name = "b"
source = { git = "https://github.com/org/b", rev = "main" }

[[grammar]]
name = "a"
source = { git = "https://github.com/org/a", rev = "two" }
"#,
		);

		let names: Vec<_> = manifest.iter().map(|s| s.name.as_str()).collect();
		assert_eq!(names, ["a", "b"]);
		assert_eq!(manifest.get("a").map(|s| s.revision.as_str()), Some("two"));
	}

	#[test]
	fn exclusion_is_applied_after_parsing() {
		let mut manifest = parse_manifest(
			r#"
[[grammar]]
name = "wren"
source = { git = "https://github.com/org/wren", rev = "main" }

[[grammar]]
name = "rust"
source = { git = "https://github.com/org/rust", rev = "main" }
"#,
		);
		assert_eq!(manifest.len(), 2);

		let excluded = BTreeSet::from(["wren".to_string(), "gemini".to_string()]);
		assert_eq!(manifest.exclude(&excluded), vec!["wren".to_string()]);
		assert_eq!(manifest.len(), 1);
	}
}
