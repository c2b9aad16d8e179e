//! Source generation for the consuming crate.
//!
//! Two artifacts are rendered from one [`GrammarSet`]: a Cargo build script
//! that compiles every grammar with `cc`, and a registry module that looks the
//! compiled grammars up by name. Both list the same names in the same order,
//! because both iterate the same set.

mod build_plan;
mod registry;

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

pub use registry::{ALIASES, emitted_aliases};

/// One grammar that passed the validity filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarEntry {
	/// Grammar name, also its directory under the grammars root.
	pub name: String,
	/// Directory holding `src/` relative to the grammar tree, empty for the root.
	pub subpath: String,
}

impl GrammarEntry {
	/// Creates an entry.
	pub fn new(name: impl Into<String>, subpath: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			subpath: subpath.into(),
		}
	}

	/// C identifier suffix of the grammar's entry point and static library.
	pub fn ident(&self) -> String {
		ffi_ident(&self.name)
	}
}

/// Maps every character that cannot appear in a C identifier to `_`.
pub fn ffi_ident(name: &str) -> String {
	name.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect()
}

/// Sorted, duplicate-free list of grammars to generate code for.
///
/// Names are unique, and so are their [`ffi_ident`]s: two grammars that map
/// to one symbol (`foo-bar`, `foo_bar`) cannot both link, so the later name
/// is dropped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarSet {
	entries: Vec<GrammarEntry>,
}

impl GrammarSet {
	/// Builds a set, sorting by name. The first entry of a duplicated name wins.
	pub fn new(entries: impl IntoIterator<Item = GrammarEntry>) -> Self {
		let mut entries: Vec<_> = entries.into_iter().collect();
		entries.sort_by(|a, b| a.name.cmp(&b.name));
		entries.dedup_by(|later, earlier| later.name == earlier.name);

		let mut idents: HashMap<String, String> = HashMap::new();
		entries.retain(|entry| match idents.get(&entry.ident()) {
			Some(owner) => {
				warn!(
					grammar = %entry.name,
					conflicts_with = %owner,
					"Dropping grammar with colliding symbol name"
				);
				false
			}
			None => {
				idents.insert(entry.ident(), entry.name.clone());
				true
			}
		});

		Self { entries }
	}

	/// Entries sorted by name.
	pub fn iter(&self) -> impl Iterator<Item = &GrammarEntry> {
		self.entries.iter()
	}

	/// Names sorted.
	pub fn names(&self) -> Vec<&str> {
		self.entries.iter().map(|e| e.name.as_str()).collect()
	}

	/// Returns true if `name` is in the set.
	pub fn contains(&self, name: &str) -> bool {
		self.entries.binary_search_by(|e| e.name.as_str().cmp(name)).is_ok()
	}

	/// Number of grammars.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if no grammar is valid.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl FromIterator<GrammarEntry> for GrammarSet {
	fn from_iter<I: IntoIterator<Item = GrammarEntry>>(iter: I) -> Self {
		Self::new(iter)
	}
}

/// Settings baked into the generated build script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenOptions {
	/// Grammars root as seen from the consuming crate's manifest directory.
	pub grammars_dir: String,
	/// Rust expression called at the end of the build script's `main`.
	pub host_build_hook: Option<String>,
}

impl Default for CodegenOptions {
	fn default() -> Self {
		Self {
			grammars_dir: "grammars".into(),
			host_build_hook: None,
		}
	}
}

/// Rendered sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifacts {
	/// Contents of `build.rs`.
	pub build_plan: String,
	/// Contents of the registry module.
	pub registry: String,
}

/// Renders both artifacts from `set`. Pure and deterministic.
pub fn generate(set: &GrammarSet, options: &CodegenOptions) -> GeneratedArtifacts {
	GeneratedArtifacts {
		build_plan: build_plan::render(set, options),
		registry: registry::render(set),
	}
}
