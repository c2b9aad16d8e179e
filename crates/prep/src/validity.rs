//! Validity filtering from on-disk state.
//!
//! A grammar is valid when its tree holds `src/parser.c`. Fetch outcomes are
//! ignored: a tree fetched by an earlier run counts, a failed fetch does not.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codegen::{GrammarEntry, GrammarSet};
use crate::manifest::{GrammarSpec, Manifest};

/// The generated parser every grammar must ship.
pub const PARSER_SOURCE: &str = "parser.c";

/// Locates `spec`'s `parser.c`.
///
/// Checks `<tree>/src` first, then `<tree>/<subpath>/src` when the spec has a
/// subpath. Trees extracted from archives or installed by the git transport
/// have `src/` at the root; the second location covers trees laid out by hand.
pub fn find_parser_source(grammars_dir: &Path, spec: &GrammarSpec) -> Option<PathBuf> {
	let tree = grammars_dir.join(&spec.name);
	let root = tree.join("src").join(PARSER_SOURCE);
	if root.is_file() {
		return Some(root);
	}

	let nested = tree.join(spec.subpath()?).join("src").join(PARSER_SOURCE);
	nested.is_file().then_some(nested)
}

/// Returns the entry the generators should emit for `spec`, or `None` if invalid.
///
/// The entry's subpath is where `src/` was actually found, so the build plan
/// compiles from the same place this check looked.
fn valid_entry(grammars_dir: &Path, spec: &GrammarSpec) -> Option<GrammarEntry> {
	let parser = find_parser_source(grammars_dir, spec)?;
	let at_root = parser.parent() == Some(grammars_dir.join(&spec.name).join("src").as_path());
	let subpath = if at_root { "" } else { spec.subpath().unwrap_or_default() };
	Some(GrammarEntry::new(&spec.name, subpath))
}

/// Recomputes the valid set for every grammar in `manifest`.
pub fn valid_grammars(grammars_dir: &Path, manifest: &Manifest) -> GrammarSet {
	manifest
		.iter()
		.filter_map(|spec| {
			let entry = valid_entry(grammars_dir, spec);
			if entry.is_none() {
				debug!(grammar = %spec.name, "No parser.c, excluding from generation");
			}
			entry
		})
		.collect()
}
