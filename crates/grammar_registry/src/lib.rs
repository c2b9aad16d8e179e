//! Runtime grammar lookup.
//!
//! The registry source emitted by `tsprep generate` builds a [`LanguageRegistry`]
//! from the grammar list shared with the generated build script. Lookups are
//! case-insensitive and resolve aliases in two steps: alias to canonical name,
//! then canonical name to compiled entry.
//!
//! ```
//! use tsprep_registry::LanguageRegistry;
//!
//! let mut registry = LanguageRegistry::new();
//! registry.register("rust", 1u8);
//! registry.register_aliases("rust", &["rs"]);
//!
//! assert_eq!(registry.lookup("RS"), Some(&1));
//! assert!(!registry.is_supported("python"));
//! ```

use std::collections::HashMap;

/// Name- and alias-keyed table of compiled grammar entries.
///
/// `L` is the compiled entry type; generated registries use
/// `tree_sitter_language::LanguageFn`.
#[derive(Debug, Clone)]
pub struct LanguageRegistry<L> {
	/// Lowercased canonical name to compiled entry.
	languages: HashMap<String, L>,
	/// Lowercased alias to lowercased canonical name.
	aliases: HashMap<String, String>,
}

impl<L> LanguageRegistry<L> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			languages: HashMap::new(),
			aliases: HashMap::new(),
		}
	}

	/// Registers a compiled entry under its canonical name.
	pub fn register(&mut self, name: &str, language: L) {
		self.languages.insert(name.to_lowercase(), language);
	}

	/// Registers aliases that resolve to `canonical`.
	///
	/// The canonical entry does not need to exist yet; an alias whose target is
	/// never registered simply fails to resolve.
	pub fn register_aliases(&mut self, canonical: &str, aliases: &[&str]) {
		let canonical = canonical.to_lowercase();
		for alias in aliases {
			self.aliases.insert(alias.to_lowercase(), canonical.clone());
		}
	}

	/// Looks up a grammar by canonical name or alias, ignoring case.
	///
	/// Canonical names win over aliases. An alias whose canonical entry is
	/// missing yields `None`.
	pub fn lookup(&self, name: &str) -> Option<&L> {
		let name = name.to_lowercase();

		if let Some(language) = self.languages.get(&name) {
			return Some(language);
		}

		let canonical = self.aliases.get(&name)?;
		self.languages.get(canonical)
	}

	/// Returns true if `name` resolves to a compiled entry.
	pub fn is_supported(&self, name: &str) -> bool {
		self.lookup(name).is_some()
	}

	/// Returns the canonical names of all registered grammars, sorted.
	pub fn supported_languages(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.languages.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	/// Number of registered canonical grammars.
	pub fn len(&self) -> usize {
		self.languages.len()
	}

	/// Returns true if no grammar is registered.
	pub fn is_empty(&self) -> bool {
		self.languages.is_empty()
	}
}

impl<L> Default for LanguageRegistry<L> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> LanguageRegistry<&'static str> {
		let mut registry = LanguageRegistry::new();
		registry.register("rust", "rust-entry");
		registry.register("javascript", "js-entry");
		registry.register_aliases("rust", &["rs"]);
		registry.register_aliases("javascript", &["JS", "ecmascript"]);
		registry
	}

	#[test]
	fn lookup_ignores_case() {
		let registry = sample();
		let expected = Some(&"rust-entry");
		assert_eq!(registry.lookup("Rust"), expected);
		assert_eq!(registry.lookup("rust"), expected);
		assert_eq!(registry.lookup("RUST"), expected);
	}

	#[test]
	fn aliases_resolve_through_canonical_name() {
		let registry = sample();
		assert_eq!(registry.lookup("rs"), Some(&"rust-entry"));
		assert_eq!(registry.lookup("js"), Some(&"js-entry"));
		assert_eq!(registry.lookup("EcmaScript"), Some(&"js-entry"));
	}

	#[test]
	fn alias_to_missing_canonical_is_not_found() {
		let mut registry = sample();
		registry.register_aliases("python", &["py"]);
		assert_eq!(registry.lookup("py"), None);
		assert!(!registry.is_supported("py"));
	}

	#[test]
	fn canonical_name_shadows_alias() {
		let mut registry = sample();
		registry.register("rs", "other-entry");
		assert_eq!(registry.lookup("rs"), Some(&"other-entry"));
	}

	#[test]
	fn unknown_language_is_unsupported() {
		let registry = sample();
		assert!(!registry.is_supported("unknown_language_xyz"));
	}

	#[test]
	fn supported_languages_are_sorted_canonical_names() {
		let registry = sample();
		assert_eq!(registry.supported_languages(), vec!["javascript", "rust"]);
		assert_eq!(registry.len(), 2);
	}
}
