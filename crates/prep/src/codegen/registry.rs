//! Registry module rendering.

use std::fmt::Write;

use super::GrammarSet;

/// Common aliases, keyed by canonical grammar name.
pub const ALIASES: &[(&str, &[&str])] = &[
	("bash", &["sh", "shell", "zsh"]),
	("cpp", &["c++", "cc", "cxx"]),
	("docker-compose", &["docker-compose.yaml", "docker-compose.yml"]),
	("dockerfile", &["docker"]),
	("git-commit", &["gitcommit"]),
	("git-rebase", &["gitrebase"]),
	("javascript", &["js", "ecmascript"]),
	("jsonnet", &["libsonnet"]),
	("markdown", &["md", "mkd"]),
	("ocaml", &["ml", "mli"]),
	("ocaml-interface", &["eli", "eliomi"]),
	("php", &["php3", "php4", "php5", "php7", "php8"]),
	("python", &["py"]),
	("ruby", &["rb"]),
	("rust", &["rs"]),
	("scala", &["sc"]),
	("terraform", &["tf", "hcl"]),
	("typescript", &["ts"]),
	("vue", &["vuejs"]),
	("yaml", &["yml"]),
];

/// Aliases to register for `set`.
///
/// Only canonical names present in the set get aliases, and an alias that is
/// itself a grammar in the set is left out since the grammar would shadow it.
pub fn emitted_aliases(set: &GrammarSet) -> Vec<(&'static str, Vec<&'static str>)> {
	ALIASES
		.iter()
		.filter(|(canonical, _)| set.contains(canonical))
		.map(|&(canonical, aliases)| {
			let aliases = aliases.iter().copied().filter(|alias| !set.contains(alias)).collect();
			(canonical, aliases)
		})
		.filter(|(_, aliases): &(_, Vec<_>)| !aliases.is_empty())
		.collect()
}

const HEADER: &str = r#"//! Language registry for tree-sitter grammars.
//!
//! @generated by `tsprep generate`. Do not edit.

use tsprep_registry::LanguageRegistry;

// Brings in `LanguageFn` and `get_language`.
include!(concat!(env!("OUT_DIR"), "/grammar_ffi.rs"));

/// Grammars compiled by the build script, sorted by name.
pub const GRAMMARS: &[&str] = &[
"#;

const REGISTRY_OPEN: &str = r#"];

/// Builds the lookup table of compiled grammars and their aliases.
pub fn language_registry() -> LanguageRegistry<LanguageFn> {
	let mut registry = LanguageRegistry::new();
	for name in GRAMMARS {
		if let Some(language) = get_language(name) {
			registry.register(name, language);
		}
	}
"#;

/// Renders the registry module for `set`.
pub(super) fn render(set: &GrammarSet) -> String {
	let mut out = String::from(HEADER);
	for entry in set.iter() {
		let _ = writeln!(out, "\t{:?},", entry.name);
	}
	out.push_str(REGISTRY_OPEN);

	let aliases = emitted_aliases(set);
	if !aliases.is_empty() {
		out.push('\n');
	}
	for (canonical, aliases) in aliases {
		let list = aliases.iter().map(|a| format!("{a:?}")).collect::<Vec<_>>().join(", ");
		let _ = writeln!(out, "\tregistry.register_aliases({canonical:?}, &[{list}]);");
	}

	out.push_str("\n\tregistry\n}\n");
	out
}
