//! `build.rs` rendering.
//!
//! The generated script compiles each grammar's `parser.c` (plus `scanner.c`)
//! as C and any `scanner.cc` / `schema.generated.cc` as a separate C++ library,
//! then writes `grammar_ffi.rs` into `OUT_DIR` with one extern declaration and
//! one `get_language` arm per compiled grammar.

use std::fmt::Write;

use super::{CodegenOptions, GrammarSet};

const HEADER: &str = "\
// @generated by `tsprep generate`. Do not edit.
//
// Requires `cc` as a build dependency and `tree-sitter-language` as a dependency.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

";

const MAIN_OPEN: &str = r#"
fn main() {
	println!("cargo:rerun-if-changed=build.rs");

	// (name, directory, subpath)
	let grammars: &[(&str, &str, &str)] = &[
"#;

const MAIN_BODY: &str = r#"	];

	let grammars_dir = Path::new(GRAMMARS_DIR);
	let mut compiled = Vec::new();
	if grammars_dir.exists() {
		for &(name, dir, subpath) in grammars {
			if compile_grammar(name, &grammars_dir.join(dir), subpath) {
				compiled.push(name);
			}
		}
	} else {
		println!(
			"cargo:warning=grammars directory `{GRAMMARS_DIR}` not found; run `tsprep sync` first"
		);
	}

	write_ffi_module(&compiled);
"#;

const HELPERS: &str = r#"
fn ident(name: &str) -> String {
	name.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect()
}

fn compile_grammar(name: &str, grammar_dir: &Path, subpath: &str) -> bool {
	let src_dir = if subpath.is_empty() {
		grammar_dir.join("src")
	} else {
		grammar_dir.join(subpath).join("src")
	};

	let parser = src_dir.join("parser.c");
	if !parser.exists() {
		println!("cargo:warning=parser.c not found for grammar {name} in {}", src_dir.display());
		return false;
	}
	println!("cargo:rerun-if-changed={}", parser.display());

	let ident = ident(name);
	let mut build = cc::Build::new();
	build.file(&parser).include(&src_dir).include(grammar_dir).warnings(false);

	let scanner = src_dir.join("scanner.c");
	if scanner.exists() {
		println!("cargo:rerun-if-changed={}", scanner.display());
		build.file(&scanner);
	}
	build.compile(&format!("tree_sitter_{ident}"));

	let cpp_sources: Vec<_> = ["scanner.cc", "schema.generated.cc"]
		.iter()
		.map(|file| src_dir.join(file))
		.filter(|path| path.exists())
		.collect();
	if !cpp_sources.is_empty() {
		let mut cpp = cc::Build::new();
		cpp.cpp(true).include(&src_dir).include(grammar_dir).warnings(false);
		for source in &cpp_sources {
			println!("cargo:rerun-if-changed={}", source.display());
			cpp.file(source);
		}
		cpp.compile(&format!("tree_sitter_{ident}_cpp"));
	}

	true
}

fn write_ffi_module(compiled: &[&str]) {
	let mut out = String::from("// @generated by build.rs\n\n");
	out.push_str("use tree_sitter_language::LanguageFn;\n\n");
	for name in compiled {
		let _ = writeln!(
			out,
			"unsafe extern \"C\" {{\n\tfn tree_sitter_{}() -> *const ();\n}}",
			ident(name)
		);
	}

	out.push_str("\n/// Returns the compiled grammar registered under `name`.\n");
	out.push_str("pub fn get_language(name: &str) -> Option<LanguageFn> {\n\tmatch name {\n");
	for name in compiled {
		let _ = writeln!(
			out,
			"\t\t{name:?} => Some(unsafe {{ LanguageFn::from_raw(tree_sitter_{}) }}),",
			ident(name)
		);
	}
	out.push_str("\t\t_ => None,\n\t}\n}\n");

	let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR");
	fs::write(Path::new(&out_dir).join("grammar_ffi.rs"), out).expect("write grammar_ffi.rs");
}
"#;

/// Renders the build script for `set`.
pub(super) fn render(set: &GrammarSet, options: &CodegenOptions) -> String {
	let mut out = String::from(HEADER);
	let _ = writeln!(out, "const GRAMMARS_DIR: &str = {:?};", options.grammars_dir);

	out.push_str(MAIN_OPEN);
	for entry in set.iter() {
		let _ = writeln!(out, "\t\t({:?}, {:?}, {:?}),", entry.name, entry.name, entry.subpath);
	}
	out.push_str(MAIN_BODY);

	let hook = options.host_build_hook.as_deref().map(str::trim);
	if let Some(hook) = hook.filter(|h| !h.is_empty()) {
		let hook = hook.trim_end_matches(';');
		let _ = writeln!(out, "\n\t{hook};");
	}
	out.push_str("}\n");

	out.push_str(HELPERS);
	out
}
