//! CLI schema for the tsprep binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tsprep::Transport;

#[derive(Parser, Debug)]
#[command(name = "tsprep")]
#[command(about = "Prepare tree-sitter grammars and generate their build and registry sources")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Config file (defaults to ./tsprep.toml when present)
	#[arg(long, short = 'c', global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Worker threads per fetch stage
	#[arg(long, short = 'j', global = true)]
	pub jobs: Option<usize>,

	/// Grammar source transport (archive or git)
	#[arg(long, global = true)]
	pub transport: Option<Transport>,

	/// Enable debug logging
	#[arg(long, short = 'v', global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
	/// Fetch grammar sources
	Fetch {
		/// Only fetch specific grammars (comma-separated)
		#[arg(long, value_delimiter = ',')]
		only: Option<Vec<String>>,
	},
	/// Fetch highlight queries for fetched grammars
	Queries {
		/// Only fetch queries for specific grammars (comma-separated)
		#[arg(long, value_delimiter = ',')]
		only: Option<Vec<String>>,
	},
	/// Regenerate build.rs, the registry and grammar_info.json from disk
	Generate,
	/// Fetch grammars and queries, then generate every valid grammar
	Sync {
		/// Only fetch specific grammars (comma-separated)
		#[arg(long, value_delimiter = ',')]
		only: Option<Vec<String>>,
	},
}

impl Command {
	/// The `--only` filter, empty when absent.
	pub fn only(&self) -> &[String] {
		match self {
			Self::Fetch { only } | Self::Queries { only } | Self::Sync { only } => {
				only.as_deref().unwrap_or_default()
			}
			Self::Generate => &[],
		}
	}
}

#[cfg(test)]
mod tests;
