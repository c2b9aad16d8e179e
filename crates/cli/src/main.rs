mod cli;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use tsprep::{Pipeline, PrepConfig, ReqwestClient, narrow};

const DEFAULT_CONFIG: &str = "tsprep.toml";

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = load_config(&cli)?;
	let client = ReqwestClient::new(config.timeout()).context("failed to build HTTP client")?;
	let pipeline = Pipeline::new(config, Arc::new(client))
		.context("invalid configuration")?
		.with_progress(Box::new(|grammar: &str, status: &str| {
			tracing::debug!(grammar, status, "Task finished");
		}));

	let only = cli.command.only();
	let summary = match &cli.command {
		Command::Sync { .. } => pipeline.run(only)?.to_string(),
		command => {
			let (manifest, _) = pipeline.load_manifest()?;
			match command {
				Command::Fetch { .. } => {
					pipeline.fetch_grammars(&narrow(&manifest, only)).to_string()
				}
				Command::Queries { .. } => {
					pipeline.fetch_queries(&narrow(&manifest, only)).to_string()
				}
				_ => pipeline.generate(&manifest)?.to_string(),
			}
		}
	};

	let mut stdout = std::io::stdout().lock();
	stdout.write_all(summary.as_bytes())?;
	Ok(())
}

/// Config file from `--config`, else `./tsprep.toml` if it exists, else defaults;
/// then command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<PrepConfig> {
	let mut config = match &cli.config {
		Some(path) => {
			PrepConfig::load(path).with_context(|| format!("failed to load {}", path.display()))?
		}
		None if Path::new(DEFAULT_CONFIG).is_file() => {
			PrepConfig::load(Path::new(DEFAULT_CONFIG)).context("failed to load tsprep.toml")?
		}
		None => PrepConfig::default(),
	};

	if let Some(jobs) = cli.jobs {
		config.jobs = jobs;
	}
	if let Some(transport) = cli.transport {
		config.transport = transport;
	}
	Ok(config)
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("tsprep=debug,info")
		} else {
			EnvFilter::new("tsprep=info,warn")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}
