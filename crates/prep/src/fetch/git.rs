//! Clone transport: shallow `git clone`, keeping only `src/` and `queries/`.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{FetchError, Result};
use crate::manifest::GrammarSpec;
use crate::utils::copy_dir_all;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Clones `spec` into a scratch directory and copies its grammar into `staging`.
///
/// The clone is removed on every exit path.
pub(super) fn fetch_with_git(spec: &GrammarSpec, staging: &Path, timeout: Duration) -> Result<()> {
	let scratch = tempfile::Builder::new().prefix("tsprep-clone-").tempdir()?;
	let clone = scratch.path().join(&spec.name);

	info!(grammar = %spec.name, url = %spec.source_url, "Cloning grammar");
	match clone_shallow(&spec.source_url, &spec.revision, &clone, timeout) {
		Ok(()) => {}
		Err(FetchError::Git(reason)) => {
			debug!(grammar = %spec.name, %reason, "Shallow clone failed, retrying with checkout");
			if clone.exists() {
				std::fs::remove_dir_all(&clone)?;
			}
			clone_and_checkout(&spec.source_url, &spec.revision, &clone, timeout)?;
		}
		Err(error) => return Err(error),
	}

	install_tree(&clone, spec.subpath(), staging)
}

fn clone_shallow(url: &str, revision: &str, dest: &Path, timeout: Duration) -> Result<()> {
	let mut cmd = Command::new("git");
	cmd.args(["clone", "--quiet", "--depth", "1", "--branch", revision, url]).arg(dest);
	run_with_timeout(cmd, timeout)
}

/// Fallback for revisions `--branch` cannot name (commit hashes).
fn clone_and_checkout(url: &str, revision: &str, dest: &Path, timeout: Duration) -> Result<()> {
	let mut clone = Command::new("git");
	clone.args(["clone", "--quiet", "--depth", "50", url]).arg(dest);
	run_with_timeout(clone, timeout)?;

	let mut checkout = Command::new("git");
	checkout.args(["checkout", "--quiet", revision]).current_dir(dest);
	run_with_timeout(checkout, timeout)
}

/// Copies `<clone>/<subpath>/src` and, when present, `<clone>/<subpath>/queries`
/// into the root of `staging`.
fn install_tree(clone: &Path, subpath: Option<&str>, staging: &Path) -> Result<()> {
	let root = match subpath {
		Some(subpath) => clone.join(subpath),
		None => clone.to_path_buf(),
	};

	let src = root.join("src");
	if !src.is_dir() {
		return Err(FetchError::NoSourceDir(root.display().to_string()));
	}
	copy_dir_all(&src, &staging.join("src"))?;

	let queries = root.join("queries");
	if queries.is_dir() {
		copy_dir_all(&queries, &staging.join("queries"))?;
	}
	Ok(())
}

/// Runs `cmd`, killing it once `timeout` elapses.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<()> {
	let mut child = cmd
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|e| FetchError::Git(e.to_string()))?;

	// Drain stderr off-thread so a chatty command cannot block on a full pipe.
	let stderr = child.stderr.take().map(|mut pipe| {
		thread::spawn(move || {
			let mut text = String::new();
			let _ = pipe.read_to_string(&mut text);
			text
		})
	});

	let deadline = Instant::now() + timeout;
	let status = loop {
		if let Some(status) = child.try_wait()? {
			break status;
		}
		if Instant::now() >= deadline {
			let _ = child.kill();
			let _ = child.wait();
			return Err(FetchError::Timeout);
		}
		thread::sleep(POLL_INTERVAL);
	};

	if status.success() {
		return Ok(());
	}
	let message = stderr
		.and_then(|handle| handle.join().ok())
		.map(|text| text.trim().to_owned())
		.filter(|text| !text.is_empty())
		.unwrap_or_else(|| format!("git exited with {status}"));
	Err(FetchError::Git(message))
}
