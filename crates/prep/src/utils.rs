use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;
use walkdir::WalkDir;

/// Longest diagnostic kept in run summaries.
pub(crate) const DIAGNOSTIC_LIMIT: usize = 100;

/// Truncates `text` to at most `limit` characters.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
	match text.char_indices().nth(limit) {
		Some((end, _)) => text[..end].to_owned(),
		None => text.to_owned(),
	}
}

/// Recursively copies `src` into `dst`, creating `dst` as needed.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
	for entry in WalkDir::new(src).follow_links(true) {
		let entry = entry.map_err(io::Error::from)?;
		let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
		let target = dst.join(relative);

		if entry.file_type().is_dir() {
			fs::create_dir_all(&target)?;
		} else {
			if let Some(parent) = target.parent() {
				fs::create_dir_all(parent)?;
			}
			fs::copy(entry.path(), &target)?;
		}
	}
	Ok(())
}

/// Writes `contents` to `path` unless the file already holds exactly those bytes.
///
/// Returns whether the file was written. Leaving identical files untouched keeps
/// their mtimes stable, which keeps Cargo's `rerun-if-changed` quiet.
pub fn write_if_changed(path: &Path, contents: &str) -> io::Result<bool> {
	match write_all_if_changed(&[(path, contents)]) {
		Ok(written) => Ok(written.first().copied().unwrap_or(false)),
		Err(failure) => Err(failure.error),
	}
}

/// An output that [`write_all_if_changed`] could not write.
#[derive(Debug)]
pub(crate) struct OutputFailure {
	pub path: PathBuf,
	pub error: io::Error,
}

/// Writes several outputs as one unit, skipping those whose bytes are unchanged.
///
/// Every changed output is staged in a temp file next to its target before any
/// target is replaced. If a replacement fails, targets already replaced get
/// their previous contents back, so either all outputs change or none do.
pub(crate) fn write_all_if_changed(outputs: &[(&Path, &str)]) -> Result<Vec<bool>, OutputFailure> {
	let mut staged = Vec::new();
	let mut written = Vec::with_capacity(outputs.len());
	for &(path, contents) in outputs {
		let fail = |error| OutputFailure {
			path: path.to_path_buf(),
			error,
		};
		if path.is_dir() {
			return Err(fail(io::Error::new(io::ErrorKind::IsADirectory, "target is a directory")));
		}
		let previous = fs::read(path).ok();
		if previous.as_deref() == Some(contents.as_bytes()) {
			written.push(false);
			continue;
		}
		let file = stage(path, contents).map_err(fail)?;
		staged.push((path, previous, file));
		written.push(true);
	}

	let mut replaced: Vec<(&Path, Option<Vec<u8>>)> = Vec::new();
	for (path, previous, file) in staged {
		if let Err(error) = file.persist(path) {
			restore(&replaced);
			return Err(OutputFailure {
				path: path.to_path_buf(),
				error: error.error,
			});
		}
		replaced.push((path, previous));
	}
	Ok(written)
}

fn stage(path: &Path, contents: &str) -> io::Result<NamedTempFile> {
	let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
		Some(parent) => {
			fs::create_dir_all(parent)?;
			parent
		}
		None => Path::new("."),
	};
	let mut file = NamedTempFile::new_in(parent)?;
	file.write_all(contents.as_bytes())?;
	file.flush()?;
	Ok(file)
}

fn restore(replaced: &[(&Path, Option<Vec<u8>>)]) {
	for (path, previous) in replaced {
		let result = match previous {
			Some(bytes) => fs::write(path, bytes),
			None => fs::remove_file(path),
		};
		if let Err(error) = result {
			warn!(path = %path.display(), %error, "Failed to restore output after a partial write");
		}
	}
}
