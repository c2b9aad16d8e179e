//! Zip extraction for host-generated repository archives.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use zip::ZipArchive;
use zip::result::ZipError;

use super::{FetchError, Result};

/// Extracts a repository archive into `dest`.
///
/// Host archives wrap the repository in a single root folder (`repo-main/`).
/// That folder, and `subpath` when given, are stripped so `dest` directly holds
/// the grammar's contents. Entries are handled in archive order; parent
/// directories are created on demand, so directory entries may arrive after
/// their files. Returns the number of files written.
///
/// # Errors
///
/// Returns [`FetchError::Archive`] if the bytes are not a zip or no file lies
/// under the selected prefix.
pub fn extract_archive(bytes: &[u8], subpath: Option<&str>, dest: &Path) -> Result<usize> {
	let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
	let root = archive_root(&mut archive)?;
	let prefix = match subpath {
		Some(subpath) => format!("{root}/{}/", subpath.trim_matches('/')),
		None => format!("{root}/"),
	};

	let mut written = 0;
	for index in 0..archive.len() {
		let mut entry = archive.by_index(index).map_err(archive_error)?;
		let name = entry.name().to_owned();
		let Some(relative) = name.strip_prefix(&prefix).filter(|r| !r.is_empty()) else {
			continue;
		};
		let Some(relative) = contained_path(relative) else {
			warn!(entry = %name, "Skipping archive entry outside the extraction root");
			continue;
		};

		let path = dest.join(relative);
		if entry.is_dir() {
			fs::create_dir_all(&path)?;
			continue;
		}

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut file = File::create(&path)?;
		io::copy(&mut entry, &mut file)?;
		written += 1;
	}

	if written == 0 {
		return Err(FetchError::Archive(format!("no files under `{prefix}`")));
	}
	Ok(written)
}

/// First path segment of the first entry.
fn archive_root(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
	if archive.is_empty() {
		return Err(FetchError::Archive("archive is empty".into()));
	}
	let first = archive.by_index(0).map_err(archive_error)?;
	first
		.name()
		.split('/')
		.next()
		.filter(|root| !root.is_empty())
		.map(str::to_owned)
		.ok_or_else(|| FetchError::Archive(format!("unexpected first entry `{}`", first.name())))
}

/// Returns `relative` as a path if it stays inside the extraction root.
fn contained_path(relative: &str) -> Option<PathBuf> {
	let path = Path::new(relative);
	path.components()
		.all(|c| matches!(c, Component::Normal(_)))
		.then(|| path.to_path_buf())
}

fn archive_error(error: ZipError) -> FetchError {
	FetchError::Archive(error.to_string())
}
