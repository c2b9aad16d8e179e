#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use tsprep::{HttpClient, HttpResponse, TransportError};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// In-memory [`HttpClient`]: fixed routes, 404 for everything else.
#[derive(Default)]
pub struct FakeHttpClient {
	routes: HashMap<String, HttpResponse>,
	requests: Mutex<Vec<String>>,
}

impl FakeHttpClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn route(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
		self.routes.insert(url.to_owned(), HttpResponse {
			status,
			body: body.into(),
		});
		self
	}

	pub fn requests(&self) -> Vec<String> {
		self.requests.lock().unwrap().clone()
	}

	pub fn request_count(&self) -> usize {
		self.requests.lock().unwrap().len()
	}
}

impl HttpClient for FakeHttpClient {
	fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
		self.requests.lock().unwrap().push(url.to_owned());
		Ok(self.routes.get(url).cloned().unwrap_or(HttpResponse {
			status: 404,
			body: b"404: Not Found".to_vec(),
		}))
	}
}

/// Builds a zip whose entries are `(path, contents)`; paths ending in `/` are directories.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
	let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
	let options = SimpleFileOptions::default();
	for (name, contents) in entries {
		if name.ends_with('/') {
			writer.add_directory(*name, options).unwrap();
		} else {
			writer.start_file(*name, options).unwrap();
			writer.write_all(contents.as_bytes()).unwrap();
		}
	}
	writer.finish().unwrap().into_inner()
}

pub fn manifest_entry(name: &str, git: &str, rev: &str, subpath: &str) -> String {
	let subpath = if subpath.is_empty() {
		String::new()
	} else {
		format!(", subpath = \"{subpath}\"")
	};
	format!(
		"[[grammar]]\nname = \"{name}\"\nsource = {{ git = \"{git}\", rev = \"{rev}\"{subpath} }}\n\n"
	)
}
