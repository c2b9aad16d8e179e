//! Blocking HTTP access for grammar archives and query files.
//!
//! Fetchers talk to the network through [`HttpClient`] so tests can substitute
//! an in-memory client and count requests.

use std::time::Duration;

use thiserror::Error;

/// Transport-level failure (no HTTP status was received).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
	/// The request exceeded the configured timeout.
	#[error("request timed out")]
	Timeout,
	/// Connection, TLS or body read failure.
	#[error("{0}")]
	Network(String),
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
	/// Status code.
	pub status: u16,
	/// Full response body.
	pub body: Vec<u8>,
}

impl HttpResponse {
	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Minimal GET-only client.
pub trait HttpClient: Send + Sync {
	/// Issues a GET request and buffers the whole body.
	fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
	client: reqwest::blocking::Client,
}

impl ReqwestClient {
	/// Builds a client whose requests are bounded by `timeout`.
	pub fn new(timeout: Duration) -> Result<Self, TransportError> {
		let client = reqwest::blocking::Client::builder()
			.timeout(timeout)
			.user_agent(concat!("tsprep/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| TransportError::Network(e.to_string()))?;
		Ok(Self { client })
	}
}

impl HttpClient for ReqwestClient {
	fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
		let response = self.client.get(url).send().map_err(transport_error)?;
		let status = response.status().as_u16();
		let body = response.bytes().map_err(transport_error)?.to_vec();
		Ok(HttpResponse { status, body })
	}
}

fn transport_error(error: reqwest::Error) -> TransportError {
	if error.is_timeout() {
		TransportError::Timeout
	} else {
		TransportError::Network(error.to_string())
	}
}
