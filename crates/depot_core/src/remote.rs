//! Remote origins of proxy repositories.

use crate::error::{DepotError, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// An open remote resource.
pub struct RemoteResponse {
    /// Length advertised by the remote, when it sent one.
    pub content_length: Option<u64>,
    /// Body, read incrementally.
    pub body: Box<dyn Read + Send>,
}

/// Opens resources on a remote origin.
pub trait RemoteClient: Send + Sync {
    /// Opens `path` below `base_url`.
    ///
    /// Returns `Ok(None)` when the remote does not have the resource. Any
    /// other failure is a [`DepotError::Transport`].
    fn open(&self, base_url: &str, path: &str) -> Result<Option<RemoteResponse>>;
}

/// HTTP remote over a blocking reqwest client.
pub struct HttpRemoteClient {
    client: Client,
}

impl HttpRemoteClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DepotError::Transport(io::Error::other(e)))?;
        Ok(Self { client })
    }

    /// Create a new HTTP remote with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl RemoteClient for HttpRemoteClient {
    fn open(&self, base_url: &str, path: &str) -> Result<Option<RemoteResponse>> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DepotError::Transport(io::Error::other(e)))?;

        match response.status() {
            StatusCode::OK => Ok(Some(RemoteResponse {
                content_length: response.content_length(),
                body: Box::new(response),
            })),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(DepotError::Transport(io::Error::other(format!(
                "unexpected status code {} for {}",
                status, url
            )))),
        }
    }
}

/// How a [`MemoryRemote`] answers for one path.
#[derive(Debug, Clone)]
pub enum RemoteBehavior {
    /// Serves the bytes with a correct content length.
    Serve(Vec<u8>),
    /// Fails before any byte is delivered.
    Refuse,
    /// Delivers the first `delivered` bytes, then the connection resets.
    ResetAfter {
        /// Full body the remote advertises.
        body: Vec<u8>,
        /// Bytes delivered before the failure.
        delivered: usize,
    },
    /// Ends the body early while advertising `declared` bytes.
    Truncate {
        /// Bytes actually delivered.
        body: Vec<u8>,
        /// Advertised content length.
        declared: u64,
    },
}

/// In-memory scripted remote.
///
/// Paths without a script answer as missing. Every `open` call is recorded.
#[derive(Default)]
pub struct MemoryRemote {
    scripts: Mutex<HashMap<String, RemoteBehavior>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryRemote {
    /// An empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the answer for a path.
    pub fn script(&self, path: &str, behavior: RemoteBehavior) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), behavior);
    }

    /// Serves `body` at `path`.
    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.script(path, RemoteBehavior::Serve(body.into()));
    }

    /// Makes `path` answer as missing.
    pub fn remove(&self, path: &str) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    /// Every requested path in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests made for `path`.
    pub fn request_count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|requested| requested.as_str() == path)
            .count()
    }
}

impl RemoteClient for MemoryRemote {
    fn open(&self, _base_url: &str, path: &str) -> Result<Option<RemoteResponse>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
        let behavior = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();

        let response = match behavior {
            None => return Ok(None),
            Some(RemoteBehavior::Refuse) => {
                return Err(DepotError::Transport(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("connection refused for {}", path),
                )))
            }
            Some(RemoteBehavior::Serve(body)) => RemoteResponse {
                content_length: Some(body.len() as u64),
                body: Box::new(io::Cursor::new(body)),
            },
            Some(RemoteBehavior::ResetAfter { body, delivered }) => RemoteResponse {
                content_length: Some(body.len() as u64),
                body: Box::new(ResettingReader {
                    remaining: io::Cursor::new(body[..delivered.min(body.len())].to_vec()),
                }),
            },
            Some(RemoteBehavior::Truncate { body, declared }) => RemoteResponse {
                content_length: Some(declared),
                body: Box::new(io::Cursor::new(body)),
            },
        };
        Ok(Some(response))
    }
}

/// Yields its bytes, then fails with a connection reset.
struct ResettingReader {
    remaining: io::Cursor<Vec<u8>>,
}

impl Read for ResettingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.remaining.read(buf)? {
            0 => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
            n => Ok(n),
        }
    }
}
