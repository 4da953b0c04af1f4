//! Fetcher trait and implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::info;

use crate::{ArtifactError, Result};

/// Byte-level access to remote artifacts. The whole payload is buffered
/// before returning.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        // large corpora; no overall deadline, only a connect timeout
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|e| ArtifactError::FetchFailed {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let failed = |reason: String| ArtifactError::FetchFailed {
            url: url.to_string(),
            reason,
        };

        info!(%url, "downloading");
        let mut resp = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let expected = resp.content_length();
        info!(%url, bytes = ?expected, "download started");

        let mut body = Vec::with_capacity(expected.unwrap_or(0) as usize);
        resp.copy_to(&mut body).map_err(|e| failed(e.to_string()))?;

        if let Some(n) = expected {
            if n != body.len() as u64 {
                return Err(failed(format!("expected {n} bytes, received {}", body.len())));
            }
        }
        Ok(body)
    }
}

/// In-memory fetcher (for testing and offline runs)
#[derive(Clone, Default)]
pub struct InMemoryFetcher {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.insert(url.into(), bytes);
        }
    }

    /// Number of `fetch` calls so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for InMemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let blobs = self.blobs.read().map_err(|_| ArtifactError::FetchFailed {
            url: url.to_string(),
            reason: "fetcher lock poisoned".into(),
        })?;
        blobs.get(url).cloned().ok_or_else(|| ArtifactError::FetchFailed {
            url: url.to_string(),
            reason: "not found".into(),
        })
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url)
    }
}
