//! Lazy build-or-fetch artifact cache
//!
//! An artifact is "materialized" iff its file exists under the cache root.
//! Cached bytes are never validated against the code that produced them;
//! callers force a rebuild with `regenerate = true` or by deleting the file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{ArtifactError, Fetcher, Result};

/// A named artifact stored at `<cache root>/<file_name>`.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub name: String,
    pub file_name: String,
    /// Prebuilt copy, if one is published
    pub remote: Option<String>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            remote: None,
        }
    }

    pub fn with_remote(mut self, url: Option<String>) -> Self {
        self.remote = url;
        self
    }
}

pub struct ArtifactCache<F: Fetcher> {
    root: PathBuf,
    fetcher: F,
}

impl<F: Fetcher> ArtifactCache<F> {
    pub fn new(root: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.root.join(&artifact.file_name)
    }

    pub fn exists(&self, artifact: &Artifact) -> bool {
        self.path_for(artifact).exists()
    }

    /// Resolve `artifact`, in order:
    /// 1. present on disk and `regenerate` is false: return the cached bytes
    /// 2. `regenerate` is true: run `regenerate_fn`, persist, return
    /// 3. otherwise: fetch the remote copy, persist, return
    ///
    /// Nothing is written unless a complete payload was produced.
    pub fn materialize<E, G>(
        &self,
        artifact: &Artifact,
        regenerate: bool,
        regenerate_fn: G,
    ) -> std::result::Result<Vec<u8>, E>
    where
        E: From<ArtifactError>,
        G: FnOnce() -> std::result::Result<Vec<u8>, E>,
    {
        let path = self.path_for(artifact);

        if !regenerate && path.exists() {
            let bytes = fs::read(&path).map_err(ArtifactError::from)?;
            debug!(artifact = %artifact.name, path = %path.display(), bytes = bytes.len(), "cache hit");
            return Ok(bytes);
        }

        let bytes = if regenerate {
            info!(artifact = %artifact.name, "regenerating");
            regenerate_fn()?
        } else {
            self.download(artifact)?
        };

        persist(&path, &bytes)?;
        info!(
            artifact = %artifact.name,
            path = %path.display(),
            bytes = bytes.len(),
            digest = %digest(&bytes),
            "artifact materialized"
        );
        Ok(bytes)
    }

    /// Cached bytes or the remote copy; never regenerates.
    pub fn fetch(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        self.materialize(artifact, false, || {
            Err(ArtifactError::FetchFailed {
                url: artifact.remote.clone().unwrap_or_default(),
                reason: "regeneration not requested".into(),
            })
        })
    }

    /// Delete the cached file. Returns whether anything was removed.
    pub fn invalidate(&self, artifact: &Artifact) -> Result<bool> {
        let path = self.path_for(artifact);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(artifact = %artifact.name, path = %path.display(), "artifact invalidated");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn download(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        let url = artifact
            .remote
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ArtifactError::FetchFailed {
                url: String::new(),
                reason: format!("no remote configured for {}", artifact.name),
            })?;
        self.fetcher.fetch(url)
    }
}

/// Write through a temp file in the destination directory, then rename.
fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ArtifactError::Io(e.error))?;
    Ok(())
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(&blake3::hash(bytes).as_bytes()[..8])
}
