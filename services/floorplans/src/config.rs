use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use corpus::CorpusSources;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cache_dir: PathBuf,
    pub raw_corpus_url: Option<String>,
    pub svg_corpus_url: Option<String>,
    pub geometry_corpus_url: Option<String>,
    pub workers: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let cache_dir = std::env::var("FLOORPLANS_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".cache"));

        let raw_corpus_url = url("FLOORPLANS_RAW_CORPUS_URL")?;
        let svg_corpus_url = url("FLOORPLANS_SVG_CORPUS_URL")?;
        let geometry_corpus_url = url("FLOORPLANS_GEOMETRY_CORPUS_URL")?;

        let workers = match std::env::var("FLOORPLANS_WORKERS") {
            Ok(v) => v
                .parse::<usize>()
                .with_context(|| format!("FLOORPLANS_WORKERS must be a positive integer, got {v:?}"))?,
            Err(_) => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };
        if workers == 0 {
            bail!("FLOORPLANS_WORKERS must be at least 1");
        }

        Ok(Self {
            cache_dir,
            raw_corpus_url,
            svg_corpus_url,
            geometry_corpus_url,
            workers,
        })
    }

    pub fn sources(&self) -> CorpusSources {
        CorpusSources {
            raw_url: self.raw_corpus_url.clone(),
            svg_url: self.svg_corpus_url.clone(),
            geometry_url: self.geometry_corpus_url.clone(),
        }
    }
}

/// Optional http(s) URL; blank counts as unset.
fn url(key: &str) -> Result<Option<String>> {
    let Ok(v) = std::env::var(key) else {
        return Ok(None);
    };
    let v = v.trim().to_string();
    if v.is_empty() {
        return Ok(None);
    }
    if !v.starts_with("http://") && !v.starts_with("https://") {
        bail!("{key} must start with http:// or https://");
    }
    Ok(Some(v))
}
