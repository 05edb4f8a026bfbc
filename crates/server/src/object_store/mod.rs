//! Screenshot artifact storage.
//!
//! Artifacts are gzip-compressed PNGs addressed by a random v4 UUID. The
//! record store only keeps the id; bytes live behind [`ObjectStore`].

mod gcs;
mod local;

pub use gcs::GcsObjectStore;
pub use local::LocalObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found")]
    NotFound,

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Identifier of a stored screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(Uuid);

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^[0-9A-F]{8}-[0-9A-F]{4}-4[0-9A-F]{3}-[89AB][0-9A-F]{3}-[0-9A-F]{12}\.png$",
        )
        .expect("Invalid screenshot filename regex")
    })
}

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Accept only `<uuid-v4>.png`. Anything else is treated as absent.
    pub fn from_filename(filename: &str) -> Option<Self> {
        if !filename_re().is_match(filename) {
            return None;
        }
        let stem = &filename[..filename.len() - ".png".len()];
        Uuid::parse_str(stem).ok().map(Self)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_filename(&format!("{raw}.png"))
    }

    /// Public filename, as used in `/screenshots/<filename>`.
    pub fn filename(&self) -> String {
        format!("{}.png", self.0)
    }

    /// Key of the compressed object in the backend.
    pub fn object_key(&self) -> String {
        format!("{}.png.gz", self.0)
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable byte storage for screenshot artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store already-gzipped bytes under `id`.
    async fn put(&self, id: ArtifactId, gzipped: Bytes) -> Result<(), StoreError>;

    /// Fetch the gzipped bytes. `StoreError::NotFound` when absent.
    async fn get(&self, id: ArtifactId) -> Result<Bytes, StoreError>;

    async fn delete(&self, id: ArtifactId) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured backend.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    match config {
        StorageConfig::Local { dir } => {
            let store = LocalObjectStore::new(dir.clone())?;
            Ok(Arc::new(store))
        }
        StorageConfig::Gcs {
            bucket,
            endpoint,
            prefix,
            access_token,
            timeout_secs,
        } => {
            let store = GcsObjectStore::new(
                endpoint.clone(),
                bucket.clone(),
                prefix.clone(),
                access_token.clone(),
                std::time::Duration::from_secs(*timeout_secs),
            )?;
            Ok(Arc::new(store))
        }
    }
}

/// Read a spooled upload and gzip it. Blocking; run on the blocking pool.
pub fn gzip_file(path: &Path) -> Result<Bytes, StoreError> {
    let raw = std::fs::read(path)?;
    gzip_bytes(&raw)
}

pub fn gzip_bytes(raw: &[u8]) -> Result<Bytes, StoreError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    Ok(Bytes::from(encoder.finish()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_filename_pattern() {
        let id = ArtifactId::new();
        assert_eq!(ArtifactId::from_filename(&id.filename()), Some(id));
        assert_eq!(
            ArtifactId::from_filename(&id.filename().to_uppercase().replace(".PNG", ".png")),
            Some(id)
        );
        assert!(ArtifactId::from_filename("../etc/passwd").is_none());
        assert!(ArtifactId::from_filename(&id.object_key()).is_none());
        assert!(ArtifactId::from_filename("00000000-0000-1000-8000-000000000000.png").is_none());
        assert!(id.object_key().ends_with(".png.gz"));
    }

    #[test]
    fn test_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload");
        std::fs::write(&path, b"\x89PNG fake image").unwrap();

        let gz = gzip_file(&path).unwrap();
        let mut out = Vec::new();
        GzDecoder::new(&gz[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"\x89PNG fake image");
    }

    #[test]
    fn test_error_classification() {
        assert!(StoreError::NotFound.is_not_found());
        assert!(StoreError::Transient("503".to_string()).is_transient());
        assert!(!StoreError::Rejected {
            status: 403,
            message: "denied".to_string()
        }
        .is_transient());
    }
}
