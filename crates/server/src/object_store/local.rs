use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;

use super::{ArtifactId, ObjectStore, StoreError};

/// Artifacts as files in one directory.
pub struct LocalObjectStore {
    dir: PathBuf,
}

impl LocalObjectStore {
    pub fn new(dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, id: ArtifactId) -> PathBuf {
        self.dir.join(id.object_key())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, id: ArtifactId, gzipped: Bytes) -> Result<(), StoreError> {
        let dest = self.path_for(id);
        let tmp = self.dir.join(format!(".{}.tmp", id.object_key()));
        fs::write(&tmp, &gzipped).await?;
        if let Err(e) = fs::rename(&tmp, &dest).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, id: ArtifactId) -> Result<Bytes, StoreError> {
        let path = self.path_for(id);
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound);
        }
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: ArtifactId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let probe = self.dir.join(format!(".health-{}", uuid::Uuid::new_v4()));
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
