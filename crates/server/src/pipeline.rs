//! Payload-fire ingestion.
//!
//! A capture is acknowledged before any of this runs. Each capture is then
//! processed on its own task: resolve the owner from the routing token,
//! store the screenshot (on a separate task), resolve correlation, write the
//! fire record and notify. Artifact and record writes are not coordinated;
//! a record can point at an artifact that is still being written, or that
//! failed to write.

use futures_util::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use xsshunter_core::{Capture, NewPayloadFire};

use crate::correlation::CorrelationIndex;
use crate::db::{Database, DbError};
use crate::notify::{FireNotification, NotificationDelivery, NotificationDispatcher};
use crate::object_store::{gzip_file, ArtifactId, ObjectStore, StoreError};

/// Screenshot bytes spooled to disk by the HTTP handler.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the spooled file. Failure is logged only.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp upload");
        }
    }
}

#[derive(Debug)]
pub struct InboundCapture {
    pub capture: Capture,
    pub screenshot: Option<TempUpload>,
    pub remote_ip: String,
}

#[derive(Debug)]
pub enum IngestOutcome {
    Recorded {
        fire_id: String,
        screenshot_id: Option<ArtifactId>,
        /// Resolves once the artifact is durable (or failed). Dropping it
        /// does not cancel the write.
        artifact_task: Option<JoinHandle<Result<(), StoreError>>>,
        deliveries: Vec<NotificationDelivery>,
    },
    UnknownRoutingToken,
    RecordFailed {
        error: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub requested: usize,
    pub records_deleted: usize,
    pub artifacts_deleted: usize,
    pub artifact_failures: usize,
}

pub struct IngestionPipeline {
    db: Arc<Database>,
    store: Arc<dyn ObjectStore>,
    correlation: CorrelationIndex,
    notifier: Arc<NotificationDispatcher>,
    base_url: String,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<NotificationDispatcher>,
        base_url: String,
    ) -> Self {
        Self {
            correlation: CorrelationIndex::new(db.clone()),
            db,
            store,
            notifier,
            base_url,
        }
    }

    pub fn correlation(&self) -> &CorrelationIndex {
        &self.correlation
    }

    /// Run [`Self::ingest`] on its own task.
    pub fn spawn(self: &Arc<Self>, inbound: InboundCapture) -> JoinHandle<IngestOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.ingest(inbound).await })
    }

    pub async fn ingest(&self, inbound: InboundCapture) -> IngestOutcome {
        let InboundCapture {
            capture,
            screenshot,
            remote_ip,
        } = inbound;

        let owner = match self.db.find_user_by_path(&capture.path) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                tracing::info!(path = %capture.path, "Capture for unknown routing token dropped");
                discard(screenshot).await;
                return IngestOutcome::UnknownRoutingToken;
            }
            Err(e) => {
                tracing::error!(path = %capture.path, error = %e, "Owner lookup failed; capture dropped");
                discard(screenshot).await;
                return IngestOutcome::UnknownRoutingToken;
            }
        };

        let (screenshot_id, artifact_task) = match screenshot {
            Some(upload) => {
                let id = ArtifactId::new();
                (Some(id), Some(self.spawn_artifact_write(id, upload)))
            }
            None => (None, None),
        };

        let correlated_request = self.correlation.resolve_or_sentinel(&capture.injection_key);

        let fire = NewPayloadFire {
            user_id: owner.id.clone(),
            url: capture.uri,
            ip_address: remote_ip,
            referer: capture.referrer,
            user_agent: capture.user_agent,
            cookies: capture.cookies,
            title: capture.title,
            dom: capture.dom,
            text: capture.text,
            origin: capture.origin,
            screenshot_id: screenshot_id.map(|id| id.to_string()),
            was_iframe: capture.was_iframe,
            browser_timestamp: capture.browser_time,
            cors: capture.cors,
            git_exposed: capture.git_exposed,
            correlated_request,
        };

        let fire_id = match self.db.create_fire(&fire, &capture.secrets) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    owner_id = %owner.id,
                    screenshot_id = ?screenshot_id.map(|id| id.to_string()),
                    error = %e,
                    "Failed to record payload fire"
                );
                return IngestOutcome::RecordFailed {
                    error: e.to_string(),
                };
            }
        };

        tracing::info!(
            fire_id = %fire_id,
            owner_id = %owner.id,
            url = %fire.url,
            secrets = capture.secrets.len(),
            "Payload fire recorded"
        );

        let notification = FireNotification::new(
            &fire_id,
            &fire,
            &owner,
            capture.secrets.len(),
            &self.base_url,
        );
        let deliveries = self.notifier.dispatch(&notification, &owner).await;

        IngestOutcome::Recorded {
            fire_id,
            screenshot_id,
            artifact_task,
            deliveries,
        }
    }

    /// gzip the upload, store it and remove the temp file.
    fn spawn_artifact_write(
        &self,
        id: ArtifactId,
        upload: TempUpload,
    ) -> JoinHandle<Result<(), StoreError>> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let path = upload.path().to_path_buf();
            let compressed = match tokio::task::spawn_blocking(move || gzip_file(&path)).await {
                Ok(result) => result,
                Err(e) => Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                ))),
            };
            let result = match compressed {
                Ok(bytes) => store.put(id, bytes).await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => tracing::debug!(screenshot_id = %id, "Screenshot stored"),
                Err(e) => tracing::error!(
                    screenshot_id = %id,
                    backend = store.backend_name(),
                    error = %e,
                    "Failed to store screenshot"
                ),
            }
            upload.discard().await;
            result
        })
    }

    /// Delete fires and their artifacts. Every artifact delete is attempted;
    /// rows are removed whatever the artifact outcomes.
    pub async fn purge_fires(&self, owner_id: &str, ids: &[String]) -> Result<PurgeReport, DbError> {
        let shots = self.db.screenshot_ids_for(owner_id, ids)?;

        let deletes = shots.iter().filter_map(|(fire_id, shot)| {
            let artifact = shot.as_deref().and_then(ArtifactId::parse)?;
            let store = Arc::clone(&self.store);
            Some(async move { (fire_id, artifact, store.delete(artifact).await) })
        });

        let mut report = PurgeReport {
            requested: ids.len(),
            ..PurgeReport::default()
        };
        for (fire_id, artifact, result) in join_all(deletes).await {
            match result {
                Ok(()) => report.artifacts_deleted += 1,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(fire_id = %fire_id, screenshot_id = %artifact, "Artifact already gone");
                }
                Err(e) => {
                    report.artifact_failures += 1;
                    tracing::warn!(
                        fire_id = %fire_id,
                        screenshot_id = %artifact,
                        error = %e,
                        "Failed to delete screenshot artifact"
                    );
                }
            }
        }

        report.records_deleted = self.db.delete_fires(owner_id, ids)?;
        tracing::info!(
            owner_id,
            records = report.records_deleted,
            artifacts = report.artifacts_deleted,
            artifact_failures = report.artifact_failures,
            "Payload fires purged"
        );
        Ok(report)
    }
}

async fn discard(upload: Option<TempUpload>) {
    if let Some(upload) = upload {
        upload.discard().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{gzip_bytes, LocalObjectStore};
    use async_trait::async_trait;
    use bytes::Bytes;
    use xsshunter_core::{NewSecret, PageRequest, NO_CORRELATED_REQUEST};

    struct Fixture {
        _dir: tempfile::TempDir,
        upload_dir: PathBuf,
        db: Arc<Database>,
        pipeline: IngestionPipeline,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalObjectStore::new(dir.path().join("shots")).unwrap());
        fixture_with_store(dir, store)
    }

    fn fixture_with_store(dir: tempfile::TempDir, store: Arc<dyn ObjectStore>) -> Fixture {
        let upload_dir = dir.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let pipeline = IngestionPipeline::new(
            db.clone(),
            store,
            Arc::new(NotificationDispatcher::default()),
            "https://xss.example.com".to_string(),
        );
        Fixture {
            _dir: dir,
            upload_dir,
            db,
            pipeline,
        }
    }

    fn capture(path: &str) -> Capture {
        Capture {
            uri: "http://victim/x".to_string(),
            path: path.to_string(),
            ..Capture::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_routing_token_records_nothing() {
        let f = fixture();
        let upload = f.upload_dir.join("u1");
        std::fs::write(&upload, b"png").unwrap();

        let outcome = f
            .pipeline
            .ingest(InboundCapture {
                capture: capture("nobody"),
                screenshot: Some(TempUpload::new(upload.clone())),
                remote_ip: "198.51.100.1".to_string(),
            })
            .await;

        assert!(matches!(outcome, IngestOutcome::UnknownRoutingToken));
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn test_capture_without_screenshot_has_null_id() {
        let f = fixture();
        let owner = f.db.create_user("owner@example.com").unwrap();
        let mut c = capture(&owner.path);
        c.secrets = vec![NewSecret {
            secret_type: "jwt".to_string(),
            secret_value: Some("eyJ".to_string()),
        }];

        let outcome = f
            .pipeline
            .ingest(InboundCapture {
                capture: c,
                screenshot: None,
                remote_ip: "198.51.100.1".to_string(),
            })
            .await;

        match outcome {
            IngestOutcome::Recorded {
                screenshot_id,
                artifact_task,
                ..
            } => {
                assert!(screenshot_id.is_none());
                assert!(artifact_task.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let (fires, _) = f.db.list_fires(&owner.id, PageRequest::default()).unwrap();
        assert!(fires[0].screenshot_id.is_none());
        assert_eq!(fires[0].ip_address, "198.51.100.1");
        assert_eq!(fires[0].correlated_request, NO_CORRELATED_REQUEST);
        assert_eq!(fires[0].secrets.len(), 1);
    }

    #[tokio::test]
    async fn test_correlated_capture_uses_registered_request() {
        let f = fixture();
        let owner = f.db.create_user("owner@example.com").unwrap();
        f.pipeline
            .correlation()
            .record(&owner.id, "inj-1", "GET /search?q=<script>")
            .unwrap();
        let mut c = capture(&owner.path);
        c.injection_key = "inj-1".to_string();

        let outcome = f
            .pipeline
            .ingest(InboundCapture {
                capture: c,
                screenshot: None,
                remote_ip: String::new(),
            })
            .await;
        assert!(matches!(outcome, IngestOutcome::Recorded { .. }));

        let (fires, _) = f.db.list_fires(&owner.id, PageRequest::default()).unwrap();
        assert_eq!(fires[0].correlated_request, "GET /search?q=<script>");
    }

    /// Store whose writes always fail.
    struct UnwritableStore;

    #[async_trait]
    impl ObjectStore for UnwritableStore {
        async fn put(&self, _id: ArtifactId, _gzipped: Bytes) -> Result<(), StoreError> {
            Err(StoreError::Transient("bucket unavailable".to_string()))
        }

        async fn get(&self, _id: ArtifactId) -> Result<Bytes, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn delete(&self, _id: ArtifactId) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "unwritable"
        }
    }

    #[tokio::test]
    async fn test_failed_artifact_write_still_records_fire() {
        let f = fixture_with_store(tempfile::tempdir().unwrap(), Arc::new(UnwritableStore));
        let owner = f.db.create_user("owner@example.com").unwrap();
        let upload = f.upload_dir.join("u2");
        std::fs::write(&upload, b"png").unwrap();

        let outcome = f
            .pipeline
            .ingest(InboundCapture {
                capture: capture(&owner.path),
                screenshot: Some(TempUpload::new(upload.clone())),
                remote_ip: "198.51.100.1".to_string(),
            })
            .await;

        let (screenshot_id, artifact_task) = match outcome {
            IngestOutcome::Recorded {
                screenshot_id,
                artifact_task,
                ..
            } => (screenshot_id.unwrap(), artifact_task.unwrap()),
            other => panic!("unexpected outcome {other:?}"),
        };
        let err = artifact_task.await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Transient(_)));

        let (fires, total) = f.db.list_fires(&owner.id, PageRequest::default()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(fires[0].screenshot_id, Some(screenshot_id.to_string()));
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn test_purge_does_not_count_missing_artifact_as_deleted() {
        let f = fixture();
        let owner = f.db.create_user("owner@example.com").unwrap();
        let stored = ArtifactId::new();
        let missing = ArtifactId::new();
        f.pipeline
            .store
            .put(stored, gzip_bytes(b"png").unwrap())
            .await
            .unwrap();

        let mut ids = Vec::new();
        for shot in [stored, missing] {
            let fire = NewPayloadFire {
                user_id: owner.id.clone(),
                url: "http://victim/x".to_string(),
                ip_address: String::new(),
                referer: String::new(),
                user_agent: String::new(),
                cookies: String::new(),
                title: String::new(),
                dom: None,
                text: None,
                origin: String::new(),
                screenshot_id: Some(shot.to_string()),
                was_iframe: false,
                browser_timestamp: 0,
                cors: None,
                git_exposed: None,
                correlated_request: NO_CORRELATED_REQUEST.to_string(),
            };
            ids.push(f.db.create_fire(&fire, &[]).unwrap());
        }

        let report = f.pipeline.purge_fires(&owner.id, &ids).await.unwrap();
        assert_eq!(
            report,
            PurgeReport {
                requested: 2,
                records_deleted: 2,
                artifacts_deleted: 1,
                artifact_failures: 0,
            }
        );
    }
}
