use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use super::{ArtifactId, ObjectStore, StoreError};

/// Google Cloud Storage through its XML API.
pub struct GcsObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    prefix: String,
    access_token: Option<String>,
}

impl GcsObjectStore {
    pub fn new(
        endpoint: String,
        bucket: String,
        prefix: String,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            prefix,
            access_token,
        })
    }

    fn bucket_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }

    fn object_url(&self, id: ArtifactId) -> String {
        format!("{}/{}{}", self.bucket_url(), self.prefix, id.object_key())
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        check_status(resp).await
    }
}

/// 404 is absence; 429 and 5xx are worth retrying; anything else is final.
async fn check_status(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound);
    }
    let message = resp.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(StoreError::Transient(format!("HTTP {}: {}", status.as_u16(), message)));
    }
    Err(StoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, id: ArtifactId, gzipped: Bytes) -> Result<(), StoreError> {
        let req = self
            .client
            .put(self.object_url(id))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .header(reqwest::header::CONTENT_ENCODING, "gzip")
            .body(gzipped);
        self.execute(req).await?;
        Ok(())
    }

    async fn get(&self, id: ArtifactId) -> Result<Bytes, StoreError> {
        // Ask for the stored bytes as-is so GCS does not decompress them.
        let req = self
            .client
            .get(self.object_url(id))
            .header(reqwest::header::ACCEPT_ENCODING, "gzip");
        let resp = self.execute(req).await?;
        resp.bytes()
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))
    }

    async fn delete(&self, id: ArtifactId) -> Result<(), StoreError> {
        self.execute(self.client.delete(self.object_url(id))).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let req = self.client.get(self.bucket_url()).query(&[("max-keys", "1")]);
        self.execute(req).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "gcs"
    }
}
