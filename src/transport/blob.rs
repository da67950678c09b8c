use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header;

use crate::error::SyncError;

use super::Transport;

/// Bounded so a dead connection cannot stall the poll loop.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Remote document on a JSON-blob endpoint. The service stores opaque
/// JSON under server-assigned ids; concurrent writers last-write-win
/// at the byte level, which is exactly what the merge loop assumes.
pub struct BlobTransport {
    base_url: String,
    doc_id: Option<String>,
    client: reqwest::Client,
}

impl BlobTransport {
    pub fn new(base_url: String, doc_id: Option<String>) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .user_agent("boardsync")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            doc_id,
            client,
        })
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    fn doc_url(&self) -> Option<String> {
        self.doc_id
            .as_deref()
            .map(|id| format!("{}/{}", self.base_url, id))
    }
}

#[async_trait]
impl Transport for BlobTransport {
    async fn pull(&mut self) -> Result<Option<String>, SyncError> {
        let Some(url) = self.doc_url() else {
            return Ok(None);
        };
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status()?;
        let body = resp.text().await?;
        Ok(Some(body))
    }

    async fn push(&mut self, body: &str) -> Result<(), SyncError> {
        let Some(url) = self.doc_url() else {
            return Err(SyncError::NoRemote);
        };
        let resp = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(url));
        }
        resp.error_for_status()?;
        Ok(())
    }

    async fn create(&mut self, body: &str) -> Result<String, SyncError> {
        let resp = self
            .client
            .post(&self.base_url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?
            .error_for_status()?;

        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;

        let id = created_identifier(location.as_deref(), &bytes).ok_or_else(|| {
            SyncError::Network(format!(
                "{} returned no document id on create",
                self.base_url
            ))
        })?;
        self.doc_id = Some(id.clone());
        Ok(id)
    }

    fn describe(&self) -> String {
        match &self.doc_id {
            Some(id) => format!("{}/{}", self.base_url, id),
            None => self.base_url.clone(),
        }
    }
}

/// Pick the new document's id out of a create response. Services
/// differ: some only set a `Location` header, some only return a JSON
/// body with an `id` or a full `uri`. Accept any of them, header
/// first.
fn created_identifier(location: Option<&str>, body: &[u8]) -> Option<String> {
    if let Some(location) = location
        && let Some(id) = last_path_segment(location)
    {
        return Some(id.to_string());
    }

    let parsed: serde_json::Value = serde_json::from_slice(body).ok()?;
    if let Some(id) = parsed.get("id").and_then(|v| v.as_str())
        && !id.is_empty()
    {
        return Some(id.to_string());
    }
    if let Some(uri) = parsed.get("uri").and_then(|v| v.as_str())
        && let Some(id) = last_path_segment(uri)
    {
        return Some(id.to_string());
    }
    None
}

fn last_path_segment(uri: &str) -> Option<&str> {
    let trimmed = uri.trim_end_matches('/');
    let segment = trimmed.rsplit('/').next()?;
    if segment.is_empty() {
        return None;
    }
    Some(segment)
}

#[cfg(test)]
#[path = "../tests/transport/blob_tests.rs"]
mod tests;
