//! Depot API client and chunk upload coordinator.
//!
//! Provides a minimal HTTP client carrying the gateway identity headers,
//! typed endpoint methods, and the `UploadCoordinator`: incremental file
//! hashing, a bounded concurrent worker pool with bounded retry, durable
//! resume state, injected progress reporting, and cooperative cancellation.

pub mod api;
pub mod coordinator;
pub mod hasher;
pub mod progress;
pub mod task;
pub mod transport;

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

/// Caller identity forwarded on every request. Authentication happens in the
/// surrounding platform; the service only consumes these headers.
#[derive(Clone, Copy, Debug)]
pub struct Identity {
    pub tenant_id: Uuid,
    pub caller_id: Option<Uuid>,
}

/// API version prefix (e.g. "/api/v0"). Set DEPOT_API_VERSION to match the server.
pub fn api_prefix() -> String {
    let version = std::env::var("DEPOT_API_VERSION").unwrap_or_else(|_| "v0".to_string());
    format!("/api/{}", version)
}

/// HTTP client for the Depot API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    identity: Identity,
}

impl ApiClient {
    pub fn new(base_url: String, identity: Identity) -> Result<Self, anyhow::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
        })
    }

    /// Create a client from the environment: DEPOT_API_URL (or API_URL) and
    /// DEPOT_TENANT_ID, with optional DEPOT_CALLER_ID.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let base_url = std::env::var("DEPOT_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let tenant_id = std::env::var("DEPOT_TENANT_ID")
            .map_err(|_| anyhow::anyhow!("Missing tenant. Set DEPOT_TENANT_ID"))?
            .parse::<Uuid>()
            .map_err(|e| anyhow::anyhow!("Invalid DEPOT_TENANT_ID: {}", e))?;

        let caller_id = std::env::var("DEPOT_CALLER_ID")
            .ok()
            .map(|v| v.parse::<Uuid>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid DEPOT_CALLER_ID: {}", e))?;

        Self::new(
            base_url,
            Identity {
                tenant_id,
                caller_id,
            },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_identity(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("x-tenant-id", self.identity.tenant_id.to_string());
        match self.identity.caller_id {
            Some(caller_id) => request.header("x-caller-id", caller_id.to_string()),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|e| TransportError::Api {
            status: status.as_u16(),
            message: format!("Invalid response body: {}", e),
        })
    }

    /// GET request, deserializing the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.build_url(path);
        let request = self.apply_identity(self.client.get(&url));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        Self::decode(response).await
    }

    /// POST a JSON body and deserialize the response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = self.build_url(path);
        let request = self.apply_identity(self.client.post(&url).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        Self::decode(response).await
    }

    /// POST with an empty body and deserialize the response.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.build_url(path);
        let request = self.apply_identity(self.client.post(&url));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        Self::decode(response).await
    }

    /// PUT raw bytes (one chunk) and deserialize the response.
    pub async fn put_bytes<T: DeserializeOwned>(
        &self,
        path: &str,
        body: bytes::Bytes,
        headers: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let url = self.build_url(path);
        let mut request = self.apply_identity(self.client.put(&url)).body(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        Self::decode(response).await
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<(), TransportError> {
        let url = self.build_url(path);
        let request = self.apply_identity(self.client.delete(&url));
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

// Re-export the main coordinator types for convenience.
pub use coordinator::{CoordinatorOptions, UploadCoordinator, UploadError, UploadMeta};
pub use progress::{NoopProgressReporter, ProgressReporter, TracingProgressReporter, UploadProgress};
pub use task::{FileTaskStore, MemoryTaskStore, StoredUploadTask, TaskStore};
pub use transport::{TransportError, UploadTransport};
