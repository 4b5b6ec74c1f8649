//! Content-addressed document store
//!
//! Batch documents are pinned through an authenticated HTTP endpoint
//! (Pinata's `pinJSONToIPFS`) and read back over a public IPFS gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use medverify_core::{DocumentFetchResult, OffChainDocument};

use crate::config::ContentStoreConfig;
use crate::error::{ClientError, Result};

/// Store for off-chain batch documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Pin a document and return its content identifier
    async fn pin_document(&self, document: &OffChainDocument) -> Result<String>;

    /// Fetch and parse the document behind a content identifier
    async fn fetch_document(&self, content_ref: &str) -> Result<OffChainDocument>;
}

#[async_trait]
impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    async fn pin_document(&self, document: &OffChainDocument) -> Result<String> {
        (**self).pin_document(document).await
    }

    async fn fetch_document(&self, content_ref: &str) -> Result<OffChainDocument> {
        (**self).fetch_document(content_ref).await
    }
}

/// Fetch a document, reporting failure as an unavailable result
pub async fn fetch_or_unavailable<S: ContentStore + ?Sized>(
    store: &S,
    content_ref: Option<&str>,
) -> DocumentFetchResult {
    let Some(content_ref) = content_ref else {
        return DocumentFetchResult::unavailable("record has no content reference");
    };

    match store.fetch_document(content_ref).await {
        Ok(document) => DocumentFetchResult::Found(document),
        Err(e) => {
            warn!("Off-chain document {} unavailable: {}", content_ref, e);
            DocumentFetchResult::unavailable(e.to_string())
        }
    }
}

/// Request body for the pinning endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PinRequest<'a> {
    pinata_content: &'a OffChainDocument,
}

/// Response from the pinning endpoint
#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata-compatible store reading through a public gateway
#[derive(Debug)]
pub struct PinataStore {
    /// HTTP client for making requests
    client: Client,

    /// Pinning endpoint
    pin_endpoint: String,

    /// Gateway base URL without trailing slash
    gateway_url: String,

    /// Bearer token for pinning
    jwt: Option<String>,

    /// Timeout for requests
    timeout: Duration,
}

impl PinataStore {
    /// Create a store from configuration
    pub fn new(config: &ContentStoreConfig) -> Self {
        Self {
            client: Client::new(),
            pin_endpoint: config.pin_endpoint.clone(),
            gateway_url: config.gateway_url.trim_end_matches('/').to_string(),
            jwt: config.jwt.clone().filter(|t| !t.is_empty()),
            timeout: config.timeout(),
        }
    }

    /// Gateway URL of a document
    pub fn document_url(&self, content_ref: &str) -> String {
        format!("{}/ipfs/{}", self.gateway_url, content_ref)
    }
}

/// CIDs are base58 or base32 strings; anything else would alter the gateway path
fn is_valid_content_ref(content_ref: &str) -> bool {
    !content_ref.is_empty() && content_ref.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn pin_document(&self, document: &OffChainDocument) -> Result<String> {
        let jwt = self.jwt.as_deref().ok_or_else(|| {
            ClientError::Configuration("missing Pinata JWT for IPFS upload".to_string())
        })?;

        debug!("Pinning document for batch {} to {}", document.batch_number, self.pin_endpoint);

        let response = self
            .client
            .post(&self.pin_endpoint)
            .bearer_auth(jwt)
            .timeout(self.timeout)
            .json(&PinRequest {
                pinata_content: document,
            })
            .send()
            .await
            .map_err(|e| ClientError::ContentStore(format!("IPFS upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ClientError::ContentStore(format!(
                "IPFS upload failed: {} - {}",
                status, text
            )));
        }

        let pinned: PinResponse = response.json().await.map_err(|e| {
            ClientError::ContentStore(format!("Failed to parse pin response: {}", e))
        })?;

        if !is_valid_content_ref(&pinned.ipfs_hash) {
            return Err(ClientError::ContentStore(format!(
                "pin response carried an invalid CID {:?}",
                pinned.ipfs_hash
            )));
        }

        info!("Pinned document for batch {} as {}", document.batch_number, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    async fn fetch_document(&self, content_ref: &str) -> Result<OffChainDocument> {
        if !is_valid_content_ref(content_ref) {
            return Err(ClientError::OffChainFetch(format!(
                "invalid content reference {:?}",
                content_ref
            )));
        }

        let url = self.document_url(content_ref);
        debug!("Fetching off-chain document from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::OffChainFetch(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ClientError::OffChainFetch(format!(
                "Gateway returned {} for {}",
                response.status(),
                content_ref
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::OffChainFetch(format!("Failed to read {}: {}", url, e)))?;

        OffChainDocument::from_json_slice(&body)
            .map_err(|e| ClientError::OffChainFetch(format!("Malformed document {}: {}", content_ref, e)))
    }
}
