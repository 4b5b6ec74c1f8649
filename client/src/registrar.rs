//! Batch registration and manufacturer authorization
//!
//! Registration writes the off-chain document first and the on-chain record
//! second. A failed upload therefore never leaves an on-chain record without
//! a document behind it. The reverse case, a pinned document whose chain
//! write failed, is left alone: the orphan is unreferenced and harmless.

use ethers::types::{Address, TxHash};
use log::{info, warn};
use serde::Serialize;

use medverify_core::{BatchId, BatchIdHash, NewBatch};

use crate::content_store::ContentStore;
use crate::contract::{BatchRegistry, TxConfirmation};
use crate::error::{ClientError, Result};

/// Registration that has been broadcast but not yet confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    /// Canonical batch identifier
    pub batch_id: BatchId,

    /// Storage key of the batch
    pub batch_id_hash: BatchIdHash,

    /// Content identifier of the pinned document
    pub content_ref: String,

    /// Registration transaction
    pub tx_hash: TxHash,
}

/// Confirmed registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReceipt {
    /// Canonical batch identifier
    pub batch_id: BatchId,

    /// Storage key of the batch, also the QR payload
    pub batch_id_hash: BatchIdHash,

    /// Content identifier of the pinned document
    pub content_ref: String,

    /// Registration transaction
    pub tx_hash: TxHash,

    /// Block the registration was included in
    pub block_number: Option<u64>,
}

/// Writes batches and allow-list entries
pub struct Registrar<R, S> {
    registry: R,
    store: S,
}

impl<R: BatchRegistry, S: ContentStore> Registrar<R, S> {
    /// Create a registrar over a registry and a content store
    pub fn new(registry: R, store: S) -> Self {
        Self { registry, store }
    }

    /// Underlying registry
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Pin the document and broadcast the registration
    ///
    /// Returns once the transaction is broadcast; see [`Registrar::confirm`].
    pub async fn submit_registration(&self, batch: &NewBatch) -> Result<PendingRegistration> {
        batch
            .validate()
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;

        let owner = self.registry.signer_address().ok_or_else(|| {
            ClientError::Configuration("registering a batch needs a signer".to_string())
        })?;

        if !self.registry.is_authorized(owner).await? {
            return Err(ClientError::Unauthorized(format!(
                "signer {:?} is not an authorized manufacturer",
                owner
            )));
        }

        let document = batch.to_document();
        let content_ref = self.store.pin_document(&document).await?;

        let batch_id = batch.batch_fields().batch_id();
        let tx_hash = match self
            .registry
            .register_batch(&batch_id, owner, batch.production_date, &content_ref)
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                warn!(
                    "Registration of {} failed after pinning {}; the document stays unreferenced",
                    batch_id, content_ref
                );
                return Err(e);
            }
        };

        Ok(PendingRegistration {
            batch_id_hash: batch_id.hash(),
            batch_id,
            content_ref,
            tx_hash,
        })
    }

    /// Wait for a broadcast registration to confirm
    pub async fn confirm(&self, pending: PendingRegistration) -> Result<RegistrationReceipt> {
        let confirmation = self.registry.wait_for_confirmation(pending.tx_hash).await?;

        info!(
            "Registered batch {} as {} (document {})",
            pending.batch_id, pending.batch_id_hash, pending.content_ref
        );
        Ok(RegistrationReceipt {
            batch_id: pending.batch_id,
            batch_id_hash: pending.batch_id_hash,
            content_ref: pending.content_ref,
            tx_hash: confirmation.tx_hash,
            block_number: confirmation.block_number,
        })
    }

    /// Register a batch and wait for confirmation
    pub async fn register(&self, batch: &NewBatch) -> Result<RegistrationReceipt> {
        let pending = self.submit_registration(batch).await?;
        self.confirm(pending).await
    }

    /// Broadcast an allow-list addition
    pub async fn submit_authorization(&self, manufacturer: Address) -> Result<TxHash> {
        self.registry.authorize_manufacturer(manufacturer).await
    }

    /// Add a manufacturer to the allow-list and wait for confirmation
    pub async fn authorize_manufacturer(&self, manufacturer: Address) -> Result<TxConfirmation> {
        let tx_hash = self.submit_authorization(manufacturer).await?;
        let confirmation = self.registry.wait_for_confirmation(tx_hash).await?;
        info!("Authorized manufacturer {:?}", manufacturer);
        Ok(confirmation)
    }

    /// Whether an address is on the allow-list
    pub async fn is_authorized(&self, manufacturer: Address) -> Result<bool> {
        self.registry.is_authorized(manufacturer).await
    }

    /// Append a checkpoint on-chain; always fails, checkpoints are off-chain
    pub async fn add_checkpoint(&self, hash: &BatchIdHash, checkpoint: &str) -> Result<TxHash> {
        self.registry.add_checkpoint(hash, checkpoint).await
    }
}
