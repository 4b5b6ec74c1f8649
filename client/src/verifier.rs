//! Batch verification
//!
//! The contract record decides whether a batch exists. The off-chain document
//! is fetched afterwards and only fills in details and cross-checks the
//! presented fields; if it cannot be read the verdict still stands on the
//! chain alone. Contract failures are always errors, never a counterfeit
//! verdict.

use log::{debug, info, warn};

use medverify_core::verdict::evaluate;
use medverify_core::{
    unix_now, BatchDetails, BatchFields, BatchIdHash, QrPayload, VerificationVerdict,
};

use crate::content_store::{fetch_or_unavailable, ContentStore};
use crate::contract::BatchRegistry;
use crate::error::{ClientError, Result};

/// Answers verification queries against the registry
pub struct Verifier<R, S> {
    registry: R,
    store: S,
    record_verifications: bool,
    clock: fn() -> u64,
}

impl<R: BatchRegistry, S: ContentStore> Verifier<R, S> {
    /// Create a verifier that records every verification on-chain
    pub fn new(registry: R, store: S) -> Self {
        Self {
            registry,
            store,
            record_verifications: true,
            clock: unix_now,
        }
    }

    /// Submit verify transactions or only read
    pub fn record_verifications(mut self, record: bool) -> Self {
        self.record_verifications = record;
        self
    }

    /// Replace the clock used for expiry checks
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying registry
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Verify a batch from its three identifying fields
    pub async fn verify_fields(&self, fields: &BatchFields) -> Result<VerificationVerdict> {
        let hash = self.resolve_hash(fields).await?;
        self.verify(&hash, Some(fields)).await
    }

    /// Verify a batch from its hash; there are no fields to cross-check
    pub async fn verify_hash(&self, hash: &BatchIdHash) -> Result<VerificationVerdict> {
        self.verify(hash, None).await
    }

    /// Verify a scanned QR payload
    pub async fn verify_payload(&self, text: &str) -> Result<VerificationVerdict> {
        match QrPayload::parse(text)? {
            QrPayload::Hash(hash) => self.verify_hash(&hash).await,
            QrPayload::Fields(fields) => self.verify_fields(&fields).await,
        }
    }

    /// Current details of a batch without counting a verification
    pub async fn details_by_hash(&self, hash: &BatchIdHash) -> Result<BatchDetails> {
        let record = self.registry.record_by_hash(hash).await?;
        if !record.is_registered {
            debug!("Batch {} is not registered", hash);
            return Ok(BatchDetails::default());
        }

        let fetched = fetch_or_unavailable(&self.store, record.content_ref()).await;
        Ok(BatchDetails::merge(&record, &fetched))
    }

    /// Current details of a batch from its fields without counting a verification
    pub async fn details_from_fields(&self, fields: &BatchFields) -> Result<BatchDetails> {
        let hash = self.resolve_hash(fields).await?;
        self.details_by_hash(&hash).await
    }

    /// Storage key of a batch as the contract computes it
    async fn resolve_hash(&self, fields: &BatchFields) -> Result<BatchIdHash> {
        let batch_id = fields.batch_id();
        let hash = self.registry.batch_id_hash(&batch_id).await?;

        let local = batch_id.hash();
        if !hash.matches(&local) {
            warn!(
                "Contract hash {} for {} differs from local derivation {}; using the contract's",
                hash, batch_id, local
            );
        }
        Ok(hash)
    }

    async fn verify(
        &self,
        hash: &BatchIdHash,
        presented: Option<&BatchFields>,
    ) -> Result<VerificationVerdict> {
        if self.record_verifications && self.registry.signer_address().is_none() {
            return Err(ClientError::Configuration(
                "recording verifications needs a signer; disable record_verifications for read-only use"
                    .to_string(),
            ));
        }

        let record = self.registry.read_verification(hash).await?;
        if !record.is_registered {
            info!("Batch {} is not registered", hash);
            return Ok(VerificationVerdict::not_registered());
        }

        if self.record_verifications {
            let tx_hash = self.registry.submit_verification(hash).await?;
            let confirmation = self.registry.wait_for_confirmation(tx_hash).await?;
            debug!(
                "Verification of {} recorded in {:?} (block {:?})",
                hash, confirmation.tx_hash, confirmation.block_number
            );
        }

        let fetched = fetch_or_unavailable(&self.store, record.content_ref()).await;
        let verdict = evaluate(&record, &fetched, presented, (self.clock)());

        info!("Batch {}: {}", hash, verdict.summary());
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ethers::types::Address;
    use medverify_core::NewBatch;

    use crate::config::ContentStoreConfig;
    use crate::content_store::{MockContentStore, PinataStore};
    use crate::registrar::Registrar;
    use crate::testing::{InMemoryRegistry, InMemoryStore};

    fn signer() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn batch(expiry_date: u64) -> NewBatch {
        NewBatch {
            manufacturer: "Acme".to_string(),
            product_name: "Metformin".to_string(),
            production_date: 1_700_000_000,
            expiry_date,
            batch_number: "B1".to_string(),
        }
    }

    fn fields() -> BatchFields {
        BatchFields::new("B1", "Acme", 1_700_000_000)
    }

    /// Registry and store shared between a registrar and a verifier
    async fn registered(
        expiry_date: u64,
    ) -> (Arc<InMemoryRegistry>, Arc<InMemoryStore>, BatchIdHash) {
        let registry = Arc::new(InMemoryRegistry::authorized(signer()));
        let store = Arc::new(InMemoryStore::new());
        let receipt = Registrar::new(registry.clone(), store.clone())
            .register(&batch(expiry_date))
            .await
            .unwrap();
        (registry, store, receipt.batch_id_hash)
    }

    #[tokio::test]
    async fn test_registered_batch_is_authentic() {
        let (registry, store, _) = registered(1_900_000_000).await;
        let verifier = Verifier::new(registry, store).with_clock(|| 1_800_000_000);

        let verdict = verifier.verify_fields(&fields()).await.unwrap();

        assert!(verdict.is_authentic());
        assert!(verdict.fields_match);
        assert!(!verdict.is_expired);
        assert_eq!(verdict.details.product_name, "Metformin");
        assert_eq!(verdict.details.owner, signer());
        assert_eq!(verdict.details.verification_count, 1);
        assert!(verdict.details.document_available);
    }

    #[tokio::test]
    async fn test_each_verification_is_counted() {
        let (registry, store, hash) = registered(0).await;
        let verifier = Verifier::new(registry, store);

        verifier.verify_hash(&hash).await.unwrap();
        let verdict = verifier.verify_hash(&hash).await.unwrap();

        assert_eq!(verdict.details.verification_count, 2);
        assert_eq!(verifier.registry().stored(&hash).unwrap().verification_count, 2);
    }

    #[tokio::test]
    async fn test_read_only_verification_does_not_count() {
        let (registry, store, hash) = registered(0).await;
        let submitted = registry.submitted();
        let verifier = Verifier::new(registry, store).record_verifications(false);

        let verdict = verifier.verify_hash(&hash).await.unwrap();

        assert!(verdict.is_authentic());
        assert_eq!(verifier.registry().submitted(), submitted);
        assert_eq!(verifier.registry().stored(&hash).unwrap().verification_count, 0);
    }

    #[tokio::test]
    async fn test_unregistered_batch_skips_fetch() {
        let mut store = MockContentStore::new();
        store.expect_fetch_document().times(0);
        let verifier = Verifier::new(InMemoryRegistry::authorized(signer()), store);

        let verdict = verifier.verify_fields(&fields()).await.unwrap();

        assert!(!verdict.is_registered);
        assert!(!verdict.is_authentic());
        assert_eq!(verdict.details, BatchDetails::default());
        assert_eq!(verifier.registry().submitted(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_document_keeps_chain_verdict() {
        let (registry, store, hash) = registered(0).await;
        let content_ref = registry.stored(&hash).unwrap().content_ref;
        store.forget(&content_ref);
        let verifier = Verifier::new(registry, store);

        let verdict = verifier.verify_fields(&fields()).await.unwrap();

        assert!(verdict.is_authentic());
        assert!(!verdict.details.document_available);
        assert!(verdict.details.product_name.is_empty());
        assert!(verdict.details.checkpoints.is_empty());
        assert_eq!(verdict.details.content_ref, content_ref);
    }

    #[tokio::test]
    async fn test_expired_batch() {
        let (registry, store, hash) = registered(1_750_000_000).await;
        let verifier = Verifier::new(registry, store).with_clock(|| 1_750_000_001);

        let verdict = verifier.verify_hash(&hash).await.unwrap();

        assert!(verdict.is_registered);
        assert!(verdict.is_expired);
        assert!(!verdict.is_authentic());
    }

    #[tokio::test]
    async fn test_tampered_document_is_a_mismatch() {
        let registry = Arc::new(InMemoryRegistry::authorized(signer()));
        let mut store = MockContentStore::new();
        store.expect_pin_document().returning(|_| Ok("QmTampered".to_string()));
        store.expect_fetch_document().returning(|_| {
            let mut doc = batch(0).to_document();
            doc.manufacturer = "Counterfeit Labs".to_string();
            Ok(doc)
        });
        let store = Arc::new(store);
        Registrar::new(registry.clone(), store.clone())
            .register(&batch(0))
            .await
            .unwrap();

        let verdict = Verifier::new(registry, store)
            .verify_fields(&fields())
            .await
            .unwrap();

        assert!(verdict.is_registered);
        assert!(!verdict.fields_match);
        assert!(!verdict.is_authentic());
    }

    const GATEWAY_CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    /// Register the batch, then verify it against a gateway serving `body`
    async fn verify_against_gateway(body: &str, now: fn() -> u64) -> VerificationVerdict {
        let registry = Arc::new(InMemoryRegistry::authorized(signer()));
        let mut pinning = MockContentStore::new();
        pinning
            .expect_pin_document()
            .returning(|_| Ok(GATEWAY_CID.to_string()));
        Registrar::new(registry.clone(), pinning)
            .register(&batch(0))
            .await
            .unwrap();

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/ipfs/{GATEWAY_CID}").as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let gateway = PinataStore::new(&ContentStoreConfig {
            gateway_url: server.url(),
            timeout_secs: 5,
            ..ContentStoreConfig::default()
        });

        Verifier::new(registry, gateway)
            .record_verifications(false)
            .with_clock(now)
            .verify_fields(&fields())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_loosely_typed_counterfeit_document_is_rejected() {
        let body = r#"{
            "manufacturer": "Counterfeit Labs",
            "productName": "Metformin",
            "productionDate": "1700000000",
            "expiryDate": "1600000000",
            "batchNumber": "B1",
            "distributionPath": null
        }"#;

        let verdict = verify_against_gateway(body, || 1_700_000_000).await;

        assert!(verdict.details.document_available);
        assert_eq!(verdict.details.manufacturer, "Counterfeit Labs");
        assert_eq!(verdict.details.expiry_date, 1_600_000_000);
        assert!(!verdict.fields_match);
        assert!(verdict.is_expired);
        assert!(!verdict.is_authentic());
    }

    #[tokio::test]
    async fn test_null_expiry_reads_as_no_expiry() {
        let body = r#"{
            "manufacturer": "Acme",
            "productionDate": 1700000000.0,
            "expiryDate": null,
            "batchNumber": "B1"
        }"#;

        let verdict = verify_against_gateway(body, || 1_700_000_000).await;

        assert!(verdict.details.document_available);
        assert_eq!(verdict.details.expiry_date, 0);
        assert!(verdict.fields_match);
        assert!(verdict.is_authentic());
    }

    #[tokio::test]
    async fn test_fractional_expiry_is_floored() {
        let body = r#"{
            "manufacturer": "Acme",
            "productionDate": 1700000000,
            "expiryDate": 1999999999.5,
            "batchNumber": "B1"
        }"#;

        let verdict = verify_against_gateway(body, || 2_000_000_000).await;
        assert_eq!(verdict.details.expiry_date, 1_999_999_999);
        assert!(verdict.is_expired);

        let verdict = verify_against_gateway(body, || 1_999_999_999).await;
        assert!(!verdict.is_expired);
        assert!(verdict.is_authentic());
    }

    #[tokio::test]
    async fn test_contract_failure_is_not_a_verdict() {
        let (registry, store, hash) = registered(0).await;
        registry.fail_reads_with("connection refused");
        let verifier = Verifier::new(registry, store);

        let err = verifier.verify_hash(&hash).await.unwrap_err();
        assert!(matches!(err, ClientError::ContractCall(msg) if msg == "connection refused"));
    }

    #[tokio::test]
    async fn test_recording_without_signer_is_config_error() {
        let verifier = Verifier::new(InMemoryRegistry::new(None), InMemoryStore::new());

        let err = verifier.verify_fields(&fields()).await.unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_payloads() {
        let (registry, store, hash) = registered(0).await;
        let verifier = Verifier::new(registry, store).record_verifications(false);

        let by_hash = verifier.verify_payload(&hash.to_string()).await.unwrap();
        assert!(by_hash.is_authentic());

        let json = r#"{"batchNumber":"B1","manufacturer":"Acme","productionDate":1700000000}"#;
        let by_fields = verifier.verify_payload(json).await.unwrap();
        assert!(by_fields.is_authentic());
        assert_eq!(by_fields.details, by_hash.details);
    }

    #[tokio::test]
    async fn test_malformed_payload_offers_manual_entry() {
        let verifier = Verifier::new(InMemoryRegistry::authorized(signer()), InMemoryStore::new());

        let err = verifier.verify_payload("not a batch").await.unwrap_err();

        assert!(err.offers_manual_entry());
        assert_eq!(verifier.registry().submitted(), 0);
    }

    #[tokio::test]
    async fn test_details_do_not_count() {
        let (registry, store, hash) = registered(0).await;
        let verifier = Verifier::new(registry, store.clone());

        let details = verifier.details_from_fields(&fields()).await.unwrap();

        assert!(details.is_registered);
        assert_eq!(details.batch_number, "B1");
        assert_eq!(details.verification_count, 0);
        assert_eq!(verifier.registry().stored(&hash).unwrap().verification_count, 0);

        let unknown = BatchFields::new("B2", "Acme", 1_700_000_000);
        assert_eq!(
            verifier.details_from_fields(&unknown).await.unwrap(),
            BatchDetails::default()
        );
        assert_eq!(store.fetches(), 1);
    }
}
