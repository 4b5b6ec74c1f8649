//! In-memory registry and content store used by the registrar and verifier tests
//!
//! The registry behaves like the deployed contract: only allow-listed
//! signers may register, a batch can be registered once, and every submitted
//! verify transaction increments the batch's counter.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, TxHash};

use medverify_core::{BatchId, BatchIdHash, OffChainDocument, OnChainRecord};

use crate::content_store::ContentStore;
use crate::contract::{BatchRegistry, NetworkInfo, TxConfirmation};
use crate::error::{ClientError, Result};

#[derive(Default)]
struct State {
    records: HashMap<BatchIdHash, OnChainRecord>,
    authorized: HashSet<Address>,
    submitted: Vec<TxHash>,
    block: u64,
}

pub struct InMemoryRegistry {
    signer: Option<Address>,
    state: Mutex<State>,
    /// Error returned by the next submission, if set
    fail_submissions: Mutex<Option<String>>,
    /// Error returned by reads, if set
    fail_reads: Mutex<Option<String>>,
}

impl InMemoryRegistry {
    pub fn new(signer: Option<Address>) -> Self {
        Self {
            signer,
            state: Mutex::new(State::default()),
            fail_submissions: Mutex::new(None),
            fail_reads: Mutex::new(None),
        }
    }

    /// Registry whose signer is already allow-listed
    pub fn authorized(signer: Address) -> Self {
        let registry = Self::new(Some(signer));
        registry.state.lock().unwrap().authorized.insert(signer);
        registry
    }

    pub fn fail_submissions_with(&self, reason: &str) {
        *self.fail_submissions.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_reads_with(&self, reason: &str) {
        *self.fail_reads.lock().unwrap() = Some(reason.to_string());
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    pub fn submitted(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    pub fn stored(&self, hash: &BatchIdHash) -> Option<OnChainRecord> {
        self.state.lock().unwrap().records.get(hash).cloned()
    }

    fn check_reads(&self) -> Result<()> {
        match self.fail_reads.lock().unwrap().clone() {
            Some(reason) => Err(ClientError::ContractCall(reason)),
            None => Ok(()),
        }
    }

    fn submit(&self, state: &mut State) -> Result<TxHash> {
        if self.signer.is_none() {
            return Err(ClientError::Configuration("no signer".to_string()));
        }
        if let Some(reason) = self.fail_submissions.lock().unwrap().take() {
            return Err(ClientError::ContractCall(reason));
        }
        state.block += 1;
        let tx_hash = TxHash::from_low_u64_be(state.submitted.len() as u64 + 1);
        state.submitted.push(tx_hash);
        Ok(tx_hash)
    }
}

#[async_trait]
impl BatchRegistry for InMemoryRegistry {
    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn register_batch(
        &self,
        batch_id: &BatchId,
        owner: Address,
        production_date: u64,
        content_ref: &str,
    ) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        let signer = self.signer.unwrap_or_default();
        if !state.authorized.contains(&signer) {
            return Err(ClientError::ContractCall(
                "registerMedicineBatch reverted: Not authorized manufacturer".to_string(),
            ));
        }
        let hash = batch_id.hash();
        if state.records.contains_key(&hash) {
            return Err(ClientError::ContractCall(
                "registerMedicineBatch reverted: Batch already registered".to_string(),
            ));
        }
        let tx_hash = self.submit(&mut state)?;
        state.records.insert(
            hash,
            OnChainRecord {
                is_registered: true,
                content_ref: content_ref.to_string(),
                registered_at: production_date,
                owner,
                verification_count: 0,
            },
        );
        Ok(tx_hash)
    }

    async fn authorize_manufacturer(&self, manufacturer: Address) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        let tx_hash = self.submit(&mut state)?;
        state.authorized.insert(manufacturer);
        Ok(tx_hash)
    }

    async fn is_authorized(&self, manufacturer: Address) -> Result<bool> {
        self.check_reads()?;
        Ok(self.state.lock().unwrap().authorized.contains(&manufacturer))
    }

    async fn batch_id_hash(&self, batch_id: &BatchId) -> Result<BatchIdHash> {
        self.check_reads()?;
        Ok(batch_id.hash())
    }

    async fn read_verification(&self, hash: &BatchIdHash) -> Result<OnChainRecord> {
        self.check_reads()?;
        Ok(match self.state.lock().unwrap().records.get(hash) {
            Some(record) => OnChainRecord {
                verification_count: record.verification_count + 1,
                ..record.clone()
            },
            None => OnChainRecord::unregistered(),
        })
    }

    async fn submit_verification(&self, hash: &BatchIdHash) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        let tx_hash = self.submit(&mut state)?;
        if let Some(record) = state.records.get_mut(hash) {
            record.verification_count += 1;
        }
        Ok(tx_hash)
    }

    async fn record_by_hash(&self, hash: &BatchIdHash) -> Result<OnChainRecord> {
        self.check_reads()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .get(hash)
            .cloned()
            .unwrap_or_else(OnChainRecord::unregistered))
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxConfirmation> {
        let state = self.state.lock().unwrap();
        if !state.submitted.contains(&tx_hash) {
            return Err(ClientError::ContractCall(format!("unknown transaction {:?}", tx_hash)));
        }
        Ok(TxConfirmation {
            tx_hash,
            block_number: Some(state.block),
        })
    }

    async fn network(&self) -> Result<NetworkInfo> {
        Ok(NetworkInfo {
            chain_id: 31337,
            block_number: self.state.lock().unwrap().block,
        })
    }
}

/// Content store keeping pinned documents in a map
#[derive(Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<String, OffChainDocument>>,
    fetches: Mutex<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }

    /// Drop a pinned document, as an unreachable gateway would
    pub fn forget(&self, content_ref: &str) {
        self.documents.lock().unwrap().remove(content_ref);
    }
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn pin_document(&self, document: &OffChainDocument) -> Result<String> {
        let mut documents = self.documents.lock().unwrap();
        let content_ref = format!("QmDoc{}", documents.len() + 1);
        documents.insert(content_ref.clone(), document.clone());
        Ok(content_ref)
    }

    async fn fetch_document(&self, content_ref: &str) -> Result<OffChainDocument> {
        *self.fetches.lock().unwrap() += 1;
        self.documents
            .lock()
            .unwrap()
            .get(content_ref)
            .cloned()
            .ok_or_else(|| ClientError::OffChainFetch(format!("Gateway returned 404 for {}", content_ref)))
    }
}
