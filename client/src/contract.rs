// SPDX-License-Identifier: MIT
//! Registry contract integration
//!
//! This module binds the `MedicineVerification` contract, which stores one
//! record per batch hash and keeps an allow-list of manufacturer addresses.
//! Every state-mutating call returns a transaction hash first; confirmation
//! is awaited separately so a caller can stop waiting without pretending
//! the broadcast transaction never happened.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::contract::{abigen, ContractCall, ContractError};
use ethers::core::abi::Detokenize;
use ethers::providers::{Http, Middleware, MiddlewareError as _, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::middleware::SignerMiddleware;
use ethers::types::{Address, TxHash, U256, U64};
use log::{debug, info, warn};
use serde::Serialize;

use medverify_core::{BatchId, BatchIdHash, OnChainRecord};

use crate::config::ChainConfig;
use crate::error::{ClientError, Result};

// Generate contract bindings
abigen!(
    MedicineVerification,
    r#"[
        function registerMedicineBatch(string batchId, address manufacturer, uint256 productionDate, string ipfsCid) external
        function authorizeManufacturer(address manufacturer) external
        function authorizedManufacturers(address manufacturer) external view returns (bool)
        function isAuthorizedManufacturer(address manufacturer) external view returns (bool)
        function getBatchIdHashFromBatchId(string batchId) external view returns (bytes32)
        function verifyByHash(bytes32 batchIdHash) external returns (bool, string, uint256, address, uint256)
        function getBatchRecordByHash(bytes32 batchIdHash) external view returns (bool, string, uint256, address, uint256)
    ]"#
);

/// JSON-RPC error code for a request the user rejected in the wallet
const USER_REJECTED_CODE: i64 = 4001;

/// Raw record tuple returned by the contract
type RecordTuple = (bool, String, U256, Address, U256);

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxConfirmation {
    /// Transaction hash
    pub tx_hash: TxHash,

    /// Block the transaction was included in
    pub block_number: Option<u64>,
}

/// Chain the registry lives on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Chain ID reported by the node
    pub chain_id: u64,

    /// Latest block number
    pub block_number: u64,
}

/// How the contract exposes its manufacturer allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationLookup {
    /// Public mapping getter `authorizedManufacturers(address)`
    Mapping,

    /// Query function `isAuthorizedManufacturer(address)`
    QueryFunction,
}

/// Operations the verification protocol needs from the registry
///
/// Implemented by [`MedicineContract`] for a live chain; tests substitute an
/// in-memory registry.
#[async_trait]
pub trait BatchRegistry: Send + Sync {
    /// Address bound as owner of registrations, `None` when read-only
    fn signer_address(&self) -> Option<Address>;

    /// Submit a batch registration
    async fn register_batch(
        &self,
        batch_id: &BatchId,
        owner: Address,
        production_date: u64,
        content_ref: &str,
    ) -> Result<TxHash>;

    /// Submit an allow-list addition
    async fn authorize_manufacturer(&self, manufacturer: Address) -> Result<TxHash>;

    /// Read the allow-list
    async fn is_authorized(&self, manufacturer: Address) -> Result<bool>;

    /// Ask the contract for the storage key of a batch identifier
    async fn batch_id_hash(&self, batch_id: &BatchId) -> Result<BatchIdHash>;

    /// Result a verify transaction would return, without submitting it
    async fn read_verification(&self, hash: &BatchIdHash) -> Result<OnChainRecord>;

    /// Submit a verify transaction, which increments the verification counter
    async fn submit_verification(&self, hash: &BatchIdHash) -> Result<TxHash>;

    /// Read a record without touching the verification counter
    async fn record_by_hash(&self, hash: &BatchIdHash) -> Result<OnChainRecord>;

    /// Wait until a submitted transaction is confirmed
    ///
    /// Dropping the returned future stops waiting; the transaction stays
    /// broadcast.
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxConfirmation>;

    /// Chain ID and latest block
    async fn network(&self) -> Result<NetworkInfo>;

    /// Append a distribution checkpoint on-chain
    ///
    /// Checkpoints live in the off-chain document only, so this always fails.
    async fn add_checkpoint(&self, _hash: &BatchIdHash, _checkpoint: &str) -> Result<TxHash> {
        Err(ClientError::CheckpointMovedOffChain)
    }
}

#[async_trait]
impl<T: BatchRegistry + ?Sized> BatchRegistry for Arc<T> {
    fn signer_address(&self) -> Option<Address> {
        (**self).signer_address()
    }

    async fn register_batch(
        &self,
        batch_id: &BatchId,
        owner: Address,
        production_date: u64,
        content_ref: &str,
    ) -> Result<TxHash> {
        (**self)
            .register_batch(batch_id, owner, production_date, content_ref)
            .await
    }

    async fn authorize_manufacturer(&self, manufacturer: Address) -> Result<TxHash> {
        (**self).authorize_manufacturer(manufacturer).await
    }

    async fn is_authorized(&self, manufacturer: Address) -> Result<bool> {
        (**self).is_authorized(manufacturer).await
    }

    async fn batch_id_hash(&self, batch_id: &BatchId) -> Result<BatchIdHash> {
        (**self).batch_id_hash(batch_id).await
    }

    async fn read_verification(&self, hash: &BatchIdHash) -> Result<OnChainRecord> {
        (**self).read_verification(hash).await
    }

    async fn submit_verification(&self, hash: &BatchIdHash) -> Result<TxHash> {
        (**self).submit_verification(hash).await
    }

    async fn record_by_hash(&self, hash: &BatchIdHash) -> Result<OnChainRecord> {
        (**self).record_by_hash(hash).await
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxConfirmation> {
        (**self).wait_for_confirmation(tx_hash).await
    }

    async fn network(&self) -> Result<NetworkInfo> {
        (**self).network().await
    }

    async fn add_checkpoint(&self, hash: &BatchIdHash, checkpoint: &str) -> Result<TxHash> {
        (**self).add_checkpoint(hash, checkpoint).await
    }
}

/// Why a contract call failed
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallFailure {
    /// The contract reverted
    Revert(String),

    /// The signer rejected the request
    Rejected(String),

    /// The return data could not be decoded
    Decode(String),

    /// The node could not be reached or answered with a non-revert error
    Node(String),
}

impl CallFailure {
    fn classify<M: Middleware>(err: ContractError<M>) -> Self {
        if err.is_revert() {
            let reason = err
                .decode_revert::<String>()
                .or_else(|| {
                    err.as_revert()
                        .filter(|data| !data.is_empty())
                        .map(|data| format!("0x{}", hex::encode(data)))
                })
                .unwrap_or_default();
            return CallFailure::Revert(reason);
        }

        if let Some(rpc) = err.as_middleware_error().and_then(|e| e.as_error_response()) {
            if rpc.code == USER_REJECTED_CODE {
                return CallFailure::Rejected(rpc.message.clone());
            }
            if rpc.message.contains("revert") {
                return CallFailure::Revert(rpc.message.clone());
            }
            return CallFailure::Node(rpc.message.clone());
        }

        match err {
            ContractError::DecodingError(e) => CallFailure::Decode(e.to_string()),
            ContractError::AbiError(e) => CallFailure::Decode(e.to_string()),
            other => CallFailure::Node(other.to_string()),
        }
    }

    fn into_client_error(self, operation: &str) -> ClientError {
        match self {
            CallFailure::Rejected(msg) => ClientError::Cancelled(format!("{}: {}", operation, msg)),
            CallFailure::Revert(reason) if reason.is_empty() => {
                ClientError::ContractCall(format!("{} reverted", operation))
            }
            CallFailure::Revert(reason) => {
                ClientError::ContractCall(format!("{} reverted: {}", operation, reason))
            }
            CallFailure::Decode(msg) => {
                ClientError::ContractCall(format!("{} returned undecodable data: {}", operation, msg))
            }
            CallFailure::Node(msg) => ClientError::ContractCall(format!("{} failed: {}", operation, msg)),
        }
    }

    /// A revert or empty return means the function is not there
    fn means_absent(&self) -> bool {
        matches!(self, CallFailure::Revert(_) | CallFailure::Decode(_))
    }
}

fn to_u64(value: U256, field: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(ClientError::ContractCall(format!("{} does not fit in 64 bits: {}", field, value)));
    }
    Ok(value.as_u64())
}

fn record_from_tuple(tuple: RecordTuple) -> Result<OnChainRecord> {
    let (is_registered, content_ref, registered_at, owner, verification_count) = tuple;
    Ok(OnChainRecord {
        is_registered,
        content_ref,
        registered_at: to_u64(registered_at, "registeredAt")?,
        owner,
        verification_count: to_u64(verification_count, "verificationCount")?,
    })
}

/// Bound registry contract
#[derive(Debug)]
pub struct MedicineContract<M> {
    /// Generated contract binding
    contract: MedicineVerification<M>,

    /// Middleware the contract talks through
    client: Arc<M>,

    /// Signer address, if the middleware signs
    signer: Option<Address>,

    /// Allow-list lookup resolved at bind time
    authorization: AuthorizationLookup,

    /// Confirmations to wait for
    confirmations: usize,

    /// Receipt poll interval
    poll_interval: Duration,
}

impl<M: Middleware + 'static> MedicineContract<M> {
    /// Bind the contract at `address`
    ///
    /// Fails with a configuration error when no code is deployed there or
    /// when the contract exposes no allow-list lookup.
    pub async fn bind(
        client: Arc<M>,
        address: Address,
        signer: Option<Address>,
        config: &ChainConfig,
    ) -> Result<Self> {
        let code = client
            .get_code(address, None)
            .await
            .map_err(|e| ClientError::Wallet(format!("Failed to reach chain node: {}", e)))?;
        if code.as_ref().is_empty() {
            return Err(ClientError::Configuration(format!(
                "no contract deployed at {:?}",
                address
            )));
        }

        let contract = MedicineVerification::new(address, client.clone());
        let authorization = Self::resolve_authorization(&contract).await?;
        info!("Bound registry contract at {:?} ({:?} allow-list)", address, authorization);

        Ok(Self {
            contract,
            client,
            signer,
            authorization,
            confirmations: config.confirmations,
            poll_interval: config.poll_interval(),
        })
    }

    async fn resolve_authorization(
        contract: &MedicineVerification<M>,
    ) -> Result<AuthorizationLookup> {
        match contract.authorized_manufacturers(Address::zero()).call().await {
            Ok(_) => return Ok(AuthorizationLookup::Mapping),
            Err(e) => {
                let failure = CallFailure::classify(e);
                if !failure.means_absent() {
                    return Err(failure.into_client_error("authorizedManufacturers lookup"));
                }
                debug!("authorizedManufacturers unavailable: {:?}", failure);
            }
        }

        match contract.is_authorized_manufacturer(Address::zero()).call().await {
            Ok(_) => Ok(AuthorizationLookup::QueryFunction),
            Err(e) => {
                let failure = CallFailure::classify(e);
                if !failure.means_absent() {
                    return Err(failure.into_client_error("isAuthorizedManufacturer lookup"));
                }
                Err(ClientError::Configuration(
                    "contract exposes neither authorizedManufacturers nor isAuthorizedManufacturer"
                        .to_string(),
                ))
            }
        }
    }

    fn require_signer(&self, operation: &str) -> Result<()> {
        if self.signer.is_none() {
            return Err(ClientError::Configuration(format!(
                "{} needs a signer; set a private key",
                operation
            )));
        }
        Ok(())
    }

    async fn read<D: Detokenize + Send + Sync>(
        &self,
        operation: &str,
        call: ContractCall<M, D>,
    ) -> Result<D> {
        call.call()
            .await
            .map_err(|e| CallFailure::classify(e).into_client_error(operation))
    }

    async fn submit<D: Detokenize + Send + Sync>(
        &self,
        operation: &str,
        call: ContractCall<M, D>,
    ) -> Result<TxHash> {
        self.require_signer(operation)?;

        let pending = call
            .send()
            .await
            .map_err(|e| CallFailure::classify(e).into_client_error(operation))?;
        let tx_hash = pending.tx_hash();

        info!("Submitted {} (tx: {:?})", operation, tx_hash);
        Ok(tx_hash)
    }
}

#[async_trait]
impl<M: Middleware + 'static> BatchRegistry for MedicineContract<M> {
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
        let call = self.contract.register_medicine_batch(
            batch_id.as_str().to_string(),
            owner,
            U256::from(production_date),
            content_ref.to_string(),
        );
        self.submit("registerMedicineBatch", call).await
    }

    async fn authorize_manufacturer(&self, manufacturer: Address) -> Result<TxHash> {
        let call = self.contract.authorize_manufacturer(manufacturer);
        self.submit("authorizeManufacturer", call).await
    }

    async fn is_authorized(&self, manufacturer: Address) -> Result<bool> {
        match self.authorization {
            AuthorizationLookup::Mapping => {
                self.read(
                    "authorizedManufacturers",
                    self.contract.authorized_manufacturers(manufacturer),
                )
                .await
            }
            AuthorizationLookup::QueryFunction => {
                self.read(
                    "isAuthorizedManufacturer",
                    self.contract.is_authorized_manufacturer(manufacturer),
                )
                .await
            }
        }
    }

    async fn batch_id_hash(&self, batch_id: &BatchId) -> Result<BatchIdHash> {
        let hash = self
            .read(
                "getBatchIdHashFromBatchId",
                self.contract.get_batch_id_hash_from_batch_id(batch_id.as_str().to_string()),
            )
            .await?;
        Ok(BatchIdHash::from_bytes(hash))
    }

    async fn read_verification(&self, hash: &BatchIdHash) -> Result<OnChainRecord> {
        let call = self.contract.verify_by_hash(*hash.as_bytes());
        let call = match self.signer {
            Some(from) => call.from(from),
            None => call,
        };
        record_from_tuple(self.read("verifyByHash", call).await?)
    }

    async fn submit_verification(&self, hash: &BatchIdHash) -> Result<TxHash> {
        let call = self.contract.verify_by_hash(*hash.as_bytes());
        self.submit("verifyByHash", call).await
    }

    async fn record_by_hash(&self, hash: &BatchIdHash) -> Result<OnChainRecord> {
        let call = self.contract.get_batch_record_by_hash(*hash.as_bytes());
        record_from_tuple(self.read("getBatchRecordByHash", call).await?)
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TxConfirmation> {
        debug!(
            "Waiting for {} confirmation(s) of {:?}",
            self.confirmations, tx_hash
        );

        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .interval(self.poll_interval)
            .confirmations(self.confirmations)
            .await
            .map_err(|e| ClientError::ContractCall(format!("Failed to await {:?}: {}", tx_hash, e)))?
            .ok_or_else(|| {
                ClientError::ContractCall(format!("Transaction {:?} was dropped", tx_hash))
            })?;

        let block_number = receipt.block_number.map(|b| b.as_u64());
        if receipt.status == Some(U64::zero()) {
            return Err(ClientError::ContractCall(format!(
                "Transaction {:?} reverted in block {:?}",
                tx_hash, block_number
            )));
        }

        info!("Confirmed {:?} in block {:?}", tx_hash, block_number);
        Ok(TxConfirmation {
            tx_hash,
            block_number,
        })
    }

    async fn network(&self) -> Result<NetworkInfo> {
        let chain_id = self
            .client
            .get_chainid()
            .await
            .map_err(|e| ClientError::Wallet(format!("Failed to get chain id: {}", e)))?;
        let block_number = self
            .client
            .get_block_number()
            .await
            .map_err(|e| ClientError::Wallet(format!("Failed to get block number: {}", e)))?;

        Ok(NetworkInfo {
            chain_id: to_u64(chain_id, "chainId")?,
            block_number: block_number.as_u64(),
        })
    }
}

/// Middleware that signs with a local key
pub type SigningClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Registry binding with or without a signer
pub enum Connection {
    /// No private key configured; reads only
    ReadOnly(MedicineContract<Provider<Http>>),

    /// Transactions are signed with the configured key
    Signing(MedicineContract<SigningClient>),
}

impl Connection {
    /// Connect to the node and bind the registry contract
    pub async fn open(config: &ChainConfig) -> Result<Self> {
        let address = config.contract_address()?;
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| ClientError::Configuration(format!("Invalid rpc url {:?}: {}", config.rpc_url, e)))?
            .interval(config.poll_interval());

        let node_chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ClientError::Wallet(format!("Failed to reach chain node: {}", e)))?;
        if node_chain_id != U256::from(config.chain_id) {
            return Err(ClientError::Configuration(format!(
                "node reports chain id {} but {} is configured",
                node_chain_id, config.chain_id
            )));
        }

        let Some(key) = config.signer_private_key.as_deref().filter(|k| !k.is_empty()) else {
            warn!("No signer key configured, registry access is read-only");
            let contract = MedicineContract::bind(Arc::new(provider), address, None, config).await?;
            return Ok(Connection::ReadOnly(contract));
        };

        let wallet = LocalWallet::from_str(key.trim())
            .map_err(|_| ClientError::Configuration("signer private key is not a valid hex key".to_string()))?
            .with_chain_id(config.chain_id);
        let signer = wallet.address();
        info!("Signing as {:?}", signer);

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = MedicineContract::bind(client, address, Some(signer), config).await?;
        Ok(Connection::Signing(contract))
    }
}
