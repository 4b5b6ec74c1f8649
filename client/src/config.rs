//! Configuration for the medverify client
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML or JSON file, then `MEDVERIFY__*` environment variables
//! (for example `MEDVERIFY__CHAIN__RPC_URL`). The CLI applies its own flags
//! on top.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use config::{Config, Environment, File};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{to_config_error, ClientError, Result};

/// Default Pinata pinning endpoint
pub const DEFAULT_PIN_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";

/// Default public IPFS gateway
pub const DEFAULT_GATEWAY_URL: &str = "https://ipfs.io";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MEDVERIFY";

/// Chain and contract settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node
    pub rpc_url: String,

    /// Address of the deployed registry contract
    pub contract_address: Option<String>,

    /// Chain ID used for signing
    pub chain_id: u64,

    /// Hex private key of the signer; read-only operation without it
    pub signer_private_key: Option<String>,

    /// Confirmations to wait for after submitting a transaction
    pub confirmations: usize,

    /// Submit verify transactions so the contract counts verifications
    pub record_verifications: bool,

    /// Interval between receipt polls in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: None,
            chain_id: 31337, // Local Hardhat/Anvil chain
            signer_private_key: None,
            confirmations: 1,
            record_verifications: true,
            poll_interval_ms: 2000,
        }
    }
}

impl ChainConfig {
    /// Parsed contract address
    pub fn contract_address(&self) -> Result<Address> {
        let raw = self
            .contract_address
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| to_config_error("contract address is not set"))?;

        Address::from_str(raw.trim())
            .map_err(|e| ClientError::Configuration(format!("invalid contract address {:?}: {}", raw, e)))
    }

    /// Receipt poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("chain_id", &self.chain_id)
            .field("signer_private_key", &self.signer_private_key.as_ref().map(|_| "<redacted>"))
            .field("confirmations", &self.confirmations)
            .field("record_verifications", &self.record_verifications)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

/// Content store settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStoreConfig {
    /// Endpoint that pins a JSON document and returns its CID
    pub pin_endpoint: String,

    /// Public gateway base URL, documents are read from `{gateway_url}/ipfs/{cid}`
    pub gateway_url: String,

    /// Bearer token for pinning; reads are unauthenticated
    pub jwt: Option<String>,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            pin_endpoint: DEFAULT_PIN_ENDPOINT.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            jwt: None,
            timeout_secs: 30,
        }
    }
}

impl ContentStoreConfig {
    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ContentStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStoreConfig")
            .field("pin_endpoint", &self.pin_endpoint)
            .field("gateway_url", &self.gateway_url)
            .field("jwt", &self.jwt.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Chain and contract settings
    pub chain: ChainConfig,

    /// Content store settings
    pub content_store: ContentStoreConfig,
}

impl ClientConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load configuration from a file only, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Check the settings every operation depends on
    pub fn validate(&self) -> Result<()> {
        self.chain.contract_address()?;

        if self.chain.rpc_url.trim().is_empty() {
            return Err(to_config_error("rpc url is not set"));
        }
        if self.chain.chain_id == 0 {
            return Err(to_config_error("chain id must be non-zero"));
        }
        if self.content_store.gateway_url.trim().is_empty() {
            return Err(to_config_error("content store gateway url is not set"));
        }
        Ok(())
    }
}
