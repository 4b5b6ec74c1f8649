use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::debug;

use medverify_client::ClientConfig;

mod commands;
mod output;

use commands::Command;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Register and verify medicine batches against the on-chain registry")]
struct Args {
    /// Config file path (TOML or JSON)
    #[clap(short, long, env = "MEDVERIFY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the chain node
    #[clap(long, env = "RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// Address of the registry contract
    #[clap(long, env = "CONTRACT_ADDRESS", global = true)]
    contract_address: Option<String>,

    /// Chain ID used for signing
    #[clap(long, env = "CHAIN_ID", global = true)]
    chain_id: Option<u64>,

    /// Hex private key of the signer
    #[clap(long, env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    private_key: Option<String>,

    /// Pinata JWT for document uploads
    #[clap(long, env = "PINATA_JWT", hide_env_values = true, global = true)]
    pinata_jwt: Option<String>,

    /// Public IPFS gateway base URL
    #[clap(long, env = "IPFS_GATEWAY_URL", global = true)]
    gateway_url: Option<String>,

    /// Confirmations to wait for after each transaction
    #[clap(long, env = "CONFIRMATIONS", global = true)]
    confirmations: Option<usize>,

    /// Submit verify transactions so the contract counts verifications
    #[clap(long, env = "RECORD_VERIFICATIONS", global = true)]
    record_verifications: Option<bool>,

    /// Print results as JSON
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

impl Args {
    /// Load the layered configuration and apply command-line overrides
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load(self.config.as_deref())?;

        if let Some(rpc_url) = &self.rpc_url {
            config.chain.rpc_url = rpc_url.clone();
        }
        if let Some(contract_address) = &self.contract_address {
            config.chain.contract_address = Some(contract_address.clone());
        }
        if let Some(chain_id) = self.chain_id {
            config.chain.chain_id = chain_id;
        }
        if let Some(private_key) = &self.private_key {
            config.chain.signer_private_key = Some(private_key.clone());
        }
        if let Some(confirmations) = self.confirmations {
            config.chain.confirmations = confirmations;
        }
        if let Some(record_verifications) = self.record_verifications {
            config.chain.record_verifications = record_verifications;
        }
        if let Some(pinata_jwt) = &self.pinata_jwt {
            config.content_store.jwt = Some(pinata_jwt.clone());
        }
        if let Some(gateway_url) = &self.gateway_url {
            config.content_store.gateway_url = gateway_url.clone();
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();
    let config = args.load_config()?;
    debug!("Loaded configuration: {:?}", config);

    commands::run(args.command, &config, args.json).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "medverify",
            "--rpc-url",
            "https://rpc.sepolia.org",
            "--chain-id",
            "11155111",
            "--confirmations",
            "2",
            "--record-verifications",
            "false",
            "network",
        ])
        .unwrap();

        let config = args.load_config().unwrap();

        assert_eq!(config.chain.rpc_url, "https://rpc.sepolia.org");
        assert_eq!(config.chain.chain_id, 11155111);
        assert_eq!(config.chain.confirmations, 2);
        assert!(!config.chain.record_verifications);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["medverify", "verify-hash", "0x00", "--json"]).unwrap();
        assert!(args.json);
        assert!(matches!(args.command, Command::VerifyHash { .. }));
    }
}
