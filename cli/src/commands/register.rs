use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use ethers::types::{Address, TxHash};
use serde::Serialize;

use medverify_client::{BatchRegistry, ContentStore, Registrar, TxConfirmation};
use medverify_core::{BatchIdHash, NewBatch};

use super::{until_interrupted, Waited, EXIT_INTERRUPTED};
use crate::output;

fn parse_address(text: &str) -> Result<Address> {
    Address::from_str(text.trim()).map_err(|e| anyhow!("invalid address {:?}: {}", text, e))
}

fn report_interrupted(tx_hash: TxHash) -> ExitCode {
    eprintln!(
        "Stopped waiting. Transaction {:?} was broadcast and may still confirm.",
        tx_hash
    );
    ExitCode::from(EXIT_INTERRUPTED)
}

pub async fn register<R: BatchRegistry, S: ContentStore>(
    registrar: &Registrar<R, S>,
    batch: NewBatch,
    json: bool,
) -> Result<ExitCode> {
    let pending = registrar.submit_registration(&batch).await?;
    let tx_hash = pending.tx_hash;
    eprintln!("Submitted registration {:?}, waiting for confirmation", tx_hash);

    let receipt = match until_interrupted(registrar.confirm(pending)).await? {
        Waited::Done(result) => result?,
        Waited::Interrupted => return Ok(report_interrupted(tx_hash)),
    };

    output::emit(json, &receipt, |receipt| {
        println!("Batch registered");
        println!("Batch ID:           {}", receipt.batch_id);
        println!("Batch hash:         {}", receipt.batch_id_hash);
        println!("Document:           {}", receipt.content_ref);
        println!("Transaction:        {:?}", receipt.tx_hash);
        if let Some(block) = receipt.block_number {
            println!("Block:              {}", block);
        }
        println!();
        println!("Encode the batch hash in the package QR code.");
    })?;
    Ok(ExitCode::SUCCESS)
}

pub async fn authorize<R: BatchRegistry, S: ContentStore>(
    registrar: &Registrar<R, S>,
    address: &str,
    json: bool,
) -> Result<ExitCode> {
    let manufacturer = parse_address(address)?;
    let tx_hash = registrar.submit_authorization(manufacturer).await?;
    eprintln!("Submitted authorization {:?}, waiting for confirmation", tx_hash);

    let waited = until_interrupted(registrar.registry().wait_for_confirmation(tx_hash)).await?;
    let confirmation: TxConfirmation = match waited {
        Waited::Done(result) => result?,
        Waited::Interrupted => return Ok(report_interrupted(tx_hash)),
    };

    output::emit(json, &confirmation, |confirmation| {
        println!(
            "Authorized {:?} (transaction {:?})",
            manufacturer, confirmation.tx_hash
        );
    })?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationStatus {
    address: Address,
    is_authorized: bool,
}

pub async fn is_authorized<R: BatchRegistry, S: ContentStore>(
    registrar: &Registrar<R, S>,
    address: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let address = match address {
        Some(address) => parse_address(address)?,
        None => registrar
            .registry()
            .signer_address()
            .ok_or_else(|| anyhow!("no address given and no signer configured"))?,
    };

    let status = AuthorizationStatus {
        address,
        is_authorized: registrar.is_authorized(address).await?,
    };

    output::emit(json, &status, |status| {
        if status.is_authorized {
            println!("{:?} is an authorized manufacturer", status.address);
        } else {
            println!("{:?} is not an authorized manufacturer", status.address);
        }
    })?;
    Ok(ExitCode::SUCCESS)
}

pub async fn add_checkpoint<R: BatchRegistry, S: ContentStore>(
    registrar: &Registrar<R, S>,
    hash: &BatchIdHash,
    checkpoint: &str,
) -> Result<ExitCode> {
    let tx_hash = registrar.add_checkpoint(hash, checkpoint).await?;
    println!("Checkpoint recorded in {:?}", tx_hash);
    Ok(ExitCode::SUCCESS)
}
