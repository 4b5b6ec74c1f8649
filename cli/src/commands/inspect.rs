use std::process::ExitCode;

use anyhow::Result;
use log::warn;
use serde::Serialize;

use medverify_client::BatchRegistry;
use medverify_core::{BatchFields, BatchId, BatchIdHash, QrPayload};

use super::BatchRef;
use crate::output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashOutput {
    batch_id: BatchId,
    batch_id_hash: BatchIdHash,
}

fn print_hash(hashed: &HashOutput) {
    println!("Batch ID:           {}", hashed.batch_id);
    println!("Batch hash:         {}", hashed.batch_id_hash);
}

pub fn local_hash(fields: &BatchFields, json: bool) -> Result<ExitCode> {
    let batch_id = fields.batch_id();
    let hashed = HashOutput {
        batch_id_hash: batch_id.hash(),
        batch_id,
    };

    output::emit(json, &hashed, print_hash)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn contract_hash<R: BatchRegistry>(
    registry: &R,
    fields: &BatchFields,
    json: bool,
) -> Result<ExitCode> {
    let batch_id = fields.batch_id();
    let batch_id_hash = registry.batch_id_hash(&batch_id).await?;
    if !batch_id_hash.matches(&batch_id.hash()) {
        warn!("Contract hash for {} differs from the local derivation", batch_id);
    }

    output::emit(json, &HashOutput { batch_id, batch_id_hash }, print_hash)?;
    Ok(ExitCode::SUCCESS)
}

/// Payload to encode for a batch
///
/// Fields encode to their hash unless `fields_json` asks for the JSON form.
fn qr_payload(batch: &BatchRef, fields_json: bool) -> Result<QrPayload> {
    Ok(match batch.target()? {
        QrPayload::Fields(fields) if !fields_json => QrPayload::Hash(fields.batch_id().hash()),
        payload => payload,
    })
}

#[derive(Serialize)]
struct QrOutput {
    payload: String,
}

pub fn qr(batch: &BatchRef, fields_json: bool, json: bool) -> Result<ExitCode> {
    let rendered = QrOutput {
        payload: qr_payload(batch, fields_json)?.encode(),
    };

    output::emit(json, &rendered, |rendered| println!("{}", rendered.payload))?;
    Ok(ExitCode::SUCCESS)
}

pub async fn network<R: BatchRegistry>(registry: &R, json: bool) -> Result<ExitCode> {
    let network = registry.network().await?;

    output::emit(json, &network, |network| {
        println!("Chain ID:           {}", network.chain_id);
        println!("Latest block:       {}", network.block_number);
    })?;
    Ok(ExitCode::SUCCESS)
}
