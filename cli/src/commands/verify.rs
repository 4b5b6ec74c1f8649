use std::process::ExitCode;

use anyhow::Result;

use medverify_client::{BatchRegistry, ContentStore, Verifier};
use medverify_core::error::MANUAL_ENTRY_HINT;
use medverify_core::{CoreError, QrPayload};

use super::{until_interrupted, Waited, EXIT_BAD_PAYLOAD, EXIT_INTERRUPTED};
use crate::output;

pub async fn verify<R: BatchRegistry, S: ContentStore>(
    verifier: &Verifier<R, S>,
    payload: QrPayload,
    json: bool,
) -> Result<ExitCode> {
    let outcome = until_interrupted(async {
        match &payload {
            QrPayload::Hash(hash) => verifier.verify_hash(hash).await,
            QrPayload::Fields(fields) => verifier.verify_fields(fields).await,
        }
    })
    .await?;

    let verdict = match outcome {
        Waited::Done(result) => result?,
        Waited::Interrupted => {
            eprintln!(
                "Interrupted. A verification transaction may already be broadcast and can still confirm."
            );
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    output::emit(json, &verdict, output::print_verdict)?;
    Ok(ExitCode::SUCCESS)
}

pub async fn details<R: BatchRegistry, S: ContentStore>(
    verifier: &Verifier<R, S>,
    target: QrPayload,
    json: bool,
) -> Result<ExitCode> {
    let details = match &target {
        QrPayload::Hash(hash) => verifier.details_by_hash(hash).await?,
        QrPayload::Fields(fields) => verifier.details_from_fields(fields).await?,
    };

    output::emit(json, &details, output::print_details)?;
    Ok(ExitCode::SUCCESS)
}

/// Explain an undecodable QR payload and point to manual entry
pub fn report_bad_payload(err: &CoreError) -> ExitCode {
    eprintln!("{}", err);
    if err.offers_manual_entry() {
        eprintln!("Run `medverify verify` instead and {}.", MANUAL_ENTRY_HINT);
    }
    ExitCode::from(EXIT_BAD_PAYLOAD)
}
