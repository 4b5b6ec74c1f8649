//! Human-readable and JSON rendering of command results

use anyhow::Result;
use serde::Serialize;

use medverify_core::{BatchDetails, VerificationVerdict};

/// Print `value` as pretty JSON, or run `human` to print it as text
pub fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn flag(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

pub fn print_details(details: &BatchDetails) {
    if !details.is_registered {
        println!("Batch is not registered");
        return;
    }

    println!("Manufacturer:       {}", or_dash(&details.manufacturer));
    println!("Product:            {}", or_dash(&details.product_name));
    println!("Batch number:       {}", or_dash(&details.batch_number));
    println!("Production date:    {}", details.production_date);
    if details.expiry_date == 0 {
        println!("Expiry date:        none");
    } else {
        println!("Expiry date:        {}", details.expiry_date);
    }
    println!("Owner:              {:?}", details.owner);
    println!("Registered at:      {}", details.registered_at);
    println!("Verifications:      {}", details.verification_count);
    println!("Document:           {}", or_dash(&details.content_ref));
    if !details.document_available {
        println!("                    (off-chain document unavailable)");
    }
    if details.checkpoints.is_empty() {
        println!("Checkpoints:        none");
    } else {
        println!("Checkpoints:");
        for (i, checkpoint) in details.checkpoints.iter().enumerate() {
            println!("  {}. {}", i + 1, checkpoint);
        }
    }
}

pub fn print_verdict(verdict: &VerificationVerdict) {
    println!("{}", verdict.summary());
    println!();
    println!("Registered:         {}", flag(verdict.is_registered));
    println!("Fields match:       {}", flag(verdict.fields_match));
    println!("Expired:            {}", flag(verdict.is_expired));

    if verdict.is_registered {
        println!();
        print_details(&verdict.details);
    }
}
