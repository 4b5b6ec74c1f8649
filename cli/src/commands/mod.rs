//! Subcommands of the `medverify` binary
//!
//! Commands that only derive or encode payloads run offline. Everything else
//! opens a registry connection first and runs against it, signing when a
//! private key is configured.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use medverify_client::{
    BatchRegistry, ClientConfig, Connection, PinataStore, Registrar, Verifier,
};
use medverify_core::{BatchFields, BatchIdHash, NewBatch, QrPayload};

mod inspect;
mod register;
mod verify;

/// Exit code for a payload that could not be decoded
pub const EXIT_BAD_PAYLOAD: u8 = 2;

/// Exit code when the user interrupts a confirmation wait
pub const EXIT_INTERRUPTED: u8 = 130;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify a batch from its identifying fields
    Verify {
        #[clap(flatten)]
        fields: FieldArgs,
    },

    /// Verify a batch from its 0x-prefixed hash
    VerifyHash {
        /// Batch hash
        hash: String,
    },

    /// Verify the text of a scanned QR code
    Scan {
        /// QR payload text
        payload: String,
    },

    /// Show batch details without counting a verification
    Details {
        #[clap(flatten)]
        batch: BatchRef,
    },

    /// Compute the batch hash used as the contract storage key
    Hash {
        #[clap(flatten)]
        fields: FieldArgs,

        /// Derive locally instead of asking the contract
        #[clap(long)]
        local: bool,
    },

    /// Print the text to encode in a batch QR code
    Qr {
        #[clap(flatten)]
        batch: BatchRef,

        /// Encode the identifying fields as JSON instead of the hash
        #[clap(long, conflicts_with = "hash")]
        fields_json: bool,
    },

    /// Pin the batch document and register the batch on-chain
    Register {
        #[clap(flatten)]
        batch: RegisterArgs,
    },

    /// Add a manufacturer address to the allow-list
    Authorize {
        /// Manufacturer address
        address: String,
    },

    /// Check whether an address is an authorized manufacturer
    IsAuthorized {
        /// Address to check, defaults to the signer
        address: Option<String>,
    },

    /// Append a distribution checkpoint on-chain (no longer supported)
    AddCheckpoint {
        /// Batch hash
        hash: String,

        /// Checkpoint description
        checkpoint: String,
    },

    /// Show the chain ID and latest block
    Network,
}

/// The three fields that identify a batch
#[derive(Args, Debug, Clone)]
pub struct FieldArgs {
    /// Batch number
    #[clap(long)]
    pub batch_number: String,

    /// Manufacturer name
    #[clap(long)]
    pub manufacturer: String,

    /// Production date in unix seconds
    #[clap(long)]
    pub production_date: u64,
}

impl FieldArgs {
    pub fn to_fields(&self) -> BatchFields {
        BatchFields::new(&self.batch_number, &self.manufacturer, self.production_date)
    }
}

/// A batch named either by hash or by its fields
#[derive(Args, Debug, Clone)]
pub struct BatchRef {
    /// Batch hash
    #[clap(long, conflicts_with_all = ["batch_number", "manufacturer", "production_date"])]
    pub hash: Option<String>,

    /// Batch number
    #[clap(long, required_unless_present = "hash")]
    pub batch_number: Option<String>,

    /// Manufacturer name
    #[clap(long, required_unless_present = "hash")]
    pub manufacturer: Option<String>,

    /// Production date in unix seconds
    #[clap(long, required_unless_present = "hash")]
    pub production_date: Option<u64>,
}

impl BatchRef {
    /// Resolve to a hash or a set of fields
    pub fn target(&self) -> Result<QrPayload> {
        if let Some(hash) = &self.hash {
            return Ok(QrPayload::Hash(parse_hash(hash)?));
        }

        match (&self.batch_number, &self.manufacturer, self.production_date) {
            (Some(batch_number), Some(manufacturer), Some(production_date)) => Ok(
                QrPayload::Fields(BatchFields::new(batch_number, manufacturer, production_date)),
            ),
            _ => Err(anyhow!(
                "give either --hash or all of --batch-number, --manufacturer and --production-date"
            )),
        }
    }
}

/// Fields of a new batch
#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Manufacturer name
    #[clap(long)]
    pub manufacturer: String,

    /// Product name
    #[clap(long)]
    pub product_name: String,

    /// Production date in unix seconds
    #[clap(long)]
    pub production_date: u64,

    /// Expiry date in unix seconds, 0 for none
    #[clap(long, default_value_t = 0)]
    pub expiry_date: u64,

    /// Batch number
    #[clap(long)]
    pub batch_number: String,
}

impl From<RegisterArgs> for NewBatch {
    fn from(args: RegisterArgs) -> Self {
        NewBatch {
            manufacturer: args.manufacturer,
            product_name: args.product_name,
            production_date: args.production_date,
            expiry_date: args.expiry_date,
            batch_number: args.batch_number,
        }
    }
}

pub fn parse_hash(text: &str) -> Result<BatchIdHash> {
    text.trim()
        .parse()
        .map_err(|e| anyhow!("invalid batch hash {:?}: {}", text, e))
}

/// Outcome of a wait the user may interrupt
pub enum Waited<T> {
    Done(T),
    Interrupted,
}

/// Race a future against Ctrl-C
pub async fn until_interrupted<T>(fut: impl Future<Output = T>) -> Result<Waited<T>> {
    tokio::select! {
        result = fut => Ok(Waited::Done(result)),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            Ok(Waited::Interrupted)
        }
    }
}

/// Run a command
///
/// Offline commands return directly; the rest become a [`Task`] and run
/// once the registry is connected.
pub async fn run(command: Command, config: &ClientConfig, json: bool) -> Result<ExitCode> {
    let task = match command {
        Command::Hash {
            fields,
            local: true,
        } => return inspect::local_hash(&fields.to_fields(), json),
        Command::Qr { batch, fields_json } => return inspect::qr(&batch, fields_json, json),
        Command::Scan { payload } => match QrPayload::parse(&payload) {
            Ok(parsed) => Task::Verify(parsed),
            Err(e) => return Ok(verify::report_bad_payload(&e)),
        },
        Command::Verify { fields } => Task::Verify(QrPayload::Fields(fields.to_fields())),
        Command::VerifyHash { hash } => Task::Verify(QrPayload::Hash(parse_hash(&hash)?)),
        Command::Details { batch } => Task::Details(batch.target()?),
        Command::Hash { fields, .. } => Task::Hash(fields.to_fields()),
        Command::Register { batch } => Task::Register(batch.into()),
        Command::Authorize { address } => Task::Authorize(address),
        Command::IsAuthorized { address } => Task::IsAuthorized(address),
        Command::AddCheckpoint { hash, checkpoint } => {
            Task::AddCheckpoint(parse_hash(&hash)?, checkpoint)
        }
        Command::Network => Task::Network,
    };

    connect_and_run(task, config, json).await
}

/// Command with its arguments parsed, ready to run against the registry
enum Task {
    Verify(QrPayload),
    Details(QrPayload),
    Hash(BatchFields),
    Register(NewBatch),
    Authorize(String),
    IsAuthorized(Option<String>),
    AddCheckpoint(BatchIdHash, String),
    Network,
}

async fn connect_and_run(task: Task, config: &ClientConfig, json: bool) -> Result<ExitCode> {
    config.validate()?;
    let store = Arc::new(PinataStore::new(&config.content_store));

    match Connection::open(&config.chain).await? {
        Connection::ReadOnly(contract) => {
            run_task(task, Arc::new(contract), store, config, json).await
        }
        Connection::Signing(contract) => {
            run_task(task, Arc::new(contract), store, config, json).await
        }
    }
}

async fn run_task<R: BatchRegistry + 'static>(
    task: Task,
    registry: Arc<R>,
    store: Arc<PinataStore>,
    config: &ClientConfig,
    json: bool,
) -> Result<ExitCode> {
    let registrar = Registrar::new(registry.clone(), store.clone());
    let verifier = Verifier::new(registry.clone(), store)
        .record_verifications(config.chain.record_verifications);

    match task {
        Task::Verify(payload) => verify::verify(&verifier, payload, json).await,
        Task::Details(target) => verify::details(&verifier, target, json).await,
        Task::Hash(fields) => inspect::contract_hash(registry.as_ref(), &fields, json).await,
        Task::Register(batch) => register::register(&registrar, batch, json).await,
        Task::Authorize(address) => register::authorize(&registrar, &address, json).await,
        Task::IsAuthorized(address) => {
            register::is_authorized(&registrar, address.as_deref(), json).await
        }
        Task::AddCheckpoint(hash, checkpoint) => {
            register::add_checkpoint(&registrar, &hash, &checkpoint).await
        }
        Task::Network => inspect::network(registry.as_ref(), json).await,
    }
}
