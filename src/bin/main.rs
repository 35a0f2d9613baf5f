//! Sideload Client CLI
//!
//! Command-line tool for fetching flattened JSON:API collections and
//! pushing batch sync payloads.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use sideload_client::{sync_chunks, ApiClient, ApiError, ClientConfig, IndexingBehavior};

#[derive(Parser)]
#[command(name = "sideload-client")]
#[command(about = "Fetch flattened JSON:API collections and push batch sync payloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an endpoint and print its flattened entities
    Fetch(FetchArgs),
    /// Push a JSON payload to the batch sync endpoint
    Sync(SyncArgs),
}

#[derive(Args)]
struct ConnectionArgs {
    /// Base URL of the API host, without the /api suffix
    #[arg(long)]
    base_url: String,

    /// OAuth client id
    #[arg(long)]
    client_id: String,

    /// OAuth client secret
    #[arg(long)]
    client_secret: String,
}

impl ConnectionArgs {
    /// Connect, performing the credential exchange up front
    fn connect(&self) -> Result<ApiClient, ApiError> {
        ApiClient::connect(ClientConfig::new(
            self.base_url.as_str(),
            self.client_id.as_str(),
            self.client_secret.as_str(),
        ))
    }
}

#[derive(Args)]
struct FetchArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Endpoint to fetch, e.g. "product" (absolute URLs are used verbatim)
    endpoint: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Path to a JSON file holding the sync payload
    payload: PathBuf,

    /// Split a top-level JSON array into batches of this many operations
    #[arg(long, default_value_t = 100)]
    chunk_size: usize,

    /// Indexing behavior requested from the server
    #[arg(long, value_enum)]
    indexing: Option<IndexingArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexingArg {
    UseQueueIndexing,
    DisableIndexing,
}

impl From<IndexingArg> for IndexingBehavior {
    fn from(arg: IndexingArg) -> Self {
        match arg {
            IndexingArg::UseQueueIndexing => IndexingBehavior::UseQueueIndexing,
            IndexingArg::DisableIndexing => IndexingBehavior::DisableIndexing,
        }
    }
}

/// Write output to file or stdout
fn write_output(content: &str, output: Option<&PathBuf>) -> Result<(), ApiError> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

fn run_fetch(args: FetchArgs) -> Result<(), ApiError> {
    let client = args.connection.connect()?;
    let rows = client.fetch_flattened(&args.endpoint)?;

    eprintln!("Fetched {} entities from {}", rows.len(), args.endpoint);

    let value = Value::Array(rows.into_iter().map(Value::Object).collect());
    let output = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };

    write_output(&output, args.output.as_ref())
}

fn run_sync(args: SyncArgs) -> Result<(), ApiError> {
    let content = fs::read_to_string(&args.payload)?;
    let payload: Value = serde_json::from_str(&content)?;
    let indexing = args.indexing.map(IndexingBehavior::from);

    let client = args.connection.connect()?;

    match payload {
        Value::Array(operations) => {
            let total = operations.len();
            let mut sent = 0;
            for chunk in sync_chunks(&operations, args.chunk_size)? {
                client.sync_call(Value::Array(chunk.to_vec()), indexing)?;
                sent += chunk.len();
                eprintln!("Synced {}/{} operations", sent, total);
            }
        }
        other => {
            client.sync_call(other, indexing)?;
            eprintln!("Synced payload");
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Sync(args) => run_sync(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
