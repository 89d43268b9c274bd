use clap::{Parser, Subcommand};
use serde::Serialize;
use std::error::Error;
use tracing::{info, warn};

use chainview::config::{get_global_config, init_global_config};
use chainview::metrics::{gather_metrics, init_metrics};
use chainview::telemetry::{init_tracing, TelemetryConfig};
use chainview::{ChainParams, Hash256, SnapshotFile};

#[derive(Parser, Debug)]
#[command(name = "chainview")]
#[command(about = "Read-only queries over a node state snapshot", long_about = None)]
struct Args {
    /// JSON snapshot of the node state
    #[arg(long)]
    snapshot: String,

    /// Configuration file (extension optional)
    #[arg(long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Difficulty the next block must meet, or of one block
    Difficulty {
        /// Block hash or height
        #[arg(long)]
        block: Option<String>,
    },
    /// All known tips with branch length and status
    ChainTips,
    /// Chain summary with soft-fork table
    BlockchainInfo,
    BlockCount,
    BestBlockHash,
    /// Hash of the active-chain block at HEIGHT
    BlockHash {
        #[arg(allow_negative_numbers = true)]
        height: i64,
    },
    /// Header summary by hash or height
    Header { locator: String },
    /// Blocks in the last WINDOW with version >= MIN_VERSION
    Majority {
        min_version: i32,
        window: usize,
        required: usize,
    },
    /// Pooled txids, or full entries with --verbose
    Mempool {
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },
    MempoolInfo,
    /// In-pool parents of TXID
    Depends { txid: String },
    /// Unspent output lookup
    TxOut {
        txid: String,
        n: u32,
        /// Ignore the mempool overlay
        #[arg(long, default_value_t = false)]
        no_mempool: bool,
    },
    TxOutSetInfo,
    /// Prometheus text exposition
    Metrics,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let _log_guard = init_tracing(TelemetryConfig::default())?;
    init_metrics()?;

    init_global_config(&args.config)?;
    let config = get_global_config().ok_or("Config not initialized")?;

    let snapshot = SnapshotFile::load(&args.snapshot)?;
    let mut params = ChainParams::from_config_or(config, snapshot.network)?;
    if snapshot.network != params.network {
        warn!(
            configured = params.network.as_str(),
            snapshot = snapshot.network.as_str(),
            "Network mismatch, using snapshot network defaults"
        );
        params = ChainParams::for_network(snapshot.network);
    }
    info!(network = params.network.as_str(), "Chain parameters ready");

    let node = snapshot.into_node_state(params)?;
    let session = node.session().await;

    match args.command {
        Command::Difficulty { block: None } => print_json(&session.difficulty()?)?,
        Command::Difficulty { block: Some(locator) } => print_json(&session.block_difficulty(&locator)?)?,
        Command::ChainTips => print_json(&session.chain_tips()?)?,
        Command::BlockchainInfo => print_json(&session.blockchain_info()?)?,
        Command::BlockCount => print_json(&session.block_count())?,
        Command::BestBlockHash => print_json(&session.best_block_hash()?)?,
        Command::BlockHash { height } => print_json(&session.block_hash(height)?)?,
        Command::Header { locator } => print_json(&session.header(&locator)?)?,
        Command::Majority { min_version, window, required } => {
            print_json(&session.majority(min_version, window, required)?)?
        }
        Command::Mempool { verbose: false } => print_json(&session.raw_mempool())?,
        Command::Mempool { verbose: true } => print_json(&session.mempool_verbose())?,
        Command::MempoolInfo => print_json(&session.mempool_info())?,
        Command::Depends { txid } => {
            let txid = Hash256::from_hex(&txid)?;
            print_json(&session.dependencies(&txid)?)?
        }
        Command::TxOut { txid, n, no_mempool } => {
            let txid = Hash256::from_hex(&txid)?;
            print_json(&session.tx_out(&txid, n, !no_mempool)?)?
        }
        Command::TxOutSetInfo => print_json(&session.tx_out_set_info())?,
        Command::Metrics => print!("{}", gather_metrics()?),
    }
    Ok(())
}
