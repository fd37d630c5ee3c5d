//! Operator CLI for a Tally node
//!
//! Inspects the chain store and per-chain ledgers a node has written, and
//! prints the effective configuration.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tally_core::{Address, ChainId};
use tally_ledger::{ledger_file_name, ChainStore, Ledger, SqliteChainStore};
use tally_node::{NodeConfig, CHAIN_STORE_FILE};

#[derive(Parser)]
#[command(name = "tallyd")]
#[command(about = "Tally - token follower node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "tally.toml")]
    config: PathBuf,

    /// Database directory, overriding the config file
    #[arg(long, global = true)]
    db_dir: Option<PathBuf>,

    /// Comma-separated chain ids that may be tracked
    #[arg(long, global = true, value_delimiter = ',')]
    whitelist: Vec<ChainId>,

    /// Comma-separated chain ids that are never tracked
    #[arg(long, global = true, value_delimiter = ',')]
    blacklist: Vec<ChainId>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the balance of an address on a chain
    Balance {
        /// Token chain id
        chain: ChainId,
        /// Holder address
        address: Address,
    },

    /// Count the addresses of a chain
    Addresses {
        /// Token chain id
        chain: ChainId,
        /// Count only addresses holding a balance
        #[arg(long)]
        non_zero: bool,
    },

    /// Print the recorded state of a chain
    Chain {
        /// Chain id
        chain: ChainId,
    },

    /// List every chain the node has seen
    Chains,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load(&cli.config)?;
    if cli.db_dir.is_some() {
        config.db_dir = cli.db_dir.clone();
    }
    config.whitelist.extend(cli.whitelist.iter().copied());
    config.blacklist.extend(cli.blacklist.iter().copied());
    config.validate()?;

    let log_level = if cli.verbose {
        "debug"
    } else {
        config.log_filter.as_str()
    };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Balance { chain, address } => {
            let ledger = open_ledger(&config, &chain)?;
            println!("{}", ledger.balance(&address)?);
        }

        Commands::Addresses { chain, non_zero } => {
            let ledger = open_ledger(&config, &chain)?;
            println!("{}", ledger.address_count(non_zero)?);
        }

        Commands::Chain { chain } => {
            let dir = db_dir(&config)?;
            let stored = open_store(dir)?.load(&chain)?;
            let ledger_path = dir.join(ledger_file_name(&chain));
            let committed = if ledger_path.exists() {
                Ledger::open(&ledger_path)?.metadata()?
            } else {
                None
            };
            let metadata = match (stored, committed) {
                (Some(stored), Some(committed)) => stored.newest(committed),
                (Some(meta), None) | (None, Some(meta)) => meta,
                (None, None) => bail!("chain {chain} has not been seen"),
            };
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }

        Commands::Chains => {
            for meta in open_store(db_dir(&config)?)?.chains()? {
                let height = meta.height.map_or_else(|| "-".to_string(), |h| h.to_string());
                let status = match &meta.status {
                    tally_ledger::ChainStatus::Unknown => "unknown",
                    tally_ledger::ChainStatus::Ignored => "ignored",
                    tally_ledger::ChainStatus::Tracked(_) => "tracked",
                };
                println!("{} {height:>10} {status}", meta.chain_id);
            }
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn db_dir(config: &NodeConfig) -> Result<&Path> {
    config
        .db_dir
        .as_deref()
        .context("no database directory configured (set db_dir or pass --db-dir)")
}

fn open_store(dir: &Path) -> Result<SqliteChainStore> {
    let path = dir.join(CHAIN_STORE_FILE);
    if !path.exists() {
        bail!("no chain store at {}", path.display());
    }
    Ok(SqliteChainStore::open(path)?)
}

fn open_ledger(config: &NodeConfig, chain: &ChainId) -> Result<Ledger> {
    let dir = db_dir(config)?;
    if !dir.join(ledger_file_name(chain)).exists() {
        bail!("chain {chain} is not tracked");
    }
    Ok(Ledger::open_in_dir(dir, chain)?)
}
