//! Reward ledger command-line tool

use anyhow::Context;
use clap::{Parser, Subcommand};
use reward_ledger::{AccountId, Config, Ledger};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "reward-ledger")]
#[command(version, about = "Tamper-evident reward ledger", long_about = None)]
struct Cli {
    /// Config file path (TOML); environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the ledger (genesis block) if it does not exist yet
    Init,
    /// Record a transfer as a new block
    Append {
        /// Paying account
        #[arg(long)]
        sender: String,
        /// Credited account
        #[arg(long)]
        receiver: String,
        /// Positive amount, e.g. 5 or 12.50
        #[arg(long)]
        amount: Decimal,
    },
    /// Print the full chain as JSON
    Show,
    /// Re-hash the chain and check its linkage
    Verify,
    /// Print reward balances (all accounts, or one)
    Balance {
        /// Single account to report
        account: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    let ledger = Ledger::initialize(config)
        .await
        .context("failed to initialize ledger")?;

    let code = match cli.command {
        Commands::Init => {
            let tip = ledger.latest_block().context("ledger has no blocks")?;
            println!(
                "ledger ready: {} block(s), tip {} ({})",
                ledger.len(),
                tip.index(),
                tip.hash()
            );
            ExitCode::SUCCESS
        }
        Commands::Append {
            sender,
            receiver,
            amount,
        } => {
            let block = ledger.append_transaction(sender, receiver, amount).await?;
            println!("{}", serde_json::to_string_pretty(&block)?);
            ExitCode::SUCCESS
        }
        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&*ledger.get_chain())?);
            ExitCode::SUCCESS
        }
        Commands::Verify => {
            let report = ledger.verify_integrity();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Commands::Balance { account } => {
            match account {
                Some(account) => {
                    let account = AccountId::new(account);
                    println!("{}\t{}", account, ledger.balance_of(&account)?);
                }
                None => {
                    for (account, balance) in ledger.balances()? {
                        println!("{account}\t{balance}");
                    }
                }
            }
            ExitCode::SUCCESS
        }
    };

    ledger.shutdown().await?;
    Ok(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "reward-ledger failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
