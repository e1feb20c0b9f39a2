use clap::{Parser, Subcommand};
use eyre::{bail, eyre, Result, WrapErr};
use futures::future::join_all;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use multichain_arb::chain::{ChainClient, ChainHealth, RpcChainClient};
use multichain_arb::config::{ChainKey, EngineConfig};
use multichain_arb::control::ArbEngine;
use multichain_arb::report;
use multichain_arb::scanner::OpportunityScanner;
use multichain_arb::scheduler::refresh_balances;
use multichain_arb::state::EngineState;

#[derive(Parser)]
#[command(name = "multichain-arb")]
#[command(about = "Multi-chain DEX arbitrage scanner and executor", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan/execute loop until Ctrl-C (trades live unless --dry-run)
    Run {
        /// Scan and record opportunities without trading
        #[arg(long)]
        dry_run: bool,
    },

    /// Scan once and print ranked opportunities
    Scan {
        /// Only this chain: base, arbitrum or optimism
        #[arg(long)]
        chain: Option<String>,
    },

    /// Show wallet balances on every configured chain
    Balances,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| eyre!("failed to install tracing subscriber: {}", e))
}

/// Connects to each configured chain (or just `only`) and health-checks it.
async fn connect(
    config: &EngineConfig,
    only: Option<ChainKey>,
) -> Result<(Vec<Arc<dyn ChainClient>>, Vec<ChainHealth>)> {
    let mut clients = Vec::new();
    for chain in config.chains.iter().filter(|c| only.map_or(true, |k| c.key == k)) {
        let client = RpcChainClient::connect(chain.clone(), config.signer.clone(), config.wallet_address)
            .wrap_err_with(|| format!("{}: cannot build RPC client", chain.key))?;
        clients.push(client);
    }
    if clients.is_empty() {
        bail!("chain {:?} is not in ARB_CHAINS", only);
    }

    let health = join_all(clients.iter().map(|c| ChainHealth::check(c.chain(), c.provider()))).await;
    let clients = clients
        .into_iter()
        .map(|c| Arc::new(c) as Arc<dyn ChainClient>)
        .collect();
    Ok((clients, health))
}

async fn run_engine(config: EngineConfig, dry_run: bool) -> Result<()> {
    if !dry_run {
        config.require_signer()?;
    }
    let config = Arc::new(config);
    let (clients, health) = connect(&config, None).await?;
    report::print_health(&health);

    let engine = ArbEngine::new(config.clone(), clients);
    for check in &health {
        engine.apply_health(check);
    }
    if !health.iter().any(|h| h.is_live) {
        bail!("no chain passed the health check");
    }

    engine.start(dry_run)?;
    info!(dry_run, "press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    let snapshot = engine.stop().await;

    report::print_status(&snapshot);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_scan(config: EngineConfig, chain: Option<String>) -> Result<()> {
    let only = chain.map(|c| ChainKey::from_str(&c)).transpose()?;
    let config = Arc::new(config);
    let (clients, health) = connect(&config, only).await?;
    report::print_health(&health);

    let scanner = OpportunityScanner::new(config.clone());
    for (client, check) in clients.iter().zip(&health) {
        if !check.is_live {
            continue;
        }
        match scanner.scan(client.as_ref(), &config.strategies).await {
            Ok(scan) => report::print_scan(&scan),
            Err(e) => error!(chain = %check.chain, "scan failed: {:#}", e),
        }
    }
    Ok(())
}

async fn run_balances(config: EngineConfig) -> Result<()> {
    config.require_wallet()?;
    let (clients, _) = connect(&config, None).await?;

    let state = Arc::new(EngineState::new(&config));
    refresh_balances(clients, state.clone()).await;
    report::print_balances(&state.snapshot().chains);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json)?;

    let config = EngineConfig::from_env().wrap_err("invalid configuration")?;

    match cli.command {
        Some(Commands::Run { dry_run }) => run_engine(config, dry_run).await,
        None => run_engine(config, true).await,
        Some(Commands::Scan { chain }) => run_scan(config, chain).await,
        Some(Commands::Balances) => run_balances(config).await,
    }
}
