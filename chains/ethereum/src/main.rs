mod cancel;
mod client;
mod config;
mod erc20;
mod funding;
mod oracle;
mod report;
mod signer;

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use dotenv::dotenv;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use sweep_core::{
    setup_logger, EncryptedWalletStore, SqliteAuditSink, SweepCoordinator, SweepMetrics,
    TransferStatus, WalletStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use client::EthereumClient;
use config::EthConfig;
use funding::{GasRefiller, RefillConfig};
use oracle::CoinGeckoOracle;
use signer::LocalKeySigner;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consolidate every enabled wallet into the destination wallet
    Sweep {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print token and native balances for every enabled wallet
    Balances,
    /// Top up wallets whose gas balance fell below the USD floor
    RefillGas,
    /// Replace a stuck transaction with a priced-up self-transfer
    CancelPending { address: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = setup_logger();
    dotenv().ok();

    let cli = Cli::parse();
    info!("Loading config from: {}", cli.config);
    let cfg = EthConfig::load(&cli.config)?;
    info!("Configuration loaded for chain ID: {}", cfg.chain_id);

    let password = env::var(&cfg.wallets.password_env)
        .ok()
        .filter(|p| !p.is_empty());
    let store = Arc::new(EncryptedWalletStore::load(
        &cfg.wallets.path,
        password.as_deref(),
    )?);
    info!("Loaded {} wallet record(s).", store.count());

    let token_address: Option<Address> = cfg
        .token
        .as_ref()
        .map(|t| t.address.parse())
        .transpose()
        .context("invalid token address in config")?;

    let metrics = Arc::new(SweepMetrics::default());
    let chain = Arc::new(
        EthereumClient::new(&cfg.rpc_url, cfg.chain_id, token_address)?
            .with_metrics(Arc::clone(&metrics)),
    );
    let signer = LocalKeySigner::from_store(&store, cfg.chain_id)?;

    match cli.command {
        Command::Sweep { yes } => run_sweep(cfg, chain, signer, store, metrics, yes).await,
        Command::Balances => {
            let wallets = store.list_enabled().await?;
            let (symbol, decimals) = match &cfg.token {
                Some(t) => (Some(t.symbol.as_str()), t.decimals),
                None => (None, 18),
            };
            let report = report::balance_report(chain, &wallets, symbol, decimals).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::RefillGas => run_refill(cfg, chain, signer, store).await,
        Command::CancelPending { address } => {
            let tx_id = cancel::cancel_pending(
                chain,
                Arc::new(signer),
                &address,
                cfg.sweep.receipt_timeout_secs,
            )
            .await?;
            println!("Replacement transaction: {}", tx_id);
            Ok(())
        }
    }
}

async fn run_sweep(
    cfg: EthConfig,
    chain: Arc<EthereumClient>,
    signer: LocalKeySigner,
    store: Arc<EncryptedWalletStore>,
    metrics: Arc<SweepMetrics>,
    yes: bool,
) -> Result<()> {
    let wallet_count = store.list_enabled().await?.len();
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Sweep {} wallet(s) into {} on chain {}?",
                wallet_count, cfg.destination, cfg.chain_id
            ))
            .default(false)
            .interact()?;
    if !confirmed {
        info!("Sweep aborted by operator.");
        return Ok(());
    }

    let audit = Arc::new(SqliteAuditSink::new(&cfg.audit_db).await?);
    let audit_sink: Arc<dyn sweep_core::AuditSink> = audit.clone();
    let mut coordinator = SweepCoordinator::new(
        chain,
        Arc::new(signer),
        store,
        audit_sink,
        cfg.to_sweep_config(),
    )
    .with_metrics(metrics);
    if let Some(token) = &cfg.token {
        coordinator = coordinator.with_token(token.address.clone());
    }

    // Ctrl+C stops launching new pipelines; in-flight attempts finish.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C. Finishing in-flight attempts...");
                signal_token.cancel();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    let run = coordinator.run(cancel).await?;
    if let Err(e) = audit.record_run(&run).await {
        warn!("could not persist run summary: {:#}", e);
    }

    for outcome in &run.outcomes {
        if let TransferStatus::Failed(_) = outcome.status {
            warn!(
                "  {} -> {} ({} attempt(s)){}",
                outcome.wallet_address,
                outcome.reason().unwrap_or_default(),
                outcome.attempts,
                outcome
                    .tx_id
                    .as_deref()
                    .map(|id| format!(" tx {}", id))
                    .unwrap_or_default()
            );
        }
    }
    println!(
        "Sweep {}: {} succeeded, {} skipped, {} failed ({} unconfirmed) in {:.1}s",
        run.run_id,
        run.succeeded(),
        run.skipped(),
        run.failed(),
        run.unconfirmed(),
        run.duration_secs()
    );
    Ok(())
}

async fn run_refill(
    cfg: EthConfig,
    chain: Arc<EthereumClient>,
    mut signer: LocalKeySigner,
    store: Arc<EncryptedWalletStore>,
) -> Result<()> {
    let funding = cfg
        .funding
        .context("no [funding] section in the config file")?;
    let funder_key = env::var(&funding.funder_key_env)
        .with_context(|| format!("{} not set", funding.funder_key_env))?;

    let funder_wallet: LocalWallet = funder_key
        .trim_start_matches("0x")
        .parse()
        .context("invalid funding key")?;
    let funder_address = format!("{:?}", funder_wallet.address());
    signer.insert_key(&funder_address, &funder_key)?;

    let refiller = GasRefiller::new(
        chain,
        Arc::new(signer),
        Arc::new(CoinGeckoOracle::new()),
        RefillConfig {
            floor_usd: funding.floor_usd,
            topup_wei: (funding.topup_eth * 1e18) as u128,
            funder: funder_address,
            native_symbol: funding.native_symbol,
            receipt_timeout_secs: cfg.sweep.receipt_timeout_secs,
        },
    );

    let wallets = store.list_enabled().await?;
    let report = refiller.run(&wallets).await?;
    println!(
        "Refill: {} checked, {} topped up, {} failed",
        report.checked, report.refilled, report.failed
    );
    Ok(())
}
