//! Command-line client for x402 pay-per-call resources.
//!
//! # Usage
//!
//! ```bash
//! # Fetch a resource, paying in USDC if it answers 402
//! p402 fetch https://api.example.com/report
//!
//! # POST with headers, refusing to pay more than 0.10 USDC
//! p402 fetch -X POST -H 'Content-Type: application/json' -d '{"q":1}' \
//!     --max-amount 0.10 https://api.example.com/query
//!
//! # List supported chains
//! p402 chains
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `p402.toml`)
//! - `P402_PRIVATE_KEY` - Paying account key, overrides `wallet_private_key`
//! - `RUST_LOG` - Log level filter (default: `info`)

mod config;
mod wallet;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_signer_local::PrivateKeySigner;
use clap::{Args, Parser, Subcommand};
use http::{HeaderName, HeaderValue, Method};
use p402::amount::Amount;
use p402::chain::ChainPolicy;
use p402::outcome::ProtocolResult;
use p402::phase::Phase;
use p402::settlement::SettlementExecutor;
use p402_evm::{RpcReceiptSource, known_chain_profiles};
use p402_http::{PaymentNegotiator, RequestOptions};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::ClientConfig;
use crate::wallet::CliWallet;

#[derive(Parser, Debug)]
#[command(name = "p402", version)]
#[command(about = "Fetch x402 pay-per-call resources, paying in USDC when asked")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, env = "CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a URL, paying for it if it answers 402.
    Fetch(FetchArgs),
    /// List the chains payments can settle on.
    Chains,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Absolute http(s) URL.
    url: String,

    /// HTTP method.
    #[arg(long, short = 'X', default_value = "GET")]
    method: String,

    /// Request header as `Name: value`. Repeatable.
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Request body.
    #[arg(long, short)]
    data: Option<String>,

    /// Chain to pay on when the server names none (key or chain id).
    #[arg(long)]
    chain: Option<String>,

    /// Refuse to pay more than this many USDC.
    #[arg(long)]
    max_amount: Option<String>,

    /// Never pay; print the payment details instead.
    #[arg(long)]
    no_pay: bool,

    /// Also send the legacy `X-Payment-TX` header.
    #[arg(long)]
    legacy_header: bool,

    /// Paying account key.
    #[arg(long, env = "P402_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("p402 failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load_from(&cli.config)?;
    tracing::debug!(path = %cli.config.display(), "Loaded configuration");

    match cli.command {
        Command::Chains => list_chains(&config),
        Command::Fetch(args) => fetch(config, args).await,
    }
}

fn list_chains(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let profiles = config.apply_overrides(known_chain_profiles())?;
    let mut out = std::io::stdout().lock();
    for profile in profiles.profiles() {
        writeln!(
            out,
            "{:>8}  {:<16} {:<20} {}  {}",
            profile.chain_id, profile.key, profile.label, profile.token_contract, profile.rpc_url
        )?;
    }
    Ok(())
}

async fn fetch(mut config: ClientConfig, args: FetchArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(chain) = args.chain {
        config.default_chain = Some(chain);
    }
    if let Some(max) = &args.max_amount {
        config.max_amount = Some(Amount::parse(max)?);
    }
    if args.no_pay {
        config.auto_pay = false;
    }
    if args.legacy_header {
        config.legacy_proof_header = true;
    }
    if let Some(key) = args.private_key {
        config.wallet_private_key = Some(key);
    }

    let chains = Arc::new(config.apply_overrides(known_chain_profiles())?);
    let default_chain = config.default_chain_id(&chains)?;
    let wallet = match config.wallet_private_key() {
        Some(key) => {
            let signer: PrivateKeySigner = key.parse()?;
            tracing::info!(address = %signer.address(), "Using local wallet");
            CliWallet::Signer {
                signer,
                chains: Arc::clone(&chains),
                default_chain,
            }
        }
        None => {
            tracing::warn!("No wallet configured; 402 responses cannot be paid");
            CliWallet::Unconfigured { default_chain }
        }
    };

    let options = config.negotiator_options();
    if options.chain_policy == ChainPolicy::WalletFallback {
        tracing::debug!(chain_id = ?default_chain, "Wallet chain fallback enabled");
    }

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    let settlement =
        SettlementExecutor::new(RpcReceiptSource::new()).with_policy(config.poll_policy());
    let negotiator = PaymentNegotiator::new(Arc::clone(&chains), settlement)
        .with_http_client(http)
        .with_options(options)
        .with_listener(|phase: Phase| tracing::info!(%phase, "Payment phase"));

    let request = request_options(&args.method, &args.headers, args.data)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match negotiator
        .fetch_with_payment_until(&cancel, &args.url, &request, &wallet)
        .await
    {
        ProtocolResult::Ok(response) => {
            if let Some(proof) = &response.payment {
                let explorer = chains
                    .by_chain_id(proof.chain_id)
                    .map(|profile| profile.explorer_tx_url(&proof.tx_hash));
                tracing::info!(
                    tx_hash = %proof.tx_hash,
                    chain = %proof.chain_key,
                    explorer = explorer.as_deref().unwrap_or("-"),
                    "Paid"
                );
            }
            tracing::info!(status = %response.status, bytes = response.body.len(), "Response received");
            let mut out = std::io::stdout().lock();
            out.write_all(&response.body)?;
            out.flush()?;
            Ok(())
        }
        ProtocolResult::PaymentRequired(instructions) => {
            tracing::warn!(
                amount = %instructions.amount,
                currency = %instructions.currency,
                recipient = %instructions.recipient,
                action = %instructions.action,
                "Payment required and not made"
            );
            let mut out = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &instructions)?;
            writeln!(out)?;
            Err("payment required".into())
        }
        ProtocolResult::Failed(failure) => {
            if let Some(tx_hash) = failure.tx_hash {
                tracing::warn!(
                    %tx_hash,
                    "A transfer was submitted and may still confirm; check it before paying again"
                );
            } else if failure.kind.is_recoverable() {
                tracing::info!("The request can be attempted again");
            }
            Err(failure.into())
        }
    }
}

fn request_options(
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> Result<RequestOptions, Box<dyn std::error::Error>> {
    let mut options = RequestOptions {
        method: Some(Method::from_bytes(method.to_ascii_uppercase().as_bytes())?),
        body: data.map(String::into_bytes),
        ..RequestOptions::default()
    };
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header {header:?} is not `Name: value`"))?;
        options.headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(options)
}
