//! zklogin - log in with an OpenID provider and sign ledger transactions

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zklogin_session::{
    config::{move_call, Args, Command},
    identity::token_from_redirect,
    ledger::{format_coin, RpcLedgerClient},
    prover::HttpProver,
    session::{FileSessionStore, Sealer},
    PendingTransaction, SessionOrchestrator, SessionState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logs go to stderr so command output stays clean on stdout
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("zklogin={0},zklogin_session={0},warn", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    debug!(
        "zklogin {} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_SHORT"),
        env!("BUILD_TIMESTAMP")
    );
    debug!("Data dir: {}", args.data_dir.display());
    debug!("Prover: {}", args.prover_url);
    debug!("RPC: {}", args.rpc_url);

    let mut store = FileSessionStore::new(&args.data_dir);
    if let Some(passphrase) = &args.session_passphrase {
        store = store.with_sealer(Sealer::new(passphrase.clone()));
    }
    let ledger = RpcLedgerClient::new(&args.rpc_url, args.request_timeout())?
        .with_coin_type(&args.coin_type);
    let prover = HttpProver::new(&args.prover_url, args.request_timeout())?;

    let mut orchestrator = SessionOrchestrator::new(
        args.orchestrator_config(),
        Arc::new(ledger),
        Arc::new(prover),
        Arc::new(store),
    );
    orchestrator
        .restore()
        .await
        .context("Failed to load stored session")?;

    match args.command {
        Command::Login => {
            let redirect = orchestrator.begin_login().await?;
            println!("Open this URL to sign in:\n\n  {}\n", redirect.url);
            println!("Max epoch:  {}", redirect.max_epoch);
            println!("Valid until {}", redirect.expires_at);
            println!("\nThen run: zklogin complete '<redirect URL>'");
        }

        Command::Complete { redirect } => {
            let token = token_from_redirect(&redirect).unwrap_or_else(|| redirect.trim().to_string());
            let record = orchestrator.complete_login(&token).await?;
            println!("Logged in as {}", record.address);
            println!("Session valid until epoch {} ({})", record.max_epoch, record.expires_at);
        }

        Command::Status => {
            orchestrator.check_expiry().await?;
            match orchestrator.state() {
                SessionState::LoggedOut => println!("Logged out"),
                SessionState::LoginPending { max_epoch, .. } => {
                    println!("Login pending (max epoch {max_epoch}); run `zklogin complete`")
                }
                SessionState::LoggedIn(record) => {
                    println!("Logged in as {}", record.address);
                    if let Some(issuer) = &record.issuer {
                        println!("Issuer:     {issuer}");
                    }
                    println!("Max epoch:  {}", record.max_epoch);
                    println!("Expires at: {}", record.expires_at);
                }
            }
        }

        Command::Balance => {
            orchestrator.check_expiry().await?;
            let Some(address) = orchestrator.address().cloned() else {
                anyhow::bail!("Not logged in");
            };
            match orchestrator.refresh_balance().await {
                Some(balance) => println!("{} {} ({})", format_coin(balance), args.coin_type, address),
                None => println!("Balance unavailable for {address}"),
            }
        }

        Command::Call {
            target,
            args: call_args,
            type_args,
            gas_budget,
        } => {
            let call = move_call(&target, &call_args, &type_args, gas_budget)?;
            let mut tx = PendingTransaction::new(call);
            let receipt = orchestrator.sign(&mut tx).await?;
            info!(digest = %receipt.digest, "Call executed");
            println!("Executed {}: {}", tx.call().target(), receipt.digest);
        }

        Command::Logout => {
            orchestrator.logout().await?;
            println!("Logged out");
        }
    }

    Ok(())
}
