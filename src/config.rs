//! Configuration for the zklogin CLI
//!
//! CLI arguments and environment variable handling using clap.
//! Every option can also be set in the environment or a `.env` file.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;

use crate::identity::provider::{DEFAULT_REDIRECT_URI, DEFAULT_SCOPE, GOOGLE_AUTH_ENDPOINT};
use crate::identity::ProviderConfig;
use crate::ledger::rpc::DEFAULT_RPC_URL;
use crate::ledger::{MoveCall, NATIVE_COIN_TYPE};
use crate::orchestrator::OrchestratorConfig;
use crate::prover::http::DEFAULT_PROVER_URL;
use crate::types::Result;

/// zklogin - sign ledger transactions with an identity-provider login
#[derive(Parser, Debug, Clone)]
#[command(name = "zklogin")]
#[command(about = "zkLogin session orchestrator: log in with an OpenID provider and sign transactions")]
pub struct Args {
    /// Directory holding the session, pending login and salt records
    #[arg(long, env = "ZKLOGIN_DATA_DIR", default_value = ".zklogin")]
    pub data_dir: PathBuf,

    /// OAuth client ID registered with the identity provider
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// Redirect target registered for the client
    #[arg(long, env = "REDIRECT_URI", default_value = DEFAULT_REDIRECT_URI)]
    pub redirect_uri: String,

    /// Identity provider authorization endpoint
    #[arg(long, env = "AUTH_ENDPOINT", default_value = GOOGLE_AUTH_ENDPOINT)]
    pub auth_endpoint: String,

    /// Requested OpenID scopes
    #[arg(long, env = "OAUTH_SCOPE", default_value = DEFAULT_SCOPE)]
    pub scope: String,

    /// Proving service endpoint
    #[arg(long, env = "PROVER_URL", default_value = DEFAULT_PROVER_URL)]
    pub prover_url: String,

    /// Ledger fullnode JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Coin type reported by `balance`
    #[arg(long, env = "COIN_TYPE", default_value = NATIVE_COIN_TYPE)]
    pub coin_type: String,

    /// Epochs the ephemeral key stays valid beyond the current epoch
    #[arg(long, env = "MAX_EPOCH_OFFSET", default_value = "10")]
    pub max_epoch_offset: u64,

    /// Proof request attempts (1 disables retry)
    #[arg(long, env = "PROVER_ATTEMPTS", default_value = "1")]
    pub prover_attempts: u32,

    /// HTTP request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Passphrase sealing the records at rest (optional)
    #[arg(long, env = "SESSION_PASSPHRASE", hide_env_values = true)]
    pub session_passphrase: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a login and print the provider URL to open
    Login,

    /// Finish a login with the redirect URL (or its fragment, or the raw token)
    Complete {
        redirect: String,
    },

    /// Show the session state
    Status,

    /// Show the session account balance
    Balance,

    /// Sign and submit a Move call
    Call {
        /// Target as package::module::function
        target: String,

        /// Call argument; JSON values are passed as-is, anything else as a string
        #[arg(long = "arg")]
        args: Vec<String>,

        /// Type argument
        #[arg(long = "type-arg")]
        type_args: Vec<String>,

        /// Gas budget in base units
        #[arg(long)]
        gas_budget: Option<u64>,
    },

    /// End the session (the subject's salt is kept)
    Logout,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if matches!(self.command, Command::Login)
            && self.client_id.as_deref().map_or(true, str::is_empty)
        {
            return Err("CLIENT_ID is required to start a login".to_string());
        }

        if self.max_epoch_offset == 0 {
            return Err("MAX_EPOCH_OFFSET must be at least 1".to_string());
        }

        if self.prover_attempts == 0 {
            return Err("PROVER_ATTEMPTS must be at least 1".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than 0".to_string());
        }

        for (name, value) in [
            ("PROVER_URL", &self.prover_url),
            ("RPC_URL", &self.rpc_url),
            ("AUTH_ENDPOINT", &self.auth_endpoint),
        ] {
            url::Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
        }

        if matches!(&self.session_passphrase, Some(p) if p.is_empty()) {
            return Err("SESSION_PASSPHRASE must not be empty when set".to_string());
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            auth_endpoint: self.auth_endpoint.clone(),
            client_id: self.client_id.clone().unwrap_or_default(),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_epoch_offset: self.max_epoch_offset,
            prover_attempts: self.prover_attempts,
            provider: self.provider_config(),
        }
    }
}

/// Build a Move call from CLI parts.
pub fn move_call(
    target: &str,
    args: &[String],
    type_args: &[String],
    gas_budget: Option<u64>,
) -> Result<MoveCall> {
    let mut call = MoveCall::new(target)?;
    for arg in args {
        call = call.arg(parse_call_arg(arg));
    }
    for type_arg in type_args {
        call = call.type_arg(type_arg.clone());
    }
    if let Some(gas_budget) = gas_budget {
        call = call.with_gas_budget(gas_budget);
    }
    Ok(call)
}

fn parse_call_arg(arg: &str) -> JsonValue {
    serde_json::from_str(arg).unwrap_or_else(|_| JsonValue::String(arg.to_string()))
}
