//! Pending transactions.
//!
//! A transaction starts as a Move call description without a sender. The
//! signature composer binds the sender to the session's account address
//! before asking the ledger to build the transaction bytes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::crypto::AccountAddress;
use crate::types::{Result, ZkLoginError};

/// Default gas budget in base units (0.01 of the native coin)
pub const DEFAULT_GAS_BUDGET: u64 = 10_000_000;

/// Shared system clock object, passed to time-aware entry functions
pub const CLOCK_OBJECT_ID: &str = "0x6";

/// A call to a Move entry function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: AccountAddress,
    pub module: String,
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    /// Object IDs and pure values, in the JSON form the RPC accepts
    #[serde(default)]
    pub arguments: Vec<JsonValue>,
    pub gas_budget: u64,
}

impl MoveCall {
    /// Build a call from a `package::module::function` target.
    pub fn new(target: &str) -> Result<Self> {
        let mut parts = target.splitn(3, "::");
        let (package, module, function) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(m), Some(f)) if !m.is_empty() && !f.is_empty() && !f.contains("::") => {
                (p, m, f)
            }
            _ => {
                return Err(ZkLoginError::Config(format!(
                    "Invalid call target '{target}': expected package::module::function"
                )))
            }
        };

        Ok(Self {
            package: AccountAddress::from_str(package)?,
            module: module.to_string(),
            function: function.to_string(),
            type_arguments: Vec::new(),
            arguments: Vec::new(),
            gas_budget: DEFAULT_GAS_BUDGET,
        })
    }

    /// Append an argument (object ID or pure value).
    pub fn arg(mut self, value: impl Into<JsonValue>) -> Self {
        self.arguments.push(value.into());
        self
    }

    pub fn type_arg(mut self, type_tag: impl Into<String>) -> Self {
        self.type_arguments.push(type_tag.into());
        self
    }

    pub fn with_gas_budget(mut self, gas_budget: u64) -> Self {
        self.gas_budget = gas_budget;
        self
    }

    /// `package::module::function`
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }
}

/// A transaction awaiting signature.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    sender: Option<AccountAddress>,
    call: MoveCall,
}

impl PendingTransaction {
    pub fn new(call: MoveCall) -> Self {
        Self { sender: None, call }
    }

    /// Bind the sender. Any previously set sender is replaced.
    pub fn set_sender(&mut self, sender: AccountAddress) {
        self.sender = Some(sender);
    }

    pub fn sender(&self) -> Option<&AccountAddress> {
        self.sender.as_ref()
    }

    pub fn call(&self) -> &MoveCall {
        &self.call
    }
}

impl From<MoveCall> for PendingTransaction {
    fn from(call: MoveCall) -> Self {
        Self::new(call)
    }
}
