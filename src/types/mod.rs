//! Shared types

pub mod error;

pub use error::{LedgerRejection, ProtocolError, Result, ZkLoginError};
