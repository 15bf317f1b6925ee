//! zkLogin session orchestrator
//!
//! Lets an operator authenticate with an OpenID identity provider and sign
//! ledger transactions without holding a long-term private key:
//!
//! 1. `begin_login` generates an ephemeral Ed25519 key and binds it to an
//!    epoch bound and randomness through the login nonce
//! 2. The provider returns an identity token carrying that nonce
//! 3. `complete_login` derives the account address from the token and the
//!    subject's salt, and obtains a zero-knowledge proof for the token
//! 4. `sign` combines an ephemeral signature with the proof into a zkLogin
//!    signature and submits the transaction
//!
//! The ledger, proving service and session storage sit behind traits
//! ([`LedgerClient`], [`ProofService`], [`SessionStore`]) with HTTP,
//! file-backed and mock implementations.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
pub mod orchestrator;
pub mod prover;
pub mod session;
pub mod signing;
pub mod types;

pub use crypto::{AccountAddress, EphemeralKeyPair, Nonce, Salt};
pub use identity::{IdentityToken, ProviderConfig};
pub use ledger::{EpochInfo, ExecutionReceipt, LedgerClient, MoveCall, PendingTransaction};
pub use orchestrator::{LoginRedirect, OrchestratorConfig, SessionOrchestrator, SessionState};
pub use prover::{ProofBundle, ProofRequest, ProofService};
pub use session::{PendingLogin, SessionRecord, SessionStore};
pub use signing::{SignatureComposer, SignedAuthorization};
pub use types::{LedgerRejection, ProtocolError, Result, ZkLoginError};
