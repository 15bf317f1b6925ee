//! Session orchestrator.
//!
//! Owns the single session of this process and sequences the login and
//! signing protocol:
//!
//! ```text
//! LoggedOut --begin_login--> LoginPending --complete_login--> LoggedIn
//!     ^                          |                               |
//!     +------ failure -----------+------ logout / expiry --------+
//! ```
//!
//! Pending login material is persisted in the store at `begin_login`
//! because the identity-provider redirect leaves the process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::crypto::{derive_address, generate_randomness, AccountAddress, EphemeralKeyPair, Nonce, Salt};
use crate::identity::{authorization_url, IdentityToken, ProviderConfig};
use crate::ledger::{ExecutionReceipt, LedgerClient, PendingTransaction};
use crate::prover::{request_with_retry, ProofRequest, ProofService};
use crate::session::{PendingLogin, SessionRecord, SessionStore};
use crate::signing::SignatureComposer;
use crate::types::{ProtocolError, Result, ZkLoginError};

/// Orchestrator policy.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Epochs the ephemeral key stays valid beyond the current one
    pub max_epoch_offset: u64,

    /// Proof request attempts (1 = no retry)
    pub prover_attempts: u32,

    /// Identity provider registration
    pub provider: ProviderConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_epoch_offset: 10,
            prover_attempts: 1,
            provider: ProviderConfig::google(String::new()),
        }
    }
}

/// Where the orchestrator is in the login protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    LoggedOut,
    LoginPending { nonce: Nonce, max_epoch: u64 },
    LoggedIn(Box<SessionRecord>),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoggedOut => "logged-out",
            Self::LoginPending { .. } => "login-pending",
            Self::LoggedIn(_) => "logged-in",
        }
    }
}

/// Output of `begin_login`: where to send the operator.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: url::Url,
    pub nonce: Nonce,
    pub max_epoch: u64,
    pub expires_at: DateTime<Utc>,
}

/// Sequences key generation, proof acquisition, persistence and signing.
pub struct SessionOrchestrator {
    config: OrchestratorConfig,
    ledger: Arc<dyn LedgerClient>,
    prover: Arc<dyn ProofService>,
    store: Arc<dyn SessionStore>,
    composer: SignatureComposer,
    state: SessionState,
    balance: Option<u64>,
}

impl SessionOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        ledger: Arc<dyn LedgerClient>,
        prover: Arc<dyn ProofService>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            composer: SignatureComposer::new(ledger.clone()),
            ledger,
            prover,
            store,
            state: SessionState::LoggedOut,
            balance: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Account address of the logged-in session.
    pub fn address(&self) -> Option<&AccountAddress> {
        match &self.state {
            SessionState::LoggedIn(record) => Some(&record.address),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&SessionRecord> {
        match &self.state {
            SessionState::LoggedIn(record) => Some(record),
            _ => None,
        }
    }

    /// Last known balance in base units.
    pub fn balance(&self) -> Option<u64> {
        self.balance
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load state persisted by a previous process.
    ///
    /// A stored session whose deadline has passed is cleared. Without a
    /// session, an unexpired pending login puts the orchestrator in
    /// `LoginPending`.
    pub async fn restore(&mut self) -> Result<&SessionState> {
        if let Some(record) = self.store.load().await? {
            if record.is_expired_at(Utc::now()) {
                info!(max_epoch = record.max_epoch, "Stored session expired, clearing");
                self.store.clear().await?;
            } else {
                info!(address = %record.address, max_epoch = record.max_epoch, "Session restored");
                self.state = SessionState::LoggedIn(Box::new(record));
                return Ok(&self.state);
            }
        }

        if let Some(pending) = self.store.load_pending().await? {
            if pending.expires_at > Utc::now() {
                let nonce = pending.nonce()?;
                debug!(max_epoch = pending.max_epoch, "Pending login restored");
                self.state = SessionState::LoginPending {
                    nonce,
                    max_epoch: pending.max_epoch,
                };
                return Ok(&self.state);
            }
            debug!("Pending login expired, clearing");
            self.store.clear_pending().await?;
        }

        self.state = SessionState::LoggedOut;
        Ok(&self.state)
    }

    /// Start a login: fresh key, epoch bound, randomness and nonce.
    ///
    /// Only valid without a live session; an expired session is logged
    /// out first. Overwrites any earlier pending login. The epoch lookup is
    /// not retried; the operator re-initiates on failure.
    pub async fn begin_login(&mut self) -> Result<LoginRedirect> {
        self.ensure_logged_out().await?;

        let epoch = self.ledger.latest_epoch().await.map_err(|e| {
            error!(error = %e, "Epoch lookup failed, login aborted");
            e
        })?;

        let offset = self.config.max_epoch_offset;
        let out_of_range = || ProtocolError::EpochOutOfRange {
            epoch: epoch.epoch,
            offset,
        };
        let max_epoch = epoch.epoch.checked_add(offset).ok_or_else(out_of_range)?;
        let expires_at = epoch.deadline_for(max_epoch).ok_or_else(out_of_range)?;

        let pending = PendingLogin {
            ephemeral_key: EphemeralKeyPair::generate(),
            max_epoch,
            randomness: generate_randomness(),
            expires_at,
            created_at: Utc::now(),
        };
        let nonce = pending.nonce()?;
        let url = authorization_url(&self.config.provider, &nonce)?;

        if matches!(self.state, SessionState::LoginPending { .. }) {
            warn!("Replacing an unfinished login attempt");
        }
        self.store.save_pending(&pending).await?;

        info!(
            epoch = epoch.epoch,
            max_epoch,
            expires_at = %expires_at,
            "Login started"
        );
        self.state = SessionState::LoginPending {
            nonce: nonce.clone(),
            max_epoch,
        };

        Ok(LoginRedirect {
            url,
            nonce,
            max_epoch,
            expires_at,
        })
    }

    /// Finish a login with the token returned by the identity provider.
    ///
    /// On failure the state becomes `LoggedOut` and the pending material is
    /// kept, so the same redirect may be retried while it is still valid.
    pub async fn complete_login(&mut self, raw_token: &str) -> Result<&SessionRecord> {
        self.ensure_logged_out().await?;

        match self.try_complete_login(raw_token).await {
            Ok(record) => {
                if let Err(e) = self.store.clear_pending().await {
                    warn!(error = %e, "Failed to clear pending login material");
                }
                info!(address = %record.address, max_epoch = record.max_epoch, "Login complete");
                self.state = SessionState::LoggedIn(Box::new(record));
                self.session()
                    .ok_or(ZkLoginError::Protocol(ProtocolError::NotLoggedIn))
            }
            Err(e) => {
                error!(error = %e, "Login completion failed");
                self.state = SessionState::LoggedOut;
                Err(e)
            }
        }
    }

    async fn try_complete_login(&self, raw_token: &str) -> Result<SessionRecord> {
        let pending = self
            .store
            .load_pending()
            .await?
            .ok_or(ProtocolError::MissingNonceMaterial)?;

        let now = Utc::now();
        if pending.expires_at <= now {
            return Err(ProtocolError::SessionExpired {
                max_epoch: pending.max_epoch,
            }
            .into());
        }

        let token = IdentityToken::parse(raw_token)?;

        // The token must carry the nonce this process committed to
        let expected = pending.nonce()?;
        if expected != *token.nonce() {
            warn!(max_epoch = pending.max_epoch, "Token nonce does not match pending login");
            return Err(ProtocolError::NonceMismatch {
                expected: expected.to_string(),
                actual: token.nonce().to_string(),
            }
            .into());
        }

        let salt = self.salt_for(token.subject()).await?;
        let address = derive_address(&token, &salt)?;
        debug!(address = %address, "Address derived");

        let request = ProofRequest::new(
            &token,
            &pending.ephemeral_key,
            pending.max_epoch,
            &pending.randomness,
            &salt,
        );
        let proof = request_with_retry(
            self.prover.as_ref(),
            &request,
            self.config.prover_attempts,
            pending.expires_at,
        )
        .await?;

        let record = SessionRecord {
            address,
            token: token.raw().to_string(),
            salt: Some(salt),
            ephemeral_key: Some(pending.ephemeral_key),
            max_epoch: pending.max_epoch,
            randomness: pending.randomness,
            subject: Some(token.subject().to_string()),
            audience: Some(token.audience().to_string()),
            issuer: Some(token.issuer().to_string()),
            proof: Some(proof),
            expires_at: pending.expires_at,
        };
        self.store.save(&record).await?;
        Ok(record)
    }

    /// Refuse to start or finish a login over a live session.
    ///
    /// Only `logout` or expiry end a stored session.
    async fn ensure_logged_out(&mut self) -> Result<()> {
        self.check_expiry().await?;
        if let SessionState::LoggedIn(record) = &self.state {
            warn!(address = %record.address, "Login requested while logged in");
            return Err(ProtocolError::AlreadyLoggedIn.into());
        }
        Ok(())
    }

    /// Stored salt for `subject`, generating and recording one on first login.
    async fn salt_for(&self, subject: &str) -> Result<Salt> {
        if let Some(salt) = self.store.load_salt(subject).await? {
            return Ok(salt);
        }
        let salt = Salt::generate();
        self.store.save_salt(subject, &salt).await?;
        info!("New subject, salt generated");
        Ok(salt)
    }

    /// Force `LoggedOut` if the session's deadline has passed.
    ///
    /// Returns true when the session was expired.
    pub async fn check_expiry(&mut self) -> Result<bool> {
        self.check_expiry_at(Utc::now()).await
    }

    async fn check_expiry_at(&mut self, now: DateTime<Utc>) -> Result<bool> {
        let expired = match &self.state {
            SessionState::LoggedIn(record) if record.is_expired_at(now) => record.max_epoch,
            _ => return Ok(false),
        };

        info!(max_epoch = expired, "Session expired, logging out");
        self.state = SessionState::LoggedOut;
        self.balance = None;
        self.store.clear().await?;
        Ok(true)
    }

    /// Sign and submit a transaction with the current session.
    ///
    /// Expiry is checked before any network call. Failures leave the
    /// state unchanged (apart from expiry) and are not retried.
    pub async fn sign(&mut self, tx: &mut PendingTransaction) -> Result<ExecutionReceipt> {
        let max_epoch = self.session().map(|record| record.max_epoch);
        if self.check_expiry().await? {
            return Err(ProtocolError::SessionExpired {
                max_epoch: max_epoch.unwrap_or_default(),
            }
            .into());
        }

        let record = match &self.state {
            SessionState::LoggedIn(record) => record,
            _ => return Err(ProtocolError::NotLoggedIn.into()),
        };

        self.composer.sign(tx, record).await.map_err(|e| {
            error!(error = %e, "Transaction signing failed");
            e
        })
    }

    /// End the session. The per-subject salt is kept.
    pub async fn logout(&mut self) -> Result<()> {
        self.state = SessionState::LoggedOut;
        self.balance = None;
        self.store.clear().await?;
        info!("Logged out");
        Ok(())
    }

    /// Refresh the balance of the session account.
    ///
    /// Errors are logged and the last known balance is kept.
    pub async fn refresh_balance(&mut self) -> Option<u64> {
        let address = self.address()?.clone();
        match self.ledger.balance(&address).await {
            Ok(balance) => {
                debug!(address = %address, balance, "Balance refreshed");
                self.balance = Some(balance);
            }
            Err(e) => warn!(error = %e, "Balance refresh failed"),
        }
        self.balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{EpochInfo, MockLedger, MoveCall};
    use crate::prover::MockProver;
    use crate::session::record::fixtures::complete_record;
    use crate::session::MemorySessionStore;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    struct Harness {
        ledger: Arc<MockLedger>,
        prover: Arc<MockProver>,
        store: Arc<MemorySessionStore>,
        orchestrator: SessionOrchestrator,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MockLedger::new(100).with_balance(2_000_000_000));
        let prover = Arc::new(MockProver::new());
        let store = Arc::new(MemorySessionStore::new());
        let config = OrchestratorConfig {
            provider: ProviderConfig::google("client.apps.example"),
            ..OrchestratorConfig::default()
        };
        let orchestrator =
            SessionOrchestrator::new(config, ledger.clone(), prover.clone(), store.clone());
        Harness {
            ledger,
            prover,
            store,
            orchestrator,
        }
    }

    fn token(sub: &str, nonce: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "iss": "https://accounts.google.com",
                "sub": sub,
                "aud": "client.apps.example",
                "nonce": nonce,
            }),
            &EncodingKey::from_secret(b"provider"),
        )
        .unwrap()
    }

    fn tx() -> PendingTransaction {
        MoveCall::new("0x8c1d::robot_control::end_session")
            .unwrap()
            .arg("0xabc")
            .arg("0x6")
            .into()
    }

    #[tokio::test]
    async fn test_begin_login_sets_pending() {
        let mut h = harness();
        let redirect = h.orchestrator.begin_login().await.unwrap();

        assert_eq!(redirect.max_epoch, 110);
        assert!(redirect.url.as_str().contains(redirect.nonce.as_str()));
        assert!(matches!(
            h.orchestrator.state(),
            SessionState::LoginPending { max_epoch: 110, .. }
        ));
        let pending = h.store.load_pending().await.unwrap().unwrap();
        assert_eq!(pending.nonce().unwrap(), redirect.nonce);
    }

    #[tokio::test]
    async fn test_begin_login_network_failure() {
        let mut h = harness();
        h.ledger.set_reachable(false);
        let err = h.orchestrator.begin_login().await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(h.orchestrator.state(), &SessionState::LoggedOut);
        assert!(h.store.load_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_begin_login_epoch_overflow() {
        let mut h = harness();
        h.ledger.set_epoch(EpochInfo {
            epoch: u64::MAX - 3,
            start_timestamp_ms: 0,
            duration_ms: 1,
        });
        let err = h.orchestrator.begin_login().await.unwrap_err();
        assert!(matches!(
            err,
            ZkLoginError::Protocol(ProtocolError::EpochOutOfRange { offset: 10, .. })
        ));
        assert_eq!(h.orchestrator.state(), &SessionState::LoggedOut);
        assert!(h.store.load_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_refused_while_logged_in() {
        let mut h = harness();
        let redirect = h.orchestrator.begin_login().await.unwrap();
        let record = h
            .orchestrator
            .complete_login(&token("alice", redirect.nonce.as_str()))
            .await
            .unwrap()
            .clone();

        assert!(matches!(
            h.orchestrator.begin_login().await,
            Err(ZkLoginError::Protocol(ProtocolError::AlreadyLoggedIn))
        ));
        assert!(matches!(
            h.orchestrator.complete_login(&token("alice", "forged-nonce")).await,
            Err(ZkLoginError::Protocol(ProtocolError::AlreadyLoggedIn))
        ));

        // Memory and store still agree on the original session
        assert_eq!(h.orchestrator.session(), Some(&record));
        assert_eq!(h.store.load().await.unwrap(), Some(record.clone()));
        let mut restarted = SessionOrchestrator::new(
            OrchestratorConfig::default(),
            h.ledger.clone(),
            h.prover.clone(),
            h.store.clone(),
        );
        restarted.restore().await.unwrap();
        assert_eq!(restarted.session(), Some(&record));
    }

    #[tokio::test]
    async fn test_begin_login_after_expiry_logs_out_first() {
        let mut h = harness();
        let mut record = complete_record();
        record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        h.store.save(&record).await.unwrap();
        h.orchestrator.state = SessionState::LoggedIn(Box::new(record));

        h.orchestrator.begin_login().await.unwrap();
        assert!(matches!(
            h.orchestrator.state(),
            SessionState::LoginPending { .. }
        ));
        assert!(h.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_login() {
        let mut h = harness();
        let redirect = h.orchestrator.begin_login().await.unwrap();

        let record = h
            .orchestrator
            .complete_login(&token("alice", redirect.nonce.as_str()))
            .await
            .unwrap()
            .clone();

        assert!(record.is_complete());
        assert_eq!(record.max_epoch, 110);
        assert_eq!(h.orchestrator.address(), Some(&record.address));
        assert_eq!(h.store.load().await.unwrap(), Some(record));
        assert!(h.store.load_pending().await.unwrap().is_none());

        let requests = h.prover.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_epoch, "110");
        assert_eq!(requests[0].key_claim_name, "sub");
    }

    #[tokio::test]
    async fn test_nonce_mismatch_rejected_before_prover() {
        let mut h = harness();
        h.orchestrator.begin_login().await.unwrap();

        let err = h
            .orchestrator
            .complete_login(&token("alice", "forged-nonce"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ZkLoginError::Protocol(ProtocolError::NonceMismatch { .. })
        ));
        assert_eq!(h.prover.call_count(), 0);
        assert_eq!(h.orchestrator.state(), &SessionState::LoggedOut);
        assert!(h.store.load_salt("alice").await.unwrap().is_none());
        // Pending material survives for a retry
        assert!(h.store.load_pending().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_complete_without_begin() {
        let mut h = harness();
        let err = h
            .orchestrator
            .complete_login(&token("alice", "n"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ZkLoginError::Protocol(ProtocolError::MissingNonceMaterial)
        ));
    }

    #[tokio::test]
    async fn test_prover_failure_allows_retry() {
        let ledger = Arc::new(MockLedger::new(100));
        let prover = Arc::new(MockProver::new().fail_times(1, 500));
        let store = Arc::new(MemorySessionStore::new());
        let mut orchestrator = SessionOrchestrator::new(
            OrchestratorConfig {
                provider: ProviderConfig::google("client.apps.example"),
                ..OrchestratorConfig::default()
            },
            ledger,
            prover.clone(),
            store.clone(),
        );

        let redirect = orchestrator.begin_login().await.unwrap();
        let jwt = token("alice", redirect.nonce.as_str());

        let err = orchestrator.complete_login(&jwt).await.unwrap_err();
        assert!(matches!(err, ZkLoginError::ProofService { status: 500, .. }));
        assert_eq!(orchestrator.state(), &SessionState::LoggedOut);
        assert!(store.load().await.unwrap().is_none());

        // Same token, same pending material
        orchestrator.complete_login(&jwt).await.unwrap();
        assert_eq!(prover.call_count(), 2);
    }

    #[tokio::test]
    async fn test_salt_reuse_gives_same_address() {
        let mut h = harness();

        let first = h.orchestrator.begin_login().await.unwrap();
        let a1 = h
            .orchestrator
            .complete_login(&token("alice", first.nonce.as_str()))
            .await
            .unwrap()
            .address
            .clone();
        h.orchestrator.logout().await.unwrap();

        let second = h.orchestrator.begin_login().await.unwrap();
        assert_ne!(first.nonce, second.nonce);
        let a2 = h
            .orchestrator
            .complete_login(&token("alice", second.nonce.as_str()))
            .await
            .unwrap()
            .address
            .clone();

        assert_eq!(a1, a2);
    }

    #[tokio::test]
    async fn test_sign_with_partial_session_fails_missing_proof() {
        let mut h = harness();
        let mut record = complete_record();
        record.proof = None;
        h.orchestrator.state = SessionState::LoggedIn(Box::new(record));

        let err = h.orchestrator.sign(&mut tx()).await.unwrap_err();
        assert!(matches!(
            err,
            ZkLoginError::Protocol(ProtocolError::MissingProof)
        ));
        assert!(matches!(h.orchestrator.state(), SessionState::LoggedIn(_)));
        assert_eq!(h.ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_expired_session_before_network() {
        let mut h = harness();
        let mut record = complete_record();
        record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        h.store.save(&record).await.unwrap();
        h.orchestrator.state = SessionState::LoggedIn(Box::new(record.clone()));

        let err = h.orchestrator.sign(&mut tx()).await.unwrap_err();
        assert!(matches!(
            err,
            ZkLoginError::Protocol(ProtocolError::SessionExpired { .. })
        ));
        assert_eq!(h.orchestrator.state(), &SessionState::LoggedOut);
        assert_eq!(h.ledger.call_count(), 0);
        assert!(h.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_logged_out() {
        let mut h = harness();
        assert!(matches!(
            h.orchestrator.sign(&mut tx()).await,
            Err(ZkLoginError::Protocol(ProtocolError::NotLoggedIn))
        ));
    }

    #[tokio::test]
    async fn test_sign_rejection_keeps_state() {
        let mut h = harness();
        let redirect = h.orchestrator.begin_login().await.unwrap();
        h.orchestrator
            .complete_login(&token("alice", redirect.nonce.as_str()))
            .await
            .unwrap();

        h.ledger.reject_with(Some(5), "MoveAbort(loc, 5) in command 0");
        let err = h.orchestrator.sign(&mut tx()).await.unwrap_err();
        assert_eq!(err.abort_code(), Some(5));
        assert!(matches!(h.orchestrator.state(), SessionState::LoggedIn(_)));
    }

    #[tokio::test]
    async fn test_logout_keeps_salt() {
        let mut h = harness();
        let redirect = h.orchestrator.begin_login().await.unwrap();
        h.orchestrator
            .complete_login(&token("alice", redirect.nonce.as_str()))
            .await
            .unwrap();

        h.orchestrator.logout().await.unwrap();
        assert_eq!(h.orchestrator.state(), &SessionState::LoggedOut);
        assert!(h.store.load().await.unwrap().is_none());
        assert!(h.store.load_salt("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_restore() {
        let mut h = harness();
        let record = complete_record();
        h.store.save(&record).await.unwrap();

        h.orchestrator.restore().await.unwrap();
        assert_eq!(h.orchestrator.session(), Some(&record));

        // Expired sessions are cleared on restore
        let mut h = harness();
        let mut expired = complete_record();
        expired.expires_at = Utc::now() - chrono::Duration::minutes(1);
        h.store.save(&expired).await.unwrap();
        assert_eq!(h.orchestrator.restore().await.unwrap(), &SessionState::LoggedOut);
        assert!(h.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_pending() {
        let mut h = harness();
        let redirect = h.orchestrator.begin_login().await.unwrap();

        let mut fresh = SessionOrchestrator::new(
            OrchestratorConfig::default(),
            h.ledger.clone(),
            h.prover.clone(),
            h.store.clone(),
        );
        assert_eq!(
            fresh.restore().await.unwrap(),
            &SessionState::LoginPending {
                nonce: redirect.nonce,
                max_epoch: 110
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_balance_is_non_fatal() {
        let mut h = harness();
        assert_eq!(h.orchestrator.refresh_balance().await, None);

        h.orchestrator.state = SessionState::LoggedIn(Box::new(complete_record()));
        assert_eq!(h.orchestrator.refresh_balance().await, Some(2_000_000_000));

        h.ledger.set_reachable(false);
        assert_eq!(h.orchestrator.refresh_balance().await, Some(2_000_000_000));
        assert_eq!(h.orchestrator.balance(), Some(2_000_000_000));
    }
}
