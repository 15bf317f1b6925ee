//! Signature composer.
//!
//! Combines the ephemeral signature over a pending transaction with the
//! stored proof bundle and the recomputed address seed into a zkLogin
//! signature, then hands it to the ledger.
//!
//! # Encoding
//!
//! - **User signature**: Ed25519 over `blake2b256([0, 0, 0] || tx_bytes)`,
//!   serialized `0x00 || sig || pk`
//! - **zkLogin signature**: `0x05 || bcs(ZkLoginSignature)`, base64

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use blake2::{digest::consts::U32, Blake2b, Digest};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::crypto::{address_seed, AccountAddress, EphemeralKeyPair, ED25519_FLAG, ZKLOGIN_FLAG};
use crate::ledger::{ExecutionReceipt, LedgerClient, PendingTransaction};
use crate::prover::ProofBundle;
use crate::session::SessionRecord;
use crate::types::{ProtocolError, Result, ZkLoginError};

type Blake2b256 = Blake2b<U32>;

/// Intent prefix for transaction data: scope 0, version 0, app id 0
pub const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofPoints {
    pub a: Vec<String>,
    pub b: Vec<Vec<String>>,
    pub c: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssBase64Details {
    pub value: String,
    pub index_mod_4: u8,
}

/// Proof bundle merged with the address seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkLoginInputs {
    pub proof_points: ProofPoints,
    pub iss_base64_details: IssBase64Details,
    pub header_base64: String,
    pub address_seed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZkLoginSignature {
    pub inputs: ZkLoginInputs,
    pub max_epoch: u64,
    pub user_signature: Vec<u8>,
}

/// A transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    pub sender: AccountAddress,
    pub tx_bytes: Vec<u8>,
    /// Base64 zkLogin signature
    pub signature: String,
}

// =============================================================================
// Encoding Helpers
// =============================================================================

/// Digest the ephemeral key signs for a transaction.
pub fn transaction_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(tx_bytes);
    hasher.finalize().into()
}

/// Flagged Ed25519 signature over the transaction intent digest.
pub fn user_signature(key: &EphemeralKeyPair, tx_bytes: &[u8]) -> Vec<u8> {
    let signature = key.sign(&transaction_digest(tx_bytes));

    let mut out = Vec::with_capacity(1 + 64 + 32);
    out.push(ED25519_FLAG);
    out.extend_from_slice(&signature.to_bytes());
    out.extend_from_slice(&key.public_key_bytes());
    out
}

/// Merge the prover's bundle with the address seed.
pub fn merge_inputs(proof: &ProofBundle, address_seed: &str) -> Result<ZkLoginInputs> {
    let mut merged = proof.as_json().clone();
    match &mut merged {
        JsonValue::Object(map) => {
            map.insert(
                "addressSeed".to_string(),
                JsonValue::String(address_seed.to_string()),
            );
        }
        _ => return Err(ProtocolError::MissingProof.into()),
    }
    serde_json::from_value(merged)
        .map_err(|e| ZkLoginError::Serialization(format!("Malformed proof bundle: {e}")))
}

/// Serialize a zkLogin signature for submission.
pub fn encode_signature(signature: &ZkLoginSignature) -> Result<String> {
    let mut bytes = vec![ZKLOGIN_FLAG];
    bytes.extend(bcs::to_bytes(signature)?);
    Ok(BASE64.encode(bytes))
}

/// Inverse of [`encode_signature`].
pub fn decode_signature(encoded: &str) -> Result<ZkLoginSignature> {
    let bytes = BASE64.decode(encoded)?;
    match bytes.split_first() {
        Some((&ZKLOGIN_FLAG, rest)) => Ok(bcs::from_bytes(rest)?),
        _ => Err(ZkLoginError::Serialization(
            "not a zkLogin signature".to_string(),
        )),
    }
}

// =============================================================================
// Composer
// =============================================================================

/// Builds and submits zkLogin-signed transactions.
pub struct SignatureComposer {
    ledger: Arc<dyn LedgerClient>,
}

impl SignatureComposer {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Sign `tx` with the session's material.
    ///
    /// # Errors
    ///
    /// Preconditions are checked before anything else, in this order:
    /// - `MissingProof` if the session has no proof bundle
    /// - `MissingKey` if it has no ephemeral keypair
    /// - `MissingIdentity` if salt, subject or audience is absent
    pub async fn compose(
        &self,
        tx: &mut PendingTransaction,
        session: &SessionRecord,
    ) -> Result<SignedAuthorization> {
        let proof = session
            .proof
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or(ProtocolError::MissingProof)?;
        let key = session
            .ephemeral_key
            .as_ref()
            .ok_or(ProtocolError::MissingKey)?;
        let salt = session
            .salt
            .as_ref()
            .ok_or(ProtocolError::MissingIdentity("salt"))?;
        let subject = session
            .subject
            .as_deref()
            .ok_or(ProtocolError::MissingIdentity("sub"))?;
        let audience = session
            .audience
            .as_deref()
            .ok_or(ProtocolError::MissingIdentity("aud"))?;

        tx.set_sender(session.address.clone());
        let tx_bytes = self
            .ledger
            .build_move_call(&session.address, tx.call())
            .await?;

        let user_signature = user_signature(key, &tx_bytes);
        let seed = address_seed(salt, subject, audience)?;
        let inputs = merge_inputs(proof, &seed.to_string())?;

        let signature = encode_signature(&ZkLoginSignature {
            inputs,
            max_epoch: session.max_epoch,
            user_signature,
        })?;

        debug!(call = %tx.call().target(), tx_len = tx_bytes.len(), "Transaction signed");
        Ok(SignedAuthorization {
            sender: session.address.clone(),
            tx_bytes,
            signature,
        })
    }

    /// Submit a composed transaction. Rejections are not retried.
    pub async fn submit(&self, authorization: &SignedAuthorization) -> Result<ExecutionReceipt> {
        match self
            .ledger
            .execute(&authorization.tx_bytes, &authorization.signature)
            .await
        {
            Ok(receipt) => {
                info!(digest = %receipt.digest, sender = %authorization.sender, "Transaction executed");
                Ok(receipt)
            }
            Err(ZkLoginError::LedgerRejection(rejection)) => {
                warn!(
                    abort_code = ?rejection.abort_code,
                    reason = %rejection.reason(),
                    "Ledger rejected transaction"
                );
                Err(ZkLoginError::LedgerRejection(rejection))
            }
            Err(e) => Err(e),
        }
    }

    /// Compose and submit.
    pub async fn sign(
        &self,
        tx: &mut PendingTransaction,
        session: &SessionRecord,
    ) -> Result<ExecutionReceipt> {
        let authorization = self.compose(tx, session).await?;
        self.submit(&authorization).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MockLedger, MoveCall};
    use crate::session::record::fixtures::complete_record;
    use ed25519_dalek::{Signature, Verifier};

    fn composer() -> (Arc<MockLedger>, SignatureComposer) {
        let ledger = Arc::new(MockLedger::new(10));
        (ledger.clone(), SignatureComposer::new(ledger))
    }

    fn tx() -> PendingTransaction {
        MoveCall::new("0x8c1d::robot_control::move_forward")
            .unwrap()
            .arg("0xabc")
            .arg("0x6")
            .arg("forward")
            .into()
    }

    #[tokio::test]
    async fn test_compose_produces_verifiable_signature() {
        let (_, composer) = composer();
        let session = complete_record();
        let mut tx = tx();

        let auth = composer.compose(&mut tx, &session).await.unwrap();
        assert_eq!(tx.sender(), Some(&session.address));

        let decoded = decode_signature(&auth.signature).unwrap();
        assert_eq!(decoded.max_epoch, session.max_epoch);
        assert_eq!(decoded.inputs.header_base64, "eyJhbGciOiJSUzI1NiJ9");
        assert_eq!(decoded.inputs.iss_base64_details.index_mod_4, 1);

        let expected_seed = address_seed(
            session.salt.as_ref().unwrap(),
            session.subject.as_deref().unwrap(),
            session.audience.as_deref().unwrap(),
        )
        .unwrap();
        assert_eq!(decoded.inputs.address_seed, expected_seed.to_string());

        let user_sig = &decoded.user_signature;
        assert_eq!(user_sig.len(), 97);
        assert_eq!(user_sig[0], ED25519_FLAG);
        let key = session.ephemeral_key.as_ref().unwrap();
        assert_eq!(&user_sig[65..], key.public_key_bytes().as_slice());
        let signature = Signature::from_slice(&user_sig[1..65]).unwrap();
        assert!(key
            .public_key()
            .verify(&transaction_digest(&auth.tx_bytes), &signature)
            .is_ok());
    }

    #[tokio::test]
    async fn test_sender_bound_into_tx_bytes() {
        let (_, composer) = composer();
        let session = complete_record();
        let auth = composer.compose(&mut tx(), &session).await.unwrap();
        let (sender, _call): (AccountAddress, MoveCall) =
            serde_json::from_slice(&auth.tx_bytes).unwrap();
        assert_eq!(sender, session.address);
    }

    #[tokio::test]
    async fn test_precondition_order() {
        let (ledger, composer) = composer();

        let mut session = complete_record();
        session.subject = None;
        assert!(matches!(
            composer.compose(&mut tx(), &session).await,
            Err(ZkLoginError::Protocol(ProtocolError::MissingIdentity("sub")))
        ));

        session.ephemeral_key = None;
        assert!(matches!(
            composer.compose(&mut tx(), &session).await,
            Err(ZkLoginError::Protocol(ProtocolError::MissingKey))
        ));

        session.proof = None;
        assert!(matches!(
            composer.compose(&mut tx(), &session).await,
            Err(ZkLoginError::Protocol(ProtocolError::MissingProof))
        ));

        // Nothing reached the ledger
        assert_eq!(ledger.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_bundle_is_rejected() {
        let (_, composer) = composer();
        let mut session = complete_record();
        session.proof = Some(ProofBundle::from_json(serde_json::json!({"unexpected": 1})).unwrap());
        assert!(matches!(
            composer.compose(&mut tx(), &session).await,
            Err(ZkLoginError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_surfaces_rejection() {
        let (ledger, composer) = composer();
        ledger.reject_with(Some(6), "MoveAbort(loc, 6) in command 0");

        let err = composer.sign(&mut tx(), &complete_record()).await.unwrap_err();
        assert_eq!(err.abort_code(), Some(6));
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_submits_once() {
        let (ledger, composer) = composer();
        let session = complete_record();
        let receipt = composer.sign(&mut tx(), &session).await.unwrap();
        assert!(!receipt.digest.is_empty());

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert!(decode_signature(&submitted[0].signature).is_ok());
    }
}
