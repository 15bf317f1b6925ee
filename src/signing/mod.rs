//! Transaction signing with zkLogin authorization.

pub mod composer;

pub use composer::{
    decode_signature, encode_signature, transaction_digest, SignatureComposer,
    SignedAuthorization, ZkLoginSignature,
};
