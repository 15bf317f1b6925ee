//! Protocol cryptography: ephemeral keys, nonce, address derivation.
//!
//! Everything here is a pure function of its inputs (apart from key,
//! randomness and salt generation, which draw from the OS RNG).

pub mod address;
pub mod keys;
pub mod poseidon;

pub use address::{
    address_from_seed, address_seed, derive_address, AccountAddress, AddressSeed, Salt,
    KEY_CLAIM_NAME, ZKLOGIN_FLAG,
};
pub use keys::{generate_nonce, generate_randomness, EphemeralKeyPair, Nonce, ED25519_FLAG};
pub use poseidon::{hash_ascii_to_field, poseidon_hash};
