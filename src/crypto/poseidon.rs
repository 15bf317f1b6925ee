//! Poseidon hashing over the BN254 scalar field.
//!
//! Circom-compatible parameters, matching what the zkLogin circuit and the
//! ledger's verifier compute. Field elements travel as `BigUint` so they can
//! be rendered as the decimal strings the proving service expects.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};
use num_bigint::BigUint;

use crate::types::{ProtocolError, Result, ZkLoginError};

/// Widest circom Poseidon instance available (inputs per permutation)
pub const MAX_POSEIDON_INPUTS: usize = 12;

/// Bytes packed into one field element when hashing strings (248 bits)
pub const PACK_WIDTH_BYTES: usize = 31;

/// The BN254 scalar field modulus.
pub fn field_modulus() -> BigUint {
    BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
}

/// Parse a decimal string into a field element, rejecting values >= p.
pub fn parse_field_element(decimal: &str) -> Result<BigUint> {
    let value = BigUint::parse_bytes(decimal.trim().as_bytes(), 10)
        .ok_or_else(|| ProtocolError::FieldElement(format!("not a decimal integer: {decimal:?}")))?;
    ensure_in_field(&value)?;
    Ok(value)
}

fn ensure_in_field(value: &BigUint) -> Result<()> {
    if *value >= field_modulus() {
        return Err(ProtocolError::FieldElement(format!("{value} is not in the BN254 field")).into());
    }
    Ok(())
}

/// Poseidon hash of 1..=24 field elements.
///
/// Up to 12 inputs are hashed by a single permutation; longer inputs are
/// split into the first 12 and the rest, and the two digests hashed again.
pub fn poseidon_hash(inputs: &[BigUint]) -> Result<BigUint> {
    for input in inputs {
        ensure_in_field(input)?;
    }

    match inputs.len() {
        0 => Err(ZkLoginError::Crypto("Poseidon requires at least one input".into())),
        n if n <= MAX_POSEIDON_INPUTS => hash_elements(inputs),
        n if n <= 2 * MAX_POSEIDON_INPUTS => {
            let left = hash_elements(&inputs[..MAX_POSEIDON_INPUTS])?;
            let right = hash_elements(&inputs[MAX_POSEIDON_INPUTS..])?;
            hash_elements(&[left, right])
        }
        n => Err(ZkLoginError::Crypto(format!(
            "Poseidon supports at most {} inputs, got {n}",
            2 * MAX_POSEIDON_INPUTS
        ))),
    }
}

fn hash_elements(inputs: &[BigUint]) -> Result<BigUint> {
    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())
        .map_err(|e| ZkLoginError::Crypto(format!("Poseidon init failed: {e}")))?;

    let elements: Vec<Fr> = inputs
        .iter()
        .map(|x| Fr::from_be_bytes_mod_order(&x.to_bytes_be()))
        .collect();

    let digest = hasher
        .hash(&elements)
        .map_err(|e| ZkLoginError::Crypto(format!("Poseidon hash failed: {e}")))?;

    Ok(BigUint::from_bytes_be(&digest.into_bigint().to_bytes_be()))
}

/// Hash an ASCII string of at most `max_len` bytes to a single field element.
///
/// The string is NUL-padded to `max_len`, packed into 31-byte big-endian
/// chunks counted from the end (so only the first chunk may be short),
/// and the chunk values are Poseidon-hashed together.
pub fn hash_ascii_to_field(value: &str, max_len: usize) -> Result<BigUint> {
    if !value.is_ascii() {
        return Err(ZkLoginError::Crypto(format!(
            "claim value must be ASCII: {value:?}"
        )));
    }
    if value.len() > max_len {
        return Err(ZkLoginError::Crypto(format!(
            "string of {} chars is longer than {max_len}",
            value.len()
        )));
    }

    let mut padded = value.as_bytes().to_vec();
    padded.resize(max_len, 0);

    let head = max_len % PACK_WIDTH_BYTES;
    let mut packed = Vec::with_capacity(max_len / PACK_WIDTH_BYTES + 1);
    if head > 0 {
        packed.push(BigUint::from_bytes_be(&padded[..head]));
    }
    packed.extend(
        padded[head..]
            .chunks(PACK_WIDTH_BYTES)
            .map(BigUint::from_bytes_be),
    );

    poseidon_hash(&packed)
}

/// Big-endian bytes of `value`, left-padded or truncated to the low `width` bytes.
pub fn to_padded_be_bytes(value: &BigUint, width: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= width {
        return bytes[bytes.len() - width..].to_vec();
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}
