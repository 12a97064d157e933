//! EIP-191 personal-sign signature utilities

use crate::address::CanonicalAddress;
use crate::{AuthError, Result};
use ethereum_types::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};
use secp256k1::{Message, Secp256k1, SecretKey};

/// Prefix prepended to every personal-sign message before hashing
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length of an `r || s || v` signature
pub const SIGNATURE_LENGTH: usize = 65;

/// Keccak-256 hash function
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    Keccak256::digest(data).into()
}

/// Compute the EIP-191 digest of a personal-sign message
///
/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`,
/// where the length is the decimal byte length of the UTF-8 message.
pub fn personal_message_hash(message: &str) -> H256 {
    let bytes = message.as_bytes();
    let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + bytes.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(bytes.len().to_string().as_bytes());
    data.extend_from_slice(bytes);
    H256::from(keccak256(&data))
}

/// Decode a hex signature, with or without the `0x` prefix
pub fn signature_from_hex(signature: &str) -> Result<Vec<u8>> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_part.is_empty() {
        return Err(AuthError::invalid_signature("Signature is required"));
    }
    hex::decode(hex_part).map_err(|_| AuthError::invalid_signature("Invalid hex signature"))
}

/// Recover the address that signed `message` with a 65-byte `r || s || v` signature
pub fn recover_signer(message: &str, signature: &[u8]) -> Result<CanonicalAddress> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(AuthError::invalid_signature(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }

    let mut v = signature[64];
    // Accept both the raw recovery id (0/1) and the legacy 27/28 encoding
    if v < 27 {
        v += 27;
    }

    // Only the y-parity bit is meaningful; x-reduced ids 2/3 are not wallet output
    let recovery_id = match v {
        27 | 28 => RecoveryId::new(v == 28, false),
        _ => return Err(AuthError::invalid_signature("Invalid recovery ID")),
    };

    let k256_sig = K256Signature::try_from(&signature[0..64])
        .map_err(|_| AuthError::invalid_signature("Invalid signature format"))?;

    // k256 only recovers from low-S signatures. Negating s mirrors R, so the
    // parity bit flips with it.
    let (k256_sig, recovery_id) = match k256_sig.normalize_s() {
        Some(low_s) => (
            low_s,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (k256_sig, recovery_id),
    };

    let message_hash = personal_message_hash(message);
    let verifying_key =
        VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id)
            .map_err(|_| AuthError::invalid_signature("Failed to recover public key"))?;

    Ok(CanonicalAddress::from_address(ethereum_address_from_pubkey(
        &verifying_key,
    )?))
}

/// Check that `signature` over `message` was produced by `claimed`
///
/// Recovery failures (malformed points, bad lengths, invalid recovery ids)
/// are expected adversarial input and yield `false` rather than an error.
pub fn verify(claimed: &CanonicalAddress, signature: &[u8], message: &str) -> bool {
    match recover_signer(message, signature) {
        Ok(recovered) => {
            let matches = recovered == *claimed;
            if !matches {
                tracing::debug!(
                    wallet = %claimed,
                    recovered = %recovered,
                    "Recovered signer does not match claimed wallet"
                );
            }
            matches
        }
        Err(e) => {
            tracing::debug!(wallet = %claimed, error = %e, "Signature recovery failed");
            false
        }
    }
}

/// Sign `message` with the personal-sign scheme, as a wallet would
///
/// Returns the 65-byte `r || s || v` signature with `v` in `{27, 28}`.
pub fn sign_personal_message(message: &str, private_key: &str) -> Result<Vec<u8>> {
    let private_key_bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
        .map_err(|_| AuthError::invalid_signature("Invalid hex private key"))?;

    let secret_key = SecretKey::from_slice(&private_key_bytes)
        .map_err(|_| AuthError::invalid_signature("Invalid private key"))?;

    let secp = Secp256k1::new();
    let message_hash = personal_message_hash(message);
    let digest = Message::from_digest_slice(message_hash.as_bytes())
        .map_err(|_| AuthError::invalid_signature("Invalid message hash"))?;

    let recoverable = secp.sign_ecdsa_recoverable(&digest, &secret_key);
    let (recovery_id, compact) = recoverable.serialize_compact();

    let mut sig_bytes = Vec::with_capacity(SIGNATURE_LENGTH);
    sig_bytes.extend_from_slice(&compact);
    sig_bytes.push(27 + recovery_id.to_i32() as u8);
    Ok(sig_bytes)
}

/// Address owned by a hex private key
pub fn address_from_private_key(private_key: &str) -> Result<CanonicalAddress> {
    let private_key_bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
        .map_err(|_| AuthError::invalid_signature("Invalid hex private key"))?;
    let signing_key = k256::ecdsa::SigningKey::from_slice(&private_key_bytes)
        .map_err(|_| AuthError::invalid_signature("Invalid private key"))?;

    Ok(CanonicalAddress::from_address(ethereum_address_from_pubkey(
        signing_key.verifying_key(),
    )?))
}

/// Convert a public key to an Ethereum address
fn ethereum_address_from_pubkey(pubkey: &VerifyingKey) -> Result<Address> {
    let encoded = pubkey.to_encoded_point(false);
    let pubkey_bytes = encoded.as_bytes();
    if pubkey_bytes.len() != 65 {
        return Err(AuthError::invalid_signature("Invalid public key length"));
    }

    // Drop the 0x04 tag and hash the 64-byte X || Y
    let pubkey_hash = keccak256(&pubkey_bytes[1..]);

    // The address is the low 20 bytes of the hash
    Ok(Address::from_slice(&pubkey_hash[12..]))
}
