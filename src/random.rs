//! Cryptographically secure randomness for nonces and token ids

use rand::RngCore;

/// Number of random bytes in a nonce value (128 bits)
pub const NONCE_BYTES: usize = 16;

/// Source of cryptographically secure random bytes
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Operating-system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(dest);
    }
}

/// Generate a fresh hex-encoded nonce value
pub fn generate_nonce_value(random: &dyn RandomSource) -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    random.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a random (v4) UUID from the given source
pub fn generate_uuid(random: &dyn RandomSource) -> uuid::Uuid {
    let mut bytes = [0u8; 16];
    random.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
