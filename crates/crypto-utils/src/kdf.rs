use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::CryptoError;
use crate::random::random_array;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Cost used for password-protected QR payloads. Kept moderate so that a
    /// phone can unlock a scanned backup in well under a second.
    pub const QR: KdfParams = KdfParams {
        memory_kib: 19_456,
        iterations: 2,
        parallelism: 1,
    };
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::QR
    }
}

/// Derives a 32-byte AES key from `password` and `salt` with Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; 16],
    params: KdfParams,
) -> Result<[u8; 32], CryptoError> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| CryptoError::KdfFailed(format!("invalid argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KdfFailed(format!("argon2 hash failed: {e}")))?;
    Ok(output)
}

/// Fresh random 16-byte salt.
pub fn generate_salt() -> [u8; 16] {
    random_array::<16>()
}
