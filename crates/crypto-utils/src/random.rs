use rand::RngCore;
use rand_core::OsRng;

/// Fills a fixed-size array from the OS CSPRNG.
///
/// Used for mnemonic entropy, KDF salts and message IVs.
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_array_has_requested_size() {
        assert_eq!(random_array::<12>().len(), 12);
        assert_eq!(random_array::<32>().len(), 32);
    }

    #[test]
    fn random_array_differs_between_calls() {
        // Collision probability for 32 random bytes is 2^-256.
        assert_ne!(random_array::<32>(), random_array::<32>());
    }
}
