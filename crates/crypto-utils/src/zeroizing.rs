use std::fmt;
use std::ops::Deref;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Seed bytes that are wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingBytes(Vec<u8>);

impl ZeroizingBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl Deref for ZeroizingBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ZeroizingBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZeroizingBytes([REDACTED; {}])", self.0.len())
    }
}

/// A mnemonic phrase or password that is wiped when dropped and never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingString(String);

impl ZeroizingString {
    pub fn new(data: String) -> Self {
        Self(data)
    }
}

impl Deref for ZeroizingString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ZeroizingString {
    fn from(data: &str) -> Self {
        Self::new(data.to_owned())
    }
}

impl fmt::Debug for ZeroizingString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ZeroizingString([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_deref_and_debug_redacts() {
        let zb = ZeroizingBytes::new(vec![1, 2, 3]);
        assert_eq!(&*zb, &[1, 2, 3]);
        assert_eq!(format!("{zb:?}"), "ZeroizingBytes([REDACTED; 3])");
    }

    #[test]
    fn string_debug_never_prints_content() {
        let zs: ZeroizingString = "pizza road phone".into();
        assert_eq!(&*zs, "pizza road phone");
        assert!(!format!("{zs:?}").contains("pizza"));
    }

    #[test]
    fn manual_zeroize_clears() {
        let mut zs = ZeroizingString::new("secret".into());
        zs.zeroize();
        assert!(zs.is_empty());
    }
}
