//! Content fingerprints for change detection.
//!
//! A [`Fingerprint`] is the first 128 bits of the SHA-256 digest of a file's
//! bytes. Comparing fingerprints lets the store ignore notifications for
//! metadata-only changes (touch, chmod) and for its own writes.
//!
//! A missing file has the distinguished [`Fingerprint::EMPTY`] value, which
//! never equals the fingerprint of real content, including an empty file.

use std::fmt;

use sha2::{Digest, Sha256};

/// 128-bit content digest, or the marker for "no file".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(Option<u128>);

impl Fingerprint {
    /// Fingerprint of an absent file.
    pub const EMPTY: Self = Self(None);

    /// Computes the fingerprint of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 16];
        head.copy_from_slice(&digest[..16]);
        Self(Some(u128::from_le_bytes(head)))
    }

    /// Returns `true` if this is the fingerprint of an absent file.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Returns `true` if both fingerprints describe identical content.
    pub fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(hash) => write!(f, "Fingerprint({hash:032x})"),
            None => write!(f, "Fingerprint(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_match() {
        let a = Fingerprint::of(b"(A) call mom\n");
        let b = Fingerprint::of(b"(A) call mom\n");
        assert!(a.same_content(&b));
    }

    #[test]
    fn different_bytes_differ() {
        let a = Fingerprint::of(b"(A) call mom\n");
        let b = Fingerprint::of(b"(B) call mom\n");
        assert!(!a.same_content(&b));
    }

    #[test]
    fn empty_file_is_not_missing_file() {
        let empty_file = Fingerprint::of(b"");
        assert!(!empty_file.is_empty());
        assert!(!empty_file.same_content(&Fingerprint::EMPTY));
        assert!(Fingerprint::default().is_empty());
    }

    #[test]
    fn debug_output_is_hex() {
        let rendered = format!("{:?}", Fingerprint::of(b"x"));
        assert!(rendered.starts_with("Fingerprint("));
        assert_eq!(rendered.len(), "Fingerprint()".len() + 32);
        assert_eq!(format!("{:?}", Fingerprint::EMPTY), "Fingerprint(empty)");
    }
}
