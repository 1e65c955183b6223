//! Key derivation.

use sha2::{Digest, Sha224};

/// Length of a derived key: the hex-encoded SHA224 of a secret.
pub const HEADER_LEN: usize = 56;

/// Compute SHA224 hash and return as lowercase hex string.
///
/// This is the standard hash function used by the Trojan protocol.
///
/// # Example
/// ```
/// use trojan_ledger::sha224_hex;
///
/// let hash = sha224_hex("password123");
/// assert_eq!(hash.len(), 56); // SHA224 = 224 bits = 28 bytes = 56 hex chars
/// ```
#[inline]
pub fn sha224_hex(input: &str) -> String {
    let mut hasher = Sha224::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Derive the fixed-length key for a raw secret.
///
/// The derived key is the same byte sequence a trojan client sends as its
/// request header, so it can be matched directly against incoming traffic.
pub fn derive_key(secret: &str) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out.copy_from_slice(sha224_hex(secret).as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha224_hex() {
        // Known test vector
        let hash = sha224_hex("password");
        assert_eq!(
            hash,
            "d63dc919e201d7bc4c825630d2cf25fdc93d4b2f0d46706d29038d01"
        );
    }

    #[test]
    fn test_derive_matches_hex() {
        let secret = "my_secret_password";
        let key = derive_key(secret);
        assert_eq!(key.len(), HEADER_LEN);
        assert_eq!(&key[..], sha224_hex(secret).as_bytes());
    }

    #[test]
    fn test_consistency() {
        assert_eq!(derive_key("a"), derive_key("a"));
        assert_ne!(derive_key("a"), derive_key("b"));
    }
}
