//! Key normalization.
//!
//! Every ledger entry is stored under a single canonical key: the padded,
//! standard-alphabet base64 encoding of the derived key. Callers may address
//! an entry by its raw secret, its derived key, or the canonical form; all
//! three resolve to the same entry.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::LedgerError;
use crate::hash::{HEADER_LEN, derive_key};

/// Length of a canonical key: base64 of a `HEADER_LEN`-byte derived key.
pub const AUTH_LEN: usize = HEADER_LEN.div_ceil(3) * 4;

/// A ledger key in one of its accepted input forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// Plaintext secret, derived before encoding.
    Raw(&'a str),
    /// Derived key bytes (`HEADER_LEN` long), encoded as-is.
    Derived(&'a [u8]),
    /// Already canonical (base64, `AUTH_LEN` long).
    Canonical(&'a str),
}

impl<'a> Key<'a> {
    /// Classify an untagged string by its length.
    ///
    /// `AUTH_LEN` is taken as canonical and `HEADER_LEN` as derived; anything
    /// else is treated as a raw secret. A secret that happens to have one of
    /// those lengths is misclassified, so prefer the explicit variants when
    /// the input form is known.
    pub fn infer(s: &'a str) -> Self {
        match s.len() {
            AUTH_LEN => Key::Canonical(s),
            HEADER_LEN => Key::Derived(s.as_bytes()),
            _ => Key::Raw(s),
        }
    }

    /// Resolve to the canonical storage key.
    pub fn canonicalize(&self) -> Result<CanonicalKey, LedgerError> {
        match *self {
            Key::Raw(secret) => Ok(CanonicalKey(STANDARD.encode(derive_key(secret)))),
            Key::Derived(bytes) => {
                if bytes.len() != HEADER_LEN {
                    return Err(LedgerError::InvalidKey(format!(
                        "derived key must be {HEADER_LEN} bytes, got {}",
                        bytes.len()
                    )));
                }
                Ok(CanonicalKey(STANDARD.encode(bytes)))
            }
            Key::Canonical(s) => CanonicalKey::parse(s),
        }
    }
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(s: &'a str) -> Self {
        Key::infer(s)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(s: &'a String) -> Self {
        Key::infer(s)
    }
}

impl<'a> From<&'a CanonicalKey> for Key<'a> {
    fn from(k: &'a CanonicalKey) -> Self {
        Key::Canonical(k.as_str())
    }
}

/// A validated canonical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Validate a string as a canonical key.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        if s.len() != AUTH_LEN {
            return Err(LedgerError::InvalidKey(format!(
                "canonical key must be {AUTH_LEN} chars, got {}",
                s.len()
            )));
        }
        let decoded = STANDARD.decode(s).map_err(LedgerError::invalid_key)?;
        if decoded.len() != HEADER_LEN {
            return Err(LedgerError::invalid_key("canonical key decodes to wrong length"));
        }
        Ok(Self(s.to_owned()))
    }

    /// Borrow the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string.
    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize a raw secret.
#[inline]
pub fn canonical_key(secret: &str) -> CanonicalKey {
    CanonicalKey(STANDARD.encode(derive_key(secret)))
}
