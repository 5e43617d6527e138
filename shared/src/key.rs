use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

// A base64-encoded Curve25519 public key. The restricted 43rd character set
// covers exactly the values whose two low-order bits are zero, which the
// final byte of a 32-byte key leaves unused.
static WG_PUBKEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]{42}[AEIMQUYcgkosw480]=$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a valid WireGuard public key: {0}")]
pub struct InvalidKey(pub String);

/// Checks that `key` is a syntactically valid WireGuard public key and
/// returns it unchanged.
pub fn validate_pubkey(key: &str) -> Result<&str, InvalidKey> {
    if WG_PUBKEY_PATTERN.is_match(key) {
        Ok(key)
    } else {
        Err(InvalidKey(key.to_string()))
    }
}
