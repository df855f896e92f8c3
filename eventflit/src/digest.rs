//! Digest primitives shared by the channel authenticator and request signer
//!
//! The Eventflit wire contract fixes both digests to lowercase hexadecimal:
//! 64 characters for HMAC-SHA256, 32 for MD5. The casing is part of the
//! contract; the service compares signatures as strings.

use md5::{Digest, Md5};

/// Computes the lowercase hex encoding of HMAC-SHA256(secret, message)
///
/// Accepts inputs of any length and always yields 64 hex characters.
#[must_use]
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    let tag = ring::hmac::sign(&key, message);
    hex::encode(tag.as_ref())
}

/// Computes the lowercase hex MD5 of a message
///
/// Used only for the `body_md5` request parameter; MD5 here is a content
/// checksum, not an integrity guarantee.
#[must_use]
pub fn md5_hex(message: &[u8]) -> String {
    hex::encode(Md5::digest(message))
}
