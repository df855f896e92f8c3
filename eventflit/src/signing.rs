//! Signing of administrative REST requests
//!
//! Every outgoing call is canonicalized into a newline-joined string of
//! method, path, and sorted query parameters, then signed with
//! HMAC-SHA256 under the app secret. The canonical form deliberately
//! applies no URL-encoding; the HTTP layer encodes values only when it
//! builds the final query string.

use std::collections::BTreeMap;

use aliri_clock::{Clock, System};
use thiserror::Error;

use crate::{credentials::Credentials, digest};

/// The signing protocol version sent as `auth_version`
pub const AUTH_VERSION: &str = "1.0";

/// A request that could not be canonicalized for signing
#[derive(Debug, Error)]
pub enum SigningError {
    /// The HTTP method was empty or not uppercase
    #[error("HTTP method must be uppercase, got '{method}'")]
    InvalidMethod {
        /// The rejected method
        method: String,
    },
    /// The request path did not begin with `/`
    #[error("request path must begin with '/', got '{path}'")]
    InvalidPath {
        /// The rejected path
        path: String,
    },
    /// Two query parameter keys collide once case is folded
    ///
    /// The canonical ordering compares keys case-insensitively, so such a
    /// pair has no stable canonical form.
    #[error("query parameters '{first}' and '{second}' collide under case folding")]
    AmbiguousParameter {
        /// The key already present
        first: String,
        /// The colliding key
        second: String,
    },
}

/// The outcome of signing one request
///
/// Holds the full parameter set to send as the query string: the caller's
/// parameters plus `auth_key`, `auth_timestamp`, `auth_version`,
/// `body_md5` (non-empty bodies only), and `auth_signature`.
#[derive(Clone, Debug)]
#[must_use]
pub struct SignedRequest {
    method: String,
    path: String,
    params: Vec<(String, String)>,
}

impl SignedRequest {
    /// The HTTP method the signature covers
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The path the signature covers
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The parameters to send as the query string
    ///
    /// Values are not URL-encoded; encoding is the transport's job.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Signs REST requests on behalf of one application
///
/// Stateless apart from the injected clock; an instance may be shared
/// freely across threads.
#[derive(Clone, Debug)]
pub struct RequestSigner<C = System> {
    credentials: Credentials,
    clock: C,
}

impl RequestSigner {
    /// Constructs a signer using the system clock
    pub fn new(credentials: Credentials) -> Self {
        Self::with_clock(credentials, System)
    }
}

impl<C: Clock> RequestSigner<C> {
    /// Constructs a signer with a caller-supplied clock
    ///
    /// Only seconds since the Unix epoch are consumed, so any clock
    /// source works; tests pin a [`TestClock`][aliri_clock::TestClock].
    pub fn with_clock(credentials: Credentials, clock: C) -> Self {
        Self { credentials, clock }
    }

    /// Canonicalizes and signs one request
    ///
    /// # Errors
    ///
    /// Returns a [`SigningError`] if the method is not uppercase, the
    /// path does not begin with `/`, or two parameter keys collide under
    /// case folding.
    pub fn sign<I, K, V>(
        &self,
        method: &str,
        path: &str,
        params: I,
        body: &[u8],
    ) -> Result<SignedRequest, SigningError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(SigningError::InvalidMethod {
                method: method.to_owned(),
            });
        }

        if !path.starts_with('/') {
            return Err(SigningError::InvalidPath {
                path: path.to_owned(),
            });
        }

        // Keyed by the case-folded name so iteration yields the canonical
        // byte-wise order; the original spelling is kept for emission.
        let mut canonical = BTreeMap::new();

        for (key, value) in params {
            insert_param(&mut canonical, key.into(), value.into())?;
        }

        insert_param(
            &mut canonical,
            "auth_key".to_owned(),
            self.credentials.key().to_owned(),
        )?;
        insert_param(
            &mut canonical,
            "auth_timestamp".to_owned(),
            self.clock.now().0.to_string(),
        )?;
        insert_param(
            &mut canonical,
            "auth_version".to_owned(),
            AUTH_VERSION.to_owned(),
        )?;

        if !body.is_empty() {
            insert_param(&mut canonical, "body_md5".to_owned(), digest::md5_hex(body))?;
        }

        let mut canonical_params = String::new();
        for (key, value) in canonical.values() {
            if !canonical_params.is_empty() {
                canonical_params.push('&');
            }
            canonical_params.push_str(key);
            canonical_params.push('=');
            canonical_params.push_str(value);
        }

        let to_sign = format!("{method}\n{path}\n{canonical_params}");
        let signature =
            digest::hmac_sha256_hex(self.credentials.secret().as_bytes(), to_sign.as_bytes());

        let mut params: Vec<(String, String)> = canonical.into_values().collect();
        params.push(("auth_signature".to_owned(), signature));

        Ok(SignedRequest {
            method: method.to_owned(),
            path: path.to_owned(),
            params,
        })
    }
}

fn insert_param(
    canonical: &mut BTreeMap<String, (String, String)>,
    key: String,
    value: String,
) -> Result<(), SigningError> {
    let folded = key.to_lowercase();

    if let Some((first, _)) = canonical.get(&folded) {
        return Err(SigningError::AmbiguousParameter {
            first: first.clone(),
            second: key,
        });
    }

    canonical.insert(folded, (key, value));
    Ok(())
}
