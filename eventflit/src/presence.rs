//! Presence channel member identity and its canonical JSON form
//!
//! The canonical serialization is part of the wire contract: the same
//! bytes are both folded into the signed message and returned verbatim in
//! the `channel_data` field of the auth response. The service re-derives
//! the signature from `channel_data`, so any difference in key order or
//! whitespace breaks verification.

use serde::Serialize;
use serde_json::{Map, Value};

/// The identity of a presence channel member
///
/// Constructed by the caller for the duration of one authorization call.
/// Canonical form: object keys in the fixed order `user_id`, then
/// `user_info` (omitted entirely when absent), with minimal whitespace.
/// The `user_info` map keeps the caller's insertion order.
#[derive(Clone, Debug, Serialize)]
pub struct PresenceUser {
    user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_info: Option<Map<String, Value>>,
}

impl PresenceUser {
    /// Constructs a member identity without additional info
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            user_info: None,
        }
    }

    /// Attaches an info map to the identity
    ///
    /// The map's iteration order is preserved in the canonical JSON.
    #[must_use]
    pub fn with_info(self, user_info: Map<String, Value>) -> Self {
        Self {
            user_info: Some(user_info),
            ..self
        }
    }

    /// The canonical JSON text of this identity
    ///
    /// This exact text is what gets signed and what the service receives
    /// as `channel_data`; byte-for-byte equality matters.
    #[must_use]
    pub fn channel_data(&self) -> String {
        serde_json::to_string(self).expect("string-keyed JSON maps always serialize")
    }
}

/// A presence member's user id, either numeric or textual
///
/// The service treats the two forms as distinct: a numeric id serializes
/// as a bare JSON number, a textual one as a JSON string.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UserId {
    /// A numeric user id, emitted as a bare JSON number
    Int(i64),
    /// A textual user id, emitted as a JSON string
    String(String),
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<i32> for UserId {
    fn from(id: i32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::String(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}
