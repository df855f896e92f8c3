//! Channel authentication for private and presence channels
//!
//! When a subscriber asks the backend for permission to join a channel,
//! the backend signs the subscriber's socket id together with the channel
//! name (and, for presence channels, the canonical member identity JSON)
//! and hands back the resulting token envelope. The subscriber completes
//! its join handshake with the service using that envelope verbatim.

use serde::Serialize;
use thiserror::Error;

use crate::{
    channel::{ChannelMode, ChannelNameRef, InvalidChannelName, InvalidSocketId, SocketIdRef},
    credentials::Credentials,
    digest,
    presence::PresenceUser,
};

/// A failed channel authorization request
#[derive(Debug, Error)]
pub enum ChannelAuthError {
    /// The socket id failed validation
    #[error(transparent)]
    InvalidSocketId(#[from] InvalidSocketId),
    /// The channel name failed validation
    #[error(transparent)]
    InvalidChannelName(#[from] InvalidChannelName),
    /// The channel's prefix does not match the requested mode
    ///
    /// Raised when presence data is supplied for a non-presence channel,
    /// when a presence channel is requested without presence data, and
    /// for channels with neither prefix.
    #[error("channel '{channel}' cannot be authorized in {mode} mode")]
    ModeMismatch {
        /// The rejected channel name
        channel: String,
        /// The mode implied by the request shape
        mode: ChannelMode,
    },
}

/// The token envelope returned to a subscriber
///
/// Serializes with `auth` first and `channel_data` second (presence
/// only), with no added whitespace, per the wire contract.
#[derive(Clone, Debug, Serialize)]
#[must_use]
pub struct ChannelAuth {
    auth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_data: Option<String>,
}

impl ChannelAuth {
    /// The `auth` field: `<key>:<64-char hex HMAC>`
    #[must_use]
    pub fn auth(&self) -> &str {
        &self.auth
    }

    /// The canonical member identity JSON, for presence channels
    #[must_use]
    pub fn channel_data(&self) -> Option<&str> {
        self.channel_data.as_deref()
    }

    /// Renders the envelope as the UTF-8 JSON response body
    ///
    /// No trailing newline; embedded quotes in `channel_data` are escaped
    /// per RFC 8259.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("string-only structs always serialize")
    }
}

/// Produces channel auth tokens on behalf of one application
///
/// Purely computational; an instance may be shared across threads.
#[derive(Clone, Debug)]
pub struct ChannelAuthorizer {
    credentials: Credentials,
}

impl ChannelAuthorizer {
    /// Constructs an authorizer over the given credentials
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Authorizes one subscriber connection onto one channel
    ///
    /// The mode is inferred from the presence data: supplying
    /// [`PresenceUser`] data requests presence mode, omitting it requests
    /// private mode. The channel prefix must agree with the inferred mode.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelAuthError`] if the channel prefix disagrees
    /// with the inferred mode.
    pub fn authorize(
        &self,
        socket_id: &SocketIdRef,
        channel: &ChannelNameRef,
        presence: Option<&PresenceUser>,
    ) -> Result<ChannelAuth, ChannelAuthError> {
        let mode = match presence {
            Some(_) => ChannelMode::Presence,
            None => ChannelMode::Private,
        };

        if channel.mode() != Some(mode) {
            return Err(ChannelAuthError::ModeMismatch {
                channel: channel.as_str().to_owned(),
                mode,
            });
        }

        let channel_data = presence.map(PresenceUser::channel_data);

        let mut message = format!("{socket_id}:{channel}");
        if let Some(data) = &channel_data {
            message.push(':');
            message.push_str(data);
        }

        let hmac =
            digest::hmac_sha256_hex(self.credentials.secret().as_bytes(), message.as_bytes());

        Ok(ChannelAuth {
            auth: format!("{}:{hmac}", self.credentials.key()),
            channel_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{channel::ChannelName, credentials::Scheme, presence::PresenceUser, SocketId};

    fn authorizer() -> ChannelAuthorizer {
        let credentials = Credentials::new(
            Scheme::Https,
            "api.eventflit.com",
            "00001",
            "278d425bdf160c739803",
            "7ad3773142a6692b25b8",
        )
        .unwrap();

        ChannelAuthorizer::new(credentials)
    }

    fn authorize(
        socket_id: &str,
        channel: &str,
        presence: Option<&PresenceUser>,
    ) -> Result<ChannelAuth, ChannelAuthError> {
        let socket_id = SocketId::new(socket_id.to_string())?;
        let channel = ChannelName::new(channel.to_string())?;
        authorizer().authorize(&socket_id, &channel, presence)
    }

    #[test]
    fn private_channel_vector() {
        let auth = authorize("1234.1234", "private-foobar", None).unwrap();
        assert_eq!(
            auth.to_json(),
            r#"{"auth":"278d425bdf160c739803:58df8b0c36d6982b82c3ecf6b4662e34fe8c25bba48f5369f135bf843651c3a4"}"#
        );
    }

    #[test]
    fn complex_private_channel_vector() {
        let auth = authorize("1234.1234", "private-azAZ9_=@,.;", None).unwrap();
        assert_eq!(
            auth.to_json(),
            r#"{"auth":"278d425bdf160c739803:208cbbce2a22fd7d7c3509046b17a97b99d345cf4c195bc0d54af9004a022b0b"}"#
        );
    }

    #[test]
    fn presence_channel_vector() {
        let mut info = serde_json::Map::new();
        info.insert("name".to_owned(), json!("Mr. Eventflit"));
        let user = PresenceUser::new(10).with_info(info);

        let auth = authorize("1234.1234", "presence-foobar", Some(&user)).unwrap();
        assert_eq!(
            auth.to_json(),
            "{\"auth\":\"278d425bdf160c739803:2be06ed82a4f555af6d0669e6fba1bb9e0d93a1af0492c4e59a8e5f29200daa5\",\"channel_data\":\"{\\\"user_id\\\":10,\\\"user_info\\\":{\\\"name\\\":\\\"Mr. Eventflit\\\"}}\"}"
        );
    }

    #[test]
    fn repeated_calls_are_byte_identical() {
        let a = authorize("1234.1234", "private-foobar", None).unwrap();
        let b = authorize("1234.1234", "private-foobar", None).unwrap();
        assert_eq!(a.to_json(), b.to_json());
    }

    #[test]
    fn presence_channel_without_presence_data() {
        assert!(matches!(
            authorize("1234.1234", "presence-foobar", None),
            Err(ChannelAuthError::ModeMismatch {
                mode: ChannelMode::Private,
                ..
            })
        ));
    }

    #[test]
    fn private_channel_with_presence_data() {
        let user = PresenceUser::new("dave");
        assert!(matches!(
            authorize("1234.1234", "private-foobar", Some(&user)),
            Err(ChannelAuthError::ModeMismatch {
                mode: ChannelMode::Presence,
                ..
            })
        ));
    }

    #[test]
    fn unprefixed_channel_rejected_in_both_modes() {
        let user = PresenceUser::new("dave");
        assert!(authorize("1234.1234", "foobar", None).is_err());
        assert!(authorize("1234.1234", "foobar", Some(&user)).is_err());
    }

    #[test]
    fn smuggling_socket_ids_rejected() {
        for socket_id in ["1.1:", ":1.1", "1.1\n", ":\n1.1", "1.1\n:", "1:1.1"] {
            assert!(matches!(
                authorize(socket_id, "private-foobar", None),
                Err(ChannelAuthError::InvalidSocketId(_))
            ));
        }
    }

    #[test]
    fn smuggling_channel_names_rejected() {
        for channel in [
            "private-foobar:",
            ":private-foobar",
            ":\nprivate-foobar",
            "private-foobar\n:",
            "private-foobar\n",
        ] {
            assert!(matches!(
                authorize("1.1", channel, None),
                Err(ChannelAuthError::InvalidChannelName(_))
            ));
        }
    }
}
