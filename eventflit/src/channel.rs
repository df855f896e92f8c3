//! Validated channel and subscriber connection identifiers
//!
//! Both identifiers end up inside the colon-separated message that gets
//! signed during channel authentication. A `:` or newline anywhere in
//! either value would let a subscriber smuggle extra fields into the
//! signed message, so both bytes are rejected outright, before any
//! hashing takes place.

use std::fmt;

use aliri_braid::braid;
use thiserror::Error;

/// Longest channel name the service accepts, in bytes
pub const MAX_CHANNEL_NAME_LEN: usize = 200;

/// The authorization mode of a channel, derived from its name prefix
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ChannelMode {
    /// A channel requiring per-subscriber authorization (`private-`)
    Private,
    /// A private channel that also exposes member identity (`presence-`)
    Presence,
}

impl ChannelMode {
    /// The name prefix that selects this mode
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Private => "private-",
            Self::Presence => "presence-",
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Private => "private",
            Self::Presence => "presence",
        };

        f.write_str(s)
    }
}

/// An invalid socket id
#[derive(Debug, Error)]
pub enum InvalidSocketId {
    /// The socket id was the empty string
    #[error("socket id cannot be empty")]
    EmptyString,
    /// The socket id contained a byte reserved by the signed message format
    #[error("reserved byte in socket id at position {position}: 0x{value:02x}")]
    ReservedByte {
        /// The index where the reserved byte was found
        position: usize,
        /// The reserved byte value (`:` or `\n`)
        value: u8,
    },
    /// The socket id did not have the `<digits>.<digits>` shape
    #[error("socket id must be two runs of digits joined by '.'")]
    Malformed,
}

aliri_braid::from_infallible!(InvalidSocketId);

/// An id assigned by the service to one subscriber connection
///
/// Socket ids have the shape `<digits>.<digits>`. Subscribers echo the id
/// back when requesting channel authorization, so it is attacker-supplied
/// input and is validated on construction.
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to a [`SocketId`]"
)]
pub struct SocketId;

impl aliri_braid::Validator for SocketId {
    type Error = InvalidSocketId;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            return Err(InvalidSocketId::EmptyString);
        }

        if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b == b':' || b == b'\n')
        {
            return Err(InvalidSocketId::ReservedByte { position, value });
        }

        let well_formed = matches!(
            s.split_once('.'),
            Some((whole, frac))
                if !whole.is_empty()
                    && !frac.is_empty()
                    && whole.bytes().all(|b| b.is_ascii_digit())
                    && frac.bytes().all(|b| b.is_ascii_digit())
        );

        if well_formed {
            Ok(())
        } else {
            Err(InvalidSocketId::Malformed)
        }
    }
}

/// An invalid channel name
#[derive(Debug, Error)]
pub enum InvalidChannelName {
    /// The channel name was the empty string
    #[error("channel name cannot be empty")]
    EmptyString,
    /// The channel name contained a byte reserved by the signed message format
    #[error("reserved byte in channel name at position {position}: 0x{value:02x}")]
    ReservedByte {
        /// The index where the reserved byte was found
        position: usize,
        /// The reserved byte value (`:` or `\n`)
        value: u8,
    },
    /// The channel name exceeded the service's length limit
    #[error("channel name of {length} bytes exceeds the limit of {MAX_CHANNEL_NAME_LEN}")]
    TooLong {
        /// The length of the rejected name
        length: usize,
    },
}

aliri_braid::from_infallible!(InvalidChannelName);

/// The name of a channel
///
/// Channel names are free-form apart from the reserved bytes `:` and
/// newline and the service's length limit. Whether a name is acceptable
/// for a given authorization mode is decided by its prefix; see
/// [`ChannelNameRef::mode()`].
#[braid(
    serde,
    validator,
    ref_doc = "A borrowed reference to a [`ChannelName`]"
)]
pub struct ChannelName;

impl aliri_braid::Validator for ChannelName {
    type Error = InvalidChannelName;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            return Err(InvalidChannelName::EmptyString);
        }

        if s.len() > MAX_CHANNEL_NAME_LEN {
            return Err(InvalidChannelName::TooLong { length: s.len() });
        }

        if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b == b':' || b == b'\n')
        {
            return Err(InvalidChannelName::ReservedByte { position, value });
        }

        Ok(())
    }
}

impl ChannelNameRef {
    /// The authorization mode selected by this channel's prefix, if any
    ///
    /// Channels without a `private-` or `presence-` prefix are public and
    /// have no mode; they never pass through the authenticator.
    #[must_use]
    pub fn mode(&self) -> Option<ChannelMode> {
        if self.as_str().starts_with(ChannelMode::Presence.prefix()) {
            Some(ChannelMode::Presence)
        } else if self.as_str().starts_with(ChannelMode::Private.prefix()) {
            Some(ChannelMode::Private)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_id_accepts_canonical_form() {
        let id = SocketId::new("1234.1234".to_string()).unwrap();
        assert_eq!(id.as_str(), "1234.1234");
    }

    #[test]
    fn socket_id_rejects_empty() {
        assert!(matches!(
            SocketId::new("".to_string()),
            Err(InvalidSocketId::EmptyString)
        ));
    }

    #[test]
    fn socket_id_rejects_trailing_colon() {
        assert!(matches!(
            SocketId::new("1.1:".to_string()),
            Err(InvalidSocketId::ReservedByte { value: b':', .. })
        ));
    }

    #[test]
    fn socket_id_rejects_leading_colon() {
        assert!(matches!(
            SocketId::new(":1.1".to_string()),
            Err(InvalidSocketId::ReservedByte { position: 0, value: b':' })
        ));
    }

    #[test]
    fn socket_id_rejects_trailing_newline() {
        assert!(matches!(
            SocketId::new("1.1\n".to_string()),
            Err(InvalidSocketId::ReservedByte { value: b'\n', .. })
        ));
    }

    #[test]
    fn socket_id_rejects_colon_newline_pairs() {
        assert!(SocketId::new(":\n1.1".to_string()).is_err());
        assert!(SocketId::new("1.1\n:".to_string()).is_err());
    }

    #[test]
    fn socket_id_rejects_interior_colon() {
        assert!(matches!(
            SocketId::new("12:34.5678".to_string()),
            Err(InvalidSocketId::ReservedByte { position: 2, value: b':' })
        ));
    }

    #[test]
    fn socket_id_rejects_non_digit_runs() {
        assert!(matches!(
            SocketId::new("abc.def".to_string()),
            Err(InvalidSocketId::Malformed)
        ));
        assert!(matches!(
            SocketId::new("1234".to_string()),
            Err(InvalidSocketId::Malformed)
        ));
        assert!(matches!(
            SocketId::new("1234.".to_string()),
            Err(InvalidSocketId::Malformed)
        ));
        assert!(matches!(
            SocketId::new(".1234".to_string()),
            Err(InvalidSocketId::Malformed)
        ));
    }

    #[test]
    fn channel_name_accepts_punctuation() {
        let name = ChannelName::new("private-azAZ9_=@,.;".to_string()).unwrap();
        assert_eq!(name.as_str(), "private-azAZ9_=@,.;");
    }

    #[test]
    fn channel_name_rejects_empty() {
        assert!(matches!(
            ChannelName::new("".to_string()),
            Err(InvalidChannelName::EmptyString)
        ));
    }

    #[test]
    fn channel_name_rejects_colon_anywhere() {
        assert!(ChannelName::new("private-foobar:".to_string()).is_err());
        assert!(ChannelName::new(":private-foobar".to_string()).is_err());
        assert!(ChannelName::new("private-foo:bar".to_string()).is_err());
    }

    #[test]
    fn channel_name_rejects_newline_anywhere() {
        assert!(ChannelName::new("private-foobar\n".to_string()).is_err());
        assert!(ChannelName::new(":\nprivate-foobar".to_string()).is_err());
        assert!(ChannelName::new("private-foobar\n:".to_string()).is_err());
    }

    #[test]
    fn channel_name_rejects_overlong() {
        let name = format!("private-{}", "x".repeat(MAX_CHANNEL_NAME_LEN));
        assert!(matches!(
            ChannelName::new(name),
            Err(InvalidChannelName::TooLong { .. })
        ));
    }

    #[test]
    fn mode_follows_prefix() {
        assert_eq!(
            ChannelNameRef::from_str("private-foobar").unwrap().mode(),
            Some(ChannelMode::Private)
        );
        assert_eq!(
            ChannelNameRef::from_str("presence-foobar").unwrap().mode(),
            Some(ChannelMode::Presence)
        );
        assert_eq!(ChannelNameRef::from_str("foobar").unwrap().mode(), None);
    }
}
