//! The client facade and its HTTP transport seam
//!
//! The facade owns the credential tuple, a [`RequestSigner`], and a
//! [`ChannelAuthorizer`], and hands fully signed requests to an injected
//! [`HttpSender`]. It performs no network I/O of its own and classifies
//! responses by status code only; response bodies are returned to the
//! caller uninterpreted.

use std::{error::Error as StdError, iter};

use aliri_clock::{Clock, System};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{
    auth::{ChannelAuthError, ChannelAuthorizer},
    channel::{ChannelName, InvalidChannelName, InvalidSocketId, SocketId, SocketIdRef},
    credentials::{Credentials, Scheme},
    presence::PresenceUser,
    signing::{RequestSigner, SignedRequest, SigningError},
};

/// Most channels one trigger call may address
pub const MAX_TRIGGER_CHANNELS: usize = 10;

/// The HTTP collaborator could not deliver a request
#[derive(Debug, Error)]
#[error("could not deliver request to the service")]
pub struct TransportError(#[from] Box<dyn StdError + Send + Sync + 'static>);

impl TransportError {
    /// Wraps the transport's underlying failure
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self(source.into())
    }
}

/// A fully signed request, ready for the transport to encode and send
///
/// `query` values are not URL-encoded; the transport encodes them when it
/// builds the final URL.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// The transport scheme
    pub scheme: Scheme,
    /// The authority, including any explicit port
    pub host: String,
    /// The absolute request path
    pub path: String,
    /// The full signed parameter set
    pub query: Vec<(String, String)>,
    /// The JSON request body, for mutating calls
    pub body: Option<String>,
}

impl HttpRequest {
    /// The HTTP method implied by the request shape
    #[must_use]
    pub fn method(&self) -> &'static str {
        if self.body.is_some() {
            "POST"
        } else {
            "GET"
        }
    }
}

/// A delivered response, however the service judged the request
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The HTTP status code
    pub status: u16,
    /// The response body as UTF-8 text
    pub body: String,
}

/// The transport seam between the facade and the network
///
/// Implementations deliver the request as-is and report any failure to
/// deliver as a [`TransportError`]; they never retry and never interpret
/// the response.
#[async_trait]
pub trait HttpSender {
    /// Delivers one request and returns the raw response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// A failed facade call
#[derive(Debug, Error)]
pub enum EventflitError {
    /// A channel name failed validation
    #[error(transparent)]
    InvalidChannelName(#[from] InvalidChannelName),
    /// A socket id failed validation
    #[error(transparent)]
    InvalidSocketId(#[from] InvalidSocketId),
    /// The trigger addressed more channels than one call may carry
    #[error("cannot trigger on {count} channels; the limit is {MAX_TRIGGER_CHANNELS}")]
    TooManyChannels {
        /// The number of channels requested
        count: usize,
    },
    /// The request could not be canonicalized for signing
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The event payload could not be serialized to JSON
    #[error("event payload could not be serialized")]
    Payload(#[source] serde_json::Error),
    /// The request could not be delivered
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service rejected the request (4xx)
    #[error("service rejected the request with status {status}")]
    ClientError {
        /// The HTTP status code
        status: u16,
        /// The response body
        body: String,
    },
    /// The service failed to process the request (5xx or other)
    #[error("service failed with status {status}")]
    ServerError {
        /// The HTTP status code
        status: u16,
        /// The response body
        body: String,
    },
}

#[derive(Serialize)]
struct EventBody<'a> {
    name: &'a str,
    data: String,
    channels: &'a [ChannelName],
    #[serde(skip_serializing_if = "Option::is_none")]
    socket_id: Option<&'a SocketIdRef>,
}

/// A server-side client for one Eventflit application
///
/// All held state is immutable after construction, so an instance may be
/// shared across threads without locking.
#[derive(Clone, Debug)]
pub struct Eventflit<S, C = System> {
    credentials: Credentials,
    authorizer: ChannelAuthorizer,
    signer: RequestSigner<C>,
    sender: S,
}

impl<S> Eventflit<S> {
    /// Constructs a client using the system clock
    pub fn new(credentials: Credentials, sender: S) -> Self {
        Self::with_clock(credentials, sender, System)
    }
}

impl<S, C: Clock> Eventflit<S, C> {
    /// Constructs a client with a caller-supplied clock
    pub fn with_clock(credentials: Credentials, sender: S, clock: C) -> Self {
        Self {
            authorizer: ChannelAuthorizer::new(credentials.clone()),
            signer: RequestSigner::with_clock(credentials.clone(), clock),
            credentials,
            sender,
        }
    }

    /// The credentials this client was built with
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Produces the auth token a subscriber needs to join a channel
    ///
    /// Supplying presence data requests presence mode; omitting it
    /// requests private mode. On success the returned string is the exact
    /// JSON body to hand back to the subscriber.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelAuthError`] if the socket id or channel name is
    /// invalid or the channel prefix disagrees with the requested mode.
    pub fn authenticate(
        &self,
        socket_id: &str,
        channel: &str,
        presence: Option<&PresenceUser>,
    ) -> Result<String, ChannelAuthError> {
        let socket_id = SocketId::new(socket_id.to_string())?;
        let channel = ChannelName::new(channel.to_string())?;
        let auth = self.authorizer.authorize(&socket_id, &channel, presence)?;
        Ok(auth.to_json())
    }
}

impl<S: HttpSender, C: Clock> Eventflit<S, C> {
    /// Publishes an event to one or more channels
    ///
    /// The payload is serialized to JSON and sent as the event's `data`
    /// string. At most [`MAX_TRIGGER_CHANNELS`] channels per call.
    ///
    /// # Errors
    ///
    /// Returns an [`EventflitError`] for invalid channel names, too many
    /// channels, payload serialization failures, delivery failures, and
    /// non-2xx service responses.
    pub async fn trigger<P: Serialize>(
        &self,
        channels: &[&str],
        event: &str,
        payload: &P,
    ) -> Result<String, EventflitError> {
        self.trigger_event(channels, event, payload, None).await
    }

    /// Publishes an event, excluding the originating connection
    ///
    /// The excluded socket id is forwarded to the service so the
    /// connection that caused the event does not receive it.
    ///
    /// # Errors
    ///
    /// As [`trigger()`][Self::trigger()], plus an invalid socket id.
    pub async fn trigger_excluding<P: Serialize>(
        &self,
        channels: &[&str],
        event: &str,
        payload: &P,
        socket_id: &str,
    ) -> Result<String, EventflitError> {
        let socket_id = SocketId::new(socket_id.to_string())?;
        self.trigger_event(channels, event, payload, Some(socket_id))
            .await
    }

    async fn trigger_event<P: Serialize>(
        &self,
        channels: &[&str],
        event: &str,
        payload: &P,
        socket_id: Option<SocketId>,
    ) -> Result<String, EventflitError> {
        if channels.len() > MAX_TRIGGER_CHANNELS {
            return Err(EventflitError::TooManyChannels {
                count: channels.len(),
            });
        }

        let mut validated = Vec::with_capacity(channels.len());
        for channel in channels {
            validated.push(ChannelName::new((*channel).to_string())?);
        }

        let data = serde_json::to_string(payload).map_err(EventflitError::Payload)?;
        let body = EventBody {
            name: event,
            data,
            channels: &validated,
            socket_id: socket_id.as_deref(),
        };
        let body = serde_json::to_string(&body).map_err(EventflitError::Payload)?;

        let path = format!("/apps/{}/events", self.credentials.app_id());
        let signed =
            self.signer
                .sign("POST", &path, iter::empty::<(&str, &str)>(), body.as_bytes())?;

        self.dispatch(signed, Some(body)).await
    }

    /// Performs a signed GET against an application-scoped path
    ///
    /// `path` is relative to the application root, e.g. `/channels` or
    /// `/channels/presence-lobby/users`, and must begin with `/`.
    ///
    /// # Errors
    ///
    /// Returns an [`EventflitError`] for malformed paths or parameters,
    /// delivery failures, and non-2xx service responses.
    pub async fn get<I, K, V>(&self, path: &str, params: I) -> Result<String, EventflitError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if !path.starts_with('/') {
            return Err(SigningError::InvalidPath {
                path: path.to_owned(),
            }
            .into());
        }

        let full_path = format!("/apps/{}{}", self.credentials.app_id(), path);
        let signed = self.signer.sign("GET", &full_path, params, b"")?;

        self.dispatch(signed, None).await
    }

    async fn dispatch(
        &self,
        signed: SignedRequest,
        body: Option<String>,
    ) -> Result<String, EventflitError> {
        let request = HttpRequest {
            scheme: self.credentials.scheme(),
            host: self.credentials.host().to_owned(),
            path: signed.path().to_owned(),
            query: signed.params().to_vec(),
            body,
        };

        let response = self.sender.send(request).await?;

        match response.status {
            200..=299 => Ok(response.body),
            400..=499 => Err(EventflitError::ClientError {
                status: response.status,
                body: response.body,
            }),
            _ => Err(EventflitError::ServerError {
                status: response.status,
                body: response.body,
            }),
        }
    }
}
