//! The crate's error taxonomy (§7).
//!
//! A `Kind`-tagged, boxed-source `Error` shape covering the exchange/pool
//! error kinds this crate surfaces: pool lifecycle, connect failures,
//! protocol/stream errors, and timeouts.

use std::{error::Error as StdError, fmt, io};

use h2::Reason;

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type used to carry an arbitrary underlying cause.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error produced by the pool, a connection, or an exchange.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

/// The taxonomy of error kinds from §7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// Acquisition attempted after the pool began or finished shutting down.
    PoolClosed,
    /// The active set plus buffer were both at capacity.
    PoolSaturated,
    /// A ticket waited past `connectTimeout` without being resolved.
    ConnectTimeout,
    /// The transport-level connect attempt itself failed.
    EndpointConnect,
    /// The peer closed, or a transport error occurred, mid-exchange.
    ConnectionReset,
    /// An HTTP/2 stream was reset by the peer, with the given reason.
    StreamReset(Reason),
    /// No progress was observed within `request_timeout`.
    RequestTimeout,
    /// Default cause used when `dispose()` is called with no explicit cause.
    ExchangeDisposed,
    /// The transport codec (hyper/h2 framer) surfaced a fatal protocol issue.
    ProtocolError,
    /// An operation unsupported by the pooled connection wrapper was invoked.
    Unsupported,
    /// Stream allocation failed locally (settings exceeded, connection closing).
    StreamAllocationFailed,
    /// An exchange's sink (or response slot) was used in violation of its
    /// single-shot contract (`AlreadyStarted`, `ResponseAlreadySet`, ...).
    ExchangeState(&'static str),
    /// A request or response body producer failed.
    Body,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner { kind, source: None }),
        }
    }

    pub(crate) fn with<E>(kind: Kind, source: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: Some(source.into()),
            }),
        }
    }

    pub(crate) fn pool_closed() -> Error {
        Error::new(Kind::PoolClosed)
    }

    pub(crate) fn pool_saturated() -> Error {
        Error::new(Kind::PoolSaturated)
    }

    pub(crate) fn connect_timeout() -> Error {
        Error::new(Kind::ConnectTimeout)
    }

    pub(crate) fn endpoint_connect<E: Into<BoxError>>(e: E) -> Error {
        Error::with(Kind::EndpointConnect, e)
    }

    pub(crate) fn connection_reset() -> Error {
        Error::new(Kind::ConnectionReset)
    }

    pub(crate) fn connection_reset_with<E: Into<BoxError>>(e: E) -> Error {
        Error::with(Kind::ConnectionReset, e)
    }

    pub(crate) fn stream_reset(reason: Reason) -> Error {
        Error::new(Kind::StreamReset(reason))
    }

    pub(crate) fn request_timeout() -> Error {
        Error::new(Kind::RequestTimeout)
    }

    pub(crate) fn exchange_disposed() -> Error {
        Error::new(Kind::ExchangeDisposed)
    }

    pub(crate) fn protocol<E: Into<BoxError>>(e: E) -> Error {
        Error::with(Kind::ProtocolError, e)
    }

    pub(crate) fn unsupported(what: &'static str) -> Error {
        Error::with(Kind::Unsupported, IoMsg(what))
    }

    pub(crate) fn stream_allocation_failed() -> Error {
        Error::new(Kind::StreamAllocationFailed)
    }

    pub(crate) fn already_started() -> Error {
        Error::new(Kind::ExchangeState("AlreadyStarted"))
    }

    pub(crate) fn response_already_set() -> Error {
        Error::new(Kind::ExchangeState("ResponseAlreadySet"))
    }

    pub(crate) fn body<E: Into<BoxError>>(e: E) -> Error {
        Error::with(Kind::Body, e)
    }

    /// The kind of error this is.
    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    /// Returns true if this error originated from a pool rejecting acquisition
    /// after `shutdown()`.
    pub fn is_pool_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::PoolClosed)
    }

    /// Returns true if the pool was full (active set + buffer) when this
    /// ticket was submitted.
    pub fn is_pool_saturated(&self) -> bool {
        matches!(self.inner.kind, Kind::PoolSaturated)
    }

    /// Returns true if a connect attempt, or a ticket's wait for one, timed
    /// out.
    pub fn is_connect_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::ConnectTimeout)
    }

    /// Returns true if the underlying transport connect failed.
    pub fn is_connect(&self) -> bool {
        matches!(self.inner.kind, Kind::EndpointConnect)
    }

    /// Returns true if this exchange, or every in-flight exchange on a
    /// connection, was disposed because of a connection-scoped reset.
    pub fn is_connection_reset(&self) -> bool {
        matches!(self.inner.kind, Kind::ConnectionReset)
    }

    /// Returns the HTTP/2 reset reason, if this error is a `StreamReset`.
    pub fn stream_reset_reason(&self) -> Option<Reason> {
        match self.inner.kind {
            Kind::StreamReset(reason) => Some(reason),
            _ => None,
        }
    }

    /// Returns true if no progress was observed within the request timeout.
    pub fn is_request_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::RequestTimeout)
    }

    /// Returns true if this is the default `dispose()` cause.
    pub fn is_exchange_disposed(&self) -> bool {
        matches!(self.inner.kind, Kind::ExchangeDisposed)
    }

    /// Returns true if the transport codec surfaced a fatal protocol error.
    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, Kind::ProtocolError)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("Error");
        builder.field("kind", &self.inner.kind);
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::PoolClosed => f.write_str("connection pool is closed")?,
            Kind::PoolSaturated => f.write_str("connection pool is saturated")?,
            Kind::ConnectTimeout => f.write_str("timed out waiting for a connection")?,
            Kind::EndpointConnect => f.write_str("failed to establish a connection")?,
            Kind::ConnectionReset => f.write_str("connection was reset")?,
            Kind::StreamReset(reason) => write!(f, "stream reset by peer: {reason}")?,
            Kind::RequestTimeout => f.write_str("request timed out")?,
            Kind::ExchangeDisposed => f.write_str("exchange was disposed")?,
            Kind::ProtocolError => f.write_str("transport protocol error")?,
            Kind::Unsupported => f.write_str("operation unsupported on this handle")?,
            Kind::StreamAllocationFailed => f.write_str("failed to allocate an http/2 stream")?,
            Kind::ExchangeState(what) => write!(f, "invalid exchange state transition: {what}")?,
            Kind::Body => f.write_str("request or response body error")?,
        };

        if let Some(e) = &self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::with(Kind::ConnectionReset, e)
    }
}

#[derive(Debug)]
struct IoMsg(&'static str);

impl fmt::Display for IoMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl StdError for IoMsg {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn error_is_send_sync() {
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn source_chain() {
        let root = Error::endpoint_connect(io::Error::other("refused"));
        assert!(root.source().is_some());
        assert!(root.is_connect());
    }

    #[test]
    fn stream_reset_carries_reason() {
        let err = Error::stream_reset(Reason::CANCEL);
        assert_eq!(err.stream_reset_reason(), Some(Reason::CANCEL));
        assert!(!err.is_connection_reset());
    }

    #[test]
    fn display_includes_source() {
        let err = Error::endpoint_connect(io::Error::other("boom"));
        let text = err.to_string();
        assert!(text.contains("boom"));
    }
}
