//! Per-protocol connection state machines (§4.2, §4.3) behind one tagged
//! variant (§9: "model as a tagged variant `Connection = { Http11(…),
//! Http2(…) }` with the common capability set").
//!
//! A `Connection` is a cheap, `Clone`-able handle: the actual socket and
//! protocol driver run on a background task (spawned through [`crate::rt`]),
//! and this handle only carries the means to submit an exchange and to ask
//! the driver to shut down. Lifecycle callbacks (`onSettingsChange`,
//! `onClose`, `onError`, `onExchangeTerminate`, `onUpgrade`) are wired at
//! construction time via [`ConnectionHandler`] rather than exposed on the
//! handle — per §5, "Calling `setHandler` on the wrapper is forbidden"; here
//! there simply is no such method to call after the fact.

pub(crate) mod h2c;
pub(crate) mod http1;
pub(crate) mod http2;

use std::sync::Arc;

use http::Version;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    config::{ExchangeConfig, Http1Config, Http2Config},
    connect::{Negotiated, ProtocolHint},
    error::Error,
    request::Request,
    response::Response,
};

/// Lifecycle callbacks a connection driver reports back to its owner. The
/// pool is the only real implementor: each slot gets a handler bound to its
/// [`crate::pool::SlotId`] that posts a command to the pool's executor
/// instead of touching pool state directly (§9).
pub(crate) trait ConnectionHandler: Send + Sync {
    /// The peer's advertised concurrency limit changed (HTTP/2 only); the
    /// new effective max is `min(peerValue, localLimit)` (§4.3).
    fn on_settings_change(&self, new_max: u32);
    /// The connection closed, locally or remotely, with every in-flight
    /// exchange already disposed with `ConnectionReset` (or `GOAWAY`'s
    /// equivalent) by the time this fires.
    fn on_close(&self);
    /// A fatal transport/protocol error surfaced outside the scope of any
    /// single exchange (e.g. `GOAWAY`).
    fn on_error(&self, err: &Error);
    /// One exchange on this connection reached a terminal state; the slot
    /// should be recycled (§4.4.5).
    fn on_exchange_terminate(&self);
    /// An HTTP/1.1 connection completed the H2C upgrade handshake and should
    /// be replaced in the slot by the given HTTP/2 connection (§4.2).
    fn on_upgrade(&self, new_connection: Connection);
}

/// Polymorphic over the capability set {send-exchange, shutdown,
/// query-protocol, report-max-concurrent} (§3 Connection).
#[derive(Clone)]
pub(crate) enum Connection {
    Http1(http1::Http1Connection),
    Http2(http2::Http2Connection),
}

impl Connection {
    pub(crate) async fn establish<IO>(
        negotiated: Negotiated<IO>,
        http1: Arc<Http1Config>,
        http2: Arc<Http2Config>,
        exchange: Arc<ExchangeConfig>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Connection, Error>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        match negotiated.protocol {
            ProtocolHint::Http1 => {
                let conn = http1::Http1Connection::handshake(
                    negotiated.io,
                    http1,
                    http2,
                    exchange,
                    handler,
                )
                .await?;
                Ok(Connection::Http1(conn))
            }
            ProtocolHint::Http2 => {
                let conn =
                    http2::Http2Connection::handshake(negotiated.io, http2, exchange, handler)
                        .await?;
                Ok(Connection::Http2(conn))
            }
        }
    }

    /// Run one exchange to completion, returning the response once its
    /// headers arrive (the body streams separately, see
    /// [`crate::body::ResponseBodyStream`]).
    pub(crate) async fn send(&self, request: Request) -> Result<Response, Error> {
        match self {
            Connection::Http1(c) => c.send(request).await,
            Connection::Http2(c) => c.send(request).await,
        }
    }

    pub(crate) fn version(&self) -> Version {
        match self {
            Connection::Http1(_) => Version::HTTP_11,
            Connection::Http2(_) => Version::HTTP_2,
        }
    }

    /// `None` = unbounded; the pool treats that as `1` for HTTP/1.1 (§3).
    pub(crate) fn max_concurrent(&self) -> Option<u32> {
        match self {
            Connection::Http1(_) => None,
            Connection::Http2(c) => Some(c.max_concurrent_streams()),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        match self {
            Connection::Http1(c) => c.is_closed(),
            Connection::Http2(c) => c.is_closed(),
        }
    }

    pub(crate) fn shutdown(&self) {
        match self {
            Connection::Http1(c) => c.shutdown(),
            Connection::Http2(c) => c.shutdown(),
        }
    }

    /// §4.4.6 "graceful" shutdown variant.
    pub(crate) async fn shutdown_gracefully(&self, timeout: std::time::Duration) {
        match self {
            Connection::Http1(c) => c.shutdown_gracefully(timeout).await,
            Connection::Http2(c) => c.shutdown_gracefully(timeout).await,
        }
    }
}
