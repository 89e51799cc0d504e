//! Transport connectors (§6 collaborators: "TLS provider", "DNS/proxy
//! wiring").
//!
//! A connector is a `tower_service::Service<Uri>` yielding a [`Negotiated`]
//! transport plus a protocol hint, minus TLS/ALPN/proxy metadata (those are
//! the declared external collaborator's job; a TLS connector plugs in by
//! implementing the same `Service` and reporting [`ProtocolHint::Http2`]
//! when ALPN negotiated it). [`TcpConnector`] is the plain-TCP default: it
//! always negotiates `Http1` (eligible for the H2C
//! upgrade path, §4.2), using `tokio::net::lookup_host` for the minimal DNS
//! resolution a default needs.

use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use http::Uri;
use tokio::net::TcpStream;
use tower_service::Service;

use crate::error::Error;

/// The protocol a transport was negotiated for, reported by the connector
/// (§6 "protocol hint used by the endpoint initializer to pick HTTP/1.1 vs
/// HTTP/2 vs 'nego pending'").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolHint {
    Http1,
    Http2,
}

/// A freshly established transport plus its negotiated protocol.
pub struct Negotiated<IO> {
    pub io: IO,
    pub protocol: ProtocolHint,
}

/// Plain-TCP connector. The default `Connector` implementation; swap in a
/// TLS-terminating one (ALPN-aware) for `https://` authorities.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        TcpConnector { connect_timeout }
    }

    async fn connect(uri: Uri, connect_timeout: Duration) -> Result<Negotiated<TcpStream>, Error> {
        let authority = uri
            .authority()
            .ok_or_else(|| Error::endpoint_connect(InvalidAuthority))?;
        let host = authority.host();
        let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
            Some("https") => 443,
            _ => 80,
        });

        let addr = tokio::time::timeout(connect_timeout, resolve_one(host, port))
            .await
            .map_err(|_| Error::connect_timeout())?
            .map_err(Error::endpoint_connect)?;

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::connect_timeout())?
            .map_err(Error::endpoint_connect)?;
        stream.set_nodelay(true).map_err(Error::endpoint_connect)?;

        Ok(Negotiated {
            io: stream,
            protocol: ProtocolHint::Http1,
        })
    }
}

async fn resolve_one(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use std::io;
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"))
}

#[derive(Debug)]
struct InvalidAuthority;

impl std::fmt::Display for InvalidAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("request uri has no authority")
    }
}

impl std::error::Error for InvalidAuthority {}

impl Service<Uri> for TcpConnector {
    type Response = Negotiated<TcpStream>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connect_timeout = self.connect_timeout;
        Box::pin(async move { TcpConnector::connect(uri, connect_timeout).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_uri_without_authority() {
        let uri = Uri::from_static("/relative/path");
        let err = TcpConnector::connect(uri, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_connect());
    }
}
