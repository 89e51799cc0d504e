//! The public entry point (§4.6 Endpoint Facade).
//!
//! [`Endpoint`] composes one [`crate::pool::Pool`] bound to a single remote
//! authority with the protocol configs and a connector collaborator (§6,
//! §4.7). `Endpoint::request` returns a [`RequestBuilder`] with the usual
//! chained-setter ergonomics (`.header()`, `.body()`, `.timeout()`,
//! `.send()`); `Endpoint` itself also implements
//! `tower_service::Service<http::Request<Body>>` so it composes with any
//! `tower` middleware stack.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{Method, Uri};
use tokio::io::{AsyncRead, AsyncWrite};
use tower_service::Service;

use crate::{
    body::Body,
    common::exec::Exec,
    config::{EndpointConfig, ExchangeConfig, Http1Config, Http2Config, PoolConfig},
    connect::{Negotiated, TcpConnector},
    connection::{Connection, ConnectionHandler},
    error::Error,
    pool::{ConnectFn, Pool},
    request::{Request, RequestBuilder as InnerRequestBuilder},
    response::Response,
    rt::{ArcTimer, Executor, Timer, TokioExecutor, TokioTimer},
};

/// A snapshot of the pool invariants in §8, useful for tests and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub size: usize,
    pub connecting: usize,
    pub parked: usize,
    pub total_capacity: i64,
    pub capacity: i64,
    pub buffered: usize,
    pub closing: bool,
    pub closed: bool,
}

impl From<crate::pool::PoolStats> for Stats {
    fn from(s: crate::pool::PoolStats) -> Self {
        Stats {
            size: s.size,
            connecting: s.connecting,
            parked: s.parked,
            total_capacity: s.total_capacity,
            capacity: s.capacity,
            buffered: s.buffered,
            closing: s.closing,
            closed: s.closed,
        }
    }
}

/// Builds an [`Endpoint`] from the configuration surface in §6.
#[must_use]
pub struct EndpointBuilder {
    config: EndpointConfig,
    exec: Option<Exec>,
    timer: Option<ArcTimer>,
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        EndpointBuilder {
            config: EndpointConfig::default(),
            exec: None,
            timer: None,
        }
    }
}

impl EndpointBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.config.pool = config;
        self
    }

    pub fn http1_config(mut self, config: Http1Config) -> Self {
        self.config.http1 = config;
        self
    }

    pub fn http2_config(mut self, config: Http2Config) -> Self {
        self.config.http2 = config;
        self
    }

    pub fn exchange_config(mut self, config: ExchangeConfig) -> Self {
        self.config.exchange = config;
        self
    }

    /// Whether the default connector (`TcpConnector`, used by [`Self::build`])
    /// should be told it's dialing a TLS-terminated authority. Has no effect
    /// on [`Self::build_with_connector`]; plug in an ALPN-aware connector
    /// there instead (§4.7).
    pub fn tls_enabled(mut self, value: bool) -> Self {
        self.config.tls_enabled = value;
        self
    }

    /// Swap in a custom [`Executor`] for background connection drivers and
    /// the pool's janitor. Defaults to [`TokioExecutor`].
    pub fn executor<E>(mut self, executor: E) -> Self
    where
        E: Executor<crate::common::exec::BoxSendFuture> + Send + Sync + 'static,
    {
        self.exec = Some(Exec::new(executor));
        self
    }

    /// Swap in a custom [`Timer`]. Defaults to [`TokioTimer`].
    pub fn timer<T>(mut self, timer: T) -> Self
    where
        T: Timer + Send + Sync + 'static,
    {
        self.timer = Some(ArcTimer::new(timer));
        self
    }

    /// Build an endpoint dialing `authority` with the default plain-TCP
    /// connector (eligible for the H2C upgrade path, §4.2).
    pub fn build(self, authority: Uri) -> Endpoint {
        let connect_timeout = self.config.pool.connect_timeout;
        self.build_with_connector(authority, TcpConnector::new(connect_timeout))
    }

    /// Build an endpoint dialing `authority` through a custom connector — the
    /// plug point for a TLS/ALPN-aware transport (§4.7; TLS context
    /// provisioning is an external collaborator this crate does not ship).
    pub fn build_with_connector<C, IO>(self, authority: Uri, connector: C) -> Endpoint
    where
        C: Service<Uri, Response = Negotiated<IO>, Error = Error> + Clone + Send + Sync + 'static,
        C::Future: Send + 'static,
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let http1 = Arc::new(self.config.http1);
        let http2 = Arc::new(self.config.http2);
        let exchange = Arc::new(self.config.exchange);
        let exec = self.exec.unwrap_or_else(|| Exec::new(TokioExecutor::new()));
        let timer = self.timer.unwrap_or_else(|| ArcTimer::new(TokioTimer::new()));

        let connect: ConnectFn = {
            let authority = authority.clone();
            let http1 = http1.clone();
            let http2 = http2.clone();
            let exchange = exchange.clone();
            Arc::new(move |handler: Arc<dyn ConnectionHandler>| {
                let connector = connector.clone();
                let authority = authority.clone();
                let http1 = http1.clone();
                let http2 = http2.clone();
                let exchange = exchange.clone();
                Box::pin(async move {
                    let mut connector = connector;
                    futures_util::future::poll_fn(|cx| connector.poll_ready(cx)).await?;
                    let negotiated = connector.call(authority).await?;
                    Connection::establish(negotiated, http1, http2, exchange, handler).await
                }) as crate::pool::BoxFuture<Result<Connection, Error>>
            })
        };

        let pool = Pool::new(
            authority,
            self.config.pool,
            exchange.graceful_shutdown_timeout,
            connect,
            exec,
            timer,
        );

        Endpoint {
            shared: Arc::new(EndpointShared { pool, exchange }),
        }
    }
}

struct EndpointShared {
    pool: Pool,
    exchange: Arc<ExchangeConfig>,
}

/// Entry point producing requests and dispatching through the pool (§4.6).
/// Cheap to clone — every clone shares the same pool.
#[derive(Clone)]
pub struct Endpoint {
    shared: Arc<EndpointShared>,
}

impl Endpoint {
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    pub fn authority(&self) -> &Uri {
        self.shared.pool.authority()
    }

    /// The endpoint's default per-exchange request timeout; overridable per
    /// request via [`RequestBuilder::timeout`].
    pub fn default_request_timeout(&self) -> std::time::Duration {
        self.shared.exchange.request_timeout
    }

    pub fn request(&self, method: Method, uri: Uri) -> RequestBuilder {
        RequestBuilder {
            endpoint: self.clone(),
            inner: InnerRequestBuilder::new(method, uri),
        }
    }

    pub fn get(&self, uri: Uri) -> RequestBuilder {
        self.request(Method::GET, uri)
    }

    pub fn post(&self, uri: Uri) -> RequestBuilder {
        self.request(Method::POST, uri)
    }

    /// Acquire a pooled connection and run `request` on it to completion
    /// (§2 "Data flow").
    pub async fn send(&self, request: Request) -> Result<Response, Error> {
        let pooled = self.shared.pool.acquire().await?;
        pooled.send(request).await
    }

    /// A snapshot of the pool invariants in §8.
    pub fn stats(&self) -> Stats {
        self.shared.pool.stats().into()
    }

    /// §4.4.6 `shutdown()`: every active and parked connection is closed
    /// immediately, and every in-flight exchange on them is disposed with
    /// `ConnectionReset`.
    pub async fn shutdown(&self) {
        self.shared.pool.shutdown(false).await;
    }

    /// §4.4.6 graceful variant: each connection is given
    /// `graceful_shutdown_timeout` to drain its in-flight exchanges before
    /// being closed.
    pub async fn shutdown_gracefully(&self) {
        self.shared.pool.shutdown(true).await;
    }
}

/// Builds one [`Request`] and dispatches it through the [`Endpoint`] that
/// produced it (§4.6).
#[must_use = "RequestBuilder does nothing until you call .send()"]
pub struct RequestBuilder {
    endpoint: Endpoint,
    inner: InnerRequestBuilder,
}

impl RequestBuilder {
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<http::HeaderValue>,
    {
        self.inner = self.inner.header(key, value);
        self
    }

    pub fn version(mut self, version: http::Version) -> Self {
        self.inner = self.inner.version(version);
        self
    }

    pub fn body<B: Into<Body>>(mut self, body: B) -> Self {
        self.inner = self.inner.body(body);
        self
    }

    /// Per-request override of the endpoint's configured `request_timeout`.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }

    pub async fn send(self) -> Result<Response, Error> {
        self.endpoint.send(self.inner.build()).await
    }
}

impl Service<http::Request<Body>> for Endpoint {
    type Response = http::Response<crate::body::ResponseBodyStream>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        let endpoint = self.clone();
        Box::pin(async move {
            let request = Request::from_http(req);
            let response = endpoint.send(request).await?;
            Ok(response.into_http())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_are_sane() {
        let builder = EndpointBuilder::new();
        assert!(builder.config.pool.max_size > 0);
    }

    #[tokio::test]
    async fn stats_start_empty_before_any_request() {
        let endpoint = Endpoint::builder().build(Uri::from_static("http://example.test"));
        let stats = endpoint.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.connecting, 0);
    }

    #[tokio::test]
    async fn shutdown_then_send_reports_pool_closed() {
        let endpoint = Endpoint::builder()
            .pool_config(
                crate::config::PoolConfigBuilder::new()
                    .connect_timeout(std::time::Duration::from_millis(50))
                    .build(),
            )
            .build(Uri::from_static("http://127.0.0.1:1"));
        endpoint.shutdown().await;
        let err = endpoint
            .request(Method::GET, Uri::from_static("http://127.0.0.1:1/"))
            .send()
            .await
            .unwrap_err();
        assert!(err.is_pool_closed());
    }
}
