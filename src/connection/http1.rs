//! Single-exchange-at-a-time HTTP/1.1 connection, with the H2C upgrade
//! producer (§4.2).
//!
//! Framing itself is `hyper::client::conn::http1`'s job (§1 "delegated to a
//! transport codec collaborator"); this module only owns the exchange
//! lifecycle around it: at most one in-flight request (enforced by holding
//! the `SendRequest` behind a `tokio::sync::Mutex`, the same one-at-a-time
//! discipline hyper's own `SendRequest` requires), the upgrade handshake,
//! and failure-to-`ConnectionReset` translation.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use http::{HeaderValue, Method, StatusCode, Uri, Version};
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::Mutex as AsyncMutex,
};

use super::{ConnectionHandler, h2c, http2::Http2Connection};
use crate::{
    body::Body,
    config::{ExchangeConfig, Http1Config, Http2Config},
    error::Error,
    exchange::{Exchange, ExchangeSink},
    request::Request,
    response::Response,
};

struct Inner {
    sender: AsyncMutex<hyper::client::conn::http1::SendRequest<Body>>,
    http1: Arc<Http1Config>,
    http2: Arc<Http2Config>,
    exchange_config: Arc<ExchangeConfig>,
    handler: Arc<dyn ConnectionHandler>,
    upgrade_attempted: AtomicBool,
    closed: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct Http1Connection(Arc<Inner>);

/// What to replay on the fresh HTTP/2 connection if the peer accepts the h2c
/// upgrade: the pieces of the original request that outlive `Exchange::start`
/// consuming it, captured only when eligible (see `eligible_for_h2c_upgrade`).
struct ReplayMaterial {
    method: Method,
    uri: Uri,
    headers: http::HeaderMap,
    body: Body,
}

impl Http1Connection {
    pub(crate) async fn handshake<IO>(
        io: IO,
        http1: Arc<Http1Config>,
        http2: Arc<Http2Config>,
        exchange_config: Arc<ExchangeConfig>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self, Error>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(io);
        let (sender, conn) = hyper::client::conn::http1::Builder::new()
            .handshake::<_, Body>(io)
            .await
            .map_err(Error::protocol)?;

        let conn_handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = conn.with_upgrades().await {
                tracing::debug!(error = %err, "http/1.1 connection driver error");
                conn_handler.on_error(&Error::protocol(err));
            }
            conn_handler.on_close();
        });

        Ok(Http1Connection(Arc::new(Inner {
            sender: AsyncMutex::new(sender),
            http1,
            http2,
            exchange_config,
            handler,
            upgrade_attempted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })))
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Relaxed)
    }

    pub(crate) fn shutdown(&self) {
        self.0.closed.store(true, Ordering::Relaxed);
    }

    pub(crate) async fn shutdown_gracefully(&self, timeout: std::time::Duration) {
        // HTTP/1.1 has no distinct graceful primitive beyond letting the
        // in-flight exchange (if any) finish; bound the wait so shutdown
        // always terminates.
        let _ = tokio::time::timeout(timeout, async {
            let _guard = self.0.sender.lock().await;
        })
        .await;
        self.shutdown();
    }

    /// Only a request with an already-known, reusable body can be replayed
    /// verbatim over the HTTP/2 connection if the server accepts the h2c
    /// upgrade — a body already partially drained as a byte stream cannot.
    fn eligible_for_h2c_upgrade(&self, request: &Request) -> bool {
        self.0.http1.upgrade_to_h2c
            && !self.0.upgrade_attempted.load(Ordering::Relaxed)
            && request.body().as_bytes().is_some()
    }

    pub(crate) async fn send(&self, mut request: Request) -> Result<Response, Error> {
        let attempting_upgrade = self.eligible_for_h2c_upgrade(&request);
        let replay = if attempting_upgrade {
            request.body().try_clone().map(|body| ReplayMaterial {
                method: request.method().clone(),
                uri: request.uri().clone(),
                headers: request.headers().clone(),
                body,
            })
        } else {
            None
        };

        if attempting_upgrade {
            apply_h2c_upgrade_headers(&mut request, &self.0.http2);
        }
        if self.0.http1.send_user_agent
            && !request.headers().contains_key(http::header::USER_AGENT)
        {
            if let Some(ua) = &self.0.http1.user_agent {
                if let Ok(value) = HeaderValue::from_str(ua) {
                    request
                        .headers_mut()
                        .insert(http::header::USER_AGENT, value);
                }
            }
        }

        let request_timeout = request
            .timeout_override()
            .unwrap_or(self.0.exchange_config.request_timeout);
        let (sink, wait) = ExchangeSink::channel();
        let mut exchange = Exchange::new(request, sink, request_timeout);
        let request = exchange.start()?;
        let http_request = request.into_http().map_err(Error::protocol)?;

        let deadline = exchange.deadline();
        let outcome = tokio::select! {
            biased;
            result = self.send_once(http_request) => Outcome::Responded(result),
            () = tokio::time::sleep_until(deadline.into()) => Outcome::TimedOut,
        };

        let http_response = match outcome {
            Outcome::Responded(Ok(resp)) => resp,
            Outcome::Responded(Err(err)) => {
                self.shutdown();
                self.0.handler.on_close();
                exchange.dispose(Some(Error::connection_reset_with(err)));
                return wait.await.map_err(|_| Error::connection_reset())?;
            }
            Outcome::TimedOut => {
                self.shutdown();
                self.0.handler.on_close();
                exchange.dispose(Some(Error::request_timeout()));
                return wait.await.map_err(|_| Error::request_timeout())?;
            }
        };

        if attempting_upgrade && http_response.status() == StatusCode::SWITCHING_PROTOCOLS {
            return self.complete_h2c_upgrade(http_response, replay).await;
        }

        let (parts, body) = http_response.into_parts();
        exchange.touch(request_timeout);
        exchange.set_response(parts.status, parts.version, parts.headers)?;
        let response = wait.await.map_err(|_| Error::connection_reset())??;

        let handler = self.0.handler.clone();
        let conn = self.clone();
        let body_deadline = exchange.deadline();
        tokio::spawn(async move {
            pump_h1_body(body, exchange, body_deadline, &conn).await;
            handler.on_exchange_terminate();
        });

        Ok(response)
    }

    async fn send_once(
        &self,
        request: http::Request<Body>,
    ) -> Result<http::Response<hyper::body::Incoming>, hyper::Error> {
        let mut sender = self.0.sender.lock().await;
        sender.send_request(request).await
    }

    async fn complete_h2c_upgrade(
        &self,
        response: http::Response<hyper::body::Incoming>,
        replay: Option<ReplayMaterial>,
    ) -> Result<Response, Error> {
        self.0.upgrade_attempted.store(true, Ordering::Relaxed);
        let upgraded = hyper::upgrade::on(response)
            .await
            .map_err(Error::protocol)?;
        let io = TokioIo::new(upgraded);

        let new_conn = Http2Connection::handshake_upgraded(
            io,
            self.0.http2.clone(),
            self.0.exchange_config.clone(),
            self.0.handler.clone(),
        )
        .await?;

        self.0
            .handler
            .on_upgrade(super::Connection::Http2(new_conn.clone()));
        self.shutdown();

        // Replaying as a brand-new stream rather than splicing frames: the
        // `h2` crate's public client API has no way to adopt a stream that
        // was implicitly opened by the upgrading request itself, so the
        // request goes out again, now as stream 1 of the new connection
        // (see the upgrade-replay decision recorded in DESIGN.md).
        let replay = replay.ok_or_else(|| Error::unsupported("h2c upgrade without a replayable body"))?;
        let mut headers = replay.headers;
        headers.remove(http::header::UPGRADE);
        headers.remove(http::header::CONNECTION);
        headers.remove("http2-settings");
        headers.remove(http::header::HOST);
        let replay_request = Request::new(replay.method, replay.uri)
            .with_version(Version::HTTP_2)
            .with_headers(headers)
            .with_body(replay.body);

        new_conn.send(replay_request).await
    }
}

enum Outcome<T> {
    Responded(T),
    TimedOut,
}

fn apply_h2c_upgrade_headers(request: &mut Request, http2: &Http2Config) {
    let headers = request.headers_mut();
    headers.insert(http::header::UPGRADE, HeaderValue::from_static("h2c"));
    headers.insert(
        http::header::CONNECTION,
        HeaderValue::from_static("Upgrade, HTTP2-Settings"),
    );
    let encoded = h2c::encode_settings_header(http2);
    if let Ok(value) = HeaderValue::from_str(&encoded) {
        headers.insert(http::HeaderName::from_static("http2-settings"), value);
    }
}

async fn pump_h1_body(
    mut body: hyper::body::Incoming,
    mut exchange: Exchange,
    deadline: std::time::Instant,
    conn: &Http1Connection,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = body.frame() => frame,
            () = tokio::time::sleep_until(deadline.into()) => {
                conn.shutdown();
                conn.0.handler.on_close();
                exchange.dispose(Some(Error::request_timeout()));
                return;
            }
        };
        match frame {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => {
                    if exchange.push_data(data).await.is_err() {
                        exchange.dispose(None);
                        return;
                    }
                }
                Err(_trailers_frame) => {
                    // trailers carry no place to land on an already-emitted
                    // Response; §4.1 only requires the terminal ordering,
                    // which falls out once the frame stream ends below.
                }
            },
            Some(Err(err)) => {
                conn.shutdown();
                conn.0.handler.on_close();
                exchange.dispose(Some(Error::connection_reset_with(err)));
                return;
            }
            None => {
                exchange.notify_complete();
                return;
            }
        }
    }
}
