//! Multiplexed HTTP/2 connection (§4.3).
//!
//! One `h2::client::SendRequest` handle is shared (it is cheaply `Clone`)
//! across every concurrently in-flight exchange. Rather than hand-rolling a
//! central dispatch loop pumping a channel into `poll_ready`/`send_request`,
//! the upstream `h2` crate is driven directly with ordinary `async fn`s:
//! `send_request` already returns futures for both the response headers and
//! the request body sink, so each exchange just awaits its own pair.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use h2::{Reason, client::SendRequest};
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

use super::ConnectionHandler;
use crate::{
    body::Body,
    config::{ExchangeConfig, Http2Config},
    error::Error,
    exchange::{Exchange, ExchangeSink},
    request::Request,
    response::Response,
};

/// How often the settings watcher re-checks the peer's advertised
/// concurrency limit (§4.3 "onSettingsChange").
const SETTINGS_POLL_INTERVAL: Duration = Duration::from_millis(250);

struct Inner {
    send_request: SendRequest<Bytes>,
    exchange_config: Arc<ExchangeConfig>,
    handler: Arc<dyn ConnectionHandler>,
    max_concurrent: AtomicU32,
    inflight: AtomicU32,
    closed: AtomicBool,
}

#[derive(Clone)]
pub(crate) struct Http2Connection(Arc<Inner>);

impl Http2Connection {
    pub(crate) async fn handshake<IO>(
        io: IO,
        http2: Arc<Http2Config>,
        exchange_config: Arc<ExchangeConfig>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self, Error>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        // h2 drives the socket with tokio's own AsyncRead/AsyncWrite traits
        // directly (unlike hyper 1.x, which needs the TokioIo bridge) — no
        // wrapping needed for a plain TCP/TLS stream here.
        Self::handshake_with(io, http2, exchange_config, handler, None).await
    }

    /// Handshake over the socket handed back by an HTTP/1.1 h2c upgrade. The
    /// upgrading request is replayed rather than spliced in as a pre-opened
    /// stream (see the upgrade-replay decision in DESIGN.md), so this
    /// connection still allocates stream 1 for it like any other — no
    /// `initial_stream_id` override needed.
    pub(crate) async fn handshake_upgraded<T>(
        io: TokioIo<T>,
        http2: Arc<Http2Config>,
        exchange_config: Arc<ExchangeConfig>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Self, Error>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self::handshake_with(io, http2, exchange_config, handler, None).await
    }

    async fn handshake_with<T>(
        io: T,
        http2: Arc<Http2Config>,
        exchange_config: Arc<ExchangeConfig>,
        handler: Arc<dyn ConnectionHandler>,
        initial_stream_id: Option<u32>,
    ) -> Result<Self, Error>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut builder = h2::client::Builder::new();
        builder.enable_push(false);
        if let Some(window) = http2.initial_window_size {
            builder.initial_window_size(window);
        }
        if let Some(frame_size) = http2.max_frame_size {
            builder.max_frame_size(frame_size);
        }
        if let Some(max) = http2.max_header_list_size {
            builder.max_header_list_size(max);
        }
        if let Some(table_size) = http2.header_table_size {
            builder.header_table_size(table_size);
        }
        if let Some(max) = http2.max_concurrent_streams {
            builder.max_concurrent_streams(max);
        }
        if let Some(id) = initial_stream_id {
            builder.initial_stream_id(id);
        }

        let (send_request, connection) = builder
            .handshake::<_, Bytes>(io)
            .await
            .map_err(Error::protocol)?;

        let conn_handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::debug!(error = %err, "http/2 connection driver error");
                conn_handler.on_error(&Error::protocol(err));
            }
            conn_handler.on_close();
        });

        let initial_max = http2.max_concurrent_streams.unwrap_or(u32::MAX);
        let inner = Arc::new(Inner {
            send_request,
            exchange_config,
            handler,
            max_concurrent: AtomicU32::new(initial_max),
            inflight: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        });

        spawn_settings_watcher(inner.clone());

        Ok(Http2Connection(inner))
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Relaxed)
    }

    pub(crate) fn shutdown(&self) {
        self.0.closed.store(true, Ordering::Relaxed);
    }

    pub(crate) async fn shutdown_gracefully(&self, timeout: Duration) {
        self.0.closed.store(true, Ordering::Relaxed);
        let deadline = tokio::time::Instant::now() + timeout;
        while self.0.inflight.load(Ordering::Acquire) > 0 {
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub(crate) fn max_concurrent_streams(&self) -> u32 {
        self.0.max_concurrent.load(Ordering::Relaxed)
    }

    /// `inflight` is held from here until the exchange is fully done — for a
    /// successful exchange that includes its response body, not just its
    /// headers, so [`Self::shutdown_gracefully`] doesn't return while a body
    /// is still streaming. The increment made here is only ever undone
    /// inside this function (the early-return error/timeout paths) or by the
    /// detached body-pump task `send_inner` spawns on success — never both.
    pub(crate) async fn send(&self, request: Request) -> Result<Response, Error> {
        if self.is_closed() {
            return Err(Error::connection_reset());
        }

        self.0.inflight.fetch_add(1, Ordering::AcqRel);
        match self.send_inner(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                self.0.inflight.fetch_sub(1, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    async fn send_inner(&self, request: Request) -> Result<Response, Error> {
        let request_timeout = request
            .timeout_override()
            .unwrap_or(self.0.exchange_config.request_timeout);
        let (sink, wait) = ExchangeSink::channel();
        let mut exchange = Exchange::new(request, sink, request_timeout);
        let request = exchange.start()?;
        let http_request = request.into_http().map_err(Error::protocol)?;
        let (parts, mut body) = http_request.into_parts();
        let end_of_stream = body.is_end_stream();

        let mut send_request = self.0.send_request.clone();
        futures_util::future::poll_fn(|cx| send_request.poll_ready(cx))
            .await
            .map_err(Error::connection_reset_with)?;

        let headless = http::Request::from_parts(parts, ());
        let (response_fut, send_stream) = send_request
            .send_request(headless, end_of_stream)
            .map_err(Error::connection_reset_with)?;

        // Shared so a timeout fired from either this function (pre-headers)
        // or `pump_h2_body` (post-headers) can still reach in and send an
        // explicit RST_STREAM(NO_ERROR) — §8 scenario 6.
        let send_stream = Arc::new(tokio::sync::Mutex::new(send_stream));
        if !end_of_stream {
            tokio::spawn(pipe_request_body(body, send_stream.clone()));
        }

        let handler = self.0.handler.clone();
        let deadline = exchange.deadline();
        let outcome = tokio::select! {
            biased;
            result = response_fut => Outcome::Responded(result),
            () = tokio::time::sleep_until(deadline.into()) => Outcome::TimedOut,
        };

        let http_response = match outcome {
            Outcome::Responded(Ok(resp)) => resp,
            Outcome::Responded(Err(err)) => {
                let cause = stream_error_to_cause(err);
                exchange.dispose(Some(cause));
                handler.on_exchange_terminate();
                return wait.await.map_err(|_| Error::connection_reset())?;
            }
            Outcome::TimedOut => {
                send_stream.lock().await.send_reset(Reason::NO_ERROR);
                exchange.dispose(Some(Error::request_timeout()));
                handler.on_exchange_terminate();
                return wait.await.map_err(|_| Error::request_timeout())?;
            }
        };

        let (parts, recv_stream) = http_response.into_parts();
        exchange.touch(request_timeout);
        exchange.set_response(parts.status, parts.version, parts.headers)?;
        let response = wait.await.map_err(|_| Error::connection_reset())??;

        let inner = self.0.clone();
        tokio::spawn(async move {
            pump_h2_body(recv_stream, exchange, request_timeout, send_stream).await;
            inner.inflight.fetch_sub(1, Ordering::AcqRel);
            handler.on_exchange_terminate();
        });

        Ok(response)
    }
}

enum Outcome<T> {
    Responded(T),
    TimedOut,
}

fn stream_error_to_cause(err: h2::Error) -> Error {
    match err.reason() {
        Some(reason) => Error::stream_reset(reason),
        None => Error::connection_reset_with(err),
    }
}

type SharedSendStream = Arc<tokio::sync::Mutex<h2::SendStream<Bytes>>>;

async fn pipe_request_body(mut body: Body, send_stream: SharedSendStream) {
    loop {
        match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => {
                    let end = body.is_end_stream();
                    let mut send_stream = send_stream.lock().await;
                    if send_stream.send_data(data, end).is_err() || end {
                        return;
                    }
                }
                Err(frame) => {
                    if let Ok(trailers) = frame.into_trailers() {
                        let _ = send_stream.lock().await.send_trailers(trailers);
                    }
                    return;
                }
            },
            Some(Err(_)) => {
                send_stream.lock().await.send_reset(Reason::INTERNAL_ERROR);
                return;
            }
            None => {
                let _ = send_stream.lock().await.send_data(Bytes::new(), true);
                return;
            }
        }
    }
}

async fn pump_h2_body(
    mut recv_stream: h2::RecvStream,
    mut exchange: Exchange,
    request_timeout: Duration,
    send_stream: SharedSendStream,
) {
    loop {
        let deadline = exchange.deadline();
        let chunk = tokio::select! {
            biased;
            chunk = recv_stream.data() => chunk,
            () = tokio::time::sleep_until(deadline.into()) => {
                send_stream.lock().await.send_reset(Reason::NO_ERROR);
                exchange.dispose(Some(Error::request_timeout()));
                return;
            }
        };
        match chunk {
            Some(Ok(chunk)) => {
                let len = chunk.len();
                // §4.1: the sliding deadline is touched on each received
                // data event for HTTP/2, unlike HTTP/1.x's touch-on-headers.
                exchange.touch(request_timeout);
                if exchange.push_data(chunk).await.is_err() {
                    exchange.dispose(None);
                    return;
                }
                let _ = recv_stream.flow_control().release_capacity(len);
            }
            Some(Err(err)) => {
                exchange.dispose(Some(stream_error_to_cause(err)));
                return;
            }
            None => break,
        }
    }

    // trailers have no landing spot on an already-emitted Response; draining
    // them here only matters for keeping the stream's flow control tidy.
    let _ = recv_stream.trailers().await;
    exchange.notify_complete();
}

fn spawn_settings_watcher(inner: Arc<Inner>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SETTINGS_POLL_INTERVAL);
        loop {
            ticker.tick().await;
            if inner.closed.load(Ordering::Relaxed) {
                return;
            }
            let observed = inner.send_request.max_concurrent_send_streams() as u32;
            let previous = inner.max_concurrent.swap(observed, Ordering::AcqRel);
            if observed != previous {
                inner.handler.on_settings_change(observed);
            }
        }
    });
}
