//! Request bodies and the response body stream (§3 Response Body Stream,
//! §5 Backpressure).
//!
//! The request side (`Body`) is a `Reusable`/`Streaming` split: a body is
//! either an already-owned `Bytes` chunk or a boxed `http_body::Body`.
//! Producing multipart/url-form/file bodies from higher-level types is the
//! declared external collaborator's job (§6); this module only needs the
//! lazy byte-chunk contract.
//!
//! The response side (`ResponseBodyStream`) is a bounded, backpressured
//! channel of chunks, fed by the connection's frame dispatch and drained by
//! the `http_body::Body` impl the consumer polls.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::{BodyExt, combinators::BoxBody};
use tokio::sync::mpsc;

use crate::error::{BoxError, Error};

/// Bound on the response body's in-memory queue (§5 Backpressure).
const RESPONSE_BODY_CHANNEL_CAPACITY: usize = 32;

/// A request body: either an already-owned chunk, or a lazily-produced
/// stream of frames.
pub struct Body {
    inner: Inner,
}

enum Inner {
    Reusable(Bytes),
    Streaming(BoxBody<Bytes, BoxError>),
}

impl Body {
    /// An empty body (used for requests with no payload, e.g. `GET`).
    pub fn empty() -> Body {
        Body::reusable(Bytes::new())
    }

    pub(crate) fn reusable(chunk: Bytes) -> Body {
        Body {
            inner: Inner::Reusable(chunk),
        }
    }

    /// Wrap any `http_body::Body` producer (file reader, multipart encoder,
    /// URL-form encoder, ...) as a request body.
    pub fn wrap<B>(inner: B) -> Body
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Body {
            inner: Inner::Streaming(inner.map_err(Into::into).boxed()),
        }
    }

    /// The body's bytes, if it is a single already-owned chunk.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.inner {
            Inner::Reusable(bytes) => Some(bytes.as_ref()),
            Inner::Streaming(_) => None,
        }
    }

    /// Known content length, if the body can report one without consuming
    /// itself.
    pub fn content_length(&self) -> Option<u64> {
        match &self.inner {
            Inner::Reusable(bytes) => Some(bytes.len() as u64),
            Inner::Streaming(body) => body.size_hint().exact(),
        }
    }

    pub(crate) fn try_clone(&self) -> Option<Body> {
        match &self.inner {
            Inner::Reusable(chunk) => Some(Body::reusable(chunk.clone())),
            Inner::Streaming(_) => None,
        }
    }
}

impl Default for Body {
    fn default() -> Body {
        Body::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Body {
        Body::reusable(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(vec: Vec<u8>) -> Body {
        Body::reusable(vec.into())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Body {
        Body::reusable(s.into())
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Body {
        Body::reusable(Bytes::from_static(s.as_bytes()))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish()
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.inner {
            Inner::Reusable(bytes) => {
                let out = bytes.split_off(0);
                if out.is_empty() {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Frame::data(out))))
                }
            }
            Inner::Streaming(body) => {
                Poll::Ready(ready!(Pin::new(body).poll_frame(cx)).map(|frame| {
                    frame.map_err(|err| match err.downcast::<Error>() {
                        Ok(err) => *err,
                        Err(err) => Error::body(err),
                    })
                }))
            }
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Inner::Reusable(bytes) => SizeHint::with_exact(bytes.len() as u64),
            Inner::Streaming(body) => body.size_hint(),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Inner::Reusable(bytes) => bytes.is_empty(),
            Inner::Streaming(body) => body.is_end_stream(),
        }
    }
}

/// The producer half of a [`ResponseBodyStream`], held by the connection
/// driving the exchange.
///
/// `send` is the crate's only backpressure suspension point on the receive
/// path (§5(iii)): it resolves once the consumer has room, so a slow
/// consumer throttles how fast a connection reads frames off the wire.
pub(crate) struct ResponseBodySender {
    tx: mpsc::Sender<Result<Bytes, Error>>,
}

impl ResponseBodySender {
    /// Deliver one chunk, suspending until the consumer has queue room.
    ///
    /// Returns `Err` if the consumer has already dropped the body (in which
    /// case the caller should stop reading and tear down as if disposed).
    pub(crate) async fn send(&self, chunk: Bytes) -> Result<(), ()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(Ok(chunk)).await.map_err(|_| ())
    }

    /// Terminate the stream with a terminal error, releasing the sender.
    pub(crate) async fn fail(&self, cause: Error) {
        let _ = self.tx.send(Err(cause)).await;
    }
}

/// A backpressured sequence of response byte chunks, terminated by
/// end-of-stream or an error (§3 Response Body Stream).
pub struct ResponseBodyStream {
    rx: mpsc::Receiver<Result<Bytes, Error>>,
    done: bool,
}

impl ResponseBodyStream {
    pub(crate) fn channel() -> (ResponseBodySender, ResponseBodyStream) {
        let (tx, rx) = mpsc::channel(RESPONSE_BODY_CHANNEL_CAPACITY);
        (
            ResponseBodySender { tx },
            ResponseBodyStream { rx, done: false },
        )
    }

    /// Pull the next chunk, if any, suspending until one arrives or the
    /// stream terminates.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, Error>> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(item) => {
                if item.is_err() {
                    self.done = true;
                }
                Some(item)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl fmt::Debug for ResponseBodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBodyStream").finish()
    }
}

impl HttpBody for ResponseBodyStream {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.done {
            return Poll::Ready(None);
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(Ok(chunk)) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Some(Err(e)) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                self.done = true;
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn body_stream_delivers_chunks_in_order() {
        let (tx, mut rx) = ResponseBodyStream::channel();
        tx.send(Bytes::from_static(b"a")).await.unwrap();
        tx.send(Bytes::from_static(b"b")).await.unwrap();
        drop(tx);

        assert_eq!(rx.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(rx.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"b"));
        assert!(rx.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn body_stream_surfaces_error_and_then_terminates() {
        let (tx, mut rx) = ResponseBodyStream::channel();
        tx.fail(Error::connection_reset()).await;

        assert!(rx.next_chunk().await.unwrap().is_err());
        assert!(rx.next_chunk().await.is_none());
    }

    #[test]
    fn reusable_body_reports_exact_length() {
        let body = Body::from(Bytes::from_static(b"hello"));
        assert_eq!(body.content_length(), Some(5));
        assert_eq!(body.as_bytes(), Some(b"hello".as_ref()));
    }
}
