//! The exchange sink: a single-shot promise for the exchange's outcome.
//!
//! A `tokio::sync::oneshot` hands the completed value back across the
//! connection-task boundary. Resolving carries the `Response` (headers +
//! body stream); rejecting carries the terminal `Error`.

use tokio::sync::oneshot;

use crate::{error::Error, response::Response};

pub(crate) struct ExchangeSink {
    tx: oneshot::Sender<Result<Response, Error>>,
}

/// The caller's half: awaiting it yields the response once headers arrive,
/// or the error that disposed the exchange first.
pub(crate) type ExchangeWait = oneshot::Receiver<Result<Response, Error>>;

impl ExchangeSink {
    pub(crate) fn channel() -> (ExchangeSink, ExchangeWait) {
        let (tx, rx) = oneshot::channel();
        (ExchangeSink { tx }, rx)
    }

    /// Resolve with the response. Dropped silently if the caller already
    /// gave up waiting.
    pub(crate) fn resolve(self, response: Response) {
        let _ = self.tx.send(Ok(response));
    }

    /// Reject with the cause that disposed the exchange before a response
    /// arrived.
    pub(crate) fn reject(self, cause: Error) {
        let _ = self.tx.send(Err(cause));
    }
}
