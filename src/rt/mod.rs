//! Runtime components.
//!
//! These traits let the rest of the crate stay agnostic of the async runtime:
//! an [`Executor`] spawns background tasks (the pool janitor, connection
//! drivers), a [`Timer`] produces cancellable [`Sleep`] futures (per-exchange
//! and per-ticket timeouts, the keepalive janitor interval).

mod timer;
pub mod tokio;

pub use self::timer::{ArcTimer, Sleep, Timer};
pub use self::tokio::{TokioExecutor, TokioTimer};

/// An executor of futures.
///
/// Implement this for your own runtime to plug it into [`crate::pool::Pool`]
/// and [`crate::endpoint::Endpoint`].
pub trait Executor<Fut> {
    /// Place the future into the executor to be run.
    fn execute(&self, fut: Fut);
}
