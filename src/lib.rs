//! A pooled, multi-protocol (HTTP/1.1 + HTTP/2, with H2C upgrade) HTTP client
//! core.
//!
//! The crate's two hard subsystems are [`pool`] (lock-free command
//! serialization, load-factor-based connection selection, parking/eviction,
//! request buffering) and [`exchange`]/[`connection`] (the per-request state
//! machine, specialized for HTTP/2 stream multiplexing and the H2C upgrade
//! hand-off). Everything else — [`config`], [`error`], [`connect`], [`body`],
//! [`request`]/[`response`], [`rt`] — is the surrounding ambient stack those
//! two subsystems need to be a usable client rather than an algorithm.
//!
//! [`endpoint::Endpoint`] is the single public entry point: it owns one
//! [`pool::Pool`] bound to one remote authority and dispatches requests
//! through it.
//!
//! ```no_run
//! use multiplex_client::Endpoint;
//! use http::{Method, Uri};
//!
//! # async fn run() -> Result<(), multiplex_client::Error> {
//! let endpoint = Endpoint::builder().build(Uri::from_static("http://example.test"));
//! let response = endpoint.request(Method::GET, Uri::from_static("http://example.test/")).send().await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

mod body;
mod common;
mod config;
mod connect;
mod connection;
mod endpoint;
mod error;
mod exchange;
mod pool;
mod request;
mod response;
mod rt;

pub use body::Body;
pub use config::{
    EndpointConfig, ExchangeConfig, ExchangeConfigBuilder, Http1Config, Http1ConfigBuilder,
    Http2Config, Http2ConfigBuilder, PoolConfig, PoolConfigBuilder,
};
pub use connect::{Negotiated, ProtocolHint, TcpConnector};
pub use endpoint::{Endpoint, EndpointBuilder, RequestBuilder, Stats};
pub use error::{Error, Kind, Result};
pub use request::Request;
pub use response::Response;
pub use rt::{ArcTimer, Executor, Sleep, Timer, TokioExecutor, TokioTimer};
