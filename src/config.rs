//! Configuration surface (§6).
//!
//! These are the knobs the core reads; wiring them from a CLI flag or a bean
//! container is the caller's concern. Each config is a plain data struct
//! plus a `#[must_use]` builder of chained `Into<Option<T>>` setters.

use std::time::Duration;

/// Top-level configuration for a [`crate::endpoint::Endpoint`].
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub(crate) pool: PoolConfig,
    pub(crate) http1: Http1Config,
    pub(crate) http2: Http2Config,
    pub(crate) exchange: ExchangeConfig,
    pub(crate) tls_enabled: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            pool: PoolConfig::default(),
            http1: Http1Config::default(),
            http2: Http2Config::default(),
            exchange: ExchangeConfig::default(),
            tls_enabled: false,
        }
    }
}

/// Pool knobs (§4.4 Configuration).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub(crate) max_size: usize,
    pub(crate) buffer_size: Option<isize>,
    pub(crate) clean_period: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) keep_alive_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_size: 8,
            buffer_size: None,
            clean_period: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            keep_alive_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Builder for [`PoolConfig`].
#[must_use]
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Hard cap on live + connecting slots. Must be `> 0`.
    pub fn max_size(mut self, value: usize) -> Self {
        self.config.max_size = value.max(1);
        self
    }

    /// `None` (or a negative value passed to [`Self::buffer_size_raw`]) means
    /// an unbounded waiting queue; `Some(0)` means no buffering at all.
    pub fn buffer_size<T>(mut self, value: T) -> Self
    where
        T: Into<Option<isize>>,
    {
        self.config.buffer_size = value.into();
        self
    }

    /// Interval between janitor runs (parking/eviction, §4.4.3).
    pub fn clean_period(mut self, value: Duration) -> Self {
        self.config.clean_period = value;
        self
    }

    /// Per-ticket acquisition deadline.
    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.config.connect_timeout = value;
        self
    }

    /// Parked-slot expiration window. `None` disables keepalive eviction.
    pub fn keep_alive_timeout<T>(mut self, value: T) -> Self
    where
        T: Into<Option<Duration>>,
    {
        self.config.keep_alive_timeout = value.into();
        self
    }

    pub fn build(self) -> PoolConfig {
        self.config
    }
}

impl PoolConfig {
    /// `bufferSize == null || bufferSize < 0` per §4.4.1 step 4.
    pub(crate) fn buffer_is_unbounded(&self) -> bool {
        matches!(self.buffer_size, None) || matches!(self.buffer_size, Some(n) if n < 0)
    }

    /// `0` when explicitly set to a non-negative bound, otherwise unused
    /// (unbounded checks never consult this).
    pub(crate) fn buffer_bound(&self) -> isize {
        self.buffer_size.unwrap_or(-1)
    }
}

/// HTTP/1.1 connection knobs.
#[derive(Debug, Clone)]
pub struct Http1Config {
    pub(crate) send_user_agent: bool,
    pub(crate) user_agent: Option<String>,
    pub(crate) upgrade_to_h2c: bool,
}

impl Default for Http1Config {
    fn default() -> Self {
        Http1Config {
            send_user_agent: false,
            user_agent: None,
            upgrade_to_h2c: true,
        }
    }
}

/// Builder for [`Http1Config`].
#[must_use]
#[derive(Debug, Default)]
pub struct Http1ConfigBuilder {
    config: Http1Config,
}

impl Http1ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_user_agent(mut self, value: bool) -> Self {
        self.config.send_user_agent = value;
        self
    }

    pub fn user_agent<T>(mut self, value: T) -> Self
    where
        T: Into<Option<String>>,
    {
        self.config.user_agent = value.into();
        self
    }

    /// Attempt the H2C upgrade (§4.2) on a connection's first exchange when
    /// it was established in cleartext. Default `true`.
    pub fn upgrade_to_h2c(mut self, value: bool) -> Self {
        self.config.upgrade_to_h2c = value;
        self
    }

    pub fn build(self) -> Http1Config {
        self.config
    }
}

/// HTTP/2 settings knobs (§6).
#[derive(Debug, Clone)]
pub struct Http2Config {
    pub(crate) max_concurrent_streams: Option<u32>,
    pub(crate) header_table_size: Option<u32>,
    pub(crate) initial_window_size: Option<u32>,
    pub(crate) max_frame_size: Option<u32>,
    pub(crate) max_header_list_size: Option<u32>,
    pub(crate) validate_headers: bool,
}

impl Default for Http2Config {
    fn default() -> Self {
        Http2Config {
            max_concurrent_streams: None,
            header_table_size: None,
            initial_window_size: None,
            max_frame_size: None,
            max_header_list_size: None,
            validate_headers: true,
        }
    }
}

/// Builder for [`Http2Config`].
#[must_use]
#[derive(Debug)]
pub struct Http2ConfigBuilder {
    config: Http2Config,
}

impl Default for Http2ConfigBuilder {
    fn default() -> Self {
        Self {
            config: Http2Config::default(),
        }
    }
}

impl Http2ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local cap combined with the peer's advertised value as
    /// `min(peerValue, localLimit)` (§4.3).
    pub fn max_concurrent_streams<T>(mut self, value: T) -> Self
    where
        T: Into<Option<u32>>,
    {
        self.config.max_concurrent_streams = value.into();
        self
    }

    pub fn header_table_size<T>(mut self, value: T) -> Self
    where
        T: Into<Option<u32>>,
    {
        self.config.header_table_size = value.into();
        self
    }

    pub fn initial_window_size<T>(mut self, value: T) -> Self
    where
        T: Into<Option<u32>>,
    {
        self.config.initial_window_size = value.into();
        self
    }

    pub fn max_frame_size<T>(mut self, value: T) -> Self
    where
        T: Into<Option<u32>>,
    {
        self.config.max_frame_size = value.into();
        self
    }

    pub fn max_header_list_size<T>(mut self, value: T) -> Self
    where
        T: Into<Option<u32>>,
    {
        self.config.max_header_list_size = value.into();
        self
    }

    pub fn validate_headers(mut self, value: bool) -> Self {
        self.config.validate_headers = value;
        self
    }

    pub fn build(self) -> Http2Config {
        self.config
    }
}

/// Per-exchange knobs (§4.1 Timeout policy).
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub(crate) request_timeout: Duration,
    pub(crate) graceful_shutdown_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            request_timeout: Duration::from_secs(30),
            graceful_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for [`ExchangeConfig`].
#[must_use]
#[derive(Debug, Default)]
pub struct ExchangeConfigBuilder {
    config: ExchangeConfig,
}

impl ExchangeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ExchangeConfig::default(),
        }
    }

    pub fn request_timeout(mut self, value: Duration) -> Self {
        self.config.request_timeout = value;
        self
    }

    pub fn graceful_shutdown_timeout(mut self, value: Duration) -> Self {
        self.config.graceful_shutdown_timeout = value;
        self
    }

    pub fn build(self) -> ExchangeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_buffer_unbounded_by_default() {
        let cfg = PoolConfig::default();
        assert!(cfg.buffer_is_unbounded());
    }

    #[test]
    fn pool_buffer_zero_is_bounded() {
        let cfg = PoolConfigBuilder::new().buffer_size(Some(0)).build();
        assert!(!cfg.buffer_is_unbounded());
        assert_eq!(cfg.buffer_bound(), 0);
    }

    #[test]
    fn pool_buffer_negative_is_unbounded() {
        let cfg = PoolConfigBuilder::new().buffer_size(Some(-1)).build();
        assert!(cfg.buffer_is_unbounded());
    }
}
