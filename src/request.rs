//! Immutable method/authority/path/headers + lazy body producer (§3 Request).
//!
//! Header codec tables and body encoding (multipart, URL-form, ...) are the
//! declared external collaborators (§1); this module only carries the
//! already-encoded pieces through to the exchange.

use std::time::Duration;

use http::{HeaderMap, Method, Uri, Version};

use crate::body::Body;

/// An immutable HTTP request, ready to be handed to an [`crate::exchange::Exchange`].
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Body,
    timeout: Option<Duration>,
}

impl Request {
    /// Construct a new request with an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Request {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Body::empty(),
            timeout: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Per-request override of `ExchangeConfig::request_timeout` (§4.6).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `None` means the connection should fall back to its configured
    /// `request_timeout`.
    pub(crate) fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Splits the request into an `http::Request<Body>`, the shape the
    /// connection drivers (hyper / h2) expect.
    pub(crate) fn into_http(self) -> http::Result<http::Request<Body>> {
        let mut builder = http::Request::builder()
            .method(self.method)
            .uri(self.uri)
            .version(self.version);
        if let Some(map) = builder.headers_mut() {
            *map = self.headers;
        }
        builder.body(self.body)
    }

    /// The inverse of [`Self::into_http`], used by
    /// [`crate::endpoint::Endpoint`]'s `tower_service::Service` impl to accept
    /// requests assembled by middleware rather than [`RequestBuilder`].
    pub(crate) fn from_http(req: http::Request<Body>) -> Self {
        let (parts, body) = req.into_parts();
        Request {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            timeout: None,
        }
    }
}

/// A builder for [`Request`], with chained setters for headers/version/body/
/// timeout; the client-dispatch bits live on [`crate::endpoint::Endpoint`].
#[must_use = "RequestBuilder does nothing until it is sent through an Endpoint"]
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub(crate) fn new(method: Method, uri: Uri) -> Self {
        RequestBuilder {
            request: Request::new(method, uri),
        }
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<http::HeaderValue>,
    {
        if let (Ok(key), Ok(value)) = (key.try_into(), value.try_into()) {
            self.request.headers.append(key, value);
        }
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.request.version = version;
        self
    }

    pub fn body<B: Into<Body>>(mut self, body: B) -> Self {
        self.request.body = body.into();
        self
    }

    /// Per-request override of the endpoint's configured `request_timeout`.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
