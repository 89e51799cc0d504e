//! Thin response value type (§3).
//!
//! Decompression and other content-codec concerns are a declared external
//! collaborator (§1); this type only carries status, headers, and the
//! backpressured body stream through to the caller.

use http::{HeaderMap, StatusCode, Version};

use crate::body::ResponseBodyStream;

/// An HTTP response, with a lazily-consumed body.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: ResponseBodyStream,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        version: Version,
        headers: HeaderMap,
        body: ResponseBodyStream,
    ) -> Self {
        Response {
            status,
            version,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Attach trailers received after the body completed (§4.3 HEADERS after
    /// body).
    pub(crate) fn set_trailers(&mut self, trailers: HeaderMap) {
        self.headers.extend(trailers);
    }

    /// Consume the response, yielding its body stream.
    pub fn into_body(self) -> ResponseBodyStream {
        self.body
    }

    pub fn body_mut(&mut self) -> &mut ResponseBodyStream {
        &mut self.body
    }

    /// Recompose into an `http::Response`, the shape
    /// [`crate::endpoint::Endpoint`]'s `tower_service::Service` impl returns
    /// to middleware built against the `http`/`http-body` stack directly.
    pub(crate) fn into_http(self) -> http::Response<ResponseBodyStream> {
        let mut builder = http::Response::builder()
            .status(self.status)
            .version(self.version);
        if let Some(map) = builder.headers_mut() {
            *map = self.headers;
        }
        builder
            .body(self.body)
            .expect("status/version/headers were already valid on this Response")
    }
}
