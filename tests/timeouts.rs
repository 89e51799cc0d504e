mod support;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use http::{Method, StatusCode, Uri};
use multiplex_client::{Body, Endpoint, ExchangeConfigBuilder};
use support::server;

/// §8 scenario 6 (HTTP/1.1 variant): `request_timeout` shorter than the
/// server's response latency fails the exchange with `RequestTimeout`, and
/// the next request on the same endpoint still succeeds.
#[tokio::test]
async fn slow_response_times_out_then_the_connection_recovers() {
    let first = Arc::new(AtomicBool::new(true));
    let server = server::http(move |_req| {
        let delay = if first.swap(false, Ordering::AcqRel) {
            Duration::from_millis(300)
        } else {
            Duration::from_millis(0)
        };
        async move {
            tokio::time::sleep(delay).await;
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Body::empty())
                .unwrap()
        }
    });

    let uri: Uri = format!("http://{}", server.addr()).parse().unwrap();
    let endpoint = Endpoint::builder()
        .exchange_config(
            ExchangeConfigBuilder::new()
                .request_timeout(Duration::from_millis(100))
                .build(),
        )
        .build(uri);

    let timed_out = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await;
    assert!(timed_out.is_err_and(|e| e.is_request_timeout()));

    let recovered = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(recovered.status(), StatusCode::OK);
}
