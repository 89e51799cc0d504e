mod support;

use std::time::Duration;

use http::{Method, StatusCode, Uri};
use multiplex_client::{Body, Endpoint, PoolConfigBuilder};
use support::server;

fn endpoint_for(addr: std::net::SocketAddr, max_size: usize) -> Endpoint {
    let uri: Uri = format!("http://{addr}").parse().unwrap();
    Endpoint::builder()
        .pool_config(
            PoolConfigBuilder::new()
                .max_size(max_size)
                .buffer_size(Some(0))
                .build(),
        )
        .build(uri)
}

/// §8 scenario 1: `maxSize=2, bufferSize=0`. Submit 3 concurrent requests
/// against a server that holds its responses open until told to release
/// them; the third must fail with `PoolSaturated` rather than wait.
#[tokio::test]
async fn saturation_rejects_the_third_concurrent_request() {
    let server = server::http(|_req| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        http::Response::builder()
            .status(StatusCode::OK)
            .body(Body::empty())
            .unwrap()
    });

    let endpoint = endpoint_for(server.addr(), 2);

    let a = endpoint.request(Method::GET, Uri::from_static("/")).send();
    let b = endpoint.request(Method::GET, Uri::from_static("/")).send();

    // give A and B time to claim both slots before C is submitted.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let c = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await;
    assert!(
        c.is_err_and(|e| e.is_pool_saturated()),
        "third concurrent request should be rejected"
    );

    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);
}
