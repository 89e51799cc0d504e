mod support;

use std::convert::Infallible;

use http::{Method, StatusCode, Uri};
use http_body_util::BodyExt;
use multiplex_client::{Body, Endpoint};
use support::server;

fn endpoint_for(addr: std::net::SocketAddr) -> Endpoint {
    let uri: Uri = format!("http://{addr}").parse().unwrap();
    Endpoint::builder().build(uri)
}

#[tokio::test]
async fn get_round_trips_status_and_body() {
    let server = server::http(|_req| async {
        http::Response::builder()
            .status(StatusCode::OK)
            .body(Body::from("hello"))
            .unwrap()
    });

    let endpoint = endpoint_for(server.addr());
    let response = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello");
}

#[tokio::test]
async fn post_body_reaches_the_server() {
    let server = server::http(|req| async move {
        let body = req.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"payload");
        http::Response::builder()
            .status(StatusCode::CREATED)
            .body(Body::empty())
            .unwrap()
    });

    let endpoint = endpoint_for(server.addr());
    let response = endpoint
        .request(Method::POST, Uri::from_static("/"))
        .body(Body::from("payload"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn same_endpoint_reuses_the_pooled_connection() {
    let server = server::http(|_req: http::Request<hyper::body::Incoming>| async {
        Ok::<_, Infallible>(http::Response::new(Body::empty()))
    });

    let endpoint = endpoint_for(server.addr());
    for _ in 0..5 {
        let response = endpoint
            .request(Method::GET, Uri::from_static("/"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stats = endpoint.stats();
    assert!(stats.size <= 1, "expected a single reused connection, got {stats:?}");
}
