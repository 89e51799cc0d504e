mod support;

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use multiplex_client::{Body, Endpoint};
use support::server;

fn is_h2c_upgrade_request(req: &http::Request<Incoming>) -> bool {
    req.headers()
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("h2c"))
}

/// An h1 service that accepts the h2c upgrade on the first request that asks
/// for it, then drives every stream on the upgraded socket — including the
/// replayed upgrading request — through a genuine `h2::server` connection.
/// `accept_order` tags each accepted stream with the order the h2 side saw
/// it in, so a test can tell the replay and later requests apart without
/// reading raw stream ids.
fn h2c_capable_server(accept_order: Arc<AtomicU32>) -> support::server::Server {
    server::http(move |mut req: http::Request<Incoming>| {
        let accept_order = accept_order.clone();
        async move {
            if !is_h2c_upgrade_request(&req) {
                return http::Response::builder()
                    .status(StatusCode::OK)
                    .header("x-accept-order", "0")
                    .body(Body::empty())
                    .unwrap();
            }

            let on_upgrade = hyper::upgrade::on(&mut req);
            tokio::spawn(async move {
                let Ok(upgraded) = on_upgrade.await else {
                    return;
                };
                let io = TokioIo::new(upgraded);
                let Ok(mut conn) = h2::server::handshake(io).await else {
                    return;
                };
                while let Some(accepted) = conn.accept().await {
                    let Ok((_request, mut respond)) = accepted else {
                        break;
                    };
                    let order = accept_order.fetch_add(1, Ordering::SeqCst) + 1;
                    let response = http::Response::builder()
                        .status(StatusCode::OK)
                        .header("x-accept-order", order.to_string())
                        .body(())
                        .unwrap();
                    if let Ok(mut send) = respond.send_response(response, false) {
                        let _ = send.send_data(Bytes::new(), true);
                    }
                }
            });

            http::Response::builder()
                .status(StatusCode::SWITCHING_PROTOCOLS)
                .header(http::header::UPGRADE, HeaderValue::from_static("h2c"))
                .header(http::header::CONNECTION, HeaderValue::from_static("Upgrade"))
                .body(Body::empty())
                .unwrap()
        }
    })
}

/// §8 scenario 3: the upgrading request is replayed as the h2 connection's
/// first accepted stream, and a later request on the same endpoint reuses
/// the now-upgraded slot as a second stream rather than upgrading again.
#[tokio::test]
async fn h2c_upgrade_replays_request_then_multiplexes_following_ones() {
    let accept_order = Arc::new(AtomicU32::new(0));
    let server = h2c_capable_server(accept_order.clone());
    let uri: Uri = format!("http://{}", server.addr()).parse().unwrap();
    let endpoint = Endpoint::builder().build(uri);

    let first = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        first.headers().get("x-accept-order").unwrap(),
        "1",
        "the replayed upgrading request is the first stream the h2 side accepts"
    );

    let second = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        second.headers().get("x-accept-order").unwrap(),
        "2",
        "a later request multiplexes onto the same upgraded connection instead of upgrading again"
    );

    assert_eq!(endpoint.stats().size, 1, "one slot, reused across both requests");
}
