mod support;

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use multiplex_client::{Body, Endpoint, ExchangeConfigBuilder};
use support::server;

fn is_h2c_upgrade_request(req: &http::Request<Incoming>) -> bool {
    req.headers()
        .get(http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("h2c"))
}

/// Upgrades to h2c, then answers each accepted stream on its own task: role
/// "slow" sleeps past the client's request timeout before responding,
/// anything else answers immediately.
fn h2c_slow_server() -> support::server::Server {
    server::http(move |mut req: http::Request<Incoming>| async move {
        if !is_h2c_upgrade_request(&req) {
            return http::Response::builder()
                .status(StatusCode::OK)
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
                let Ok((request, respond)) = accepted else {
                    break;
                };
                tokio::spawn(async move {
                    let role = request
                        .headers()
                        .get("x-role")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    if role == "slow" {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                    }
                    let response = http::Response::builder().status(StatusCode::OK).body(()).unwrap();
                    let mut respond = respond;
                    if let Ok(mut send) = respond.send_response(response, false) {
                        let _ = send.send_data(Bytes::new(), true);
                    }
                });
            }
        });

        http::Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(http::header::UPGRADE, HeaderValue::from_static("h2c"))
            .header(http::header::CONNECTION, HeaderValue::from_static("Upgrade"))
            .body(Body::empty())
            .unwrap()
    })
}

/// §8 scenario 6 (HTTP/2 variant): a slow stream times out and is reset on
/// its own, but — unlike the HTTP/1.1 variant — the underlying connection is
/// never torn down, so the next exchange just multiplexes onto it as a new
/// stream instead of forcing a reconnect.
#[tokio::test]
async fn slow_stream_times_out_then_the_same_connection_keeps_serving() {
    let server = h2c_slow_server();
    let uri: Uri = format!("http://{}", server.addr()).parse().unwrap();
    let endpoint = Endpoint::builder()
        .exchange_config(
            ExchangeConfigBuilder::new()
                .request_timeout(Duration::from_millis(100))
                .build(),
        )
        .build(uri);

    // drives the h2c upgrade; answered immediately (role unset), so it
    // completes comfortably inside the timeout.
    let warmup = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(warmup.status(), StatusCode::OK);

    let timed_out = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .header("x-role", "slow")
        .send()
        .await;
    assert!(timed_out.is_err_and(|e| e.is_request_timeout()));

    let recovered = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await
        .unwrap();
    assert_eq!(recovered.status(), StatusCode::OK);

    assert_eq!(
        endpoint.stats().size,
        1,
        "the h2 connection survives a single stream's timeout"
    );
}
