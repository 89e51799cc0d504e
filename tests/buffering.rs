mod support;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use http::{Method, StatusCode, Uri};
use multiplex_client::{Body, Endpoint, PoolConfigBuilder};
use support::server;

fn endpoint_for(addr: std::net::SocketAddr, max_size: usize, buffer_size: isize) -> Endpoint {
    let uri: Uri = format!("http://{addr}").parse().unwrap();
    Endpoint::builder()
        .pool_config(
            PoolConfigBuilder::new()
                .max_size(max_size)
                .buffer_size(Some(buffer_size))
                .connect_timeout(Duration::from_millis(500))
                .build(),
        )
        .build(uri)
}

fn held_response_server(
    release: Arc<tokio::sync::Semaphore>,
    served: Arc<AtomicUsize>,
) -> support::server::Server {
    server::http(move |_req| {
        let release = release.clone();
        let served = served.clone();
        async move {
            let permit = release.acquire().await.unwrap();
            permit.forget();
            served.fetch_add(1, Ordering::SeqCst);
            http::Response::builder()
                .status(StatusCode::OK)
                .body(Body::empty())
                .unwrap()
        }
    })
}

/// §8 scenario 2: `maxSize=1, bufferSize=2, connectTimeout=500`. One request
/// holds the only slot while two more queue behind it in the buffer; a
/// fourth concurrent request finds the buffer already full and is rejected
/// outright rather than waiting. Releasing the held slot drains the buffer
/// as each exchange completes, and once it empties a fresh request can
/// queue and resolve the same way.
#[tokio::test]
async fn buffered_tickets_drain_on_release_then_overflow_is_rejected() {
    let release = Arc::new(tokio::sync::Semaphore::new(0));
    let served = Arc::new(AtomicUsize::new(0));
    let server = held_response_server(release.clone(), served.clone());

    let endpoint = endpoint_for(server.addr(), 1, 2);

    let a = endpoint.request(Method::GET, Uri::from_static("/")).send();
    // give A time to claim the only slot before B/C queue up behind it.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let b = endpoint.request(Method::GET, Uri::from_static("/")).send();
    let c = endpoint.request(Method::GET, Uri::from_static("/")).send();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(endpoint.stats().buffered, 2, "B and C should both be queued");

    let d = endpoint
        .request(Method::GET, Uri::from_static("/"))
        .send()
        .await;
    assert!(
        d.is_err_and(|e| e.is_pool_saturated()),
        "the buffer is already full with B and C"
    );

    // three permits: one each for A, then whichever of B/C drains first,
    // then the other. The buffer drains exactly one ticket per completed
    // exchange until it's empty.
    release.add_permits(3);

    let (a, b, c) = tokio::join!(a, b, c);
    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);
    assert_eq!(c.unwrap().status(), StatusCode::OK);
    assert_eq!(served.load(Ordering::SeqCst), 3);
    assert_eq!(endpoint.stats().buffered, 0);

    // the buffer has room again now that A/B/C are all done.
    let e = endpoint.request(Method::GET, Uri::from_static("/")).send();
    release.add_permits(1);
    assert_eq!(e.await.unwrap().status(), StatusCode::OK);
    assert_eq!(served.load(Ordering::SeqCst), 4);
}
