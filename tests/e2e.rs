//! Live-listener tests for the gateway.

use std::net::SocketAddr;

use site_gateway::lifecycle::Shutdown;
use site_gateway::HttpServer;

mod common;

async fn start_gateway(shutdown: &Shutdown) -> SocketAddr {
    let upstream = common::start_echo_backend().await;
    let server = HttpServer::new(common::test_config(upstream));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    common::settle().await;

    addr
}

#[tokio::test]
async fn test_browser_flow_csrf_login_dashboard() {
    let shutdown = Shutdown::new();
    let addr = start_gateway(&shutdown).await;

    // Cookie store plays the browser; redirects are asserted, not followed.
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();
    let base = format!("http://{addr}");

    let res = client.get(format!("{base}/dashboard")).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(
        res.headers()["location"],
        "/login?callbackUrl=%2Fdashboard"
    );

    let res = client.get(format!("{base}/api/csrf")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    let token_id = body["tokenId"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{base}/api/auth/login"))
        .header("x-csrf-token", &token_id)
        .json(&serde_json::json!({
            "email": "demo@solvejet.net",
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["callbackUrl"], "/dashboard");

    let res = client.get(format!("{base}/dashboard")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["userId"], "123");
    assert_eq!(body["role"], "user");

    let res = client
        .post(format!("{base}/api/auth/logout"))
        .header("x-csrf-token", &token_id)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let res = client.get(format!("{base}/dashboard")).send().await.unwrap();
    assert_eq!(res.status(), 302);

    shutdown.trigger();
}

#[tokio::test]
async fn test_peer_address_keys_rate_limit() {
    let shutdown = Shutdown::new();
    let addr = start_gateway(&shutdown).await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    for _ in 0..100 {
        let res = client
            .get(format!("http://{addr}/api/public/stats"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    let res = client
        .get(format!("http://{addr}/api/public/stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 429);
    assert!(res.headers().contains_key("retry-after"));

    shutdown.trigger();
}
