//! End-to-end proxy behavior over real sockets.

use std::time::Duration;

use reqwest::StatusCode;
use turngate::config::RuleConfig;

mod common;

#[tokio::test]
async fn round_robin_rotates_through_all_backends() {
    let b1 = common::start_mock_backend("b1").await;
    let b2 = common::start_mock_backend("b2").await;
    let b3 = common::start_mock_backend("b3").await;

    let proxy = common::start_proxy(common::test_config(&[b1, b2, b3])).await;
    let client = common::http_client();

    let mut bodies = Vec::new();
    for _ in 0..6 {
        let res = client
            .get(format!("http://{}", proxy.proxy_addr))
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), StatusCode::OK);
        bodies.push(res.text().await.unwrap());
    }
    assert_eq!(bodies, vec!["b1", "b2", "b3", "b1", "b2", "b3"]);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn dead_backend_is_skipped_without_stalling_rotation() {
    let b1 = common::start_mock_backend("b1").await;
    let b2 = common::start_mock_backend("b2").await;
    let b3 = common::start_mock_backend("b3").await;

    let proxy = common::start_proxy(common::test_config(&[b1, b2, b3])).await;
    let client = common::http_client();

    proxy.pool.all()[1].set_alive(false);

    let mut bodies = Vec::new();
    for _ in 0..4 {
        let res = client
            .get(format!("http://{}", proxy.proxy_addr))
            .send()
            .await
            .expect("proxy unreachable");
        bodies.push(res.text().await.unwrap());
    }
    assert_eq!(bodies, vec!["b1", "b3", "b1", "b3"]);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn full_outage_returns_503_and_recovery_restores_traffic() {
    let b1 = common::start_mock_backend("b1").await;
    let b2 = common::start_mock_backend("b2").await;

    let proxy = common::start_proxy(common::test_config(&[b1, b2])).await;
    let client = common::http_client();

    for backend in proxy.pool.all() {
        backend.set_alive(false);
    }

    for _ in 0..2 {
        let res = client
            .get(format!("http://{}", proxy.proxy_addr))
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.text().await.unwrap(), "No live backends available");
    }

    proxy.pool.all()[1].set_alive(true);

    let res = client
        .get(format!("http://{}", proxy.proxy_addr))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "b2");

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn prober_takes_unreachable_backend_out_of_rotation() {
    let live = common::start_mock_backend("live").await;
    let dead = common::unused_addr();

    let mut config = common::test_config(&[live, dead]);
    config.health_check.enabled = true;
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;

    let proxy = common::start_proxy(config).await;
    let client = common::http_client();

    // Both start alive; the first sweep lands one interval in.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(proxy.pool.all()[0].is_alive());
    assert!(!proxy.pool.all()[1].is_alive());

    for _ in 0..4 {
        let res = client
            .get(format!("http://{}", proxy.proxy_addr))
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.text().await.unwrap(), "live");
    }

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn rate_limited_client_gets_429_until_a_token_refills() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::test_config(&[backend]);
    config.rate_limit.rules = vec![RuleConfig {
        client_id: "acme".to_string(),
        capacity: 2,
        rate: 1,
    }];

    let proxy = common::start_proxy(config).await;
    let client = common::http_client();
    let url = format!("http://{}", proxy.proxy_addr);

    // Two tokens, then deny.
    for _ in 0..2 {
        let res = client
            .get(&url)
            .header("x-api-key", "acme")
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = client
        .get(&url)
        .header("x-api-key", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.text().await.unwrap(), "Rate limit exceeded");

    // The query parameter resolves to the same identity and bucket.
    let res = client
        .get(format!("{}?client_id=acme", url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // Header wins over the parameter, so this is still acme's empty bucket.
    let res = client
        .get(format!("{}?client_id=other", url))
        .header("x-api-key", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // Anonymous requests have no rule and pass through.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(proxy.limiter.bucket_count().await, 1);

    // One refill interval later a single token is back.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let res = client
        .get(&url)
        .header("x-api-key", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = client
        .get(&url)
        .header("x-api-key", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn clients_without_rules_are_never_throttled() {
    let backend = common::start_mock_backend("ok").await;
    let proxy = common::start_proxy(common::test_config(&[backend])).await;
    let client = common::http_client();

    for _ in 0..20 {
        let res = client
            .get(format!("http://{}", proxy.proxy_addr))
            .header("x-api-key", "anon-client")
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), StatusCode::OK);
    }
    assert_eq!(proxy.limiter.bucket_count().await, 0);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn upstream_connect_failure_returns_502() {
    let backend = common::unused_addr();
    let proxy = common::start_proxy(common::test_config(&[backend])).await;
    let client = common::http_client();

    let res = client
        .get(format!("http://{}", proxy.proxy_addr))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await.unwrap(), "Upstream request failed");

    proxy.shutdown.trigger();
}
