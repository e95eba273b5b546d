use fastproxy::admin::admin_routes;
use fastproxy::icon::LogIconRenderer;
use fastproxy::r#const::{pac, storage_keys};
use fastproxy::service::ProxyService;
use fastproxy::store::Store;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

// 启动管理接口，返回服务地址
async fn start_admin(store: Arc<Store>) -> (SocketAddr, Arc<ProxyService>) {
    let service = Arc::new(ProxyService::new(store, Arc::new(LogIconRenderer)).unwrap());
    let app = admin_routes(Arc::clone(&service));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, service)
}

fn store_with_rules() -> Arc<Store> {
    let store = Store::in_memory();
    store
        .set_many(vec![
            (
                storage_keys::SERVER_LIST,
                json!([{"id": "1", "name": "Home", "scheme": "SOCKS5", "host": "127.0.0.1", "port": 1080}]),
            ),
            (storage_keys::ACTIVE_SERVER_ID, json!("1")),
            (storage_keys::USER_WHITELIST, json!(["example.com"])),
            (storage_keys::GFW_DOMAINS, json!(["blocked.test"])),
        ])
        .unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (addr, _) = start_admin(Arc::new(Store::in_memory())).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("fastproxy_rule_set_size"));
}

#[tokio::test]
async fn test_mode_switching_and_pac_serving() {
    let (addr, service) = start_admin(store_with_rules()).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    // 直连模式下提供 DIRECT 脚本
    let resp = client.get(format!("{}/proxy.pac", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        pac::CONTENT_TYPE
    );
    assert!(resp.text().await.unwrap().contains("\"DIRECT\""));

    // PAC 尚未生成时无法切换到自动模式
    let resp = client
        .put(format!("{}/mode", base))
        .json(&json!({"mode": "pac_script"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let snapshot = service.reload_rules().unwrap();
    service.rebuild_pac(&snapshot).unwrap();

    let resp = client
        .put(format!("{}/mode", base))
        .json(&json!({"mode": "autoPac"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"mode": "pac_script"}));

    let body: Value = client
        .get(format!("{}/mode", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["mode"], "pac_script");

    let script = client
        .get(format!("{}/proxy.pac", base))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(script.contains("FindProxyForURL"));
    assert!(script.contains("blocked.test"));
    assert!(script.contains("SOCKS5 127.0.0.1:1080; SOCKS 127.0.0.1:1080; DIRECT"));
}

#[tokio::test]
async fn test_fixed_mode_requires_server() {
    let (addr, _) = start_admin(Arc::new(Store::in_memory())).await;
    let resp = reqwest::Client::new()
        .put(format!("http://{}/mode", addr))
        .json(&json!({"mode": "fixed_servers"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("No proxy server"));
}

#[tokio::test]
async fn test_decide_endpoint() {
    let (addr, service) = start_admin(store_with_rules()).await;
    let snapshot = service.reload_rules().unwrap();
    service.rebuild_pac(&snapshot).unwrap();
    service
        .set_mode(fastproxy::router::Mode::AutoPac)
        .unwrap();

    let client = reqwest::Client::new();
    let body: Value = client
        .get(format!("http://{}/decide", addr))
        .query(&[("host", "cdn.blocked.test")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["mode"], "pac_script");
    assert_eq!(
        body["verdict"],
        json!({"useProxy": true, "matchedTier": "autoList"})
    );
    assert_eq!(body["icon"]["label"], "A");

    let body: Value = client
        .get(format!("http://{}/decide", addr))
        .query(&[("url", "https://www.example.com/page"), ("tab", "5")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["verdict"],
        json!({"useProxy": false, "matchedTier": "whitelist"})
    );

    let resp = client
        .get(format!("http://{}/decide", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
