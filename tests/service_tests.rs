use assert_matches::assert_matches;
use fastproxy::error::AppError;
use fastproxy::icon::{IconRenderer, IconState, TabId};
use fastproxy::pac::PacProgram;
use fastproxy::r#const::{icon_tokens, storage_keys};
use fastproxy::router::Mode;
use fastproxy::rule_set::Tier;
use fastproxy::service::ProxyService;
use fastproxy::store::{RuleSource, Store};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingRenderer {
    calls: Mutex<Vec<(IconState, Option<TabId>)>>,
}

impl RecordingRenderer {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn last(&self) -> Option<(IconState, Option<TabId>)> {
        self.calls.lock().unwrap().last().copied()
    }
}

impl IconRenderer for RecordingRenderer {
    fn draw(&self, state: &IconState, tab: Option<TabId>) {
        self.calls.lock().unwrap().push((*state, tab));
    }
}

fn store_with_server() -> Arc<Store> {
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

fn service(store: Arc<Store>) -> (ProxyService, Arc<RecordingRenderer>) {
    let renderer = Arc::new(RecordingRenderer::default());
    let service = ProxyService::new(store, renderer.clone()).unwrap();
    (service, renderer)
}

#[test]
fn test_initial_mode_from_store() {
    let store = store_with_server();
    store.set_mode(Mode::FixedProxy).unwrap();
    let (service, _) = service(store);
    assert_eq!(service.mode(), Mode::FixedProxy);
}

#[test]
fn test_auto_mode_requires_pac() {
    let (service, _) = service(store_with_server());
    assert_matches!(service.set_mode(Mode::AutoPac), Err(AppError::PacNotReady));
    assert_eq!(service.mode(), Mode::Direct);

    let snapshot = service.reload_rules().unwrap();
    assert!(service.rebuild_pac(&snapshot).unwrap().is_some());
    service.set_mode(Mode::AutoPac).unwrap();
    assert_eq!(service.mode(), Mode::AutoPac);
    assert_eq!(service.store().mode(), Mode::AutoPac);
}

#[test]
fn test_fixed_mode_requires_server() {
    let (service, _) = service(Arc::new(Store::in_memory()));
    assert_matches!(
        service.set_mode(Mode::FixedProxy),
        Err(AppError::NoActiveServer)
    );
    service.set_mode(Mode::Direct).unwrap();
}

#[test]
fn test_rebuild_persists_pac() {
    let store = store_with_server();
    let (service, _) = service(store.clone());
    let snapshot = store.read().unwrap();
    let program = service.rebuild_pac(&snapshot).unwrap().unwrap();

    let stored: PacProgram = store.get(storage_keys::PAC_SCRIPT_DATA).unwrap().unwrap();
    assert_eq!(stored, program);

    // 内容未变化时不再写入
    let mut rx = store.on_change();
    service.rebuild_pac(&snapshot).unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_rebuild_without_server_keeps_old_script_and_falls_back() {
    let store = store_with_server();
    let (service, _) = service(store.clone());
    let snapshot = service.reload_rules().unwrap();
    let program = service.rebuild_pac(&snapshot).unwrap().unwrap();
    service.set_mode(Mode::AutoPac).unwrap();

    store.remove(storage_keys::ACTIVE_SERVER_ID).unwrap();
    let snapshot = service.reload_rules().unwrap();
    assert!(service.rebuild_pac(&snapshot).unwrap().is_none());

    assert_eq!(service.mode(), Mode::Direct);
    let stored: PacProgram = store.get(storage_keys::PAC_SCRIPT_DATA).unwrap().unwrap();
    assert_eq!(stored, program);
}

#[test]
fn test_served_script_per_mode() {
    let (service, _) = service(store_with_server());
    assert_eq!(service.served_script().unwrap(), PacProgram::direct().unwrap());

    service.set_mode(Mode::FixedProxy).unwrap();
    assert!(service
        .served_script()
        .unwrap()
        .as_str()
        .contains("SOCKS5 127.0.0.1:1080; SOCKS 127.0.0.1:1080; DIRECT"));

    let snapshot = service.reload_rules().unwrap();
    let program = service.rebuild_pac(&snapshot).unwrap().unwrap();
    service.set_mode(Mode::AutoPac).unwrap();
    assert_eq!(service.served_script().unwrap(), program);
}

#[test]
fn test_decide_uses_current_mode() {
    let (service, _) = service(store_with_server());
    assert!(!service.decide("cdn.blocked.test").use_proxy);

    service.set_mode(Mode::FixedProxy).unwrap();
    assert!(service.decide("example.com").use_proxy);

    let snapshot = service.reload_rules().unwrap();
    service.rebuild_pac(&snapshot).unwrap();
    service.set_mode(Mode::AutoPac).unwrap();
    assert_eq!(
        service.decide("cdn.blocked.test").matched_tier,
        Some(Tier::AutoList)
    );
    assert_eq!(
        service.decide("https://www.example.com/").matched_tier,
        Some(Tier::Whitelist)
    );
}

#[test]
fn test_active_page_icon_updates() {
    let store = store_with_server();
    let (service, renderer) = service(store.clone());
    let snapshot = service.reload_rules().unwrap();
    service.rebuild_pac(&snapshot).unwrap();
    service.set_mode(Mode::AutoPac).unwrap();
    let base = renderer.count();

    let (verdict, icon) = service.report_active_page(Some("https://cdn.blocked.test/"), Some(3));
    assert!(verdict.use_proxy);
    assert_eq!(icon.color, icon_tokens::LIGHT_GREEN);
    assert_eq!(renderer.count(), base + 1);
    assert_eq!(renderer.last().unwrap().1, Some(3));

    // 同一状态不重绘
    service.report_active_page(Some("https://img.blocked.test/"), Some(3));
    assert_eq!(renderer.count(), base + 1);

    // 规则变化后按当前页面重新计算
    store
        .set(storage_keys::USER_WHITELIST, &vec!["blocked.test"])
        .unwrap();
    service.reload_rules().unwrap();
    assert_eq!(renderer.count(), base + 2);
    assert_eq!(renderer.last().unwrap().0.color, icon_tokens::BLUE);
}
