use fastproxy::config::{Config, ProxyScheme, RuleFormat};
use fastproxy::error::ConfigError;
use fastproxy::r#const::{debounce_limits, remote_rule_defaults, server_defaults};
use fastproxy::router::Mode;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

// 辅助函数：创建临时配置文件
fn create_temp_config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn assert_validation_error(content: &str, needle: &str) {
    match Config::from_yaml(content) {
        Err(ConfigError::ValidationError(message)) => assert!(
            message.contains(needle),
            "expected '{}' in validation error: {}",
            needle,
            message
        ),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_basic_config_loading() {
    let config_content = r#"
store:
  path: "/tmp/fastproxy-test.json"
admin:
  listen: "127.0.0.1:9100"
servers:
  - id: "home"
    name: "Home"
    scheme: "SOCKS5"
    host: "127.0.0.1"
    port: 1080
  - id: "office"
    scheme: "http"
    host: "proxy.lan"
    port: "3128"
active_server: "office"
mode: "pac_script"
rules:
  whitelist: ["example.com"]
  temporary: []
  user_rules: ["*.user.net"]
pac:
  debounce_ms: 250
"#;

    let file = create_temp_config_file(config_content);
    let result = Config::from_file(file.path());
    assert!(
        result.is_ok(),
        "Failed to load valid config: {:?}",
        result.err()
    );
    let config = result.unwrap();

    assert_eq!(config.store.path, PathBuf::from("/tmp/fastproxy-test.json"));
    assert_eq!(config.admin_listen(), "127.0.0.1:9100");
    let servers = config.servers.as_ref().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].scheme, ProxyScheme::Socks5);
    assert_eq!(servers[1].scheme, ProxyScheme::Http);
    assert_eq!(servers[1].port, 3128);
    assert_eq!(servers[1].name, "");
    assert_eq!(config.active_server.as_deref(), Some("office"));
    assert_eq!(config.mode, Some(Mode::AutoPac));
    assert_eq!(config.pac.debounce_window().as_millis(), 250);
    assert!(config.auto_list.is_none());
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(
        config.store.path,
        PathBuf::from(server_defaults::DEFAULT_STORE_PATH)
    );
    assert_eq!(config.admin_listen(), server_defaults::DEFAULT_ADMIN_LISTEN);
    assert_eq!(config.pac.debounce_ms, debounce_limits::DEFAULT_MS);
    assert!(config.servers.is_none());
    assert!(config.mode.is_none());
}

#[test]
fn test_auto_list_defaults() {
    let config = Config::from_yaml("auto_list: {}\n").unwrap();
    let auto_list = config.auto_list.unwrap();
    assert_eq!(auto_list.url, remote_rule_defaults::GFWLIST_URL);
    assert_eq!(auto_list.format, RuleFormat::Gfwlist);
    assert!(auto_list.update_on_start);
    assert!(auto_list.update_interval.is_none());
    assert_eq!(auto_list.seed_domains.len(), remote_rule_defaults::SEED_DOMAINS.len());
}

#[test]
fn test_default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_invalid_yaml() {
    let result = Config::from_yaml("servers: [");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_missing_file() {
    let result = Config::from_file("/nonexistent/fastproxy/config.yaml");
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

#[test]
fn test_invalid_admin_listen() {
    assert_validation_error(
        r#"
admin:
  listen: "not-an-address"
"#,
        "Invalid admin listen address",
    );
}

#[test]
fn test_duplicate_server_ids() {
    assert_validation_error(
        r#"
servers:
  - { id: "a", host: "127.0.0.1", port: 1080 }
  - { id: "a", host: "127.0.0.2", port: 1081 }
"#,
        "Server ids must be unique",
    );
}

#[test]
fn test_unknown_active_server() {
    assert_validation_error(
        r#"
servers:
  - { id: "a", host: "127.0.0.1", port: 1080 }
active_server: "b"
"#,
        "Active server references a non-existent server id",
    );
}

#[test]
fn test_invalid_server_fields() {
    assert_validation_error(
        r#"
servers:
  - { id: "a", host: "bad host;", port: 1080 }
"#,
        "Invalid proxy host",
    );
    assert_validation_error(
        r#"
servers:
  - { id: "a", host: "127.0.0.1", port: 0 }
"#,
        "Port must be between",
    );
}

#[test]
fn test_invalid_auto_list() {
    assert_validation_error(
        r#"
auto_list:
  url: "ftp://example.com/list.txt"
"#,
        "Invalid remote rule URL",
    );
    assert_validation_error(
        r#"
auto_list:
  update_interval: 5
"#,
        "Update interval must be between",
    );
    assert_validation_error(
        r#"
auto_list:
  auth:
    type: bearer
"#,
        "bearer authentication requires token",
    );
}

#[test]
fn test_invalid_debounce_window() {
    assert_validation_error(
        r#"
pac:
  debounce_ms: 600000
"#,
        "Debounce window must be between",
    );
}
