use base64::{engine::general_purpose::STANDARD, Engine as _};
use fastproxy::config::{
    AuthConfig, AuthType, HttpClientConfig, RemoteRuleConfig, RetryConfig, RuleFormat,
};
use fastproxy::error::AppError;
use fastproxy::r#const::{remote_rule_defaults, remote_rule_limits, storage_keys};
use fastproxy::remote_rule::{
    update_auto_list, GfwListParser, PlainListParser, RemoteRuleLoader, RuleParser,
};
use fastproxy::store::{RuleSource, Store};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const GFWLIST_TEXT: &str = r#"[AutoProxy 0.2.9]
! Checksum: abc
! Title: GFWList4LL
||blocked.test
||Upper.Example.org^
.dotted.net
|http://prefix-only.com/path
@@||exception.com
http://plain-url.io/some/page
https://secure-url.io
*.wildcard.com
/^https?:\/\/[^\/]+regex\.com/
nodot
percent%2e.com
bad!char.com
||www.google.com/search

example.co.uk
"#;

fn encode(text: &str) -> String {
    // 模拟上游按 64 字符换行的 Base64 文本
    let encoded = STANDARD.encode(text);
    encoded
        .as_bytes()
        .chunks(64)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

fn remote_config(url: String) -> RemoteRuleConfig {
    RemoteRuleConfig {
        url,
        seed_domains: vec!["seed.example".to_string(), "*.Seed2.example".to_string()],
        ..RemoteRuleConfig::default()
    }
}

#[test]
fn test_gfwlist_parser() {
    let parser = GfwListParser;
    let domains = parser.parse(&encode(GFWLIST_TEXT)).unwrap();

    assert_eq!(
        domains,
        vec![
            "blocked.test",
            "dotted.net",
            "plain-url.io",
            "secure-url.io",
            "www.google.com",
            "example.co.uk",
        ]
    );
}

#[test]
fn test_gfwlist_parser_rejects_invalid_base64() {
    let parser = GfwListParser;
    let result = parser.parse("this is not base64 !!!");
    assert!(matches!(result, Err(AppError::RemoteRule(_))));
}

#[test]
fn test_gfwlist_parser_empty_content() {
    let parser = GfwListParser;
    assert!(parser.parse("").unwrap().is_empty());
}

#[test]
fn test_plain_list_parser() {
    let parser = PlainListParser;
    let content = "# comment\n\nExample.com\n*.sub.example.org\n  spaced.net  \nbad/entry\n";
    assert_eq!(
        parser.parse(content).unwrap(),
        vec!["example.com", "sub.example.org", "spaced.net"]
    );
}

#[tokio::test]
async fn test_remote_rule_loader_gfwlist() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gfwlist.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(encode(GFWLIST_TEXT)))
        .mount(&mock_server)
        .await;

    let config = remote_config(format!("{}/gfwlist.txt", mock_server.uri()));
    let loader = RemoteRuleLoader::new(config, HttpClientConfig::default()).unwrap();
    let domains = loader.load().await.unwrap();

    // 结果排序去重，包含种子域名
    let mut expected = vec![
        "blocked.test",
        "dotted.net",
        "example.co.uk",
        "plain-url.io",
        "secure-url.io",
        "seed.example",
        "seed2.example",
        "www.google.com",
    ];
    expected.sort();
    assert_eq!(domains, expected);
}

#[tokio::test]
async fn test_remote_rule_loader_plain_with_auth() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain.txt"))
        .and(header("Authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a.com\nb.com\na.com\n"))
        .mount(&mock_server)
        .await;

    let config = RemoteRuleConfig {
        format: RuleFormat::Plain,
        auth: Some(AuthConfig {
            r#type: AuthType::Bearer,
            username: None,
            password: None,
            token: Some("secret-token".to_string()),
        }),
        seed_domains: vec![],
        ..remote_config(format!("{}/plain.txt", mock_server.uri()))
    };

    let loader = RemoteRuleLoader::new(config, HttpClientConfig::default()).unwrap();
    assert_eq!(loader.load().await.unwrap(), vec!["a.com", "b.com"]);
}

#[tokio::test]
async fn test_remote_rule_loader_http_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = remote_config(format!("{}/missing.txt", mock_server.uri()));
    let loader = RemoteRuleLoader::new(config, HttpClientConfig::default()).unwrap();
    assert!(matches!(loader.load().await, Err(AppError::RemoteRule(_))));
}

#[tokio::test]
async fn test_remote_rule_loader_retries_transient_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.txt"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok.com\n"))
        .mount(&mock_server)
        .await;

    let config = RemoteRuleConfig {
        format: RuleFormat::Plain,
        retry: Some(RetryConfig {
            attempts: 2,
            delay: 1,
        }),
        seed_domains: vec![],
        ..remote_config(format!("{}/flaky.txt", mock_server.uri()))
    };

    let loader = RemoteRuleLoader::new(config, HttpClientConfig::default()).unwrap();
    assert_eq!(loader.load().await.unwrap(), vec!["ok.com"]);
}

#[tokio::test]
async fn test_remote_rule_size_limit() {
    let mock_server = MockServer::start().await;
    let large_content = "a.com\n".repeat(remote_rule_limits::MIN_SIZE);
    Mock::given(method("GET"))
        .and(path("/large.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(large_content))
        .mount(&mock_server)
        .await;

    let config = RemoteRuleConfig {
        format: RuleFormat::Plain,
        max_size: remote_rule_limits::MIN_SIZE,
        ..remote_config(format!("{}/large.txt", mock_server.uri()))
    };

    let loader = RemoteRuleLoader::new(config, HttpClientConfig::default()).unwrap();
    let result = loader.load().await;
    assert!(matches!(result, Err(AppError::RemoteRule(msg)) if msg.contains("exceeds")));
}

#[tokio::test]
async fn test_update_auto_list_writes_store() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gfwlist.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(encode("||blocked.test\n")))
        .mount(&mock_server)
        .await;

    let url = format!("{}/gfwlist.txt", mock_server.uri());
    let loader = RemoteRuleLoader::new(remote_config(url.clone()), HttpClientConfig::default())
        .unwrap();
    let store = Store::in_memory();
    let mut rx = store.on_change();

    let count = update_auto_list(&store, &loader).await.unwrap();
    assert_eq!(count, 3);

    assert_eq!(
        store.string_list(storage_keys::GFW_DOMAINS),
        vec!["blocked.test", "seed.example", "seed2.example"]
    );
    assert_eq!(store.get::<usize>(storage_keys::RULE_COUNT).unwrap(), Some(3));
    assert_eq!(store.get::<String>(storage_keys::GFWLIST_URL).unwrap(), Some(url));
    let last_update = store
        .get::<String>(storage_keys::LAST_UPDATE)
        .unwrap()
        .unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(
        &last_update,
        remote_rule_defaults::LAST_UPDATE_FORMAT
    )
    .is_ok());

    let change = rx.try_recv().unwrap();
    assert!(change.touches_routing());
}

#[tokio::test]
async fn test_update_auto_list_failure_keeps_previous_list() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gfwlist.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let store = Store::in_memory();
    store
        .set(storage_keys::GFW_DOMAINS, &vec!["old.test"])
        .unwrap();

    let loader = RemoteRuleLoader::new(
        remote_config(format!("{}/gfwlist.txt", mock_server.uri())),
        HttpClientConfig::default(),
    )
    .unwrap();
    assert!(update_auto_list(&store, &loader).await.is_err());
    assert_eq!(store.string_list(storage_keys::GFW_DOMAINS), vec!["old.test"]);
    assert!(store.read().unwrap().auto_list.contains(&"old.test".to_string()));
}
