use crate::r#const::{debounce_limits, http_client_limits, server_defaults};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

// 自定义验证函数 - 验证Socket地址格式
pub fn validate_socket_addr(addr: &str) -> Result<(), ValidationError> {
    match SocketAddr::from_str(addr) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_socket_addr")),
    }
}

// HTTP客户端配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct HttpClientConfig {
    // 连接超时（秒）
    #[validate(range(
        min = http_client_limits::MIN_CONNECT_TIMEOUT,
        max = http_client_limits::MAX_CONNECT_TIMEOUT,
        message = "Connect timeout must be between {} and {} seconds"
    ))]
    pub connect_timeout: u64,
    // 请求超时（秒）
    #[validate(range(
        min = http_client_limits::MIN_REQUEST_TIMEOUT,
        max = http_client_limits::MAX_REQUEST_TIMEOUT,
        message = "Request timeout must be between {} and {} seconds"
    ))]
    pub request_timeout: u64,
    // 空闲连接超时（秒）（可选）
    #[validate(range(
        min = http_client_limits::MIN_IDLE_TIMEOUT,
        max = http_client_limits::MAX_IDLE_TIMEOUT,
        message = "Idle timeout must be between {} and {} seconds"
    ))]
    pub idle_timeout: Option<u64>,
    // TCP Keepalive（秒）（可选）
    #[validate(range(
        min = http_client_limits::MIN_KEEPALIVE,
        max = http_client_limits::MAX_KEEPALIVE,
        message = "Keepalive must be between {} and {} seconds"
    ))]
    pub keepalive: Option<u32>,
    // HTTP用户代理（可选）
    pub agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: http_client_limits::DEFAULT_CONNECT_TIMEOUT,
            request_timeout: http_client_limits::DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: Some(http_client_limits::DEFAULT_IDLE_TIMEOUT),
            keepalive: Some(http_client_limits::DEFAULT_KEEPALIVE),
            agent: None,
        }
    }
}

// 管理服务器配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct AdminConfig {
    // 管理服务器监听地址
    #[validate(custom(function = "validate_socket_addr", message = "Invalid admin listen address"))]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: server_defaults::DEFAULT_ADMIN_LISTEN.to_string(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(server_defaults::DEFAULT_STORE_PATH)
}

// 持久化存储配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    // 存储文件路径
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    debounce_limits::DEFAULT_MS
}

// PAC 生成配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct PacConfig {
    // 规则变更后的防抖窗口（毫秒）
    #[serde(default = "default_debounce_ms")]
    #[validate(range(
        min = debounce_limits::MIN_MS,
        max = debounce_limits::MAX_MS,
        message = "Debounce window must be between {} and {} milliseconds"
    ))]
    pub debounce_ms: u64,
}

impl PacConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for PacConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}
