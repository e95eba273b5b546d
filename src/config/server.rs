use crate::r#const::{pac, port_limits};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

// 代理协议枚举
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyScheme {
    // HTTP 代理
    #[serde(alias = "http")]
    Http,
    // SOCKS5 代理
    #[default]
    #[serde(alias = "socks5")]
    Socks5,
}

impl ProxyScheme {
    // PAC 指令关键字：HTTP 使用 PROXY，其余一律 SOCKS5
    pub fn pac_keyword(&self) -> &'static str {
        match self {
            ProxyScheme::Http => pac::PROXY_KEYWORD,
            ProxyScheme::Socks5 => pac::SOCKS5_KEYWORD,
        }
    }
}

// 自定义验证函数 - 主机名不能为空，也不能包含会破坏 PAC 指令语法的字符
pub fn validate_proxy_host(host: &str) -> Result<(), ValidationError> {
    if host.is_empty()
        || host
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ';' | '"' | '\\' | '/'))
    {
        return Err(ValidationError::new("invalid_proxy_host"));
    }
    Ok(())
}

// 端口既可以是数字也可以是字符串（浏览器扩展历史数据中两种都存在）
fn port_from_any<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

// 上游代理服务器描述
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct ServerDescriptor {
    // 服务器ID
    #[validate(length(min = 1, message = "Server id must not be empty"))]
    pub id: String,
    // 显示名称
    #[serde(default)]
    pub name: String,
    // 代理协议，默认为 SOCKS5
    #[serde(default)]
    pub scheme: ProxyScheme,
    // 主机地址
    #[validate(custom(function = "validate_proxy_host", message = "Invalid proxy host"))]
    pub host: String,
    // 端口
    #[serde(deserialize_with = "port_from_any")]
    #[validate(range(
        min = port_limits::MIN_PORT,
        max = port_limits::MAX_PORT,
        message = "Port must be between {} and {}"
    ))]
    pub port: u16,
}

impl ServerDescriptor {
    // 代理端点，形如 host:port
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {})",
            self.name,
            self.scheme.pac_keyword(),
            self.endpoint()
        )
    }
}
