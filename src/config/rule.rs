use crate::r#const::{remote_rule_defaults, remote_rule_limits, retry_limits};
use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

// 自定义验证函数 - 验证URL格式
pub fn validate_url(url_str: &str) -> Result<(), ValidationError> {
    match Url::parse(url_str) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_url")),
    }
}

// 认证类型枚举
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    // HTTP基本认证
    Basic,
    // Bearer令牌认证
    Bearer,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

// 自定义验证函数 - 认证方式所需的字段必须齐全
fn validate_auth_fields(auth: &AuthConfig) -> Result<(), ValidationError> {
    match auth.r#type {
        AuthType::Basic if is_blank(&auth.username) || is_blank(&auth.password) => {
            Err(ValidationError::new("missing_credentials_for_basic_auth"))
        }
        AuthType::Bearer if is_blank(&auth.token) => {
            Err(ValidationError::new("missing_token_for_bearer_auth"))
        }
        _ => Ok(()),
    }
}

// 认证配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
#[validate(schema(
    function = "validate_auth_fields",
    message = "Basic authentication requires username and password, bearer authentication requires token"
))]
pub struct AuthConfig {
    // 认证类型（basic/bearer）
    pub r#type: AuthType,
    // 用户名（仅用于basic认证）
    pub username: Option<String>,
    // 密码（仅用于basic认证）
    pub password: Option<String>,
    // 令牌（仅用于bearer认证）
    pub token: Option<String>,
}

// 重试配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct RetryConfig {
    // 重试次数
    #[validate(range(
        min = retry_limits::MIN_ATTEMPTS,
        max = retry_limits::MAX_ATTEMPTS,
        message = "Retry attempts must be between {} and {}"
    ))]
    pub attempts: u32,
    // 重试初始延迟（秒）
    #[validate(range(
        min = retry_limits::MIN_DELAY,
        max = retry_limits::MAX_DELAY,
        message = "Retry delay must be between {} and {} seconds"
    ))]
    pub delay: u32,
}

// 规则格式枚举
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleFormat {
    // Base64 编码的 GFWList（AdBlock 语法）
    #[default]
    Gfwlist,
    // 每行一个域名的纯文本列表
    Plain,
}

fn default_gfwlist_url() -> String {
    remote_rule_defaults::GFWLIST_URL.to_string()
}

fn default_max_rule_size() -> usize {
    remote_rule_limits::DEFAULT_MAX_SIZE
}

fn default_update_on_start() -> bool {
    true
}

fn default_seed_domains() -> Vec<String> {
    remote_rule_defaults::SEED_DOMAINS
        .iter()
        .map(|d| d.to_string())
        .collect()
}

// 自动列表（远程规则）配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
pub struct RemoteRuleConfig {
    // 规则URL
    #[serde(default = "default_gfwlist_url")]
    #[validate(custom(function = "validate_url", message = "Invalid remote rule URL"))]
    pub url: String,
    // 认证配置（可选）
    #[validate(nested)]
    pub auth: Option<AuthConfig>,
    // 规则格式（默认为gfwlist）
    #[serde(default)]
    pub format: RuleFormat,
    // 重试配置（可选）
    #[validate(nested)]
    pub retry: Option<RetryConfig>,
    // 代理（可选）
    pub proxy: Option<String>,
    // 最大规则文件大小（字节，默认10MB）
    #[serde(default = "default_max_rule_size")]
    #[validate(range(
        min = remote_rule_limits::MIN_SIZE,
        max = remote_rule_limits::MAX_SIZE,
        message = "Remote rule size limit must be between {} and {} bytes"
    ))]
    pub max_size: usize,
    // 启动时是否立即更新
    #[serde(default = "default_update_on_start")]
    pub update_on_start: bool,
    // 自动更新间隔（秒，可选）
    #[serde(default)]
    #[validate(range(
        min = remote_rule_limits::MIN_UPDATE_INTERVAL,
        max = remote_rule_limits::MAX_UPDATE_INTERVAL,
        message = "Update interval must be between {} and {} seconds"
    ))]
    pub update_interval: Option<u64>,
    // 总是加入自动列表的种子域名
    #[serde(default = "default_seed_domains")]
    pub seed_domains: Vec<String>,
}

impl Default for RemoteRuleConfig {
    fn default() -> Self {
        Self {
            url: default_gfwlist_url(),
            auth: None,
            format: RuleFormat::default(),
            retry: None,
            proxy: None,
            max_size: default_max_rule_size(),
            update_on_start: default_update_on_start(),
            update_interval: None,
            seed_domains: default_seed_domains(),
        }
    }
}

// 本地规则列表配置，启动时写入存储
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct RuleListsConfig {
    // 强制直连（白名单）
    pub whitelist: Option<Vec<String>>,
    // 临时代理
    pub temporary: Option<Vec<String>>,
    // 强制代理
    pub user_rules: Option<Vec<String>>,
}
