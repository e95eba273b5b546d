use crate::error::ConfigError;
use crate::r#const::server_defaults;
use crate::router::Mode;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};
use tracing::debug;
use validator::{Validate, ValidationError, ValidationErrors};

pub mod general;
pub mod rule;
pub mod server;

pub use self::general::*;
pub use self::rule::*;
pub use self::server::*;

// 配置结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;

// 自定义验证函数 - 验证服务器ID唯一性
pub fn validate_unique_server_ids(config: &Config) -> Result<(), ValidationError> {
    if let Some(servers) = &config.servers {
        let mut ids = HashSet::new();
        for server in servers {
            if !ids.insert(server.id.as_str()) {
                return Err(ValidationError::new("duplicate_server_id"));
            }
        }
    }
    Ok(())
}

// 自定义验证函数 - 验证激活的服务器存在
pub fn validate_active_server(config: &Config) -> Result<(), ValidationError> {
    let active = match &config.active_server {
        Some(active) => active,
        None => return Ok(()),
    };

    let exists = config
        .servers
        .as_ref()
        .is_some_and(|servers| servers.iter().any(|s| &s.id == active));

    if !exists {
        return Err(ValidationError::new("non_existent_active_server"));
    }
    Ok(())
}

// 应用配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Validate)]
#[validate(schema(
    function = "validate_unique_server_ids",
    message = "Server ids must be unique"
))]
#[validate(schema(
    function = "validate_active_server",
    message = "Active server references a non-existent server id"
))]
pub struct Config {
    // 持久化存储配置
    #[serde(default)]
    pub store: StoreConfig,
    // 管理服务器配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub admin: Option<AdminConfig>,
    // HTTP客户端配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub http_client: Option<HttpClientConfig>,
    // 代理服务器列表（可选，提供时覆盖存储中的列表）
    #[serde(default)]
    #[validate(nested)]
    pub servers: Option<Vec<ServerDescriptor>>,
    // 激活的服务器ID（可选）
    #[serde(default)]
    pub active_server: Option<String>,
    // 本地规则列表（可选，提供时覆盖存储中的列表）
    #[serde(default)]
    pub rules: Option<RuleListsConfig>,
    // 自动列表配置（可选）
    #[serde(default)]
    #[validate(nested)]
    pub auto_list: Option<RemoteRuleConfig>,
    // PAC 生成配置
    #[serde(default)]
    #[validate(nested)]
    pub pac: PacConfig,
    // 启动时的代理模式（可选，未提供时沿用存储中的模式）
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl Config {
    // 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        debug!("Loading configuration file: {:?}", path.as_ref());
        let content = fs::read_to_string(path).map_err(ConfigError::LoadError)?;
        Self::from_yaml(&content)
    }

    // 从 YAML 文本加载配置
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_yaml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    // 验证配置有效性
    pub fn validate(&self) -> ConfigResult<()> {
        Validate::validate(self)
            .map_err(|errors| ConfigError::ValidationError(format_validation_errors(&errors)))
    }

    // 管理服务器监听地址
    pub fn admin_listen(&self) -> String {
        self.admin
            .as_ref()
            .map(|admin| admin.listen.clone())
            .unwrap_or_else(|| server_defaults::DEFAULT_ADMIN_LISTEN.to_string())
    }
}

// 将 ValidationErrors 转换为友好的错误信息
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, error_kind) in errors.errors() {
        match error_kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    messages.push(format!("Field '{}': {}", field, message));
                }
            }
            validator::ValidationErrorsKind::Struct(struct_errors) => {
                messages.push(format!(
                    "Struct '{}' validation failed: {}",
                    field,
                    format_validation_errors(struct_errors)
                ));
            }
            validator::ValidationErrorsKind::List(list_errors) => {
                for (index, err) in list_errors {
                    messages.push(format!(
                        "List '{}' at index {}: {}",
                        field,
                        index,
                        format_validation_errors(err)
                    ));
                }
            }
        }
    }

    if messages.is_empty() {
        "Unknown validation error".to_string()
    } else {
        messages.join("\n")
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreConfig::default(),
            admin: Some(AdminConfig::default()),
            http_client: Some(HttpClientConfig::default()),
            servers: None,
            active_server: None,
            rules: None,
            auto_list: Some(RemoteRuleConfig::default()),
            pac: PacConfig::default(),
            mode: None,
        }
    }
}
