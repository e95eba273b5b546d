use std::io;
use std::net::AddrParseError;
use thiserror::Error;

// HTTP 客户端错误
#[derive(Error, Debug)]
#[error("{0}")]
pub struct HttpClientError(pub String);

// 代理配置错误
#[derive(Error, Debug)]
#[error("{0}")]
pub struct InvalidProxyConfig(pub String);

// Unified error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(String),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] HttpClientError),

    #[error("Invalid proxy configuration: {0}")]
    InvalidProxy(#[from] InvalidProxyConfig),

    #[error("Remote rule error: {0}")]
    RemoteRule(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("JSON serialization/deserialization error: {0}")]
    JsonError(String),

    #[error("No proxy server configured")]
    NoActiveServer,

    #[error("PAC script is not ready, update the rules first")]
    PacNotReady,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid shutdown timeout")]
    InvalidShutdownTimeout,
}

impl From<reqwest_middleware::Error> for AppError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => Self::Http(e),
            _ => Self::HttpMiddleware(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<AddrParseError> for AppError {
    fn from(err: AddrParseError) -> Self {
        Self::Config(ConfigError::InvalidListenAddress(err.to_string()))
    }
}

// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadError(#[from] io::Error),

    #[error("YAML parsing error: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid server listen address: {0}")]
    InvalidListenAddress(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
