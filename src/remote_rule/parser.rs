use crate::domain::normalize;
use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;

// 可接受的域名字符
lazy_static! {
    static ref DOMAIN_CHARS: Regex = Regex::new(r"^[A-Za-z0-9_\-.]+$").unwrap();
}

/// 规则解析器特征，定义解析不同格式规则文件的接口
pub trait RuleParser: Send + Sync {
    /// 解析规则内容，返回规范化后的域名列表
    fn parse(&self, content: &str) -> Result<Vec<String>, AppError>;
}

/// GFWList 解析器
///
/// 内容为 Base64 编码的 AdBlock 语法列表。只提取 `||domain`、
/// 普通域名与 `http(s)://domain/...` 形式的条目，忽略注释、
/// 段落头、`|` 开头的 URL 前缀规则、通配符、正则与例外规则。
pub struct GfwListParser;

impl GfwListParser {
    // 去掉所有空白后按标准 Base64 解码
    fn decode(content: &str) -> Result<String, AppError> {
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| AppError::RemoteRule(format!("Failed to decode GFWList: {}", e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // 从单行规则中提取域名
    fn extract(line: &str) -> Option<&str> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('!') || line.starts_with('[') {
            return None;
        }

        let mut domain = match line.strip_prefix("||") {
            Some(rest) => rest,
            None if line.starts_with('|') => return None,
            None => line,
        };

        for scheme in ["https://", "http://"] {
            if let Some(rest) = domain.strip_prefix(scheme) {
                domain = rest;
                break;
            }
        }

        if let Some(slash) = domain.find('/') {
            if slash > 0 {
                domain = &domain[..slash];
            }
        }

        if domain.contains('*') || (domain.starts_with('/') && domain.ends_with('/')) {
            return None;
        }

        if domain.contains('.') && !domain.contains('%') && DOMAIN_CHARS.is_match(domain) {
            Some(domain)
        } else {
            None
        }
    }
}

impl RuleParser for GfwListParser {
    fn parse(&self, content: &str) -> Result<Vec<String>, AppError> {
        let text = Self::decode(content)?;
        Ok(text
            .lines()
            .filter_map(Self::extract)
            .filter_map(normalize)
            .map(String::from)
            .collect())
    }
}

/// 纯文本域名列表解析器，每行一个域名，`#` 开头为注释
pub struct PlainListParser;

impl RuleParser for PlainListParser {
    fn parse(&self, content: &str) -> Result<Vec<String>, AppError> {
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(normalize)
            .map(String::from)
            .collect())
    }
}
