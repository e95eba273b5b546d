use crate::r#const::router::wildcards;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use url::Url;

// 规范化后的域名键
//
// 不变式：非空、全小写、不以 "." 开头或结尾，且不包含 "/"、":"、"*"、空白和控制字符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainKey(String);

impl DomainKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DomainKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DomainKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DomainKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value).ok_or_else(|| format!("invalid domain rule: {:?}", value))
    }
}

impl From<DomainKey> for String {
    fn from(key: DomainKey) -> Self {
        key.0
    }
}

#[inline]
fn is_forbidden(c: char) -> bool {
    c.is_whitespace() || c.is_control() || matches!(c, '/' | ':' | '*')
}

/// 将原始规则字符串规范化为域名键
///
/// 小写、去除首尾空白，去掉前导 `*.`（否则去掉单个前导 `.`）以及 FQDN 末尾的 `.`。
/// 空输入或不满足 [`DomainKey`] 不变式的输入返回 `None`，调用方必须过滤掉这些结果。
pub fn normalize(raw: &str) -> Option<DomainKey> {
    let lowered = raw.trim().to_lowercase();

    let stripped = match lowered.strip_prefix(wildcards::PREFIX) {
        Some(rest) => rest,
        None => lowered.strip_prefix(wildcards::DOT).unwrap_or(&lowered),
    };
    let stripped = stripped.strip_suffix(wildcards::DOT).unwrap_or(stripped);

    if stripped.is_empty()
        || stripped.starts_with(wildcards::DOT)
        || stripped.ends_with(wildcards::DOT)
        || stripped.chars().any(is_forbidden)
    {
        return None;
    }

    Some(DomainKey(stripped.to_string()))
}

/// 批量规范化，丢弃无效条目并去重
pub fn normalize_set<I, S>(raw: I) -> HashSet<DomainKey>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|item| normalize(item.as_ref()))
        .collect()
}

/// 接受主机名或完整 URL 的便捷入口
///
/// 含有 `://` 的输入先按 URL 解析并取主机名（任意协议），其余输入直接规范化。
pub fn normalize_input(raw: &str) -> Option<DomainKey> {
    let raw = raw.trim();
    if raw.contains("://") {
        let url = Url::parse(raw).ok()?;
        return normalize(url.host_str()?);
    }
    normalize(raw)
}

/// 从页面地址中提取主机名，只接受 http/https
pub fn host_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(|host| host.to_lowercase())
}

/// 路由判定前的主机名处理：去除空白、小写、去掉末尾的 `.`
pub fn canonical_host(hostname: &str) -> String {
    let lowered = hostname.trim().to_lowercase();
    match lowered.strip_suffix(wildcards::DOT) {
        Some(trimmed) => trimmed.to_string(),
        None => lowered,
    }
}

/// 去掉前导 `www.`
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix(wildcards::WWW_PREFIX).unwrap_or(host)
}

/// 判断主机名是否为本地或私有网络地址
///
/// 覆盖无点的简单主机名、`localhost`、`*.local`、IPv4 回环、RFC1918 私有网段与链路本地地址。
/// 生成的 PAC 脚本使用同一套判断。
pub fn is_local_host(host: &str) -> bool {
    if !host.contains(wildcards::DOT) || host == "localhost" || host.ends_with(".local") {
        return true;
    }

    let octets: Vec<&str> = host.split(wildcards::DOT).collect();
    if octets.len() != 4
        || !octets
            .iter()
            .all(|o| !o.is_empty() && o.chars().all(|c| c.is_ascii_digit()))
    {
        return false;
    }

    let a: u32 = octets[0].parse().unwrap_or(u32::MAX);
    let b: u32 = octets[1].parse().unwrap_or(u32::MAX);

    a == 10
        || a == 127
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || (a == 169 && b == 254)
}
