use crate::config::ServerDescriptor;
use crate::error::AppError;
use crate::metrics::METRICS;
use crate::r#const::pac;
use crate::rule_set::{RuleSets, Tier};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

// PAC 代理指令
//
// 形如 "SOCKS5 h:p; SOCKS h:p; DIRECT"，代理不可用时逐级回退。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDirective(String);

impl ProxyDirective {
    pub fn for_server(server: &ServerDescriptor) -> Self {
        let endpoint = server.endpoint();
        Self(format!(
            "{keyword} {endpoint}; {fallback} {endpoint}; {direct}",
            keyword = server.scheme.pac_keyword(),
            endpoint = endpoint,
            fallback = pac::SOCKS_FALLBACK_KEYWORD,
            direct = pac::DIRECT,
        ))
    }

    pub fn direct() -> Self {
        Self(pac::DIRECT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 生成好的 PAC 程序文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacProgram(String);

impl PacProgram {
    // 从存储中读取的脚本
    pub fn from_persisted(text: String) -> Self {
        Self(text)
    }

    // 全局代理脚本：所有请求都走同一个代理
    pub fn fixed(server: &ServerDescriptor) -> Result<Self, AppError> {
        Self::single_directive(&ProxyDirective::for_server(server))
    }

    // 直连脚本
    pub fn direct() -> Result<Self, AppError> {
        Self::single_directive(&ProxyDirective::direct())
    }

    fn single_directive(directive: &ProxyDirective) -> Result<Self, AppError> {
        Ok(Self(format!(
            "function {}(url, host) {{\n  return {};\n}}\n",
            pac::ENTRY_FUNCTION,
            js_literal(directive.as_str())?
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PacProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// 把值序列化为 JS 字面量
//
// JSON 是 JS 的子集，唯一的例外是 U+2028/U+2029 在旧引擎的字符串字面量中非法。
fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    let json = serde_json::to_string(value)?;
    Ok(json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029"))
}

// 脚本主体：本地地址判断、后缀匹配与入口函数
// 与 RoutingEngine::decide 在自动模式下的判定保持一致
const PAC_BODY: &str = r#"var directMap = Object.create(null);
var proxyMap = Object.create(null);
for (var i = 0; i < directDomains.length; i++) {
  directMap[directDomains[i]] = true;
}
for (var j = 0; j < proxyDomains.length; j++) {
  proxyMap[proxyDomains[j]] = true;
}

function hasKey(map, key) {
  return Object.prototype.hasOwnProperty.call(map, key);
}

function isLocalHost(host) {
  if (host.indexOf(".") === -1 || host === "localhost" || /\.local$/.test(host)) {
    return true;
  }
  var m = /^(\d+)\.(\d+)\.(\d+)\.(\d+)$/.exec(host);
  if (!m) {
    return false;
  }
  var a = parseInt(m[1], 10);
  var b = parseInt(m[2], 10);
  return a === 10 || a === 127 ||
    (a === 172 && b >= 16 && b <= 31) ||
    (a === 192 && b === 168) ||
    (a === 169 && b === 254);
}

function checkMap(host, map) {
  if (hasKey(map, host)) {
    return true;
  }
  var pos = host.indexOf(".");
  while (pos !== -1) {
    if (hasKey(map, host.substring(pos + 1))) {
      return true;
    }
    pos = host.indexOf(".", pos + 1);
  }
  return false;
}

function lookup(host, stripped, map) {
  return hasKey(map, host) || checkMap(stripped, map);
}

function FindProxyForURL(url, host) {
  host = String(host).toLowerCase();
  if (host.charAt(host.length - 1) === ".") {
    host = host.substring(0, host.length - 1);
  }
  if (isLocalHost(host)) {
    return direct;
  }
  var stripped = host.indexOf("www.") === 0 ? host.substring(4) : host;
  if (lookup(host, stripped, directMap)) {
    return direct;
  }
  if (lookup(host, stripped, proxyMap)) {
    return proxy;
  }
  return direct;
}
"#;

// PAC 脚本生成器
pub struct PacSynthesizer;

impl PacSynthesizer {
    /// 由激活的服务器与规则集生成自包含的 PAC 程序
    ///
    /// 白名单进入直连表，临时、用户、自动列表的并集进入代理表。
    /// 没有激活的服务器时返回 [`AppError::NoActiveServer`]，此时不应覆盖已有脚本。
    /// 输出只取决于输入，规则按字典序排列。
    pub fn synthesize(
        active: Option<&ServerDescriptor>,
        rules: &RuleSets,
    ) -> Result<PacProgram, AppError> {
        let server = active.ok_or(AppError::NoActiveServer)?;
        let directive = ProxyDirective::for_server(server);

        let direct_domains: Vec<&str> = rules.direct_domains().into_iter().collect();
        let proxy_domains: Vec<&str> = rules.proxy_domains().into_iter().collect();

        let mut script = String::with_capacity(
            PAC_BODY.len()
                + direct_domains.iter().chain(&proxy_domains).map(|d| d.len() + 3).sum::<usize>()
                + 256,
        );

        script.push_str(&format!(
            "// fastproxy PAC: {} direct, {} proxied ({} user, {} temporary, {} auto)\n",
            direct_domains.len(),
            proxy_domains.len(),
            rules.len(Tier::UserRules),
            rules.len(Tier::Temporary),
            rules.len(Tier::AutoList),
        ));
        script.push_str(&format!("var proxy = {};\n", js_literal(directive.as_str())?));
        script.push_str(&format!("var direct = {};\n", js_literal(pac::DIRECT)?));
        script.push_str(&format!("var directDomains = {};\n", js_literal(&direct_domains)?));
        script.push_str(&format!("var proxyDomains = {};\n\n", js_literal(&proxy_domains)?));
        script.push_str(PAC_BODY);

        METRICS.pac_builds_total().inc();
        METRICS.pac_script_bytes().set(script.len() as i64);

        debug!("PAC script built with directive '{}'", directive);
        info!(
            "PAC script generated: {} bytes, {} direct domains, {} proxy domains",
            script.len(),
            direct_domains.len(),
            proxy_domains.len()
        );

        Ok(PacProgram(script))
    }
}
