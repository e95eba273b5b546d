use crate::config::ServerDescriptor;
use crate::domain::{normalize_set, strip_www, DomainKey};
use crate::matcher;
use crate::r#const::{storage_keys, tier_labels};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

// 规则集：一组规范化后的域名键
pub type RuleSet = HashSet<DomainKey>;

// 规则层级，按优先级从高到低排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    // 强制直连（白名单）
    Whitelist,
    // 临时代理
    Temporary,
    // 强制代理
    UserRules,
    // 自动列表（GFWList）
    AutoList,
}

impl Tier {
    // 判定时的检查顺序
    pub const PRECEDENCE: [Tier; 4] = [
        Tier::Whitelist,
        Tier::Temporary,
        Tier::UserRules,
        Tier::AutoList,
    ];

    // 命中该层级时是否走代理
    pub fn routes_to_proxy(&self) -> bool {
        !matches!(self, Tier::Whitelist)
    }

    // 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Whitelist => tier_labels::WHITELIST,
            Tier::Temporary => tier_labels::TEMPORARY,
            Tier::UserRules => tier_labels::USER_RULES,
            Tier::AutoList => tier_labels::AUTO_LIST,
        }
    }

    // 对应的存储键
    pub fn storage_key(&self) -> &'static str {
        match self {
            Tier::Whitelist => storage_keys::USER_WHITELIST,
            Tier::Temporary => storage_keys::TEMP_RULES,
            Tier::UserRules => storage_keys::USER_RULES,
            Tier::AutoList => storage_keys::GFW_DOMAINS,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// 四个命名规则集
//
// 同一域名可以同时出现在多个规则集中，冲突在判定时按 Tier::PRECEDENCE 解决。
// 只能整体替换，写入前一律经过规范化。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSets {
    whitelist: RuleSet,
    temporary: RuleSet,
    user_rules: RuleSet,
    auto_list: RuleSet,
}

impl RuleSets {
    pub fn new() -> Self {
        Self::default()
    }

    // 整体替换某一层级，返回规范化后的条目数
    pub fn replace<I, S>(&mut self, tier: Tier, raw: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = normalize_set(raw);
        let len = set.len();
        *self.get_mut(tier) = set;
        len
    }

    // 链式构造，便于测试与初始化
    pub fn with<I, S>(mut self, tier: Tier, raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.replace(tier, raw);
        self
    }

    pub fn get(&self, tier: Tier) -> &RuleSet {
        match tier {
            Tier::Whitelist => &self.whitelist,
            Tier::Temporary => &self.temporary,
            Tier::UserRules => &self.user_rules,
            Tier::AutoList => &self.auto_list,
        }
    }

    fn get_mut(&mut self, tier: Tier) -> &mut RuleSet {
        match tier {
            Tier::Whitelist => &mut self.whitelist,
            Tier::Temporary => &mut self.temporary,
            Tier::UserRules => &mut self.user_rules,
            Tier::AutoList => &mut self.auto_list,
        }
    }

    // 单个层级的成员判定（后缀匹配）
    pub fn matches(&self, tier: Tier, hostname: &str) -> bool {
        matcher::matches(hostname, self.get(tier))
    }

    // 按优先级返回第一个命中的层级及命中的规则
    pub fn classify(&self, hostname: &str) -> Option<(Tier, &DomainKey)> {
        Tier::PRECEDENCE.iter().find_map(|&tier| {
            matcher::find_match(hostname, self.get(tier)).map(|key| (tier, key))
        })
    }

    // 页面主机名的分类：原始主机名精确命中优先，再对去掉 www. 的主机名做后缀匹配
    pub fn classify_host(&self, host: &str) -> Option<(Tier, &DomainKey)> {
        let stripped = strip_www(host);
        Tier::PRECEDENCE.iter().find_map(|&tier| {
            let rules = self.get(tier);
            rules
                .get(host)
                .or_else(|| matcher::find_match(stripped, rules))
                .map(|key| (tier, key))
        })
    }

    // 代理表：临时、用户、自动列表的并集，排序保证输出稳定
    pub fn proxy_domains(&self) -> BTreeSet<&str> {
        Tier::PRECEDENCE
            .iter()
            .filter(|tier| tier.routes_to_proxy())
            .flat_map(|&tier| self.get(tier).iter().map(DomainKey::as_str))
            .collect()
    }

    // 直连表：白名单
    pub fn direct_domains(&self) -> BTreeSet<&str> {
        self.whitelist.iter().map(DomainKey::as_str).collect()
    }

    pub fn len(&self, tier: Tier) -> usize {
        self.get(tier).len()
    }

    pub fn is_empty(&self) -> bool {
        Tier::PRECEDENCE.iter().all(|&tier| self.get(tier).is_empty())
    }
}

// 从规则来源读取的原始快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSnapshot {
    // 强制直连（未规范化）
    pub whitelist: Vec<String>,
    // 临时代理（未规范化）
    pub temporary: Vec<String>,
    // 强制代理（未规范化）
    pub user_rules: Vec<String>,
    // 自动列表（未规范化）
    pub auto_list: Vec<String>,
    // 服务器列表
    pub servers: Vec<ServerDescriptor>,
    // 激活的服务器ID
    pub active_server_id: Option<String>,
}

impl RuleSnapshot {
    pub fn raw(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Whitelist => &self.whitelist,
            Tier::Temporary => &self.temporary,
            Tier::UserRules => &self.user_rules,
            Tier::AutoList => &self.auto_list,
        }
    }

    // 规范化后的规则集
    pub fn rule_sets(&self) -> RuleSets {
        Tier::PRECEDENCE
            .iter()
            .fold(RuleSets::new(), |sets, &tier| sets.with(tier, self.raw(tier)))
    }

    // 当前激活的服务器
    pub fn active_server(&self) -> Option<&ServerDescriptor> {
        let active = self.active_server_id.as_deref()?;
        self.servers.iter().find(|server| server.id == active)
    }
}
