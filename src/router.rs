use crate::domain::{canonical_host, host_from_url, is_local_host};
use crate::icon::{IconRenderer, IconState, IconStateCache, TabId};
use crate::metrics::METRICS;
use crate::r#const::{icon_tokens, mode_labels, tier_labels};
use crate::rule_set::{RuleSets, Tier};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// 代理模式，序列化值与浏览器代理设置保持一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    // 直连
    #[default]
    #[serde(rename = "direct")]
    Direct,
    // 全局代理
    #[serde(rename = "fixed_servers", alias = "fixed_proxy", alias = "fixedProxy")]
    FixedProxy,
    // 自动分流（PAC）
    #[serde(rename = "pac_script", alias = "auto_pac", alias = "autoPac")]
    AutoPac,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Direct => mode_labels::DIRECT,
            Mode::FixedProxy => mode_labels::FIXED_PROXY,
            Mode::AutoPac => mode_labels::AUTO_PAC,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// 路由判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingVerdict {
    // 是否走代理
    pub use_proxy: bool,
    // 命中的规则层级（未命中为 None）
    pub matched_tier: Option<Tier>,
}

impl RoutingVerdict {
    // 直连且未命中任何规则
    pub const DIRECT: Self = Self {
        use_proxy: false,
        matched_tier: None,
    };

    // 全局代理
    pub const PROXY: Self = Self {
        use_proxy: true,
        matched_tier: None,
    };

    pub fn matched(tier: Tier) -> Self {
        Self {
            use_proxy: tier.routes_to_proxy(),
            matched_tier: Some(tier),
        }
    }
}

// 路由判定引擎
//
// 持有规则集、当前模式与图标缓存，全部状态都归属于这一个实例。
pub struct RoutingEngine {
    rules: RuleSets,
    mode: Mode,
    icon: IconStateCache,
}

impl RoutingEngine {
    pub fn new(rules: RuleSets, mode: Mode) -> Self {
        let engine = Self {
            rules,
            mode,
            icon: IconStateCache::new(),
        };
        engine.record_rule_counts();
        engine
    }

    // 替换全部规则集
    pub fn apply_rule_sets(&mut self, rules: RuleSets) {
        self.rules = rules;
        self.record_rule_counts();
        debug!(
            "Rule sets applied: {} whitelist, {} temporary, {} user, {} auto",
            self.rules.len(Tier::Whitelist),
            self.rules.len(Tier::Temporary),
            self.rules.len(Tier::UserRules),
            self.rules.len(Tier::AutoList)
        );
    }

    // 模式在外部发生变化，同时作废图标缓存
    pub fn apply_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!("Mode changed: {} -> {}", self.mode, mode);
        }
        self.mode = mode;
        self.icon.invalidate();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn rule_sets(&self) -> &RuleSets {
        &self.rules
    }

    fn record_rule_counts(&self) {
        for tier in Tier::PRECEDENCE {
            METRICS
                .rule_set_size()
                .with_label_values(&[tier.label()])
                .set(self.rules.len(tier) as i64);
        }
    }

    /// 对主机名做出路由判定，永不失败
    ///
    /// 自动模式下依次检查：本地/私有地址直连，再按
    /// 白名单 > 临时 > 用户 > 自动列表 的顺序匹配，全部未命中则直连。
    /// 每一层先精确匹配原始主机名，再对去掉 `www.` 的主机名做后缀匹配。
    /// 本地地址的绕过先于所有层级，即使单标签主机名列在某一层中，
    /// 结果也是未命中的直连。
    pub fn decide(&self, hostname: &str, mode: Mode) -> RoutingVerdict {
        let verdict = match mode {
            Mode::FixedProxy => RoutingVerdict::PROXY,
            Mode::Direct => RoutingVerdict::DIRECT,
            Mode::AutoPac => self.classify(hostname),
        };

        let tier_label = verdict
            .matched_tier
            .map(|tier| tier.label())
            .unwrap_or(tier_labels::NONE);
        METRICS
            .route_decisions_total()
            .with_label_values(&[mode.label(), tier_label])
            .inc();

        verdict
    }

    // 对页面地址做出路由判定，非 http/https 地址视为未命中
    pub fn decide_url(&self, url: &str, mode: Mode) -> RoutingVerdict {
        if mode != Mode::AutoPac {
            return self.decide(url, mode);
        }

        match host_from_url(url) {
            Some(host) => self.decide(&host, mode),
            None => {
                debug!("Unroutable page address '{}', treated as direct", url);
                self.decide("", mode)
            }
        }
    }

    fn classify(&self, hostname: &str) -> RoutingVerdict {
        let host = canonical_host(hostname);
        if is_local_host(&host) {
            debug!("Local address '{}' bypasses rules", host);
            return RoutingVerdict::DIRECT;
        }

        match self.rules.classify_host(&host) {
            Some((tier, rule)) => {
                debug!("Rule match: '{}' -> Tier: {}, Rule: '{}'", host, tier, rule);
                RoutingVerdict::matched(tier)
            }
            None => {
                debug!("No rule matched '{}', default direct", host);
                RoutingVerdict::DIRECT
            }
        }
    }

    // 图标状态，每个 (模式, 层级) 组合对应唯一的状态
    pub fn icon_state(mode: Mode, verdict: &RoutingVerdict) -> IconState {
        let (color, label) = match mode {
            Mode::Direct => (icon_tokens::BLUE, icon_tokens::LABEL_DIRECT),
            Mode::FixedProxy => (icon_tokens::GREEN, icon_tokens::LABEL_PROXY),
            Mode::AutoPac => {
                let color = match verdict.matched_tier {
                    Some(Tier::Whitelist) => icon_tokens::BLUE,
                    Some(Tier::Temporary) => icon_tokens::ORANGE,
                    Some(Tier::UserRules) => icon_tokens::GREEN,
                    Some(Tier::AutoList) => icon_tokens::LIGHT_GREEN,
                    None => icon_tokens::GREY,
                };
                (color, icon_tokens::LABEL_AUTO)
            }
        };
        IconState { color, label }
    }

    // 以当前模式计算页面状态，仅在状态变化时重绘图标
    pub fn refresh_icon(
        &mut self,
        url: Option<&str>,
        tab: Option<TabId>,
        renderer: &dyn IconRenderer,
    ) -> (RoutingVerdict, IconState) {
        let mode = self.mode;
        let verdict = match url {
            Some(url) => self.decide_url(url, mode),
            None => self.decide("", mode),
        };
        let state = Self::icon_state(mode, &verdict);
        self.icon.apply_if_changed(state, tab, renderer);
        (verdict, state)
    }
}
