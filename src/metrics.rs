use axum::http::{header, StatusCode};
use axum::{routing::get, Router};
use once_cell::sync::Lazy;
use prometheus::{opts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Registry};

// 全局静态指标实例
pub static METRICS: Lazy<ProxyMetrics> = Lazy::new(ProxyMetrics::new);

// 代理切换器指标
pub struct ProxyMetrics {
    registry: Registry,

    // 1. 路由判定指标
    route_decisions_total: IntCounterVec,
    rule_set_size: IntGaugeVec,

    // 2. PAC 生成指标
    pac_builds_total: IntCounter,
    pac_script_bytes: IntGauge,
    mode_changes_total: IntCounterVec,

    // 3. 图标指标
    icon_redraws_total: IntCounter,

    // 4. 自动列表指标
    remote_rule_fetch_total: IntCounterVec,
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyMetrics {
    // 创建新的指标收集器
    pub fn new() -> Self {
        let registry = Registry::new();

        // 1. 路由判定指标
        let route_decisions_total = IntCounterVec::new(
            opts!(
                "fastproxy_route_decisions_total",
                "Total routing decisions, classified by proxy mode and matched rule tier"
            ),
            &["mode", "tier"],
        )
        .unwrap();

        let rule_set_size = IntGaugeVec::new(
            opts!(
                "fastproxy_rule_set_size",
                "Current number of normalized domains in each rule tier"
            ),
            &["tier"],
        )
        .unwrap();

        // 2. PAC 生成指标
        let pac_builds_total = IntCounter::new(
            "fastproxy_pac_builds_total",
            "Total PAC scripts generated",
        )
        .unwrap();

        let pac_script_bytes = IntGauge::new(
            "fastproxy_pac_script_bytes",
            "Size of the most recently generated PAC script in bytes",
        )
        .unwrap();

        let mode_changes_total = IntCounterVec::new(
            opts!(
                "fastproxy_mode_changes_total",
                "Total proxy mode changes, classified by target mode"
            ),
            &["mode"],
        )
        .unwrap();

        // 3. 图标指标
        let icon_redraws_total = IntCounter::new(
            "fastproxy_icon_redraws_total",
            "Total icon redraws issued to the renderer",
        )
        .unwrap();

        // 4. 自动列表指标
        let remote_rule_fetch_total = IntCounterVec::new(
            opts!(
                "fastproxy_remote_rule_fetch_total",
                "Total auto list fetches, classified by result (success, failure)"
            ),
            &["result"],
        )
        .unwrap();

        let metrics = ProxyMetrics {
            registry,
            route_decisions_total,
            rule_set_size,
            pac_builds_total,
            pac_script_bytes,
            mode_changes_total,
            icon_redraws_total,
            remote_rule_fetch_total,
        };

        metrics.register_all_metrics();

        metrics
    }

    // 注册所有指标
    fn register_all_metrics(&self) {
        self.registry
            .register(Box::new(self.route_decisions_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.rule_set_size.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.pac_builds_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.pac_script_bytes.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.mode_changes_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.icon_redraws_total.clone()))
            .unwrap();
        self.registry
            .register(Box::new(self.remote_rule_fetch_total.clone()))
            .unwrap();
    }

    // 获取 Prometheus 注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // 导出所有指标为文本
    pub fn export_metrics(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        if let Err(e) = encoder.encode_utf8(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        buffer
    }

    // 1. 路由判定指标
    pub fn route_decisions_total(&self) -> &IntCounterVec {
        &self.route_decisions_total
    }

    pub fn rule_set_size(&self) -> &IntGaugeVec {
        &self.rule_set_size
    }

    // 2. PAC 生成指标
    pub fn pac_builds_total(&self) -> &IntCounter {
        &self.pac_builds_total
    }

    pub fn pac_script_bytes(&self) -> &IntGauge {
        &self.pac_script_bytes
    }

    pub fn mode_changes_total(&self) -> &IntCounterVec {
        &self.mode_changes_total
    }

    // 3. 图标指标
    pub fn icon_redraws_total(&self) -> &IntCounter {
        &self.icon_redraws_total
    }

    // 4. 自动列表指标
    pub fn remote_rule_fetch_total(&self) -> &IntCounterVec {
        &self.remote_rule_fetch_total
    }
}

// 提供指标导出路由
pub fn metrics_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/metrics",
        get(|| async {
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
                METRICS.export_metrics(),
            )
        }),
    )
}
