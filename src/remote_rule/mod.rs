mod loader;
mod parser;

pub use self::loader::RemoteRuleLoader;
pub use self::parser::{GfwListParser, PlainListParser, RuleParser};

use crate::config::{HttpClientConfig, RemoteRuleConfig};
use crate::error::AppError;
use crate::r#const::{remote_rule_defaults, storage_keys};
use crate::store::Store;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemHandle};
use tracing::{error, info};

/// 拉取自动列表并写入存储
///
/// 同时写入条目数、更新时间与列表地址，返回条目数。
/// 拉取失败时存储保持原样。
pub async fn update_auto_list(store: &Store, loader: &RemoteRuleLoader) -> Result<usize, AppError> {
    let domains = loader.load().await?;
    let count = domains.len();

    store.set_many(vec![
        (storage_keys::GFW_DOMAINS, serde_json::to_value(&domains)?),
        (storage_keys::RULE_COUNT, Value::from(count)),
        (
            storage_keys::LAST_UPDATE,
            Value::String(
                chrono::Local::now()
                    .format(remote_rule_defaults::LAST_UPDATE_FORMAT)
                    .to_string(),
            ),
        ),
        (storage_keys::GFWLIST_URL, Value::String(loader.url().to_string())),
    ])?;

    info!("Auto list updated: {} domains", count);
    Ok(count)
}

// 自动列表刷新子系统
pub struct AutoListRefresher {
    store: Arc<Store>,
    loader: RemoteRuleLoader,
    update_on_start: bool,
    update_interval: Option<Duration>,
}

impl AutoListRefresher {
    pub fn new(
        store: Arc<Store>,
        config: RemoteRuleConfig,
        http_config: HttpClientConfig,
    ) -> Result<Self, AppError> {
        let update_on_start = config.update_on_start;
        let update_interval = config.update_interval.map(Duration::from_secs);
        let loader = RemoteRuleLoader::new(config, http_config)?;

        Ok(Self {
            store,
            loader,
            update_on_start,
            update_interval,
        })
    }

    async fn refresh(&self) {
        if let Err(e) = update_auto_list(&self.store, &self.loader).await {
            error!("Failed to update auto list from {}: {}", self.loader.url(), e);
        }
    }

    async fn run_loop(&self) {
        if self.update_on_start {
            self.refresh().await;
        }

        let period = match self.update_interval {
            Some(period) => period,
            None => return std::future::pending().await,
        };

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }
}

#[async_trait::async_trait]
impl IntoSubsystem<AppError> for AutoListRefresher {
    async fn run(self, subsys: SubsystemHandle) -> Result<(), AppError> {
        tokio::select! {
            _ = self.run_loop() => {}
            _ = subsys.on_shutdown_requested() => {
                info!("Received shutdown request, auto list refresher is stopping");
            }
        }
        Ok(())
    }
}
