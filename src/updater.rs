use crate::error::AppError;
use crate::service::ProxyService;
use crate::store::RuleSource;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemHandle};
use tracing::{debug, error, info, warn};

// 防抖器
//
// 每次触发都把截止时间推迟到 now + window，截止时间到达后才执行一次。
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // 重新开始计时
    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    // 截止时间到达时完成，未触发时永不完成
    //
    // 返回的 future 不借用 self，可以直接放进 select! 分支。
    pub fn expired(&self) -> impl Future<Output = ()> + Send + 'static {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        }
    }
}

// PAC 更新子系统
//
// 监听规则来源的变更：立即刷新路由引擎，防抖后重新生成 PAC 脚本。
pub struct PacUpdater {
    service: Arc<ProxyService>,
    source: Arc<dyn RuleSource>,
    window: Duration,
}

impl PacUpdater {
    pub fn new(service: Arc<ProxyService>, source: Arc<dyn RuleSource>, window: Duration) -> Self {
        Self {
            service,
            source,
            window,
        }
    }

    // 重新读取规则并应用到路由引擎
    fn reload(&self) {
        match self.source.read() {
            Ok(snapshot) => self.service.apply_snapshot(&snapshot),
            Err(e) => error!("Failed to reload rules: {}", e),
        }
    }

    // 重新生成 PAC 脚本
    fn rebuild(&self) {
        let result = self
            .source
            .read()
            .and_then(|snapshot| self.service.rebuild_pac(&snapshot));
        if let Err(e) = result {
            error!("Failed to rebuild PAC script: {}", e);
        }
    }

    // 运行更新循环直到 shutdown 完成或变更通道关闭
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut changes = self.source.on_change();
        let mut debouncer = Debouncer::new(self.window);

        // 启动时先同步一次
        self.reload();
        self.rebuild();
        info!(
            "PAC updater started, debounce window: {}ms",
            self.window.as_millis()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown request, PAC updater is stopping");
                    break;
                }
                change = changes.recv() => match change {
                    Ok(change) if change.touches_routing() => {
                        debug!("Routing data changed: {:?}", change.keys);
                        self.reload();
                        debouncer.trigger();
                    }
                    Ok(change) => {
                        debug!("Ignoring non-routing change: {:?}", change.keys);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("PAC updater lagged behind, {} change events skipped", skipped);
                        self.reload();
                        debouncer.trigger();
                    }
                    Err(RecvError::Closed) => {
                        info!("Rule source closed, PAC updater is stopping");
                        break;
                    }
                },
                _ = debouncer.expired() => {
                    debouncer.clear();
                    self.rebuild();
                }
            }
        }

        // 退出前处理尚未执行的重建
        if debouncer.is_pending() {
            self.rebuild();
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl IntoSubsystem<AppError> for PacUpdater {
    async fn run(self, subsys: SubsystemHandle) -> Result<(), AppError> {
        self.run_until(subsys.on_shutdown_requested()).await
    }
}
