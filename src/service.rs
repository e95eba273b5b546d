use crate::error::AppError;
use crate::icon::{IconRenderer, IconState, TabId};
use crate::metrics::METRICS;
use crate::pac::{PacProgram, PacSynthesizer};
use crate::r#const::storage_keys;
use crate::router::{Mode, RoutingEngine, RoutingVerdict};
use crate::rule_set::RuleSnapshot;
use crate::store::{RuleSource, Store};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

// 当前活动页面
#[derive(Debug, Clone, Default)]
struct ActivePage {
    url: Option<String>,
    tab: Option<TabId>,
}

struct ServiceState {
    engine: RoutingEngine,
    page: ActivePage,
}

// 代理服务：连接存储、路由引擎、PAC 生成与图标
pub struct ProxyService {
    store: Arc<Store>,
    renderer: Arc<dyn IconRenderer>,
    state: Mutex<ServiceState>,
}

impl ProxyService {
    // 从存储中的规则与模式创建服务
    pub fn new(store: Arc<Store>, renderer: Arc<dyn IconRenderer>) -> Result<Self, AppError> {
        let snapshot = store.read()?;
        let mode = store.mode();
        let engine = RoutingEngine::new(snapshot.rule_sets(), mode);
        info!("Proxy service initialized, mode: {}", mode);

        Ok(Self {
            store,
            renderer,
            state: Mutex::new(ServiceState {
                engine,
                page: ActivePage::default(),
            }),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Mode {
        self.lock().engine.mode()
    }

    // 重新读取规则并刷新当前页面的图标
    pub fn reload_rules(&self) -> Result<RuleSnapshot, AppError> {
        let snapshot = self.store.read()?;
        self.apply_snapshot(&snapshot);
        Ok(snapshot)
    }

    pub fn apply_snapshot(&self, snapshot: &RuleSnapshot) {
        let mut state = self.lock();
        state.engine.apply_rule_sets(snapshot.rule_sets());
        let ServiceState { engine, page } = &mut *state;
        engine.refresh_icon(page.url.as_deref(), page.tab, self.renderer.as_ref());
    }

    /// 按快照重新生成 PAC 脚本并写入存储
    ///
    /// 没有激活的服务器时保留旧脚本，非直连模式回退到直连。
    /// 脚本内容未变化时不写入。
    pub fn rebuild_pac(&self, snapshot: &RuleSnapshot) -> Result<Option<PacProgram>, AppError> {
        match PacSynthesizer::synthesize(snapshot.active_server(), &snapshot.rule_sets()) {
            Ok(program) => {
                let stored = self.store.get::<PacProgram>(storage_keys::PAC_SCRIPT_DATA)?;
                if stored.as_ref() == Some(&program) {
                    debug!("PAC script unchanged, skip persisting");
                } else {
                    self.store.set(storage_keys::PAC_SCRIPT_DATA, &program)?;
                    info!("PAC script persisted ({} bytes)", program.len());
                }
                Ok(Some(program))
            }
            Err(AppError::NoActiveServer) => {
                warn!("No active proxy server, PAC script not regenerated");
                if self.mode() != Mode::Direct {
                    warn!("Falling back to direct mode");
                    self.apply_mode(Mode::Direct)?;
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 切换代理模式
    ///
    /// 自动模式需要已生成的 PAC 脚本，全局代理需要激活的服务器。
    pub fn set_mode(&self, mode: Mode) -> Result<(), AppError> {
        match mode {
            Mode::AutoPac => {
                if self
                    .store
                    .get::<PacProgram>(storage_keys::PAC_SCRIPT_DATA)?
                    .is_none()
                {
                    return Err(AppError::PacNotReady);
                }
            }
            Mode::FixedProxy => {
                if self.store.read()?.active_server().is_none() {
                    return Err(AppError::NoActiveServer);
                }
            }
            Mode::Direct => {}
        }

        self.apply_mode(mode)?;
        info!("Proxy mode set to {}", mode);
        Ok(())
    }

    fn apply_mode(&self, mode: Mode) -> Result<(), AppError> {
        self.store.set_mode(mode)?;
        METRICS
            .mode_changes_total()
            .with_label_values(&[mode.label()])
            .inc();

        let mut state = self.lock();
        state.engine.apply_mode(mode);
        let ServiceState { engine, page } = &mut *state;
        engine.refresh_icon(page.url.as_deref(), page.tab, self.renderer.as_ref());
        Ok(())
    }

    // 当前模式下提供给平台的 PAC 脚本
    pub fn served_script(&self) -> Result<PacProgram, AppError> {
        match self.mode() {
            Mode::AutoPac => self
                .store
                .get::<PacProgram>(storage_keys::PAC_SCRIPT_DATA)?
                .ok_or(AppError::PacNotReady),
            Mode::FixedProxy => {
                let snapshot = self.store.read()?;
                let server = snapshot.active_server().ok_or(AppError::NoActiveServer)?;
                PacProgram::fixed(server)
            }
            Mode::Direct => PacProgram::direct(),
        }
    }

    // 以当前模式判定主机名或页面地址
    pub fn decide(&self, target: &str) -> RoutingVerdict {
        let state = self.lock();
        let mode = state.engine.mode();
        if target.contains("://") {
            state.engine.decide_url(target, mode)
        } else {
            state.engine.decide(target, mode)
        }
    }

    // 活动页面变化，返回判定与图标状态
    pub fn report_active_page(
        &self,
        url: Option<&str>,
        tab: Option<TabId>,
    ) -> (RoutingVerdict, IconState) {
        let mut state = self.lock();
        state.page = ActivePage {
            url: url.map(str::to_string),
            tab,
        };
        state
            .engine
            .refresh_icon(url, tab, self.renderer.as_ref())
    }
}
