use crate::metrics::METRICS;
use serde::Serialize;
use tracing::{debug, info};

// 浏览器标签页ID
pub type TabId = i64;

// 图标状态：颜色与文字标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IconState {
    // 背景颜色
    pub color: &'static str,
    // 图标文字
    pub label: &'static str,
}

// 图标绘制器（外部协作者）
pub trait IconRenderer: Send + Sync {
    // 绘制图标，tab 为空时作用于全局
    fn draw(&self, state: &IconState, tab: Option<TabId>);
}

// 将绘制请求写入日志的绘制器，用于无界面运行
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIconRenderer;

impl IconRenderer for LogIconRenderer {
    fn draw(&self, state: &IconState, tab: Option<TabId>) {
        match tab {
            Some(tab) => info!(
                "Icon updated for tab {}: {} ({})",
                tab, state.label, state.color
            ),
            None => info!("Icon updated: {} ({})", state.label, state.color),
        }
    }
}

// 图标状态缓存
//
// 记录上一次绘制的状态，状态未变化时跳过绘制。
// 模式在外部发生变化时必须调用 invalidate，保证下一次一定重绘。
#[derive(Debug, Default)]
pub struct IconStateCache {
    last: Option<IconState>,
}

impl IconStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    // 状态变化时绘制并返回 true
    pub fn apply_if_changed(
        &mut self,
        state: IconState,
        tab: Option<TabId>,
        renderer: &dyn IconRenderer,
    ) -> bool {
        if self.last == Some(state) {
            debug!("Icon state unchanged, skip redraw: {:?}", state);
            return false;
        }

        renderer.draw(&state, tab);
        METRICS.icon_redraws_total().inc();
        self.last = Some(state);
        true
    }

    // 重置为未设置状态
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<&IconState> {
        self.last.as_ref()
    }
}
