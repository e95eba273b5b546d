use crate::error::AppError;
use crate::icon::{IconState, TabId};
use crate::metrics;
use crate::r#const::{admin_paths, pac};
use crate::router::{Mode, RoutingEngine, RoutingVerdict};
use crate::service::ProxyService;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemHandle};
use tracing::{error, info, warn};

// 管理接口共享状态
#[derive(Clone)]
pub struct AdminState {
    service: Arc<ProxyService>,
}

// 管理接口错误响应
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::PacNotReady | AppError::NoActiveServer => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Admin request failed: {}", self.0);
        } else {
            warn!("Admin request rejected: {}", self.0);
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// 模式请求/响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: Mode,
}

// 路由判定查询参数
#[derive(Debug, Deserialize)]
pub struct DecideQuery {
    // 主机名，只做判定
    pub host: Option<String>,
    // 页面地址，判定后同时更新图标
    pub url: Option<String>,
    // 标签页ID
    pub tab: Option<TabId>,
}

// 路由判定响应
#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub target: String,
    pub mode: Mode,
    pub verdict: RoutingVerdict,
    pub icon: IconState,
}

// 构建管理接口路由
pub fn admin_routes(service: Arc<ProxyService>) -> Router {
    Router::new()
        .route(admin_paths::HEALTH, get(health_handler))
        .route(admin_paths::PAC, get(pac_handler))
        .route(admin_paths::MODE, get(get_mode_handler).put(set_mode_handler))
        .route(admin_paths::DECIDE, get(decide_handler))
        .merge(metrics::metrics_routes::<AdminState>())
        .with_state(AdminState { service })
}

// 管理服务器
pub struct AdminServer {
    // 监听地址
    listen_addr: SocketAddr,
    // 代理服务
    service: Arc<ProxyService>,
    // 停止信号接收端
    shutdown_rx: Option<oneshot::Receiver<()>>,
    // 停止信号发送端
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AdminServer {
    // 创建新的管理服务器
    pub fn new(listen_addr: SocketAddr, service: Arc<ProxyService>) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        Self {
            listen_addr,
            service,
            shutdown_rx: Some(shutdown_rx),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    // 停止管理服务器
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Admin server stop signal sent");
        }
    }

    // 启动管理服务器
    pub async fn start(&mut self) -> Result<(), AppError> {
        let app = admin_routes(Arc::clone(&self.service));

        let shutdown_rx = self
            .shutdown_rx
            .take()
            .ok_or_else(|| AppError::Internal("Admin server already started".to_string()))?;

        let listener = TcpListener::bind(self.listen_addr).await?;
        info!(
            "Admin server listening on {}, PAC script served at http://{}{}",
            self.listen_addr,
            self.listen_addr,
            admin_paths::PAC
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Admin server received shutdown signal");
            })
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl IntoSubsystem<AppError> for AdminServer {
    async fn run(mut self, subsys: SubsystemHandle) -> Result<(), AppError> {
        tokio::select! {
            res = self.start() => {
                if let Err(err) = res {
                    error!("Admin server error: {}", err);
                    Err(err)
                } else {
                    info!("Admin server stopped");
                    Ok(())
                }
            }
            _ = subsys.on_shutdown_requested() => {
                info!("Received subsystem shutdown request, admin server is stopping");
                self.shutdown();
                Ok(())
            }
        }
    }
}

// 健康检查处理程序
async fn health_handler() -> &'static str {
    "OK"
}

// 当前模式下的 PAC 脚本
async fn pac_handler(State(state): State<AdminState>) -> Result<Response, ApiError> {
    let program = state.service.served_script()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, pac::CONTENT_TYPE)],
        program.into_string(),
    )
        .into_response())
}

async fn get_mode_handler(State(state): State<AdminState>) -> Json<ModeBody> {
    Json(ModeBody {
        mode: state.service.mode(),
    })
}

async fn set_mode_handler(
    State(state): State<AdminState>,
    Json(body): Json<ModeBody>,
) -> Result<Json<ModeBody>, ApiError> {
    state.service.set_mode(body.mode)?;
    Ok(Json(ModeBody {
        mode: state.service.mode(),
    }))
}

async fn decide_handler(
    State(state): State<AdminState>,
    Query(query): Query<DecideQuery>,
) -> Result<Json<DecideResponse>, Response> {
    let service = &state.service;

    if let Some(url) = query.url {
        let (verdict, icon) = service.report_active_page(Some(&url), query.tab);
        return Ok(Json(DecideResponse {
            target: url,
            mode: service.mode(),
            verdict,
            icon,
        }));
    }

    match query.host {
        Some(host) => {
            let mode = service.mode();
            let verdict = service.decide(&host);
            Ok(Json(DecideResponse {
                target: host,
                mode,
                verdict,
                icon: RoutingEngine::icon_state(mode, &verdict),
            }))
        }
        None => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Either 'host' or 'url' query parameter is required".to_string(),
            }),
        )
            .into_response()),
    }
}
