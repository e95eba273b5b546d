use fastproxy::{
    subsystem_names, AdminServer, AppError, Args, AutoListRefresher, Config, LogIconRenderer,
    PacSynthesizer, PacUpdater, ProxyService, RuleSource, Store,
};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use tokio_graceful_shutdown::{IntoSubsystem, SubsystemBuilder, Toplevel};
use tracing::{error, info, warn};

// 使用 mimalloc 分配器提高内存效率
#[global_allocator]
static GLOBAL: MiMalloc = mimalloc::MiMalloc;

fn init_logging(args: &Args) {
    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_line_number(false);

    // 如果启用调试模式，输出调试信息，否则只输出 info 及以上级别
    if args.debug {
        builder.with_max_level(tracing::Level::DEBUG)
    } else {
        builder.with_max_level(tracing::Level::INFO)
    }
    .init();
}

// 程序入口
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 解析命令行参数
    let args = Args::parse_args();

    // 初始化日志
    init_logging(&args);

    // 验证参数
    if let Err(e) = args.validation() {
        error!("Invalid command line arguments: {}", e);
        process::exit(1);
    }

    info!("Starting FastProxy proxy switcher");

    // 加载配置
    let config = match Config::from_file(&args.config) {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration file: {}", e);
            process::exit(1);
        }
    };

    // 如果是测试模式，成功验证配置后退出
    if args.test_config {
        info!("Configuration file validation successful");
        return Ok(());
    }

    // 打开存储并写入配置中提供的条目
    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open store {:?}: {}", config.store.path, e);
            process::exit(1);
        }
    };

    // 输出 PAC 脚本后退出
    if args.print_pac {
        let snapshot = store.read()?;
        match PacSynthesizer::synthesize(snapshot.active_server(), &snapshot.rule_sets()) {
            Ok(program) => {
                println!("{}", program);
                return Ok(());
            }
            Err(e) => {
                error!("Failed to generate PAC script: {}", e);
                process::exit(1);
            }
        }
    }

    // 创建应用组件
    let components = match create_components(config, store) {
        Ok(components) => components,
        Err(e) => {
            error!("Failed to create application components: {}", e);
            process::exit(1);
        }
    };

    // 创建优雅关闭顶层管理器
    let toplevel = Toplevel::new(|s| async move {
        // 启动管理服务器子系统
        let admin_server = components.admin_server;
        s.start(SubsystemBuilder::new(
            subsystem_names::ADMIN_SERVER,
            move |s| async move { admin_server.run(s).await },
        ));
        // 启动 PAC 更新子系统
        let pac_updater = components.pac_updater;
        s.start(SubsystemBuilder::new(
            subsystem_names::PAC_UPDATER,
            move |s| async move { pac_updater.run(s).await },
        ));
        // 启动自动列表刷新子系统
        if let Some(refresher) = components.auto_list_refresher {
            s.start(SubsystemBuilder::new(
                subsystem_names::AUTO_LIST_REFRESHER,
                move |s| async move { refresher.run(s).await },
            ));
        }
    });

    // 等待关闭
    info!("All services started, waiting for requests...");
    match toplevel
        .catch_signals()
        .handle_shutdown_requests(tokio::time::Duration::from_secs(args.shutdown_timeout))
        .await
    {
        Ok(_) => {
            info!("Application gracefully shut down");
            Ok(())
        }
        Err(e) => {
            error!("Application shutdown error: {}", e);
            process::exit(1);
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<Store>, AppError> {
    let store = Store::open(&config.store.path)?;
    store.seed_from_config(config)?;
    Ok(Arc::new(store))
}

// 应用组件
struct AppComponents {
    // 管理服务器
    admin_server: AdminServer,
    // PAC 更新器
    pac_updater: PacUpdater,
    // 自动列表刷新器（可选）
    auto_list_refresher: Option<AutoListRefresher>,
}

// 创建应用组件
fn create_components(config: Config, store: Arc<Store>) -> Result<AppComponents, AppError> {
    let service = Arc::new(ProxyService::new(
        Arc::clone(&store),
        Arc::new(LogIconRenderer),
    )?);

    // 先同步生成一次 PAC，自动模式依赖已生成的脚本
    let snapshot = service.reload_rules()?;
    service.rebuild_pac(&snapshot)?;

    if let Some(mode) = config.mode {
        if let Err(e) = service.set_mode(mode) {
            warn!("Cannot switch to configured mode {}: {}", mode, e);
        }
    }
    info!("Current proxy mode: {}", service.mode());

    // 创建管理服务器
    let admin_listen_addr: SocketAddr = config.admin_listen().parse()?;
    let admin_server = AdminServer::new(admin_listen_addr, Arc::clone(&service));

    // 创建 PAC 更新器
    let source: Arc<dyn RuleSource> = store.clone();
    let pac_updater = PacUpdater::new(Arc::clone(&service), source, config.pac.debounce_window());

    // 创建自动列表刷新器
    let http_client_config = config.http_client.clone().unwrap_or_default();
    let auto_list_refresher = match config.auto_list.clone() {
        Some(auto_list) => {
            info!("Auto list enabled, source: {}", auto_list.url);
            Some(AutoListRefresher::new(store, auto_list, http_client_config)?)
        }
        None => {
            info!("Auto list configuration not provided, auto list disabled");
            None
        }
    };

    Ok(AppComponents {
        admin_server,
        pac_updater,
        auto_list_refresher,
    })
}
