use crate::error::AppError;
use crate::r#const::shutdown_timeout;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

// 代理切换服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fastproxy",
    author,
    version,
    about = "A lightweight proxy switcher compiling per-domain routing rules into a PAC script\n\n\
             Key Features:\n\
             - Rule Tiers: Whitelist (direct), temporary, user and GFWList-derived proxy rules\n\
             - Suffix Matching: A rule covers the domain itself and every subdomain\n\
             - PAC Generation: Self-contained script served over HTTP, rebuilt after rule changes\n\
             - Proxy Modes: Direct, fixed proxy and automatic (PAC) switching\n\
             - Auto List: Periodic GFWList download with retry, authentication and proxy support\n\
             - Usability: Simple YAML configuration, Configuration validation, Command-line interface"
)]
pub struct Args {
    // 配置文件路径
    #[arg(short, long, default_value = "./config.yaml")]
    pub config: PathBuf,

    // 测试配置
    #[arg(
        short = 't',
        long = "test",
        action = ArgAction::SetTrue,
        help = "Test configuration file for validity and exit"
    )]
    pub test_config: bool,

    // 输出 PAC 脚本
    #[arg(
        short = 'p',
        long = "print-pac",
        action = ArgAction::SetTrue,
        help = "Generate the PAC script from the configured rules, print it and exit"
    )]
    pub print_pac: bool,

    // 启用调试日志
    #[arg(
        short = 'd',
        long = "debug",
        action = ArgAction::SetTrue,
        help = "Enable debug level logging for detailed output"
    )]
    pub debug: bool,

    // 关闭超时
    #[arg(
        long = "shutdown-timeout",
        help = "Maximum time in seconds to wait for complete shutdown",
        default_value_t = shutdown_timeout::DEFAULT
    )]
    pub shutdown_timeout: u64,
}

impl Args {
    // 解析命令行参数
    pub fn parse_args() -> Self {
        Args::parse()
    }

    // 验证参数
    pub fn validation(&self) -> Result<(), AppError> {
        if self.shutdown_timeout < shutdown_timeout::MIN
            || self.shutdown_timeout > shutdown_timeout::MAX
        {
            return Err(AppError::InvalidShutdownTimeout);
        }
        Ok(())
    }
}
