// 应用常量定义

//
// 配置参数限制常量
//

// 应用关闭等待时间限制
pub mod shutdown_timeout {
    // 默认值
    pub const DEFAULT: u64 = 30;
    // 最小值
    pub const MIN: u64 = 1;
    // 最大值
    pub const MAX: u64 = 120;
}

// HTTP客户端配置限制
pub mod http_client_limits {
    // 默认连接超时（秒）
    pub const DEFAULT_CONNECT_TIMEOUT: u64 = 5;
    // 最小连接超时（秒）
    pub const MIN_CONNECT_TIMEOUT: u64 = 1;
    // 最大连接超时（秒）
    pub const MAX_CONNECT_TIMEOUT: u64 = 120;
    // 默认请求超时（秒）
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;
    // 最小请求超时（秒）
    pub const MIN_REQUEST_TIMEOUT: u64 = 1;
    // 最大请求超时（秒）
    pub const MAX_REQUEST_TIMEOUT: u64 = 1200;
    // 默认空闲超时（秒）
    pub const DEFAULT_IDLE_TIMEOUT: u64 = 10;
    // 最小空闲超时（秒）
    pub const MIN_IDLE_TIMEOUT: u64 = 5;
    // 最大空闲超时（秒）
    pub const MAX_IDLE_TIMEOUT: u64 = 1800;
    // 默认keepalive时间（秒）
    pub const DEFAULT_KEEPALIVE: u32 = 30;
    // 最小keepalive时间（秒）
    pub const MIN_KEEPALIVE: u32 = 5;
    // 最大keepalive时间（秒）
    pub const MAX_KEEPALIVE: u32 = 600;
}

// 重试配置限制
pub mod retry_limits {
    // 最小重试次数
    pub const MIN_ATTEMPTS: u32 = 1;
    // 最大重试次数
    pub const MAX_ATTEMPTS: u32 = 100;
    // 最小重试延迟（秒）
    pub const MIN_DELAY: u32 = 1;
    // 最大重试延迟（秒）
    pub const MAX_DELAY: u32 = 120;
}

// 远程规则文件大小限制
pub mod remote_rule_limits {
    // 默认最大文件大小（字节）- 10MB
    pub const DEFAULT_MAX_SIZE: usize = 10 * 1024 * 1024;
    // 最小文件大小（字节）- 1KB
    pub const MIN_SIZE: usize = 1024;
    // 最大文件大小（字节）- 50MB
    pub const MAX_SIZE: usize = 50 * 1024 * 1024;
    // 最小自动更新间隔（秒）
    pub const MIN_UPDATE_INTERVAL: u64 = 60;
    // 最大自动更新间隔（秒）- 7天
    pub const MAX_UPDATE_INTERVAL: u64 = 7 * 24 * 3600;
}

// 远程规则默认值
pub mod remote_rule_defaults {
    // 上次更新时间的本地时间格式
    pub const LAST_UPDATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
    // 默认 GFWList 地址
    pub const GFWLIST_URL: &str =
        "https://raw.githubusercontent.com/gfwlist/gfwlist/master/gfwlist.txt";
    // 无论列表内容如何都会加入的种子域名
    pub const SEED_DOMAINS: [&str; 4] = ["google.com", "youtube.com", "github.com", "openai.com"];
}

// PAC 重建防抖窗口限制（毫秒）
pub mod debounce_limits {
    // 默认值
    pub const DEFAULT_MS: u64 = 500;
    // 最小值
    pub const MIN_MS: u64 = 0;
    // 最大值
    pub const MAX_MS: u64 = 60_000;
}

// 端口限制
pub mod port_limits {
    // 最小端口
    pub const MIN_PORT: u16 = 1;
    // 最大端口
    pub const MAX_PORT: u16 = 65535;
}

//
// 存储键常量（与浏览器扩展的存储键保持一致）
//
pub mod storage_keys {
    // 服务器列表
    pub const SERVER_LIST: &str = "serverList";
    // 当前激活的服务器ID
    pub const ACTIVE_SERVER_ID: &str = "activeServerId";
    // 强制代理规则
    pub const USER_RULES: &str = "userRules";
    // 强制直连规则（白名单）
    pub const USER_WHITELIST: &str = "userWhitelist";
    // 临时代理规则
    pub const TEMP_RULES: &str = "tempRules";
    // 自动列表（GFWList）域名
    pub const GFW_DOMAINS: &str = "gfwDomains";
    // 自动列表条目数
    pub const RULE_COUNT: &str = "ruleCount";
    // 自动列表上次更新时间
    pub const LAST_UPDATE: &str = "lastUpdate";
    // 自动列表地址
    pub const GFWLIST_URL: &str = "gfwlistUrl";
    // 预先生成的 PAC 脚本
    pub const PAC_SCRIPT_DATA: &str = "pacScriptData";
    // 当前代理模式
    pub const PROXY_MODE: &str = "proxyMode";

    // 影响路由判定或 PAC 内容的键
    pub const ROUTING_KEYS: [&str; 6] = [
        SERVER_LIST,
        ACTIVE_SERVER_ID,
        USER_RULES,
        USER_WHITELIST,
        TEMP_RULES,
        GFW_DOMAINS,
    ];
}

//
// PAC 脚本常量
//
pub mod pac {
    // 直连指令
    pub const DIRECT: &str = "DIRECT";
    // HTTP 代理关键字
    pub const PROXY_KEYWORD: &str = "PROXY";
    // SOCKS5 代理关键字
    pub const SOCKS5_KEYWORD: &str = "SOCKS5";
    // 仅识别 SOCKS 关键字的客户端使用的回退关键字
    pub const SOCKS_FALLBACK_KEYWORD: &str = "SOCKS";
    // 入口函数名
    pub const ENTRY_FUNCTION: &str = "FindProxyForURL";
    // PAC 内容类型
    pub const CONTENT_TYPE: &str = "application/x-ns-proxy-autoconfig";
}

//
// 图标状态常量
//
pub mod icon_tokens {
    // 蓝色：直连
    pub const BLUE: &str = "#2196F3";
    // 绿色：代理
    pub const GREEN: &str = "#4CAF50";
    // 浅绿：自动列表代理
    pub const LIGHT_GREEN: &str = "#8BC34A";
    // 橙色：临时代理
    pub const ORANGE: &str = "#FF9800";
    // 灰色：未匹配
    pub const GREY: &str = "#9E9E9E";

    // 直连模式标签
    pub const LABEL_DIRECT: &str = "D";
    // 全局代理模式标签
    pub const LABEL_PROXY: &str = "P";
    // 自动分流模式标签
    pub const LABEL_AUTO: &str = "A";
}

//
// 指标标签常量
//

// 规则层级标签
pub mod tier_labels {
    // 白名单
    pub const WHITELIST: &str = "whitelist";
    // 临时规则
    pub const TEMPORARY: &str = "temporary";
    // 用户规则
    pub const USER_RULES: &str = "user_rules";
    // 自动列表
    pub const AUTO_LIST: &str = "auto_list";
    // 未匹配
    pub const NONE: &str = "none";
}

// 模式标签
pub mod mode_labels {
    // 直连
    pub const DIRECT: &str = "direct";
    // 全局代理
    pub const FIXED_PROXY: &str = "fixed_servers";
    // 自动分流
    pub const AUTO_PAC: &str = "pac_script";
}

// 远程规则拉取结果标签
pub mod fetch_labels {
    // 成功
    pub const SUCCESS: &str = "success";
    // 失败
    pub const FAILURE: &str = "failure";
}

// 子系统名称
pub mod subsystem_names {
    // 管理服务器子系统
    pub const ADMIN_SERVER: &str = "admin_server";
    // PAC 更新子系统
    pub const PAC_UPDATER: &str = "pac_updater";
    // 自动列表刷新子系统
    pub const AUTO_LIST_REFRESHER: &str = "auto_list_refresher";
}

// 服务器默认值
pub mod server_defaults {
    // 默认管理服务器监听地址
    pub const DEFAULT_ADMIN_LISTEN: &str = "127.0.0.1:9000";
    // 默认存储文件路径
    pub const DEFAULT_STORE_PATH: &str = "./fastproxy.json";
}

// 路由器常量
pub mod router {
    // 通配符常量
    pub mod wildcards {
        // 前缀通配符
        pub const PREFIX: &str = "*.";
        // 点分隔符
        pub const DOT: char = '.';
        // www 前缀
        pub const WWW_PREFIX: &str = "www.";
    }
}

// 管理接口路径
pub mod admin_paths {
    // 健康检查
    pub const HEALTH: &str = "/health";
    // PAC 脚本
    pub const PAC: &str = "/proxy.pac";
    // 代理模式
    pub const MODE: &str = "/mode";
    // 路由判定
    pub const DECIDE: &str = "/decide";
}
