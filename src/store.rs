use crate::config::{Config, ServerDescriptor};
use crate::error::AppError;
use crate::r#const::storage_keys;
use crate::router::Mode;
use crate::rule_set::RuleSnapshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use validator::Validate;

// 变更通知通道容量
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// 存储变更事件，只包含值真正发生变化的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub keys: Vec<String>,
}

impl StoreChange {
    // 是否影响路由判定或 PAC 内容
    pub fn touches_routing(&self) -> bool {
        self.keys
            .iter()
            .any(|key| storage_keys::ROUTING_KEYS.contains(&key.as_str()))
    }
}

/// 规则来源
///
/// 路由引擎与 PAC 生成只通过这个接口读取规则，变更通过广播通道通知。
pub trait RuleSource: Send + Sync {
    // 读取当前的规则与服务器快照
    fn read(&self) -> Result<RuleSnapshot, AppError>;

    // 订阅变更事件
    fn on_change(&self) -> broadcast::Receiver<StoreChange>;
}

// 键值存储，持久化为单个 JSON 文件
//
// 键名与浏览器扩展的存储键一致，没有路径时只保存在内存中。
pub struct Store {
    path: Option<PathBuf>,
    data: RwLock<Map<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Store {
    // 打开存储文件，文件不存在时从空存储开始
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&content)? {
                    Value::Object(map) => map,
                    _ => {
                        return Err(AppError::Store(format!(
                            "Store file {:?} does not contain a JSON object",
                            path
                        )))
                    }
                }
            }
        } else {
            info!("Store file {:?} not found, starting with an empty store", path);
            Map::new()
        };

        debug!("Store opened: {:?}, {} keys", path, data.len());
        Ok(Self::with_data(Some(path), data))
    }

    // 仅在内存中的存储
    pub fn in_memory() -> Self {
        Self::with_data(None, Map::new())
    }

    fn with_data(path: Option<PathBuf>, data: Map<String, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            data: RwLock::new(data),
            changes,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    // 读取原始值
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.read_guard().get(key).cloned()
    }

    // 读取并反序列化，缺失或为 null 时返回 None
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.get_raw(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    // 读取字符串列表，忽略非字符串条目
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get_raw(key) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                warn!("Store key '{}' is not a list, ignored: {}", key, other);
                Vec::new()
            }
        }
    }

    // 写入单个键
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        self.set_many(vec![(key, serde_json::to_value(value)?)])
    }

    // 删除单个键
    pub fn remove(&self, key: &str) -> Result<(), AppError> {
        self.set_many(vec![(key, Value::Null)])
    }

    // 批量写入并持久化，只通知值发生变化的键
    //
    // 写入 null 等同于删除。
    pub fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<(), AppError> {
        let changed = {
            let mut data = self.write_guard();
            let mut changed = Vec::new();
            for (key, value) in entries {
                let previous = if value.is_null() {
                    data.remove(key)
                } else {
                    data.insert(key.to_string(), value.clone())
                };
                let unchanged = match &previous {
                    Some(prev) => *prev == value,
                    None => value.is_null(),
                };
                if !unchanged {
                    changed.push(key.to_string());
                }
            }

            if changed.is_empty() {
                return Ok(());
            }
            self.persist(&data)?;
            changed
        };

        debug!("Store keys changed: {:?}", changed);
        // 没有订阅者时发送失败，忽略即可
        let _ = self.changes.send(StoreChange { keys: changed });
        Ok(())
    }

    // 写入临时文件后替换，避免写入中断导致文件损坏
    fn persist(&self, data: &Map<String, Value>) -> Result<(), AppError> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let content = serde_json::to_string_pretty(data)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    // 当前代理模式，未设置时为直连
    pub fn mode(&self) -> Mode {
        match self.get::<Mode>(storage_keys::PROXY_MODE) {
            Ok(mode) => mode.unwrap_or_default(),
            Err(e) => {
                warn!("Stored proxy mode is invalid, falling back to direct: {}", e);
                Mode::Direct
            }
        }
    }

    pub fn set_mode(&self, mode: Mode) -> Result<(), AppError> {
        self.set(storage_keys::PROXY_MODE, &mode)
    }

    // 用配置文件中提供的条目覆盖存储，未提供的保持原样
    pub fn seed_from_config(&self, config: &Config) -> Result<(), AppError> {
        let mut entries: Vec<(&str, Value)> = Vec::new();

        if let Some(servers) = &config.servers {
            entries.push((storage_keys::SERVER_LIST, serde_json::to_value(servers)?));
        }
        if let Some(active) = &config.active_server {
            entries.push((storage_keys::ACTIVE_SERVER_ID, Value::String(active.clone())));
        }
        if let Some(rules) = &config.rules {
            if let Some(whitelist) = &rules.whitelist {
                entries.push((storage_keys::USER_WHITELIST, serde_json::to_value(whitelist)?));
            }
            if let Some(temporary) = &rules.temporary {
                entries.push((storage_keys::TEMP_RULES, serde_json::to_value(temporary)?));
            }
            if let Some(user_rules) = &rules.user_rules {
                entries.push((storage_keys::USER_RULES, serde_json::to_value(user_rules)?));
            }
        }

        if entries.is_empty() {
            return Ok(());
        }

        info!("Seeding store with {} entries from configuration", entries.len());
        self.set_many(entries)
    }

    // 服务器列表，跳过无法解析或校验失败的条目
    fn servers(&self) -> Vec<ServerDescriptor> {
        let items = match self.get_raw(storage_keys::SERVER_LIST) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ServerDescriptor>(item) {
                Ok(server) => match server.validate() {
                    Ok(()) => Some(server),
                    Err(e) => {
                        warn!("Skipping invalid server '{}': {}", server.id, e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Skipping invalid server entry: {}", e);
                    None
                }
            })
            .collect()
    }

    // 激活的服务器ID，兼容数字形式
    fn active_server_id(&self) -> Option<String> {
        match self.get_raw(storage_keys::ACTIVE_SERVER_ID)? {
            Value::String(id) if !id.is_empty() => Some(id),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl RuleSource for Store {
    fn read(&self) -> Result<RuleSnapshot, AppError> {
        Ok(RuleSnapshot {
            whitelist: self.string_list(storage_keys::USER_WHITELIST),
            temporary: self.string_list(storage_keys::TEMP_RULES),
            user_rules: self.string_list(storage_keys::USER_RULES),
            auto_list: self.string_list(storage_keys::GFW_DOMAINS),
            servers: self.servers(),
            active_server_id: self.active_server_id(),
        })
    }

    fn on_change(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
