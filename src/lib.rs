pub mod admin;
pub mod args;
pub mod config;
pub mod r#const;
pub mod domain;
pub mod error;
pub mod icon;
pub mod matcher;
pub mod metrics;
pub mod pac;
pub mod remote_rule;
pub mod router;
pub mod rule_set;
pub mod service;
pub mod store;
pub mod updater;

// 重导出常用组件
pub use admin::AdminServer;
pub use args::Args;
pub use config::{Config, ServerDescriptor};
pub use domain::{normalize, DomainKey};
pub use error::AppError;
pub use icon::{IconRenderer, IconState, IconStateCache, LogIconRenderer, TabId};
pub use metrics::ProxyMetrics;
pub use pac::{PacProgram, PacSynthesizer, ProxyDirective};
pub use r#const::{storage_keys, subsystem_names};
pub use remote_rule::{AutoListRefresher, GfwListParser, PlainListParser, RemoteRuleLoader, RuleParser};
pub use router::{Mode, RoutingEngine, RoutingVerdict};
pub use rule_set::{RuleSet, RuleSets, RuleSnapshot, Tier};
pub use service::ProxyService;
pub use store::{RuleSource, Store, StoreChange};
pub use updater::{Debouncer, PacUpdater};
