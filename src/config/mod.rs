// ==========================================
// 平面文件导入器 - 配置层
// ==========================================
// 职责: 导入运行参数，支持 config_kv 覆写
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod import_settings;

pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use import_settings::{ImportSettings, SecondaryQueueing, DEFAULT_IMPORTED_AT_FIELD};
