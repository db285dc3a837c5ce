// ==========================================
// 平面文件导入器 - 配置管理器
// ==========================================
// 职责: 导入运行参数的加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// 约定: 键缺失时使用默认值；值无法解析时告警并使用默认值
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::config::import_settings::{SecondaryQueueing, DEFAULT_IMPORTED_AT_FIELD};
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（确保表结构存在）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取全部 global 配置的快照
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn get_bool_or_default(&self, key: &str, default: bool) -> RepositoryResult<bool> {
        let Some(value) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "布尔配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_stamp_imported_at(&self) -> RepositoryResult<bool> {
        self.get_bool_or_default(config_keys::STAMP_IMPORTED_AT, true)
    }

    fn get_imported_at_field(&self) -> RepositoryResult<String> {
        let value =
            self.get_config_or_default(config_keys::IMPORTED_AT_FIELD, DEFAULT_IMPORTED_AT_FIELD)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            tracing::warn!(
                config_key = config_keys::IMPORTED_AT_FIELD,
                "导入时间字段名为空，使用默认值"
            );
            return Ok(DEFAULT_IMPORTED_AT_FIELD.to_string());
        }
        Ok(trimmed.to_string())
    }

    fn get_underscore_synonyms(&self) -> RepositoryResult<bool> {
        self.get_bool_or_default(config_keys::UNDERSCORE_SYNONYMS, true)
    }

    fn get_secondary_queueing(&self) -> RepositoryResult<SecondaryQueueing> {
        let Some(value) = self.get_global_config_value(config_keys::SECONDARY_QUEUEING)? else {
            return Ok(SecondaryQueueing::default());
        };
        Ok(value.parse::<SecondaryQueueing>().unwrap_or_else(|e| {
            tracing::warn!(
                config_key = config_keys::SECONDARY_QUEUEING,
                raw_value = %value,
                error = %e,
                "入队策略配置格式错误，使用默认值"
            );
            SecondaryQueueing::default()
        }))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const STAMP_IMPORTED_AT: &str = "import.stamp_imported_at";
    pub const IMPORTED_AT_FIELD: &str = "import.imported_at_field";
    pub const UNDERSCORE_SYNONYMS: &str = "import.underscore_synonyms";
    pub const SECONDARY_QUEUEING: &str = "import.secondary_queueing";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::import_settings::ImportSettings;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(temp_file.path().to_str().unwrap()).unwrap();
        (temp_file, manager)
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let (_tmp, manager) = manager();
        assert_eq!(manager.load_settings().unwrap(), ImportSettings::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let (_tmp, manager) = manager();
        manager
            .set_global_config_value(config_keys::STAMP_IMPORTED_AT, "false")
            .unwrap();
        manager
            .set_global_config_value(config_keys::SECONDARY_QUEUEING, "ALWAYS_EXPLICIT")
            .unwrap();
        manager
            .set_global_config_value(config_keys::IMPORTED_AT_FIELD, " synced_at ")
            .unwrap();

        let settings = manager.load_settings().unwrap();
        assert!(!settings.stamp_imported_at);
        assert_eq!(settings.imported_at_field, "synced_at");
        assert_eq!(settings.secondary_queueing, SecondaryQueueing::AlwaysExplicit);
        assert!(settings.underscore_synonyms);
        assert_eq!(manager.get_config_snapshot().unwrap().len(), 3);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let (_tmp, manager) = manager();
        manager
            .set_global_config_value(config_keys::UNDERSCORE_SYNONYMS, "maybe")
            .unwrap();
        manager
            .set_global_config_value(config_keys::SECONDARY_QUEUEING, "sometimes")
            .unwrap();

        let settings = manager.load_settings().unwrap();
        assert!(settings.underscore_synonyms);
        assert_eq!(
            settings.secondary_queueing,
            SecondaryQueueing::NewPrimaryCascades
        );
    }

    #[test]
    fn test_set_overwrites_existing_value() {
        let (_tmp, manager) = manager();
        manager.set_global_config_value("k", "1").unwrap();
        manager.set_global_config_value("k", "2").unwrap();
        assert_eq!(
            manager.get_global_config_value("k").unwrap(),
            Some("2".to_string())
        );
    }
}
