// ==========================================
// 平面文件导入器 - SQLite 连接与表结构
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 首次打开时建表，并记录 schema_version
// ==========================================

use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FLATFILE_IMPORTER_DB_PATH";

const DB_FILE_NAME: &str = "flatfile_importer.db";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS imported_entity (
    entity_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type     TEXT NOT NULL,
    parent_id       INTEGER REFERENCES imported_entity(entity_id) ON DELETE CASCADE,
    join_name       TEXT,
    attributes_json TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_imported_entity_type
    ON imported_entity(entity_type, parent_id);
CREATE INDEX IF NOT EXISTS idx_imported_entity_parent
    ON imported_entity(parent_id, join_name);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id   TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key  TEXT NOT NULL
);
INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
    VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id   TEXT NOT NULL REFERENCES config_scope(scope_id),
    key        TEXT NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：foreign_keys 与 busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 建表（幂等），并登记当前 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
}

/// 默认数据库路径
///
/// 优先级: 环境变量 FLATFILE_IMPORTER_DB_PATH > 用户数据目录 > 当前目录
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    match dirs::data_dir() {
        Some(dir) => dir.join("flatfile-importer").join(DB_FILE_NAME),
        None => PathBuf::from(DB_FILE_NAME),
    }
}
