// ==========================================
// 平面文件导入器 - SQLite 记录 Repository
// ==========================================
// 职责: imported_entity 表的 CRUD（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 存储: 属性以 JSON 对象写入 attributes_json 列
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::entity::KeyTuple;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{NewRecord, RecordRepository, StoredRecord};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// 属性名 → JSON 路径（带引号，属性名可含空格、点号）
fn json_path(attribute: &str) -> String {
    format!("$.\"{}\"", attribute.replace('"', ""))
}

pub struct SqliteRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordRepository {
    /// 打开数据库并确保表结构存在
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例（调用方负责建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, Option<i64>, Option<String>, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn into_record(
        raw: (i64, String, Option<i64>, Option<String>, String),
    ) -> RepositoryResult<StoredRecord> {
        let (entity_id, entity_type, parent_id, join_name, attributes_json) = raw;
        let attributes: BTreeMap<String, String> = serde_json::from_str(&attributes_json)?;
        Ok(StoredRecord {
            entity_id,
            entity_type,
            parent_id,
            join_name,
            attributes,
        })
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn find_primary(
        &self,
        entity_type: &str,
        key: &KeyTuple,
    ) -> RepositoryResult<Option<StoredRecord>> {
        // 键属性在 SQL 中用 json_extract 过滤，只解码命中的记录
        let mut sql = String::from(
            r#"
            SELECT entity_id, entity_type, parent_id, join_name, attributes_json
            FROM imported_entity
            WHERE entity_type = ?1 AND parent_id IS NULL"#,
        );
        let mut values: Vec<String> = vec![entity_type.to_string()];
        for (attr, value) in key.iter() {
            values.push(json_path(attr));
            values.push(value.to_string());
            sql.push_str(&format!(
                "\n              AND json_extract(attributes_json, ?{}) = ?{}",
                values.len() - 1,
                values.len()
            ));
        }
        sql.push_str("\n            ORDER BY entity_id");

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Self::map_row)?;

        for raw in rows {
            let record = Self::into_record(raw?)?;
            if record.matches_key(key) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn find_children(&self, parent_id: i64, join_name: &str) -> RepositoryResult<Vec<StoredRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT entity_id, entity_type, parent_id, join_name, attributes_json
            FROM imported_entity
            WHERE parent_id = ?1 AND join_name = ?2
            ORDER BY entity_id
            "#,
        )?;
        let rows = stmt.query_map(params![parent_id, join_name], Self::map_row)?;

        let mut records = Vec::new();
        for raw in rows {
            records.push(Self::into_record(raw?)?);
        }
        Ok(records)
    }

    fn insert(&mut self, record: NewRecord<'_>) -> RepositoryResult<i64> {
        let attributes_json = serde_json::to_string(record.attributes)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO imported_entity (
                entity_type, parent_id, join_name, attributes_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
            params![
                record.entity_type,
                record.parent_id,
                record.join_name,
                attributes_json,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(
        &mut self,
        entity_id: i64,
        attributes: &BTreeMap<String, String>,
    ) -> RepositoryResult<()> {
        let attributes_json = serde_json::to_string(attributes)?;
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE imported_entity SET attributes_json = ?1, updated_at = ?2 WHERE entity_id = ?3",
            params![attributes_json, Utc::now().to_rfc3339(), entity_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "imported_entity".to_string(),
                id: entity_id.to_string(),
            });
        }
        Ok(())
    }

    fn count(&self, entity_type: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM imported_entity WHERE entity_type = ?1",
            params![entity_type],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_repo() -> (NamedTempFile, SqliteRecordRepository) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let repo = SqliteRecordRepository::new(&db_path).unwrap();
        (temp_file, repo)
    }

    #[test]
    fn test_insert_find_update_roundtrip() {
        let (_tmp, mut repo) = open_repo();
        let mut attrs = BTreeMap::new();
        attrs.insert("id".to_string(), "1".to_string());
        attrs.insert("name".to_string(), "Alice".to_string());

        let id = repo
            .insert(NewRecord {
                entity_type: "customer",
                parent_id: None,
                join_name: None,
                attributes: &attrs,
            })
            .unwrap();

        let key: KeyTuple = vec![("id", "1")].into_iter().collect();
        let found = repo.find_primary("customer", &key).unwrap().unwrap();
        assert_eq!(found.entity_id, id);
        assert_eq!(found.attributes.get("name").map(String::as_str), Some("Alice"));

        attrs.insert("name".to_string(), "Alicia".to_string());
        repo.update(id, &attrs).unwrap();
        let found = repo.find_primary("customer", &key).unwrap().unwrap();
        assert_eq!(found.attributes.get("name").map(String::as_str), Some("Alicia"));
        assert_eq!(repo.count("customer").unwrap(), 1);
    }

    #[test]
    fn test_children_and_foreign_key() {
        let (_tmp, mut repo) = open_repo();
        let parent_attrs: BTreeMap<String, String> =
            [("id".to_string(), "1".to_string())].into_iter().collect();
        let parent = repo
            .insert(NewRecord {
                entity_type: "customer",
                parent_id: None,
                join_name: None,
                attributes: &parent_attrs,
            })
            .unwrap();

        let child_attrs: BTreeMap<String, String> =
            [("sku".to_string(), "A1".to_string())].into_iter().collect();
        repo.insert(NewRecord {
            entity_type: "order",
            parent_id: Some(parent),
            join_name: Some("order"),
            attributes: &child_attrs,
        })
        .unwrap();

        let children = repo.find_children(parent, "order").unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].parent_id, Some(parent));

        let orphan = repo.insert(NewRecord {
            entity_type: "order",
            parent_id: Some(parent + 100),
            join_name: Some("order"),
            attributes: &child_attrs,
        });
        assert!(matches!(orphan, Err(RepositoryError::ForeignKeyViolation(_))));
    }

    #[test]
    fn test_update_missing_record_is_not_found() {
        let (_tmp, mut repo) = open_repo();
        let result = repo.update(99, &BTreeMap::new());
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_find_primary_filters_key_in_sql() {
        let (_tmp, mut repo) = open_repo();
        {
            // 不匹配的记录即使属性无法解码也不会被读取
            let conn = repo.connection();
            let conn = conn.lock().unwrap();
            conn.execute(
                r#"
                INSERT INTO imported_entity (entity_type, attributes_json, created_at, updated_at)
                VALUES ('customer', '{"id": "9", "qty": 3}', '2026-01-01', '2026-01-01')
                "#,
                [],
            )
            .unwrap();
        }

        let attrs: BTreeMap<String, String> = [
            ("id".to_string(), "1".to_string()),
            ("region code".to_string(), "EU".to_string()),
        ]
        .into_iter()
        .collect();
        let id = repo
            .insert(NewRecord {
                entity_type: "customer",
                parent_id: None,
                join_name: None,
                attributes: &attrs,
            })
            .unwrap();

        let key: KeyTuple = vec![("id", "1"), ("region code", "EU")].into_iter().collect();
        let found = repo.find_primary("customer", &key).unwrap().unwrap();
        assert_eq!(found.entity_id, id);

        let other: KeyTuple = vec![("id", "1"), ("region code", "US")].into_iter().collect();
        assert!(repo.find_primary("customer", &other).unwrap().is_none());
    }
}
