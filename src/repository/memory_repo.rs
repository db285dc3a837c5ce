// ==========================================
// 平面文件导入器 - 内存记录 Repository
// ==========================================
// 用途: 预演导入（--dry-run）与测试；进程结束即丢弃
// ==========================================

use crate::domain::entity::KeyTuple;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{NewRecord, RecordRepository, StoredRecord};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordRepository {
    records: BTreeMap<i64, StoredRecord>,
    next_id: i64,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: i64) -> Option<&StoredRecord> {
        self.records.get(&entity_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.values()
    }
}

impl RecordRepository for MemoryRecordRepository {
    fn find_primary(
        &self,
        entity_type: &str,
        key: &KeyTuple,
    ) -> RepositoryResult<Option<StoredRecord>> {
        Ok(self
            .records
            .values()
            .find(|r| r.entity_type == entity_type && r.parent_id.is_none() && r.matches_key(key))
            .cloned())
    }

    fn find_children(&self, parent_id: i64, join_name: &str) -> RepositoryResult<Vec<StoredRecord>> {
        Ok(self
            .records
            .values()
            .filter(|r| r.parent_id == Some(parent_id) && r.join_name.as_deref() == Some(join_name))
            .cloned()
            .collect())
    }

    fn insert(&mut self, record: NewRecord<'_>) -> RepositoryResult<i64> {
        if let Some(parent_id) = record.parent_id {
            if !self.records.contains_key(&parent_id) {
                return Err(RepositoryError::ForeignKeyViolation(format!(
                    "parent_id={} 不存在",
                    parent_id
                )));
            }
        }

        self.next_id += 1;
        let entity_id = self.next_id;
        self.records.insert(
            entity_id,
            StoredRecord {
                entity_id,
                entity_type: record.entity_type.to_string(),
                parent_id: record.parent_id,
                join_name: record.join_name.map(str::to_string),
                attributes: record.attributes.clone(),
            },
        );
        Ok(entity_id)
    }

    fn update(
        &mut self,
        entity_id: i64,
        attributes: &BTreeMap<String, String>,
    ) -> RepositoryResult<()> {
        let record = self
            .records
            .get_mut(&entity_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "imported_entity".to_string(),
                id: entity_id.to_string(),
            })?;
        record.attributes = attributes.clone();
        Ok(())
    }

    fn count(&self, entity_type: &str) -> RepositoryResult<usize> {
        Ok(self
            .records
            .values()
            .filter(|r| r.entity_type == entity_type)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_insert_and_find_primary() {
        let mut repo = MemoryRecordRepository::new();
        let a = attrs(&[("id", "1"), ("name", "Alice")]);
        let id = repo
            .insert(NewRecord {
                entity_type: "customer",
                parent_id: None,
                join_name: None,
                attributes: &a,
            })
            .unwrap();

        let key: KeyTuple = vec![("id", "1")].into_iter().collect();
        let found = repo.find_primary("customer", &key).unwrap().unwrap();
        assert_eq!(found.entity_id, id);

        let other: KeyTuple = vec![("id", "2")].into_iter().collect();
        assert!(repo.find_primary("customer", &other).unwrap().is_none());
        assert!(repo.find_primary("supplier", &key).unwrap().is_none());
    }

    #[test]
    fn test_children_scoped_by_join() {
        let mut repo = MemoryRecordRepository::new();
        let parent_attrs = attrs(&[("id", "1")]);
        let parent = repo
            .insert(NewRecord {
                entity_type: "customer",
                parent_id: None,
                join_name: None,
                attributes: &parent_attrs,
            })
            .unwrap();
        let child_attrs = attrs(&[("sku", "A1")]);
        repo.insert(NewRecord {
            entity_type: "order",
            parent_id: Some(parent),
            join_name: Some("order"),
            attributes: &child_attrs,
        })
        .unwrap();

        assert_eq!(repo.find_children(parent, "order").unwrap().len(), 1);
        assert!(repo.find_children(parent, "invoice").unwrap().is_empty());
    }

    #[test]
    fn test_insert_child_with_unknown_parent_fails() {
        let mut repo = MemoryRecordRepository::new();
        let child_attrs = attrs(&[("sku", "A1")]);
        let result = repo.insert(NewRecord {
            entity_type: "order",
            parent_id: Some(42),
            join_name: Some("order"),
            attributes: &child_attrs,
        });

        assert!(matches!(result, Err(RepositoryError::ForeignKeyViolation(_))));
    }
}
