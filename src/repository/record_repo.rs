// ==========================================
// 平面文件导入器 - 记录 Repository Trait
// ==========================================
// 职责: 定义导入实体的数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::entity::KeyTuple;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// StoredRecord - 已持久化的记录
// ==========================================
// 对齐: imported_entity 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub entity_id: i64,
    pub entity_type: String,
    pub parent_id: Option<i64>,
    pub join_name: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl StoredRecord {
    /// 所有键属性逐一精确相等
    pub fn matches_key(&self, key: &KeyTuple) -> bool {
        key.iter()
            .all(|(attr, value)| self.attributes.get(attr).map(String::as_str) == Some(value))
    }
}

/// 待插入记录
#[derive(Debug, Clone, Copy)]
pub struct NewRecord<'a> {
    pub entity_type: &'a str,
    pub parent_id: Option<i64>,
    pub join_name: Option<&'a str>,
    pub attributes: &'a BTreeMap<String, String>,
}

// ==========================================
// RecordRepository Trait
// ==========================================
// 实现者: MemoryRecordRepository / SqliteRecordRepository
pub trait RecordRepository {
    /// 按键查找主记录（parent_id 为空）；多条命中时取 entity_id 最小者
    fn find_primary(&self, entity_type: &str, key: &KeyTuple)
        -> RepositoryResult<Option<StoredRecord>>;

    /// 查询某主记录在某 join 下的全部从属记录（按 entity_id 升序）
    fn find_children(&self, parent_id: i64, join_name: &str) -> RepositoryResult<Vec<StoredRecord>>;

    /// 插入记录，返回新 entity_id
    fn insert(&mut self, record: NewRecord<'_>) -> RepositoryResult<i64>;

    /// 覆盖写入属性
    fn update(&mut self, entity_id: i64, attributes: &BTreeMap<String, String>)
        -> RepositoryResult<()>;

    /// 统计某类型的记录数
    fn count(&self, entity_type: &str) -> RepositoryResult<usize>;
}
