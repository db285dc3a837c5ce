// ==========================================
// 平面文件导入器 - 导入结果
// ==========================================
// 职责: 按实体类型归类 created / updated / invalid
// ==========================================

use crate::domain::entity::EntityRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// ==========================================
// InvalidEntity - 校验失败的实体
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidEntity {
    pub entity: EntityRef,
    pub errors: String,
}

// ==========================================
// EntityOutcome - 单一实体类型的保存结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityOutcome {
    pub created: Vec<EntityRef>,
    pub updated: Vec<EntityRef>,
    pub invalid: Vec<InvalidEntity>,
}

impl EntityOutcome {
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.invalid.len()
    }
}

// ==========================================
// ImportResult - 实体类型 → 保存结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ImportResult {
    by_type: BTreeMap<String, EntityOutcome>,
}

impl ImportResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, entity_type: &str) -> &mut EntityOutcome {
        self.by_type.entry(entity_type.to_string()).or_default()
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntityOutcome> {
        self.by_type.get(entity_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityOutcome)> {
        self.by_type.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.values().all(|o| o.total() == 0)
    }

    pub fn created_count(&self) -> usize {
        self.by_type.values().map(|o| o.created.len()).sum()
    }

    pub fn updated_count(&self) -> usize {
        self.by_type.values().map(|o| o.updated.len()).sum()
    }

    pub fn invalid_count(&self) -> usize {
        self.by_type.values().map(|o| o.invalid.len()).sum()
    }
}

// ==========================================
// ImportSummary / ImportReport - 运行汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    /// 数据行总数（不含标题行）
    pub total_rows: usize,
    /// 主键为空而跳过的行数
    pub skipped_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: String,
    pub imported_at: DateTime<Utc>,
    pub summary: ImportSummary,
    pub results: ImportResult,
    pub elapsed_ms: u64,
}
