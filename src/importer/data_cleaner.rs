// ==========================================
// 平面文件导入器 - 数据清洗
// ==========================================
// 职责: TRIM / UPPER / LOWER / 标志位标准化
// 用法: CleaningHandler 作为复杂属性处理器，按定义中的清洗规则赋值
// ==========================================

use crate::domain::definition::{CleanRule, ImportDefinition};
use crate::domain::entity::EntityRef;
use crate::importer::cell_reader::RowContext;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::importer_trait::{ComplexAttributeHandler, PersistenceBackend};
use std::collections::BTreeMap;

pub struct DataCleaner;

impl DataCleaner {
    pub fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    /// 空白视为缺失
    pub fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 标志位统一为 "1" / "0"，无法识别的值视为否
    pub fn clean_flag(&self, value: Option<String>) -> Option<String> {
        self.normalize_null(value).map(|v| {
            match v.to_uppercase().as_str() {
                "1" | "Y" | "YES" | "是" | "TRUE" => "1".to_string(),
                _ => "0".to_string(),
            }
        })
    }

    pub fn apply(&self, rule: CleanRule, raw: &str) -> String {
        match rule {
            CleanRule::Trim => self.clean_text(raw, false),
            CleanRule::Upper => self.clean_text(raw, true),
            CleanRule::Lower => raw.trim().to_lowercase(),
            CleanRule::Flag => self
                .clean_flag(Some(raw.to_string()))
                .unwrap_or_default(),
        }
    }
}

// ==========================================
// CleaningHandler - 按规则清洗的复杂属性处理器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CleaningHandler {
    rules: BTreeMap<String, CleanRule>,
}

impl CleaningHandler {
    pub fn from_definition(definition: &ImportDefinition) -> Self {
        Self {
            rules: definition.cleaning_rules.clone(),
        }
    }
}

impl ComplexAttributeHandler for CleaningHandler {
    fn assign(
        &self,
        backend: &mut dyn PersistenceBackend,
        entity: EntityRef,
        attribute: &str,
        row: &RowContext<'_>,
    ) -> ImporterResult<()> {
        let raw = row.value(attribute)?;
        // 未配置规则的复杂属性只做 TRIM
        let rule = ImportDefinition::scoped_lookup(&self.rules, row.join(), attribute)
            .copied()
            .unwrap_or(CleanRule::Trim);
        let cleaned = DataCleaner.apply(rule, &raw);

        backend
            .set_attribute(entity, attribute, &cleaned)
            .map_err(|e| ImportError::ComplexAttribute {
                line: row.line(),
                attribute: attribute.to_string(),
                message: e.to_string(),
            })
    }
}
