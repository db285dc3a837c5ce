// ==========================================
// 平面文件导入器 - 导入运行参数
// ==========================================
// 职责: 单次导入运行的行为开关（可由 config_kv 覆写）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 默认的"最近导入时间"字段名
pub const DEFAULT_IMPORTED_AT_FIELD: &str = "last_imported_at";

// ==========================================
// SecondaryQueueing - 从属实体入队策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecondaryQueueing {
    /// 新主实体的从属实体随主实体级联保存，只有已持久化主实体的从属实体显式入队
    #[default]
    NewPrimaryCascades,
    /// 所有被触及的从属实体都显式入队
    AlwaysExplicit,
}

impl fmt::Display for SecondaryQueueing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecondaryQueueing::NewPrimaryCascades => write!(f, "NEW_PRIMARY_CASCADES"),
            SecondaryQueueing::AlwaysExplicit => write!(f, "ALWAYS_EXPLICIT"),
        }
    }
}

impl FromStr for SecondaryQueueing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NEW_PRIMARY_CASCADES" | "CASCADE" => Ok(SecondaryQueueing::NewPrimaryCascades),
            "ALWAYS_EXPLICIT" | "EXPLICIT" => Ok(SecondaryQueueing::AlwaysExplicit),
            other => Err(format!("未知的从属实体入队策略: {}", other)),
        }
    }
}

// ==========================================
// ImportSettings
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// 保存前写入本次导入时间
    pub stamp_imported_at: bool,
    pub imported_at_field: String,
    /// 标签匹配时下划线可写作空格
    pub underscore_synonyms: bool,
    pub secondary_queueing: SecondaryQueueing,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            stamp_imported_at: true,
            imported_at_field: DEFAULT_IMPORTED_AT_FIELD.to_string(),
            underscore_synonyms: true,
            secondary_queueing: SecondaryQueueing::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ImportSettings::default();
        assert!(settings.stamp_imported_at);
        assert_eq!(settings.imported_at_field, "last_imported_at");
        assert!(settings.underscore_synonyms);
        assert_eq!(
            settings.secondary_queueing,
            SecondaryQueueing::NewPrimaryCascades
        );
    }

    #[test]
    fn test_secondary_queueing_parse() {
        assert_eq!(
            "always_explicit".parse::<SecondaryQueueing>(),
            Ok(SecondaryQueueing::AlwaysExplicit)
        );
        assert_eq!(
            SecondaryQueueing::NewPrimaryCascades
                .to_string()
                .parse::<SecondaryQueueing>(),
            Ok(SecondaryQueueing::NewPrimaryCascades)
        );
        assert!("sometimes".parse::<SecondaryQueueing>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: ImportSettings =
            serde_json::from_str(r#"{ "stamp_imported_at": false }"#).unwrap();
        assert!(!settings.stamp_imported_at);
        assert_eq!(settings.imported_at_field, DEFAULT_IMPORTED_AT_FIELD);
    }
}
