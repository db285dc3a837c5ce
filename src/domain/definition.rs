// ==========================================
// 平面文件导入器 - 实体定义
// ==========================================
// 职责: 声明主实体键/属性、关联(join)、同义列标签、必填项、清洗规则
// 来源: 代码构造 或 JSON 定义文件
// ==========================================

use crate::importer::error::{ImportError, ImporterResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

// ==========================================
// CleanRule - 复杂属性清洗规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanRule {
    /// 去除首尾空白
    Trim,
    /// 去除空白并转大写
    Upper,
    /// 去除空白并转小写
    Lower,
    /// 标志位统一为 "1"/"0"
    Flag,
}

// ==========================================
// DeclaredAttribute - 待解析列的属性声明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredAttribute {
    pub join: Option<String>,
    pub attribute: String,
}

impl DeclaredAttribute {
    pub fn primary(attribute: impl Into<String>) -> Self {
        Self {
            join: None,
            attribute: attribute.into(),
        }
    }

    pub fn joined(join: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            join: Some(join.into()),
            attribute: attribute.into(),
        }
    }
}

// ==========================================
// JoinDeclaration - 关联声明
// ==========================================
// 主实体 → 从属实体集合；keys 为集合内身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinDeclaration {
    pub name: String,

    /// 从属实体类型（缺省与 join 名相同）
    #[serde(default)]
    pub entity_type: Option<String>,

    pub keys: Vec<String>,

    #[serde(default)]
    pub attributes: Vec<String>,

    #[serde(default)]
    pub complex_attributes: Vec<String>,

    #[serde(default)]
    pub required: Vec<String>,
}

impl JoinDeclaration {
    pub fn new<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            entity_type: None,
            keys: keys.into_iter().map(Into::into).collect(),
            attributes: Vec::new(),
            complex_attributes: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_complex_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.complex_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_required<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn entity_type(&self) -> &str {
        self.entity_type.as_deref().unwrap_or(&self.name)
    }
}

// ==========================================
// ImportDefinition - 导入实体定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDefinition {
    pub entity_type: String,

    /// 主键属性（有序，至少一个）
    pub primary_keys: Vec<String>,

    #[serde(default)]
    pub attributes: Vec<String>,

    #[serde(default)]
    pub complex_attributes: Vec<String>,

    #[serde(default)]
    pub joins: Vec<JoinDeclaration>,

    /// 同义列标签: "attr" 或 "join.attr" → 可接受的其他标签
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub required: Vec<String>,

    /// 复杂属性清洗规则: "attr" 或 "join.attr" → 规则
    #[serde(default)]
    pub cleaning_rules: BTreeMap<String, CleanRule>,
}

impl ImportDefinition {
    pub fn new<I, S>(entity_type: impl Into<String>, primary_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_type: entity_type.into(),
            primary_keys: primary_keys.into_iter().map(Into::into).collect(),
            attributes: Vec::new(),
            complex_attributes: Vec::new(),
            joins: Vec::new(),
            synonyms: BTreeMap::new(),
            required: Vec::new(),
            cleaning_rules: BTreeMap::new(),
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_complex_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.complex_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_join(mut self, join: JoinDeclaration) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_synonym(mut self, attribute: impl Into<String>, label: impl Into<String>) -> Self {
        self.synonyms
            .entry(attribute.into())
            .or_default()
            .push(label.into());
        self
    }

    pub fn with_required<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_cleaning_rule(mut self, attribute: impl Into<String>, rule: CleanRule) -> Self {
        self.cleaning_rules.insert(attribute.into(), rule);
        self
    }

    /// 从 JSON 字符串加载并校验
    pub fn from_json_str(raw: &str) -> ImporterResult<Self> {
        let definition: ImportDefinition = serde_json::from_str(raw)?;
        definition.validate()?;
        Ok(definition)
    }

    /// 从 JSON 文件加载并校验
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ImporterResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// 结构校验（在任何列解析之前执行）
    pub fn validate(&self) -> ImporterResult<()> {
        if self.entity_type.trim().is_empty() {
            return Err(ImportError::InvalidDefinition(
                "entity_type 不能为空".to_string(),
            ));
        }
        if self.primary_keys.is_empty() {
            return Err(ImportError::InvalidDefinition(format!(
                "{} 未声明主键",
                self.entity_type
            )));
        }

        let mut seen = HashSet::new();
        for join in &self.joins {
            if join.name.trim().is_empty() {
                return Err(ImportError::InvalidDefinition(
                    "join 名称不能为空".to_string(),
                ));
            }
            if !seen.insert(join.name.to_lowercase()) {
                return Err(ImportError::InvalidDefinition(format!(
                    "join 名称重复: {}",
                    join.name
                )));
            }
            if join.keys.is_empty() {
                return Err(ImportError::InvalidDefinition(format!(
                    "join {} 未声明键属性",
                    join.name
                )));
            }
        }

        Ok(())
    }

    pub fn join(&self, name: &str) -> Option<&JoinDeclaration> {
        self.joins.iter().find(|j| j.name.eq_ignore_ascii_case(name))
    }

    /// 需要解析列位置的全部属性（主实体在前，join 按声明顺序）
    pub fn declared_attributes(&self) -> Vec<DeclaredAttribute> {
        let mut declared: Vec<DeclaredAttribute> = self
            .primary_keys
            .iter()
            .chain(&self.attributes)
            .chain(&self.complex_attributes)
            .map(DeclaredAttribute::primary)
            .collect();

        for join in &self.joins {
            declared.extend(
                join.keys
                    .iter()
                    .chain(&join.attributes)
                    .chain(&join.complex_attributes)
                    .map(|attr| DeclaredAttribute::joined(join.name.as_str(), attr.as_str())),
            );
        }

        declared
    }

    /// 按 "attr" / "join.attr" 查找配置项（大小写不敏感）
    pub(crate) fn scoped_lookup<'a, T>(
        map: &'a BTreeMap<String, T>,
        join: Option<&str>,
        attribute: &str,
    ) -> Option<&'a T> {
        let wanted = match join {
            Some(j) => format!("{}.{}", j, attribute).to_lowercase(),
            None => attribute.to_lowercase(),
        };
        map.iter()
            .find(|(k, _)| k.to_lowercase() == wanted)
            .map(|(_, v)| v)
    }
}
