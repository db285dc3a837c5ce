// ==========================================
// 平面文件导入器 - 列解析器
// ==========================================
// 职责: 逻辑属性名 → 物理列号（1 起）
// 规则:
// - 标题单元格与候选标签均转小写后比较，仅大小写不敏感，不做模糊匹配
// - 候选标签: 属性名、下划线换空格、自定义同义词、join 限定形式
// - 按列号递增取第一个命中的标题单元格；join 属性优先匹配限定标签
// - 任一属性找不到即整体失败，不处理任何数据行
// ==========================================

use crate::domain::definition::{DeclaredAttribute, ImportDefinition};
use crate::importer::error::{ImportError, ImporterResult};
use std::collections::HashMap;

/// 日志/错误中展示用的限定名: "attr" 或 "join.attr"
pub(crate) fn qualified_name(join: Option<&str>, attribute: &str) -> String {
    match join {
        Some(j) => format!("{}.{}", j, attribute),
        None => attribute.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ColumnKey {
    join: Option<String>,
    attribute: String,
}

impl ColumnKey {
    fn new(join: Option<&str>, attribute: &str) -> Self {
        Self {
            join: join.map(str::to_lowercase),
            attribute: attribute.to_lowercase(),
        }
    }
}

// ==========================================
// ColumnMap - (join, 属性) → 列号
// ==========================================
// 构建后只读
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    indices: HashMap<ColumnKey, usize>,
}

impl ColumnMap {
    pub fn index_of(&self, join: Option<&str>, attribute: &str) -> Option<usize> {
        self.indices.get(&ColumnKey::new(join, attribute)).copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// 按列号排序的 (限定名, 列号)，用于日志
    pub fn entries(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> = self
            .indices
            .iter()
            .map(|(k, &idx)| (qualified_name(k.join.as_deref(), &k.attribute), idx))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

// ==========================================
// SynonymProvider Trait
// ==========================================
// 用途: 为属性提供额外可接受的标题标签
pub trait SynonymProvider {
    fn synonyms(&self, join: Option<&str>, attribute: &str) -> Vec<String>;
}

impl SynonymProvider for () {
    fn synonyms(&self, _join: Option<&str>, _attribute: &str) -> Vec<String> {
        Vec::new()
    }
}

impl SynonymProvider for ImportDefinition {
    fn synonyms(&self, join: Option<&str>, attribute: &str) -> Vec<String> {
        ImportDefinition::scoped_lookup(&self.synonyms, join, attribute)
            .cloned()
            .unwrap_or_default()
    }
}

// ==========================================
// ColumnResolver
// ==========================================
pub struct ColumnResolver<'a> {
    synonyms: &'a dyn SynonymProvider,
    underscore_as_space: bool,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(synonyms: &'a dyn SynonymProvider, underscore_as_space: bool) -> Self {
        Self {
            synonyms,
            underscore_as_space,
        }
    }

    /// 属性可接受的全部标签（小写、去重、顺序稳定）: 非限定在前，join 限定在后
    pub fn label_variants(&self, join: Option<&str>, attribute: &str) -> Vec<String> {
        let (plain, qualified) = self.variant_groups(join, attribute);
        let mut variants = plain;
        for label in qualified {
            if !variants.contains(&label) {
                variants.push(label);
            }
        }
        variants
    }

    fn variant_groups(&self, join: Option<&str>, attribute: &str) -> (Vec<String>, Vec<String>) {
        let mut bases = vec![attribute.to_lowercase()];
        bases.extend(
            self.synonyms
                .synonyms(join, attribute)
                .iter()
                .map(|s| s.trim().to_lowercase()),
        );

        let push = |variants: &mut Vec<String>, label: String| {
            if !label.is_empty() && !variants.contains(&label) {
                variants.push(label);
            }
        };

        let mut plain: Vec<String> = Vec::new();
        for base in &bases {
            push(&mut plain, base.clone());
            if self.underscore_as_space {
                push(&mut plain, base.replace('_', " "));
            }
        }

        let mut qualified: Vec<String> = Vec::new();
        if let Some(j) = join {
            let j = j.to_lowercase();
            for base in &bases {
                for label in [
                    format!("{}.{}", j, base),
                    format!("{} {}", j, base),
                    format!("{}_{}", j, base),
                ] {
                    if self.underscore_as_space {
                        push(&mut qualified, label.replace('_', " "));
                    }
                    push(&mut qualified, label);
                }
            }
        }

        (plain, qualified)
    }

    /// 解析全部声明属性；任一缺失立即失败
    ///
    /// join 属性先在整行标题中找限定标签，找不到才退回非限定标签
    pub fn resolve(
        &self,
        declared: &[DeclaredAttribute],
        header_row: &[String],
    ) -> ImporterResult<ColumnMap> {
        let labels: Vec<String> = header_row
            .iter()
            .map(|cell| cell.trim().to_lowercase())
            .collect();
        let find = |variants: &[String]| labels.iter().position(|label| variants.contains(label));

        let mut map = ColumnMap::default();
        for decl in declared {
            let join = decl.join.as_deref();
            let key = ColumnKey::new(join, &decl.attribute);
            if map.indices.contains_key(&key) {
                continue;
            }

            let (plain, qualified) = self.variant_groups(join, &decl.attribute);
            match find(&qualified).or_else(|| find(&plain)) {
                Some(position) => {
                    map.indices.insert(key, position + 1);
                }
                None => {
                    return Err(ImportError::MissingColumn {
                        attribute: qualified_name(join, &decl.attribute),
                        searched: self.label_variants(join, &decl.attribute),
                    });
                }
            }
        }

        Ok(map)
    }
}
