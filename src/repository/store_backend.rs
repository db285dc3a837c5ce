// ==========================================
// 平面文件导入器 - 持久化后端
// ==========================================
// 职责: 以实体句柄（EntityRef）管理本次运行加载/构造的实体，
//       通过 RecordRepository 完成查找与保存
// 红线:
// - 实体归后端所有，导入核心只持有句柄
// - 校验失败 save 返回 Ok(false)，错误信息可由 validation_errors 读取
// - 新主实体保存时级联保存其新的从属实体
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::domain::definition::ImportDefinition;
use crate::domain::entity::{EntityRef, KeyTuple};
use crate::importer::importer_trait::PersistenceBackend;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_repo::{NewRecord, RecordRepository, StoredRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

// ==========================================
// EntitySchema - 实体类型的字段与必填约束
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity_type: String,
    pub fields: BTreeSet<String>,
    pub required: Vec<String>,
}

impl EntitySchema {
    fn new<'a>(
        entity_type: &str,
        field_groups: impl IntoIterator<Item = &'a [String]>,
        required: &[String],
        settings: &ImportSettings,
    ) -> Self {
        let mut fields: BTreeSet<String> = field_groups
            .into_iter()
            .flat_map(|group| group.iter().cloned())
            .collect();
        fields.extend(required.iter().cloned());
        if settings.stamp_imported_at {
            fields.insert(settings.imported_at_field.clone());
        }
        Self {
            entity_type: entity_type.to_string(),
            fields,
            required: required.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSchema {
    pub primary: EntitySchema,
    /// join 名 → 从属实体 schema
    pub joins: BTreeMap<String, EntitySchema>,
}

impl StoreSchema {
    pub fn from_definition(definition: &ImportDefinition, settings: &ImportSettings) -> Self {
        let primary = EntitySchema::new(
            &definition.entity_type,
            [
                definition.primary_keys.as_slice(),
                definition.attributes.as_slice(),
                definition.complex_attributes.as_slice(),
            ],
            &definition.required,
            settings,
        );

        let joins = definition
            .joins
            .iter()
            .map(|join| {
                let schema = EntitySchema::new(
                    join.entity_type(),
                    [
                        join.keys.as_slice(),
                        join.attributes.as_slice(),
                        join.complex_attributes.as_slice(),
                    ],
                    &join.required,
                    settings,
                );
                (join.name.clone(), schema)
            })
            .collect();

        Self { primary, joins }
    }
}

// ==========================================
// EntityRecord - 运行期实体
// ==========================================
#[derive(Debug, Clone)]
struct EntityRecord {
    entity_type: String,
    /// 后端身份；None 表示尚未保存
    entity_id: Option<i64>,
    parent: Option<EntityRef>,
    join_name: Option<String>,
    attributes: BTreeMap<String, String>,
    collections: BTreeMap<String, Vec<EntityRef>>,
    errors: String,
}

impl EntityRecord {
    fn from_stored(stored: StoredRecord, parent: Option<EntityRef>) -> Self {
        Self {
            entity_type: stored.entity_type,
            entity_id: Some(stored.entity_id),
            parent,
            join_name: stored.join_name,
            attributes: stored.attributes,
            collections: BTreeMap::new(),
            errors: String::new(),
        }
    }

    fn built(
        entity_type: &str,
        parent: Option<EntityRef>,
        join_name: Option<&str>,
        seed: &KeyTuple,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id: None,
            parent,
            join_name: join_name.map(str::to_string),
            attributes: seed
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            collections: BTreeMap::new(),
            errors: String::new(),
        }
    }
}

// ==========================================
// StoreBackend
// ==========================================
pub struct StoreBackend<R: RecordRepository> {
    repo: R,
    schema: StoreSchema,
    entities: Vec<EntityRecord>,
    // entity_id → 已加载句柄（同一记录只加载一次）
    loaded: HashMap<i64, EntityRef>,
}

impl<R: RecordRepository> StoreBackend<R> {
    pub fn new(repo: R, schema: StoreSchema) -> Self {
        Self {
            repo,
            schema,
            entities: Vec::new(),
            loaded: HashMap::new(),
        }
    }

    /// 本次运行加载或构造的实体数
    pub fn loaded_count(&self) -> usize {
        self.entities.len()
    }

    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn into_repository(self) -> R {
        self.repo
    }

    fn record(&self, entity: EntityRef) -> Option<&EntityRecord> {
        self.entities.get(entity.index())
    }

    fn record_mut(&mut self, entity: EntityRef) -> RepositoryResult<&mut EntityRecord> {
        self.entities
            .get_mut(entity.index())
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "entity".to_string(),
                id: entity.to_string(),
            })
    }

    fn push(&mut self, record: EntityRecord) -> EntityRef {
        let entity = EntityRef::new(self.entities.len());
        if let Some(id) = record.entity_id {
            self.loaded.insert(id, entity);
        }
        self.entities.push(record);
        entity
    }

    fn schema_of(&self, record: &EntityRecord) -> Option<&EntitySchema> {
        match &record.join_name {
            Some(join) => self.schema.joins.get(join),
            None => Some(&self.schema.primary),
        }
    }

    fn is_new_ref(&self, entity: EntityRef) -> bool {
        self.record(entity).map_or(true, |r| r.entity_id.is_none())
    }

    /// 加载主记录并预加载其各 join 的从属记录
    fn load_primary(&mut self, stored: StoredRecord) -> RepositoryResult<EntityRef> {
        let entity_id = stored.entity_id;
        let primary = self.push(EntityRecord::from_stored(stored, None));

        let join_names: Vec<String> = self.schema.joins.keys().cloned().collect();
        for join in join_names {
            let children = self.repo.find_children(entity_id, &join)?;
            let mut refs = Vec::with_capacity(children.len());
            for child in children {
                let child_id = child.entity_id;
                let child_ref = match self.loaded.get(&child_id).copied() {
                    Some(existing) => existing,
                    None => self.push(EntityRecord::from_stored(child, Some(primary))),
                };
                refs.push(child_ref);
            }
            self.record_mut(primary)?.collections.insert(join, refs);
        }

        debug!(entity_id, "已加载主记录及其从属记录");
        Ok(primary)
    }

    /// 必填字段校验，返回错误列表
    fn missing_required(&self, record: &EntityRecord) -> Vec<String> {
        let Some(schema) = self.schema_of(record) else {
            return vec![format!("未声明的关联: {}", record.join_name.as_deref().unwrap_or(""))];
        };
        schema
            .required
            .iter()
            .filter(|field| {
                record
                    .attributes
                    .get(field.as_str())
                    .map_or(true, |v| v.trim().is_empty())
            })
            .map(|field| format!("{} 不能为空", field))
            .collect()
    }

    fn validate(&self, entity: EntityRef, was_new: bool) -> Vec<String> {
        let Some(record) = self.record(entity) else {
            return vec!["实体不存在".to_string()];
        };
        let mut errors = self.missing_required(record);

        if let Some(parent) = record.parent {
            if self.is_new_ref(parent) {
                errors.push("所属主实体尚未保存".to_string());
            }
        }

        // 新主实体保存时一并校验将被级联保存的从属实体
        if was_new {
            for (join, children) in &record.collections {
                for child in children {
                    let Some(child_record) = self.record(*child) else {
                        continue;
                    };
                    if child_record.entity_id.is_some() {
                        continue;
                    }
                    errors.extend(
                        self.missing_required(child_record)
                            .into_iter()
                            .map(|e| format!("{}: {}", join, e)),
                    );
                }
            }
        }

        errors
    }

    fn persist(&mut self, entity: EntityRef) -> RepositoryResult<i64> {
        let record = self
            .record(entity)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "entity".to_string(),
                id: entity.to_string(),
            })?;

        if let Some(entity_id) = record.entity_id {
            self.repo.update(entity_id, &record.attributes)?;
            return Ok(entity_id);
        }

        let parent_id = match record.parent {
            Some(parent) => Some(
                self.record(parent)
                    .and_then(|p| p.entity_id)
                    .ok_or_else(|| RepositoryError::OrphanRecord {
                        entity: record.entity_type.clone(),
                    })?,
            ),
            None => None,
        };

        let entity_id = self.repo.insert(NewRecord {
            entity_type: &record.entity_type,
            parent_id,
            join_name: record.join_name.as_deref(),
            attributes: &record.attributes,
        })?;

        self.record_mut(entity)?.entity_id = Some(entity_id);
        self.loaded.insert(entity_id, entity);
        Ok(entity_id)
    }
}

impl<R: RecordRepository> PersistenceBackend for StoreBackend<R> {
    fn find_by_key(&mut self, key: &KeyTuple) -> RepositoryResult<Option<EntityRef>> {
        let entity_type = self.schema.primary.entity_type.clone();
        match self.repo.find_primary(&entity_type, key)? {
            Some(stored) => match self.loaded.get(&stored.entity_id).copied() {
                Some(existing) => Ok(Some(existing)),
                None => self.load_primary(stored).map(Some),
            },
            None => Ok(None),
        }
    }

    fn build_new(&mut self, seed: &KeyTuple) -> RepositoryResult<EntityRef> {
        let entity_type = self.schema.primary.entity_type.clone();
        Ok(self.push(EntityRecord::built(&entity_type, None, None, seed)))
    }

    fn is_new(&self, entity: EntityRef) -> bool {
        self.is_new_ref(entity)
    }

    fn collection(&self, entity: EntityRef, join: &str) -> Vec<EntityRef> {
        self.record(entity)
            .and_then(|r| r.collections.get(join))
            .cloned()
            .unwrap_or_default()
    }

    fn build_secondary(
        &mut self,
        entity: EntityRef,
        join: &str,
        seed: &KeyTuple,
    ) -> RepositoryResult<EntityRef> {
        let entity_type = self
            .schema
            .joins
            .get(join)
            .map(|s| s.entity_type.clone())
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "join".to_string(),
                id: join.to_string(),
            })?;
        if self.record(entity).is_none() {
            return Err(RepositoryError::NotFound {
                entity: "entity".to_string(),
                id: entity.to_string(),
            });
        }

        let child = self.push(EntityRecord::built(&entity_type, Some(entity), Some(join), seed));
        self.record_mut(entity)?
            .collections
            .entry(join.to_string())
            .or_default()
            .push(child);
        Ok(child)
    }

    fn attribute(&self, entity: EntityRef, name: &str) -> Option<String> {
        self.record(entity)
            .and_then(|r| r.attributes.get(name))
            .cloned()
    }

    fn set_attribute(&mut self, entity: EntityRef, name: &str, value: &str) -> RepositoryResult<()> {
        self.record_mut(entity)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn has_attribute(&self, entity: EntityRef, name: &str) -> bool {
        self.record(entity).is_some_and(|r| {
            r.attributes.contains_key(name)
                || self.schema_of(r).is_some_and(|s| s.fields.contains(name))
        })
    }

    fn entity_type(&self, entity: EntityRef) -> String {
        self.record(entity)
            .map(|r| r.entity_type.clone())
            .unwrap_or_default()
    }

    fn save(&mut self, entity: EntityRef) -> RepositoryResult<bool> {
        let was_new = self.is_new_ref(entity);
        let errors = self.validate(entity, was_new);
        if !errors.is_empty() {
            self.record_mut(entity)?.errors = errors.join("; ");
            return Ok(false);
        }

        self.persist(entity)?;
        self.record_mut(entity)?.errors.clear();

        if was_new {
            let children: Vec<EntityRef> = self
                .record(entity)
                .map(|r| r.collections.values().flatten().copied().collect())
                .unwrap_or_default();
            for child in children {
                if self.is_new_ref(child) {
                    self.persist(child)?;
                }
            }
        }

        Ok(true)
    }

    fn validation_errors(&self, entity: EntityRef) -> String {
        self.record(entity)
            .map(|r| r.errors.clone())
            .unwrap_or_default()
    }

    fn identity(&self, entity: EntityRef) -> Option<String> {
        self.record(entity)
            .and_then(|r| r.entity_id)
            .map(|id| id.to_string())
    }
}
