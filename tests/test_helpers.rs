// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 测试数据库初始化、记录型诊断/钩子、计数后端、常用实体定义
// ==========================================
#![allow(dead_code)]

use flatfile_importer::config::ImportSettings;
use flatfile_importer::db::{init_schema, open_sqlite_connection};
use flatfile_importer::domain::{EntityRef, ImportDefinition, JoinDeclaration, KeyTuple};
use flatfile_importer::importer::{Diagnostics, FlatfileImporter, ImportHooks, PersistenceBackend};
use flatfile_importer::repository::{
    MemoryRecordRepository, RecordRepository, RepositoryResult, StoreBackend, StoreSchema,
};
use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use std::time::Duration;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// customer(id, name) + order(sku, qty)
pub fn customer_definition() -> ImportDefinition {
    ImportDefinition::new("customer", ["id"])
        .with_attributes(["name"])
        .with_join(JoinDeclaration::new("order", ["sku"]).with_attributes(["qty"]))
}

pub fn key(pairs: &[(&str, &str)]) -> KeyTuple {
    pairs.iter().copied().collect()
}

pub type MemoryImporter = FlatfileImporter<StoreBackend<MemoryRecordRepository>>;

pub fn importer_with<R: RecordRepository>(
    repo: R,
    definition: ImportDefinition,
    settings: ImportSettings,
) -> FlatfileImporter<StoreBackend<R>> {
    let schema = StoreSchema::from_definition(&definition, &settings);
    FlatfileImporter::new(definition, settings, StoreBackend::new(repo, schema))
        .expect("实体定义应当有效")
}

pub fn memory_importer(definition: ImportDefinition) -> MemoryImporter {
    importer_with(
        MemoryRecordRepository::new(),
        definition,
        ImportSettings::default(),
    )
}

// ==========================================
// RecordingDiagnostics - 记录全部诊断输出
// ==========================================
#[derive(Clone, Default)]
pub struct RecordingDiagnostics {
    pub infos: Rc<RefCell<Vec<String>>>,
    pub warnings: Rc<RefCell<Vec<String>>>,
    pub timings: Rc<RefCell<Vec<String>>>,
}

impl Diagnostics for RecordingDiagnostics {
    fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }

    fn timing(&self, label: &str, _elapsed: Duration) {
        self.timings.borrow_mut().push(label.to_string());
    }
}

// ==========================================
// RecordingHooks - 记录生命周期钩子调用
// ==========================================
#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub events: Rc<RefCell<Vec<String>>>,
}

impl ImportHooks for RecordingHooks {
    fn about_to_save_all(&mut self, entities: &[EntityRef]) {
        self.events
            .borrow_mut()
            .push(format!("about_to_save_all({})", entities.len()));
    }

    fn about_to_save_one(&mut self, entity: EntityRef) {
        self.events
            .borrow_mut()
            .push(format!("about_to_save_one({})", entity));
    }

    fn saved(&mut self, entity: EntityRef, success: bool) {
        self.events
            .borrow_mut()
            .push(format!("saved({}, {})", entity, success));
    }

    fn finished_saving(&mut self, entities: &[EntityRef]) {
        self.events
            .borrow_mut()
            .push(format!("finished_saving({})", entities.len()));
    }
}

// ==========================================
// CountingBackend - 统计后端调用次数
// ==========================================
pub struct CountingBackend<B> {
    pub inner: B,
    pub finds: usize,
    pub builds: usize,
    pub secondary_builds: usize,
    pub saves: usize,
}

impl<B> CountingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            finds: 0,
            builds: 0,
            secondary_builds: 0,
            saves: 0,
        }
    }

    pub fn total_calls(&self) -> usize {
        self.finds + self.builds + self.secondary_builds + self.saves
    }
}

impl<B: PersistenceBackend> PersistenceBackend for CountingBackend<B> {
    fn find_by_key(&mut self, key: &KeyTuple) -> RepositoryResult<Option<EntityRef>> {
        self.finds += 1;
        self.inner.find_by_key(key)
    }

    fn build_new(&mut self, seed: &KeyTuple) -> RepositoryResult<EntityRef> {
        self.builds += 1;
        self.inner.build_new(seed)
    }

    fn is_new(&self, entity: EntityRef) -> bool {
        self.inner.is_new(entity)
    }

    fn collection(&self, entity: EntityRef, join: &str) -> Vec<EntityRef> {
        self.inner.collection(entity, join)
    }

    fn build_secondary(
        &mut self,
        entity: EntityRef,
        join: &str,
        seed: &KeyTuple,
    ) -> RepositoryResult<EntityRef> {
        self.secondary_builds += 1;
        self.inner.build_secondary(entity, join, seed)
    }

    fn attribute(&self, entity: EntityRef, name: &str) -> Option<String> {
        self.inner.attribute(entity, name)
    }

    fn set_attribute(&mut self, entity: EntityRef, name: &str, value: &str) -> RepositoryResult<()> {
        self.inner.set_attribute(entity, name, value)
    }

    fn has_attribute(&self, entity: EntityRef, name: &str) -> bool {
        self.inner.has_attribute(entity, name)
    }

    fn entity_type(&self, entity: EntityRef) -> String {
        self.inner.entity_type(entity)
    }

    fn save(&mut self, entity: EntityRef) -> RepositoryResult<bool> {
        self.saves += 1;
        self.inner.save(entity)
    }

    fn validation_errors(&self, entity: EntityRef) -> String {
        self.inner.validation_errors(entity)
    }

    fn identity(&self, entity: EntityRef) -> Option<String> {
        self.inner.identity(entity)
    }
}

pub type CountingMemoryBackend = CountingBackend<StoreBackend<MemoryRecordRepository>>;

pub fn counting_importer(
    definition: ImportDefinition,
    settings: ImportSettings,
) -> FlatfileImporter<CountingMemoryBackend> {
    let schema = StoreSchema::from_definition(&definition, &settings);
    let backend = CountingBackend::new(StoreBackend::new(MemoryRecordRepository::new(), schema));
    FlatfileImporter::new(definition, settings, backend).expect("实体定义应当有效")
}
