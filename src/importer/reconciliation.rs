// ==========================================
// 平面文件导入器 - 行对账引擎
// ==========================================
// 职责: 逐行 查找或构造 主实体 → 赋值 → 处理各 join 的从属实体
// 红线:
// - 同一主键元组在一次运行内最多查找/构造一次（之后命中缓存）
// - 主键全空的行整体跳过；join 键全空只跳过该行的该 join
// - 命中缓存时不再重复给主实体赋值
// ==========================================

use crate::config::import_settings::{ImportSettings, SecondaryQueueing};
use crate::domain::definition::{ImportDefinition, JoinDeclaration};
use crate::domain::entity::{EntityRef, KeyTuple, PrimaryKeyTuple};
use crate::importer::cell_reader::{CellReader, RowContext};
use crate::importer::diagnostics::{time_block, Diagnostics};
use crate::importer::error::ImporterResult;
use crate::importer::importer_trait::{ComplexAttributeHandler, PersistenceBackend};
use std::collections::{HashMap, HashSet};

// ==========================================
// PendingSaveSet - 待保存实体集合
// ==========================================
// 按首次插入顺序迭代，成员唯一
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSaveSet {
    order: Vec<EntityRef>,
    members: HashSet<EntityRef>,
}

impl PendingSaveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 返回是否为新成员
    pub fn insert(&mut self, entity: EntityRef) -> bool {
        if self.members.insert(entity) {
            self.order.push(entity);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, entity: EntityRef) -> bool {
        self.members.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[EntityRef] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.order.iter().copied()
    }
}

/// 行处理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowStats {
    pub processed: usize,
    pub skipped: usize,
}

/// 单行处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// 主键为空，整行忽略
    Skipped,
    /// 主实体首次出现（已查找或构造）
    FirstSeen(EntityRef),
    /// 主实体命中缓存
    AlreadySeen(EntityRef),
}

// ==========================================
// ReconciliationEngine
// ==========================================
pub struct ReconciliationEngine<'a> {
    definition: &'a ImportDefinition,
    settings: &'a ImportSettings,
    backend: &'a mut dyn PersistenceBackend,
    complex_handler: &'a dyn ComplexAttributeHandler,
    diagnostics: &'a dyn Diagnostics,

    // 运行期状态
    primary_cache: HashMap<PrimaryKeyTuple, EntityRef>,
    pending: PendingSaveSet,
    stats: RowStats,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(
        definition: &'a ImportDefinition,
        settings: &'a ImportSettings,
        backend: &'a mut dyn PersistenceBackend,
        complex_handler: &'a dyn ComplexAttributeHandler,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            definition,
            settings,
            backend,
            complex_handler,
            diagnostics,
            primary_cache: HashMap::new(),
            pending: PendingSaveSet::new(),
            stats: RowStats::default(),
        }
    }

    /// 按文件顺序处理第 2 行至最后一行
    pub fn process_rows(&mut self, reader: &CellReader<'_>) -> ImporterResult<()> {
        let diagnostics = self.diagnostics;
        for line in 2..=reader.row_count() {
            let label = format!("第 {} 行", line);
            let (outcome, elapsed) =
                time_block(diagnostics, &label, || self.process_line(reader, line));
            outcome?;
            diagnostics.info(&format!(
                "处理第 {} 行耗时 {} ms",
                line,
                elapsed.as_millis()
            ));
        }
        Ok(())
    }

    pub fn process_line(
        &mut self,
        reader: &CellReader<'_>,
        line: usize,
    ) -> ImporterResult<LineOutcome> {
        let definition = self.definition;
        let key = reader.read_key(line, None, &definition.primary_keys)?;
        self.diagnostics.info(&format!("处理主键为 {} 的行", key));

        if key.is_blank() {
            self.stats.skipped += 1;
            self.diagnostics
                .info(&format!("第 {} 行主键为空，跳过", line));
            return Ok(LineOutcome::Skipped);
        }
        self.stats.processed += 1;

        let (primary, outcome) = match self.primary_cache.get(&key).copied() {
            Some(primary) => {
                self.diagnostics.info(&format!("已处理过 {}", key));
                (primary, LineOutcome::AlreadySeen(primary))
            }
            None => {
                let primary = self.find_or_build_primary(&key)?;
                self.assign_attributes(
                    reader,
                    line,
                    primary,
                    None,
                    &definition.attributes,
                    &definition.complex_attributes,
                )?;
                (primary, LineOutcome::FirstSeen(primary))
            }
        };

        // 主实体先于其从属实体入队（集合去重，重复插入无副作用）
        self.pending.insert(primary);

        for join in &definition.joins {
            self.process_join(reader, line, primary, join)?;
        }

        self.primary_cache.insert(key, primary);
        self.pending.insert(primary);

        Ok(outcome)
    }

    /// 整个运行中唯一会查询/构造主实体的位置
    fn find_or_build_primary(&mut self, key: &KeyTuple) -> ImporterResult<EntityRef> {
        match self.backend.find_by_key(key)? {
            Some(existing) => {
                self.diagnostics.info(&format!("找到已有记录 {}", key));
                Ok(existing)
            }
            None => {
                self.diagnostics.info(&format!("创建新记录 {}", key));
                Ok(self.backend.build_new(key)?)
            }
        }
    }

    fn process_join(
        &mut self,
        reader: &CellReader<'_>,
        line: usize,
        primary: EntityRef,
        join: &JoinDeclaration,
    ) -> ImporterResult<()> {
        let join_name = join.name.as_str();
        let keys = reader.read_key(line, Some(join_name), &join.keys)?;
        if keys.is_blank() {
            self.diagnostics
                .info(&format!("第 {} 行 {} 键为空，跳过该关联", line, join_name));
            return Ok(());
        }

        let secondary = match self.find_secondary(primary, join_name, &keys) {
            Some(existing) => {
                self.diagnostics.info(&format!(
                    "找到 {} 从属记录，键 {}",
                    join_name,
                    keys.values().join(", ")
                ));
                existing
            }
            None => {
                self.diagnostics.info(&format!(
                    "创建 {} 从属记录，键 {}",
                    join_name,
                    keys.values().join(", ")
                ));
                self.backend.build_secondary(primary, join_name, &keys)?
            }
        };

        self.assign_attributes(
            reader,
            line,
            secondary,
            Some(join_name),
            &join.attributes,
            &join.complex_attributes,
        )?;

        let queue = match self.settings.secondary_queueing {
            SecondaryQueueing::AlwaysExplicit => true,
            SecondaryQueueing::NewPrimaryCascades => !self.backend.is_new(primary),
        };
        if queue {
            self.pending.insert(secondary);
        }

        Ok(())
    }

    /// 在主实体集合中按键逐一精确比较
    fn find_secondary(&self, primary: EntityRef, join: &str, keys: &KeyTuple) -> Option<EntityRef> {
        self.backend
            .collection(primary, join)
            .into_iter()
            .find(|&candidate| {
                keys.iter().all(|(attr, value)| {
                    self.backend.attribute(candidate, attr).as_deref().unwrap_or("") == value
                })
            })
    }

    fn assign_attributes(
        &mut self,
        reader: &CellReader<'_>,
        line: usize,
        entity: EntityRef,
        join: Option<&str>,
        attributes: &[String],
        complex_attributes: &[String],
    ) -> ImporterResult<()> {
        for attr in attributes {
            let value = reader.read(line, attr, join)?;
            self.backend.set_attribute(entity, attr, &value)?;
        }

        let handler = self.complex_handler;
        for attr in complex_attributes {
            let ctx = RowContext::new(reader, line, join);
            handler.assign(&mut *self.backend, entity, attr, &ctx)?;
        }

        Ok(())
    }

    pub fn cached_primaries(&self) -> usize {
        self.primary_cache.len()
    }

    pub fn pending(&self) -> &PendingSaveSet {
        &self.pending
    }

    pub fn stats(&self) -> RowStats {
        self.stats
    }

    /// 结束行处理，交出待保存集合（缓存随之丢弃）
    pub fn into_pending(self) -> (PendingSaveSet, RowStats) {
        (self.pending, self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::JoinDeclaration;
    use crate::importer::column_resolver::{ColumnMap, ColumnResolver};
    use crate::importer::diagnostics::TracingDiagnostics;
    use crate::importer::importer_trait::IgnoreComplexAttributes;
    use crate::importer::sheet::Sheet;
    use crate::repository::memory_repo::MemoryRecordRepository;
    use crate::repository::store_backend::{StoreBackend, StoreSchema};

    fn customer_definition() -> ImportDefinition {
        ImportDefinition::new("customer", ["id"])
            .with_attributes(["name"])
            .with_join(JoinDeclaration::new("order", ["sku"]).with_attributes(["qty"]))
    }

    fn resolve(definition: &ImportDefinition, sheet: &Sheet) -> ColumnMap {
        ColumnResolver::new(definition, true)
            .resolve(&definition.declared_attributes(), &sheet.header())
            .unwrap()
    }

    #[test]
    fn test_pending_save_set_dedupes_in_insertion_order() {
        let mut set = PendingSaveSet::new();
        assert!(set.insert(EntityRef::new(2)));
        assert!(set.insert(EntityRef::new(1)));
        assert!(!set.insert(EntityRef::new(2)));

        assert_eq!(set.as_slice(), &[EntityRef::new(2), EntityRef::new(1)]);
        assert!(set.contains(EntityRef::new(1)));
    }

    #[test]
    fn test_repeated_primary_key_hits_cache() {
        let definition = customer_definition();
        let settings = ImportSettings::default();
        let sheet = Sheet::from_rows(vec![
            vec!["id", "name", "order.sku", "order.qty"],
            vec!["1", "Alice", "A1", "2"],
            vec!["1", "Alice", "A2", "3"],
        ]);
        let columns = resolve(&definition, &sheet);
        let reader = CellReader::new(&sheet, &columns);
        let mut backend = StoreBackend::new(
            MemoryRecordRepository::new(),
            StoreSchema::from_definition(&definition, &settings),
        );
        let diagnostics = TracingDiagnostics::new();

        let mut engine = ReconciliationEngine::new(
            &definition,
            &settings,
            &mut backend,
            &IgnoreComplexAttributes,
            &diagnostics,
        );

        let first = engine.process_line(&reader, 2).unwrap();
        let second = engine.process_line(&reader, 3).unwrap();

        let primary = match first {
            LineOutcome::FirstSeen(p) => p,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(second, LineOutcome::AlreadySeen(primary));
        assert_eq!(engine.cached_primaries(), 1);

        // 新主实体：从属实体靠级联保存，不单独入队
        assert_eq!(engine.pending().as_slice(), &[primary]);

        let (_pending, stats) = engine.into_pending();
        assert_eq!(stats, RowStats { processed: 2, skipped: 0 });
        assert_eq!(backend.collection(primary, "order").len(), 2);
    }

    #[test]
    fn test_blank_primary_key_skips_row() {
        let definition = customer_definition();
        let settings = ImportSettings::default();
        let sheet = Sheet::from_rows(vec![
            vec!["id", "name", "order.sku", "order.qty"],
            vec!["  ", "Bob", "B1", "5"],
        ]);
        let columns = resolve(&definition, &sheet);
        let reader = CellReader::new(&sheet, &columns);
        let mut backend = StoreBackend::new(
            MemoryRecordRepository::new(),
            StoreSchema::from_definition(&definition, &settings),
        );
        let diagnostics = TracingDiagnostics::new();

        let mut engine = ReconciliationEngine::new(
            &definition,
            &settings,
            &mut backend,
            &IgnoreComplexAttributes,
            &diagnostics,
        );

        assert_eq!(engine.process_line(&reader, 2).unwrap(), LineOutcome::Skipped);
        assert!(engine.pending().is_empty());
        assert_eq!(engine.stats().skipped, 1);
        drop(engine);
        assert_eq!(backend.loaded_count(), 0);
    }

    #[test]
    fn test_always_explicit_queues_secondaries_after_primary() {
        let definition = customer_definition();
        let settings = ImportSettings {
            secondary_queueing: SecondaryQueueing::AlwaysExplicit,
            ..ImportSettings::default()
        };
        let sheet = Sheet::from_rows(vec![
            vec!["id", "name", "order.sku", "order.qty"],
            vec!["1", "Alice", "A1", "2"],
        ]);
        let columns = resolve(&definition, &sheet);
        let reader = CellReader::new(&sheet, &columns);
        let mut backend = StoreBackend::new(
            MemoryRecordRepository::new(),
            StoreSchema::from_definition(&definition, &settings),
        );
        let diagnostics = TracingDiagnostics::new();

        let mut engine = ReconciliationEngine::new(
            &definition,
            &settings,
            &mut backend,
            &IgnoreComplexAttributes,
            &diagnostics,
        );
        engine.process_rows(&reader).unwrap();

        let pending = engine.pending().as_slice().to_vec();
        assert_eq!(pending.len(), 2);
        drop(engine);
        assert_eq!(backend.entity_type(pending[0]), "customer");
        assert_eq!(backend.entity_type(pending[1]), "order");
    }
}
