// ==========================================
// 平面文件导入器 - 导入协作者 Trait
// ==========================================
// 职责: 定义核心所消费的外部接口（不包含实现）
// 接口: 表格数据源 / 文件解析器 / 持久化后端 / 复杂属性处理器 / 生命周期钩子
// ==========================================

use crate::domain::entity::{EntityRef, KeyTuple};
use crate::importer::cell_reader::RowContext;
use crate::importer::error::ImporterResult;
use crate::importer::sheet::Sheet;
use crate::repository::error::RepositoryResult;
use std::path::Path;

// ==========================================
// TabularSource Trait
// ==========================================
// 约定: 行列均从 1 开始；第 1 行为标题行，2..=row_count 为数据行
pub trait TabularSource {
    /// 总行数（含标题行）
    fn row_count(&self) -> usize;

    /// 读取整行单元格文本；越界返回空行
    fn row(&self, index: usize) -> Vec<String>;

    /// 读取单元格文本；空单元格或越界返回空字符串
    fn cell(&self, row: usize, column: usize) -> String;
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser / ExcelParser
pub trait FileParser {
    /// 读取文件第一张表为 Sheet
    fn parse_to_sheet(&self, file_path: &Path) -> ImporterResult<Sheet>;
}

// ==========================================
// PersistenceBackend Trait
// ==========================================
// 用途: 查找 / 构造 / 赋值 / 保存实体
// 实现者: StoreBackend<R: RecordRepository>
// 约定:
// - 实体归后端所有，核心只持有 EntityRef
// - save 返回 Ok(false) 表示校验拒绝（非致命）；Err 表示基础设施故障
pub trait PersistenceBackend {
    /// 按主键查找已持久化的主实体
    fn find_by_key(&mut self, key: &KeyTuple) -> RepositoryResult<Option<EntityRef>>;

    /// 构造未保存的主实体，以主键作为初始属性
    fn build_new(&mut self, seed: &KeyTuple) -> RepositoryResult<EntityRef>;

    /// 实体是否尚无后端身份
    fn is_new(&self, entity: EntityRef) -> bool;

    /// 主实体在某个 join 下的从属实体集合
    fn collection(&self, entity: EntityRef, join: &str) -> Vec<EntityRef>;

    /// 在主实体的 join 集合中构造新的从属实体
    fn build_secondary(
        &mut self,
        entity: EntityRef,
        join: &str,
        seed: &KeyTuple,
    ) -> RepositoryResult<EntityRef>;

    fn attribute(&self, entity: EntityRef, name: &str) -> Option<String>;

    fn set_attribute(&mut self, entity: EntityRef, name: &str, value: &str)
        -> RepositoryResult<()>;

    /// 实体类型是否具有该字段
    fn has_attribute(&self, entity: EntityRef, name: &str) -> bool;

    fn entity_type(&self, entity: EntityRef) -> String;

    fn save(&mut self, entity: EntityRef) -> RepositoryResult<bool>;

    /// 最近一次 save 失败的校验信息
    fn validation_errors(&self, entity: EntityRef) -> String;

    /// 后端身份（用于日志）；新实体返回 None
    fn identity(&self, entity: EntityRef) -> Option<String>;
}

// ==========================================
// ComplexAttributeHandler Trait
// ==========================================
// 用途: 对声明为"复杂"的属性执行自定义赋值（如把多值单元格拆成关联集合）
// 闭包可直接作为处理器使用
pub trait ComplexAttributeHandler {
    fn assign(
        &self,
        backend: &mut dyn PersistenceBackend,
        entity: EntityRef,
        attribute: &str,
        row: &RowContext<'_>,
    ) -> ImporterResult<()>;
}

impl<F> ComplexAttributeHandler for F
where
    F: Fn(&mut dyn PersistenceBackend, EntityRef, &str, &RowContext<'_>) -> ImporterResult<()>,
{
    fn assign(
        &self,
        backend: &mut dyn PersistenceBackend,
        entity: EntityRef,
        attribute: &str,
        row: &RowContext<'_>,
    ) -> ImporterResult<()> {
        self(backend, entity, attribute, row)
    }
}

/// 忽略所有复杂属性
pub struct IgnoreComplexAttributes;

impl ComplexAttributeHandler for IgnoreComplexAttributes {
    fn assign(
        &self,
        _backend: &mut dyn PersistenceBackend,
        _entity: EntityRef,
        _attribute: &str,
        _row: &RowContext<'_>,
    ) -> ImporterResult<()> {
        Ok(())
    }
}

// ==========================================
// ImportHooks Trait
// ==========================================
// 默认实现均为空操作
pub trait ImportHooks {
    fn about_to_save_all(&mut self, _entities: &[EntityRef]) {}

    fn about_to_save_one(&mut self, _entity: EntityRef) {}

    fn saved(&mut self, _entity: EntityRef, _success: bool) {}

    fn finished_saving(&mut self, _entities: &[EntityRef]) {}
}

pub struct NoopHooks;

impl ImportHooks for NoopHooks {}
