// ==========================================
// 平面文件导入器 - 导入主流程
// ==========================================
// 职责: 串联一次导入运行
// 流程: 列解析 → 逐行对账 → 保存与归类
// 红线:
// - 列解析失败时不查找、不构造、不保存任何实体
// - 同一次运行内所有实体使用同一个导入时间
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::domain::definition::ImportDefinition;
use crate::domain::result::{ImportReport, ImportResult, ImportSummary};
use crate::importer::cell_reader::CellReader;
use crate::importer::column_resolver::{ColumnMap, ColumnResolver};
use crate::importer::data_cleaner::CleaningHandler;
use crate::importer::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::{
    ComplexAttributeHandler, ImportHooks, NoopHooks, PersistenceBackend, TabularSource,
};
use crate::importer::reconciliation::{PendingSaveSet, ReconciliationEngine, RowStats};
use crate::importer::result_aggregator::ResultAggregator;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};
use uuid::Uuid;

// ==========================================
// FlatfileImporter
// ==========================================
pub struct FlatfileImporter<B: PersistenceBackend> {
    definition: ImportDefinition,
    settings: ImportSettings,
    backend: B,

    // 可替换协作者
    complex_handler: Box<dyn ComplexAttributeHandler>,
    hooks: Box<dyn ImportHooks>,
    // 缺省时每次运行使用带 run_id 的 TracingDiagnostics
    diagnostics: Option<Box<dyn Diagnostics>>,
}

impl<B: PersistenceBackend> FlatfileImporter<B> {
    /// 创建导入器；实体定义在此处完成结构校验
    pub fn new(
        definition: ImportDefinition,
        settings: ImportSettings,
        backend: B,
    ) -> ImporterResult<Self> {
        definition.validate()?;
        let complex_handler = Box::new(CleaningHandler::from_definition(&definition));
        Ok(Self {
            definition,
            settings,
            backend,
            complex_handler,
            hooks: Box::new(NoopHooks),
            diagnostics: None,
        })
    }

    pub fn with_complex_handler(mut self, handler: impl ComplexAttributeHandler + 'static) -> Self {
        self.complex_handler = Box::new(handler);
        self
    }

    pub fn with_hooks(mut self, hooks: impl ImportHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Some(Box::new(diagnostics));
        self
    }

    pub fn definition(&self) -> &ImportDefinition {
        &self.definition
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// 为全部声明属性解析列位置（第 1 行为标题行）
    pub fn resolve_columns(&self, source: &dyn TabularSource) -> ImporterResult<ColumnMap> {
        if source.row_count() == 0 {
            return Err(ImportError::EmptySource);
        }
        let header = source.row(1);
        ColumnResolver::new(&self.definition, self.settings.underscore_synonyms)
            .resolve(&self.definition.declared_attributes(), &header)
    }

    /// 逐行对账，返回待保存集合
    pub fn process_rows(
        &mut self,
        source: &dyn TabularSource,
        columns: &ColumnMap,
        diagnostics: &dyn Diagnostics,
    ) -> ImporterResult<(PendingSaveSet, RowStats)> {
        let reader = CellReader::new(source, columns);
        let mut engine = ReconciliationEngine::new(
            &self.definition,
            &self.settings,
            &mut self.backend,
            self.complex_handler.as_ref(),
            diagnostics,
        );
        engine.process_rows(&reader)?;
        debug!(cached = engine.cached_primaries(), "行处理完成");
        Ok(engine.into_pending())
    }

    /// 保存待保存集合并归类结果
    pub fn finalize(
        &mut self,
        pending: &PendingSaveSet,
        imported_at: DateTime<Utc>,
        diagnostics: &dyn Diagnostics,
    ) -> ImporterResult<ImportResult> {
        ResultAggregator::new(
            &self.settings,
            &mut self.backend,
            self.hooks.as_mut(),
            diagnostics,
        )
        .finalize(pending, imported_at)
    }

    /// 执行一次完整导入
    #[instrument(skip(self, source), fields(entity_type = %self.definition.entity_type, run_id))]
    pub fn import(&mut self, source: &dyn TabularSource) -> ImporterResult<ImportReport> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        // 注入的 diagnostics 在运行结束后放回，供下一次运行使用
        let injected = self.diagnostics.take();
        let default_diagnostics = TracingDiagnostics::with_run_id(run_id.as_str());
        let outcome = match injected.as_deref() {
            Some(diagnostics) => self.run(source, diagnostics),
            None => self.run(source, &default_diagnostics),
        };
        self.diagnostics = injected;
        let (results, stats, imported_at) = outcome?;

        let summary = ImportSummary {
            total_rows: source.row_count().saturating_sub(1),
            skipped_rows: stats.skipped,
            created: results.created_count(),
            updated: results.updated_count(),
            invalid: results.invalid_count(),
        };
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            run_id = %run_id,
            total_rows = summary.total_rows,
            skipped = summary.skipped_rows,
            created = summary.created,
            updated = summary.updated,
            invalid = summary.invalid,
            elapsed_ms,
            "导入完成"
        );

        Ok(ImportReport {
            run_id,
            imported_at,
            summary,
            results,
            elapsed_ms,
        })
    }

    /// 读取文件（按扩展名选择解析器）并导入
    pub fn import_file<P: AsRef<Path>>(&mut self, file_path: P) -> ImporterResult<ImportReport> {
        let path = file_path.as_ref();
        info!(file_path = %path.display(), "开始导入文件");
        let sheet = UniversalFileParser.parse(path)?;
        self.import(&sheet)
    }

    fn run(
        &mut self,
        source: &dyn TabularSource,
        diagnostics: &dyn Diagnostics,
    ) -> ImporterResult<(ImportResult, RowStats, DateTime<Utc>)> {
        let columns = self.resolve_columns(source)?;
        for (name, column) in columns.entries() {
            diagnostics.info(&format!("{} 在第 {} 列", name, column));
        }

        // 整次运行共用一个导入时间，在行处理开始时取得
        let imported_at = Utc::now();
        let (pending, stats) = self.process_rows(source, &columns, diagnostics)?;
        diagnostics.info(&format!("共 {} 个实体待保存", pending.len()));

        let results = self.finalize(&pending, imported_at, diagnostics)?;
        Ok((results, stats, imported_at))
    }
}
