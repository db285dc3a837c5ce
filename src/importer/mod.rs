// ==========================================
// 平面文件导入器 - 导入层
// ==========================================
// 职责: 列解析、逐行对账、保存与结果归类
// 支持: CSV, Excel (xlsx/xlsm/xls/ods), 内存表格
// ==========================================

pub mod cell_reader;
pub mod column_resolver;
pub mod data_cleaner;
pub mod diagnostics;
pub mod error;
pub mod file_parser;
pub mod flatfile_importer;
pub mod importer_trait;
pub mod reconciliation;
pub mod result_aggregator;
pub mod sheet;

// 重导出核心类型
pub use cell_reader::{CellReader, RowContext};
pub use column_resolver::{ColumnMap, ColumnResolver, SynonymProvider};
pub use data_cleaner::{CleaningHandler, DataCleaner};
pub use diagnostics::{time_block, Diagnostics, TracingDiagnostics};
pub use error::{ImportError, ImporterResult};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use flatfile_importer::FlatfileImporter;
pub use reconciliation::{LineOutcome, PendingSaveSet, ReconciliationEngine, RowStats};
pub use result_aggregator::ResultAggregator;
pub use sheet::Sheet;

// 重导出 Trait 接口
pub use importer_trait::{
    ComplexAttributeHandler, FileParser, IgnoreComplexAttributes, ImportHooks, NoopHooks,
    PersistenceBackend, TabularSource,
};
