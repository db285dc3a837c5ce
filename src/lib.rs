// ==========================================
// 平面文件导入器 - 核心库
// ==========================================
// 职责: 按列标签解析表格文件，并与已持久化的实体对账
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体句柄、定义、结果
pub mod domain;

// 数据仓储层 - 数据访问与持久化后端
pub mod repository;

// 导入层 - 列解析、对账、保存
pub mod importer;

// 配置层 - 运行参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::{ConfigManager, ImportConfigReader, ImportSettings, SecondaryQueueing};
pub use domain::{
    EntityRef, ImportDefinition, ImportReport, ImportResult, JoinDeclaration, KeyTuple,
};
pub use importer::{
    ComplexAttributeHandler, Diagnostics, FlatfileImporter, ImportError, ImportHooks,
    ImporterResult, PersistenceBackend, Sheet, TabularSource,
};
pub use repository::{
    MemoryRecordRepository, RecordRepository, RepositoryError, SqliteRecordRepository,
    StoreBackend, StoreSchema,
};

// ==========================================
// 常量定义
// ==========================================

// 版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 名称
pub const APP_NAME: &str = "平面文件导入器";
