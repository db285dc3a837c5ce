// ==========================================
// 平面文件导入器 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口，屏蔽存储细节
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

pub mod error;
pub mod memory_repo;
pub mod record_repo;
pub mod sqlite_repo;
pub mod store_backend;

pub use error::{RepositoryError, RepositoryResult};
pub use memory_repo::MemoryRecordRepository;
pub use record_repo::{NewRecord, RecordRepository, StoredRecord};
pub use sqlite_repo::SqliteRecordRepository;
pub use store_backend::{EntitySchema, StoreBackend, StoreSchema};
