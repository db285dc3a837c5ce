// ==========================================
// 平面文件导入器 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 校验失败不是错误（save 返回 false），这里只有基础设施故障
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 记录错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("从属实体 {entity} 的主实体尚未持久化")]
    OrphanRecord { entity: String },

    // ===== 数据库错误 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    #[error("属性序列化失败: {0}")]
    SerializationError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

// rusqlite 错误按约束类型归类
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, Some(msg)) => match failure.code {
                rusqlite::ErrorCode::ConstraintViolation if msg.contains("FOREIGN KEY") => {
                    RepositoryError::ForeignKeyViolation(msg)
                }
                rusqlite::ErrorCode::ConstraintViolation if msg.contains("UNIQUE") => {
                    RepositoryError::UniqueConstraintViolation(msg)
                }
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    RepositoryError::LockError(msg)
                }
                _ => RepositoryError::DatabaseQueryError(msg),
            },
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "imported_entity".to_string(),
                id: "?".to_string(),
            },
            other => RepositoryError::DatabaseQueryError(other.to_string()),
        }
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
