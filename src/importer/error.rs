// ==========================================
// 平面文件导入器 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.xlsx/.xlsm/.xls/.ods）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("数据源为空: 缺少标题行")]
    EmptySource,

    // ===== 列解析错误（致命，整个导入中止）=====
    #[error("找不到标题为 \"{attribute}\" 的列（已尝试: {searched:?}），未导入任何数据")]
    MissingColumn {
        attribute: String,
        searched: Vec<String>,
    },

    #[error("属性 \"{attribute}\" 未经过列解析（实体定义缺陷）")]
    UnmappedAttribute { attribute: String },

    // ===== 定义错误 =====
    #[error("实体定义无效: {0}")]
    InvalidDefinition(String),

    #[error("定义文件解析失败: {0}")]
    DefinitionParseError(String),

    #[error("复杂属性赋值失败 (行 {line}, 属性 {attribute}): {message}")]
    ComplexAttribute {
        line: usize,
        attribute: String,
        message: String,
    },

    // ===== 持久化错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::DefinitionParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImportError>;
