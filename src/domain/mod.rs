// ==========================================
// 平面文件导入器 - 领域层
// ==========================================
// 职责: 实体句柄、实体定义、导入结果
// ==========================================

pub mod definition;
pub mod entity;
pub mod result;

pub use definition::{CleanRule, DeclaredAttribute, ImportDefinition, JoinDeclaration};
pub use entity::{EntityRef, KeyTuple, PrimaryKeyTuple};
pub use result::{EntityOutcome, ImportReport, ImportResult, ImportSummary, InvalidEntity};
