// ==========================================
// 平面文件导入器 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入运行所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::import_settings::{ImportSettings, SecondaryQueueing};
use crate::repository::error::RepositoryResult;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader {
    /// 保存前是否写入导入时间
    ///
    /// # 默认值
    /// - true
    fn get_stamp_imported_at(&self) -> RepositoryResult<bool>;

    /// 导入时间字段名
    ///
    /// # 默认值
    /// - last_imported_at
    fn get_imported_at_field(&self) -> RepositoryResult<String>;

    /// 标签匹配时下划线是否可写作空格
    ///
    /// # 默认值
    /// - true
    fn get_underscore_synonyms(&self) -> RepositoryResult<bool>;

    /// 从属实体入队策略
    ///
    /// # 默认值
    /// - NEW_PRIMARY_CASCADES
    fn get_secondary_queueing(&self) -> RepositoryResult<SecondaryQueueing>;

    /// 汇总为一次运行的 ImportSettings
    fn load_settings(&self) -> RepositoryResult<ImportSettings> {
        Ok(ImportSettings {
            stamp_imported_at: self.get_stamp_imported_at()?,
            imported_at_field: self.get_imported_at_field()?,
            underscore_synonyms: self.get_underscore_synonyms()?,
            secondary_queueing: self.get_secondary_queueing()?,
        })
    }
}
