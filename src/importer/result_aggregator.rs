// ==========================================
// 平面文件导入器 - 保存与结果归类
// ==========================================
// 职责: 按插入顺序保存待保存集合，并按实体类型归类
//       created / updated / invalid
// 红线:
// - 新旧状态在第一次保存前统一快照（级联保存不影响归类）
// - 校验失败不中断，继续保存其余实体
// - 后端故障（Err）立即中止
// ==========================================

use crate::config::import_settings::ImportSettings;
use crate::domain::entity::EntityRef;
use crate::domain::result::{ImportResult, InvalidEntity};
use crate::importer::diagnostics::{time_block, Diagnostics};
use crate::importer::error::ImporterResult;
use crate::importer::importer_trait::{ImportHooks, PersistenceBackend};
use crate::importer::reconciliation::PendingSaveSet;
use chrono::{DateTime, Utc};

pub struct ResultAggregator<'a> {
    settings: &'a ImportSettings,
    backend: &'a mut dyn PersistenceBackend,
    hooks: &'a mut dyn ImportHooks,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(
        settings: &'a ImportSettings,
        backend: &'a mut dyn PersistenceBackend,
        hooks: &'a mut dyn ImportHooks,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            settings,
            backend,
            hooks,
            diagnostics,
        }
    }

    pub fn finalize(
        &mut self,
        pending: &PendingSaveSet,
        imported_at: DateTime<Utc>,
    ) -> ImporterResult<ImportResult> {
        let snapshot: Vec<(EntityRef, bool)> = pending
            .iter()
            .map(|entity| (entity, self.backend.is_new(entity)))
            .collect();

        self.hooks.about_to_save_all(pending.as_slice());

        let mut result = ImportResult::new();
        let stamp = imported_at.to_rfc3339();
        for (entity, was_new) in snapshot {
            self.hooks.about_to_save_one(entity);
            let success = self.save_one(entity, was_new, &stamp)?;

            let entity_type = self.backend.entity_type(entity);
            let outcome = result.entry(&entity_type);
            match (success, was_new) {
                (true, true) => outcome.created.push(entity),
                (true, false) => outcome.updated.push(entity),
                (false, _) => {
                    let errors = self.backend.validation_errors(entity);
                    self.diagnostics.warn(&format!(
                        "{} {} 保存失败: {}",
                        entity_type, entity, errors
                    ));
                    outcome.invalid.push(InvalidEntity { entity, errors });
                }
            }

            self.hooks.saved(entity, success);
        }

        self.hooks.finished_saving(pending.as_slice());

        for (entity_type, outcome) in result.iter() {
            self.diagnostics.info(&format!(
                "{}: 新建 {}，更新 {}，无效 {}",
                entity_type,
                outcome.created.len(),
                outcome.updated.len(),
                outcome.invalid.len()
            ));
        }

        Ok(result)
    }

    fn save_one(&mut self, entity: EntityRef, was_new: bool, stamp: &str) -> ImporterResult<bool> {
        let field = self.settings.imported_at_field.as_str();
        if self.settings.stamp_imported_at && self.backend.has_attribute(entity, field) {
            self.backend.set_attribute(entity, field, stamp)?;
        }

        let label = format!(
            "保存 {} {} {}",
            if was_new { "新建" } else { "已有" },
            self.backend.entity_type(entity),
            self.backend
                .identity(entity)
                .unwrap_or_else(|| entity.to_string())
        );

        let diagnostics = self.diagnostics;
        let backend = &mut *self.backend;
        let (saved, _elapsed) = time_block(diagnostics, &label, || backend.save(entity));
        Ok(saved?)
    }
}
