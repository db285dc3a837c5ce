// ==========================================
// 平面文件导入器 - 内存表格
// ==========================================
// 职责: 以行列方式保存已解析的表格（第 1 行为标题行）
// ==========================================

use crate::importer::importer_trait::TabularSource;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// 便于测试/调用方直接用字面量构造
    pub fn from_rows<R, C, S>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn header(&self) -> Vec<String> {
        self.row(1)
    }

    /// 数据行数（不含标题行）
    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

impl TabularSource for Sheet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Vec<String> {
        index
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn cell(&self, row: usize, column: usize) -> String {
        let (Some(r), Some(c)) = (row.checked_sub(1), column.checked_sub(1)) else {
            return String::new();
        };
        self.rows
            .get(r)
            .and_then(|cells| cells.get(c))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_is_one_based() {
        let sheet = Sheet::from_rows(vec![vec!["id", "name"], vec!["1", "Alice"]]);

        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.data_row_count(), 1);
        assert_eq!(sheet.header(), vec!["id".to_string(), "name".to_string()]);
        assert_eq!(sheet.cell(2, 2), "Alice");
    }

    #[test]
    fn test_sheet_out_of_range_is_empty() {
        let sheet = Sheet::from_rows(vec![vec!["id", "name"], vec!["1"]]);

        assert_eq!(sheet.cell(2, 2), "");
        assert_eq!(sheet.cell(0, 1), "");
        assert_eq!(sheet.cell(9, 1), "");
        assert!(sheet.row(0).is_empty());
    }
}
