// ==========================================
// 平面文件导入器 - 单元格读取器
// ==========================================
// 职责: (行, join, 属性) → 单元格原始文本
// 约束: 空单元格返回空字符串；未解析属性属于定义缺陷
// ==========================================

use crate::domain::entity::KeyTuple;
use crate::importer::column_resolver::{qualified_name, ColumnMap};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::importer_trait::TabularSource;

pub struct CellReader<'a> {
    source: &'a dyn TabularSource,
    columns: &'a ColumnMap,
}

impl<'a> CellReader<'a> {
    pub fn new(source: &'a dyn TabularSource, columns: &'a ColumnMap) -> Self {
        Self { source, columns }
    }

    pub fn read(&self, line: usize, attribute: &str, join: Option<&str>) -> ImporterResult<String> {
        let column = self.columns.index_of(join, attribute).ok_or_else(|| {
            ImportError::UnmappedAttribute {
                attribute: qualified_name(join, attribute),
            }
        })?;
        Ok(self.source.cell(line, column))
    }

    /// 按声明顺序读取一组键属性
    pub fn read_key(
        &self,
        line: usize,
        join: Option<&str>,
        keys: &[String],
    ) -> ImporterResult<KeyTuple> {
        let mut tuple = KeyTuple::new();
        for key in keys {
            tuple.push(key.as_str(), self.read(line, key, join)?);
        }
        Ok(tuple)
    }

    pub fn row_count(&self) -> usize {
        self.source.row_count()
    }
}

// ==========================================
// RowContext - 复杂属性处理器可见的行上下文
// ==========================================
pub struct RowContext<'a> {
    reader: &'a CellReader<'a>,
    line: usize,
    join: Option<&'a str>,
}

impl<'a> RowContext<'a> {
    pub fn new(reader: &'a CellReader<'a>, line: usize, join: Option<&'a str>) -> Self {
        Self { reader, line, join }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn join(&self) -> Option<&str> {
        self.join
    }

    /// 读取当前作用域（主实体或当前 join）下的属性
    pub fn value(&self, attribute: &str) -> ImporterResult<String> {
        self.reader.read(self.line, attribute, self.join)
    }

    pub fn primary_value(&self, attribute: &str) -> ImporterResult<String> {
        self.reader.read(self.line, attribute, None)
    }

    pub fn join_value(&self, join: &str, attribute: &str) -> ImporterResult<String> {
        self.reader.read(self.line, attribute, Some(join))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::definition::DeclaredAttribute;
    use crate::importer::column_resolver::ColumnResolver;
    use crate::importer::sheet::Sheet;

    fn fixture() -> (Sheet, ColumnMap) {
        let sheet = Sheet::from_rows(vec![
            vec!["id", "Full Name", "order.sku"],
            vec!["1", "", "A1"],
        ]);
        let declared = vec![
            DeclaredAttribute::primary("id"),
            DeclaredAttribute::primary("full_name"),
            DeclaredAttribute::joined("order", "sku"),
        ];
        let columns = ColumnResolver::new(&(), true)
            .resolve(&declared, &sheet.header())
            .unwrap();
        (sheet, columns)
    }

    #[test]
    fn test_read_normalizes_attribute_case() {
        let (sheet, columns) = fixture();
        let reader = CellReader::new(&sheet, &columns);

        assert_eq!(reader.read(2, "ID", None).unwrap(), "1");
        assert_eq!(reader.read(2, "sku", Some("Order")).unwrap(), "A1");
    }

    #[test]
    fn test_read_empty_cell_is_empty_string() {
        let (sheet, columns) = fixture();
        let reader = CellReader::new(&sheet, &columns);

        assert_eq!(reader.read(2, "full_name", None).unwrap(), "");
    }

    #[test]
    fn test_read_unmapped_attribute() {
        let (sheet, columns) = fixture();
        let reader = CellReader::new(&sheet, &columns);

        let err = reader.read(2, "qty", Some("order")).unwrap_err();
        assert!(matches!(
            err,
            ImportError::UnmappedAttribute { ref attribute } if attribute == "order.qty"
        ));
    }

    #[test]
    fn test_row_context_scopes_to_join() {
        let (sheet, columns) = fixture();
        let reader = CellReader::new(&sheet, &columns);
        let ctx = RowContext::new(&reader, 2, Some("order"));

        assert_eq!(ctx.value("sku").unwrap(), "A1");
        assert_eq!(ctx.primary_value("id").unwrap(), "1");
        assert!(ctx.value("id").is_err());
    }
}
