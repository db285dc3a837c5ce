// ==========================================
// 平面文件导入器 - 文件解析器实现
// ==========================================
// 支持: CSV (.csv) / Excel (.xlsx/.xlsm/.xls) / ODS (.ods)
// 说明: 保留全部行（csv 跳过的空行补为空行），行号与源文件一致
// ==========================================

use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::importer_trait::{FileParser, TabularSource};
use crate::importer::sheet::Sheet;
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

const EXCEL_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImporterResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn clean_cell(value: &str) -> String {
    // Excel 导出的 CSV 常带 UTF-8 BOM
    value.trim_start_matches('\u{feff}').trim().to_string()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_sheet(&self, file_path: &Path) -> ImporterResult<Sheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false) // 标题行作为第 1 行保留
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut sheet = Sheet::default();
        for result in reader.records() {
            let record = result?;
            // csv 会跳过空行，按记录起始行号补齐
            if let Some(position) = record.position() {
                let line = position.line() as usize;
                while sheet.row_count() + 1 < line {
                    sheet.push_row(Vec::new());
                }
            }
            sheet.push_row(record.iter().map(clean_cell).collect());
        }

        if sheet.row_count() == 0 {
            return Err(ImportError::EmptySource);
        }

        Ok(sheet)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_sheet(&self, file_path: &Path) -> ImporterResult<Sheet> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if !EXCEL_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        let mut sheet = Sheet::default();
        for row in range.rows() {
            sheet.push_row(row.iter().map(|cell| clean_cell(&cell.to_string())).collect());
        }

        if sheet.row_count() == 0 {
            return Err(ImportError::EmptySource);
        }

        Ok(sheet)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImporterResult<Sheet> {
        let path = file_path.as_ref();
        let ext = extension_of(path);

        match ext.as_str() {
            "csv" => CsvParser.parse_to_sheet(path),
            e if EXCEL_EXTENSIONS.contains(&e) => ExcelParser.parse_to_sheet(path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_csv_parser_keeps_header_as_first_row() {
        let file = csv_file(&["id,Full Name", "1, Alice ", "2,Bob"]);

        let sheet = CsvParser.parse_to_sheet(file.path()).unwrap();

        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.cell(1, 2), "Full Name");
        assert_eq!(sheet.cell(2, 2), "Alice");
    }

    #[test]
    fn test_csv_parser_keeps_blank_rows_for_line_numbers() {
        let file = csv_file(&["id,name", "1,Alice", ",", "2,Bob"]);

        let sheet = CsvParser.parse_to_sheet(file.path()).unwrap();

        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.cell(4, 1), "2");
    }

    #[test]
    fn test_csv_parser_pads_empty_lines() {
        let file = csv_file(&["id,name", "1,Alice", "", "2,Bob"]);

        let sheet = CsvParser.parse_to_sheet(file.path()).unwrap();

        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.cell(3, 1), "");
        assert_eq!(sheet.cell(4, 1), "2");
        assert_eq!(sheet.cell(4, 2), "Bob");
    }

    #[test]
    fn test_csv_parser_strips_bom() {
        let file = csv_file(&["\u{feff}id,name", "1,Alice"]);

        let sheet = CsvParser.parse_to_sheet(file.path()).unwrap();

        assert_eq!(sheet.cell(1, 1), "id");
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse_to_sheet(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let result = UniversalFileParser.parse("data.txt");
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }
}
