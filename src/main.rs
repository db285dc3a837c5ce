// ==========================================
// 平面文件导入器 - 命令行入口
// ==========================================
// 用法:
//   flatfile-import data.csv --definition customer.json [--db path] [--dry-run] [--json] [--log-json]
// ==========================================

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use flatfile_importer::config::{ConfigManager, ImportConfigReader, ImportSettings};
use flatfile_importer::db::default_db_path;
use flatfile_importer::domain::{ImportDefinition, ImportReport};
use flatfile_importer::importer::FlatfileImporter;
use flatfile_importer::perf::PerfGuard;
use flatfile_importer::repository::{
    MemoryRecordRepository, RecordRepository, SqliteRecordRepository, StoreBackend, StoreSchema,
};
use flatfile_importer::{logging, APP_NAME, VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "flatfile-import")]
#[command(author, version, about = "按列标签导入 CSV/Excel 文件并与已有实体对账")]
struct Cli {
    /// 待导入文件（.csv/.xlsx/.xlsm/.xls/.ods）
    file: PathBuf,

    /// 实体定义 JSON 文件
    #[arg(short, long)]
    definition: PathBuf,

    /// SQLite 数据库路径（默认: $FLATFILE_IMPORTER_DB_PATH 或用户数据目录）
    #[arg(long)]
    db: Option<PathBuf>,

    /// 使用内存后端预演，不写数据库
    #[arg(long)]
    dry_run: bool,

    /// 不写入导入时间字段
    #[arg(long)]
    no_stamp: bool,

    /// 以 JSON 输出导入报告
    #[arg(long)]
    json: bool,

    /// 日志以 JSON 行输出到 stderr
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);
    info!(version = VERSION, "{}", APP_NAME);

    let definition = ImportDefinition::from_json_file(&cli.definition)
        .with_context(|| format!("无法读取实体定义: {}", cli.definition.display()))?;

    let _perf = PerfGuard::new("flatfile_import");
    let report = if cli.dry_run {
        let settings = apply_flags(ImportSettings::default(), &cli);
        info!("预演模式：使用内存后端");
        run_import(definition, settings, MemoryRecordRepository::new(), &cli.file)?
    } else {
        let db_path = cli.db.clone().unwrap_or_else(default_db_path);
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建数据库目录: {}", parent.display()))?;
        }
        let db_path_str = db_path
            .to_str()
            .ok_or_else(|| anyhow!("数据库路径不是有效的 UTF-8: {}", db_path.display()))?;
        info!(db_path = %db_path_str, "使用数据库");

        let settings = apply_flags(ConfigManager::new(db_path_str)?.load_settings()?, &cli);
        let repo = SqliteRecordRepository::new(db_path_str)?;
        run_import(definition, settings, repo, &cli.file)?
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn apply_flags(mut settings: ImportSettings, cli: &Cli) -> ImportSettings {
    if cli.no_stamp {
        settings.stamp_imported_at = false;
    }
    settings
}

fn run_import<R: RecordRepository>(
    definition: ImportDefinition,
    settings: ImportSettings,
    repo: R,
    file: &Path,
) -> Result<ImportReport> {
    let schema = StoreSchema::from_definition(&definition, &settings);
    let mut importer = FlatfileImporter::new(definition, settings, StoreBackend::new(repo, schema))?;
    let report = importer
        .import_file(file)
        .with_context(|| format!("导入失败: {}", file.display()))?;
    Ok(report)
}

fn print_summary(report: &ImportReport) {
    let summary = &report.summary;
    println!("导入批次: {}", report.run_id);
    println!(
        "数据行 {}，跳过 {}，新建 {}，更新 {}，无效 {}（{} ms）",
        summary.total_rows,
        summary.skipped_rows,
        summary.created,
        summary.updated,
        summary.invalid,
        report.elapsed_ms
    );
    for (entity_type, outcome) in report.results.iter() {
        println!(
            "  {}: 新建 {}，更新 {}，无效 {}",
            entity_type,
            outcome.created.len(),
            outcome.updated.len(),
            outcome.invalid.len()
        );
        for invalid in &outcome.invalid {
            println!("    {} {}", invalid.entity, invalid.errors);
        }
    }
}
