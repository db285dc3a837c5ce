// ==========================================
// 平面文件导入器 - 性能统计
// ==========================================
// - PerfGuard: 作用域结束时输出耗时与期间执行的 SQL 数（target = perf）
// - install_sqlite_tracing: 统计 SQL 语句数，记录慢 SQL（target = slow_sql）
// ==========================================

use rusqlite::Connection;
use std::borrow::Cow;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const PERF_SQL_ENV: &str = "FLATFILE_IMPORTER_PERF_SQL";
pub const SLOW_SQL_MS_ENV: &str = "FLATFILE_IMPORTER_SLOW_SQL_MS";

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = const { Cell::new(0) };
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

/// SQL 统计开关
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlPerfConfig {
    pub enabled: bool,
    pub slow_ms: u64,
}

impl SqlPerfConfig {
    /// Debug 构建默认开启；环境变量可强制开关与设置阈值
    pub fn parse(perf_sql: Option<&str>, slow_sql_ms: Option<&str>) -> Self {
        let enabled = match perf_sql {
            Some(v) => is_true(v),
            None => cfg!(debug_assertions),
        };
        let slow_ms = slow_sql_ms
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
        Self { enabled, slow_ms }
    }

    pub fn from_env() -> Self {
        let perf_sql = std::env::var(PERF_SQL_ENV).ok();
        let slow_sql_ms = std::env::var(SLOW_SQL_MS_ENV).ok();
        Self::parse(perf_sql.as_deref(), slow_sql_ms.as_deref())
    }
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn truncate_sql(sql: &str, max_chars: usize) -> String {
    let s = sql.trim().replace('\n', " ");
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &s[..cut]),
        None => s,
    }
}

/// 在连接上安装 trace/profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let config = SqlPerfConfig::from_env();
    PERF_SQL_ENABLED.store(config.enabled, Ordering::Relaxed);

    if !config.enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    SLOW_SQL_THRESHOLD_MS.store(config.slow_ms, Ordering::Relaxed);
    conn.trace(Some(sql_trace_callback));
    conn.profile(Some(sql_profile_callback));
}

fn sql_trace_callback(_sql: &str) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if PERF_DEPTH.with(|d| d.get() > 0) {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn sql_profile_callback(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold > 0 && ms >= threshold {
        tracing::warn!(
            target: "slow_sql",
            duration_ms = ms,
            sql = %truncate_sql(sql, 420),
            "slow sql"
        );
        if PERF_DEPTH.with(|d| d.get() > 0) {
            SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
        }
    }
}

/// 作用域性能统计
///
/// ```ignore
/// let _perf = flatfile_importer::perf::PerfGuard::new("import_file");
/// ```
pub struct PerfGuard {
    op: Cow<'static, str>,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: impl Into<Cow<'static, str>>) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op: op.into(),
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::info!(
            target: "perf",
            op = %self.op,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            sql_count,
            slow_sql_count,
            "done"
        );

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = SqlPerfConfig::parse(Some("on"), Some(" 120 "));
        assert!(config.enabled);
        assert_eq!(config.slow_ms, 120);

        let config = SqlPerfConfig::parse(Some("0"), Some("abc"));
        assert!(!config.enabled);
        assert!(config.slow_ms > 0);
    }

    #[test]
    fn test_truncate_sql_respects_char_boundaries() {
        assert_eq!(truncate_sql("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql("SELECT\n'数据'", 9), "SELECT '数…");
    }

    #[test]
    fn test_perf_guard_measures_elapsed() {
        let mut conn = Connection::open_in_memory().unwrap();
        install_sqlite_tracing(&mut conn);
        let guard = PerfGuard::new("test");
        conn.execute_batch("CREATE TABLE t (x INTEGER);").unwrap();
        assert!(guard.elapsed() < Duration::from_secs(60));
    }
}
