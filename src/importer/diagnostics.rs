// ==========================================
// 平面文件导入器 - 诊断协作者
// ==========================================
// 职责: 导入过程的日志与计时通过注入的 Diagnostics 输出
// 默认实现: TracingDiagnostics（转发到 tracing）
// ==========================================

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub trait Diagnostics {
    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn timing(&self, label: &str, elapsed: Duration);
}

/// 计时执行闭包，返回闭包结果与耗时，并上报给 diagnostics
pub fn time_block<T>(
    diagnostics: &dyn Diagnostics,
    label: &str,
    f: impl FnOnce() -> T,
) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();
    diagnostics.timing(label, elapsed);
    (value, elapsed)
}

// ==========================================
// TracingDiagnostics
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics {
    run_id: Option<String>,
}

impl TracingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
        }
    }
}

impl Diagnostics for TracingDiagnostics {
    fn info(&self, message: &str) {
        info!(run_id = self.run_id.as_deref().unwrap_or("-"), "{}", message);
    }

    fn warn(&self, message: &str) {
        warn!(run_id = self.run_id.as_deref().unwrap_or("-"), "{}", message);
    }

    fn timing(&self, label: &str, elapsed: Duration) {
        debug!(
            target: "perf",
            run_id = self.run_id.as_deref().unwrap_or("-"),
            op = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        timings: RefCell<Vec<String>>,
    }

    impl Diagnostics for Recorder {
        fn info(&self, _message: &str) {}

        fn warn(&self, _message: &str) {}

        fn timing(&self, label: &str, _elapsed: Duration) {
            self.timings.borrow_mut().push(label.to_string());
        }
    }

    #[test]
    fn test_time_block_reports_label_and_returns_value() {
        let recorder = Recorder::default();

        let (value, _elapsed) = time_block(&recorder, "第 2 行", || 40 + 2);

        assert_eq!(value, 42);
        assert_eq!(recorder.timings.borrow().as_slice(), ["第 2 行".to_string()]);
    }
}
