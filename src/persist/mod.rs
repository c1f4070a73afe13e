/// 持久化系统 (Persistence)
///
/// - event:    过线事件记录
/// - emitter:  追加日志 + 实时状态
/// - snapshot: 状态/汇总/聚合JSON
/// - export:   CSV导出
pub mod emitter;
pub mod event;
pub mod export;
pub mod snapshot;

pub use emitter::EventEmitter;
pub use event::{CrossingEvent, Timestamp};
pub use snapshot::{AggregateReport, FinalSummary, LiveStatus};

use std::path::{Path, PathBuf};

pub const AGGREGATE_FILE: &str = "aggregate_counts_live.json";

/// 单路摄像头的输出文件
#[derive(Clone, Debug, PartialEq)]
pub struct SessionPaths {
    pub events_log: PathBuf,
    pub live_status: PathBuf,
    pub events_csv: PathBuf,
    pub final_summary: PathBuf,
}

impl SessionPaths {
    pub fn new(output_dir: &Path, camera_id: &str) -> Self {
        Self {
            events_log: output_dir.join(format!("{}_events.ndjson", camera_id)),
            live_status: output_dir.join(format!("{}_summary_live.json", camera_id)),
            events_csv: output_dir.join(format!("{}_events.csv", camera_id)),
            final_summary: output_dir.join(format!("{}_final_summary.json", camera_id)),
        }
    }
}

pub fn aggregate_path(output_dir: &Path) -> PathBuf {
    output_dir.join(AGGREGATE_FILE)
}
