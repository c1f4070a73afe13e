//! 状态快照 / 最终汇总 / 多路聚合报告
//! JSON documents written beside the event log

use super::event::CrossingEvent;
use crate::counting::DirectionCounts;
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// 实时状态 (每个事件后覆盖写入)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub camera_id: String,
    pub camera_name: String,
    pub counts: DirectionCounts,
    pub last_event_time: Option<String>,
    pub events_logged: u64,
}

/// 会话结束时的完整汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub camera_id: String,
    pub camera_name: String,
    pub counts: DirectionCounts,
    pub events: Vec<CrossingEvent>,
}

/// camera_id → 最终计数
pub type AggregateReport = BTreeMap<String, DirectionCounts>;

/// Pretty JSON written to a sibling temp file, then renamed over `path`.
pub fn write_json<T: Serialize>(
    what: &'static str,
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PersistenceError::new(what, path, e.into()))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json).map_err(|e| PersistenceError::new(what, &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PersistenceError::new(what, path, e))
}
