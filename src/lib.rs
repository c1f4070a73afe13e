#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 摄像头配置与运行参数
pub mod counting; // 过线判定与计数
pub mod detection; // 检测/跟踪结果适配
pub mod error; // 错误类型
pub mod orchestrator; // 多摄像头调度
pub mod persist; // 事件日志/状态/导出
pub mod session; // 单路摄像头会话

#[cfg(test)]
mod test_util;

pub use crate::config::{CameraConfig, CountingConfig, RunSettings};
pub use crate::counting::{BoundaryLine, Direction, DirectionCounts, Point2, Side};
pub use crate::detection::{Detection, DetectionSource, DetectorFactory, ReplayFactory};
pub use crate::error::{ConfigError, CounterError, DetectionStreamError, PersistenceError};
pub use crate::orchestrator::{Orchestrator, RunReport};
pub use crate::persist::{AggregateReport, CrossingEvent};
pub use crate::session::{CameraSession, SessionEnd, SessionOutcome};
