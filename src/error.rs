//! 错误类型
//! Error taxonomy for configuration, detection streams and persistence

use std::path::PathBuf;
use thiserror::Error;

/// 摄像头配置错误 (会话启动前即失败)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("camera #{index}: missing field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("camera `{camera}`: invalid `{field}`: {reason}")]
    InvalidField {
        camera: String,
        field: &'static str,
        reason: String,
    },

    #[error("camera id `{0}` is configured more than once")]
    DuplicateId(String),
}

/// 检测/跟踪数据流错误
#[derive(Debug, Error)]
pub enum DetectionStreamError {
    /// 数据源不可用,当前会话终止
    #[error("detection source failed: {0}")]
    Source(String),

    /// 单帧数据无法解析,可以跳过
    #[error("malformed detections at frame {frame}: {reason}")]
    MalformedFrame { frame: u64, reason: String },
}

impl DetectionStreamError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. })
    }
}

/// 持久化错误 (事件日志/状态快照/导出写入失败),绝不静默吞掉
#[derive(Debug, Error)]
#[error("failed to write {what} at {path}: {source}")]
pub struct PersistenceError {
    pub what: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl PersistenceError {
    pub fn new(what: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            what,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum CounterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    DetectionStream(#[from] DetectionStreamError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// 会话线程 panic (仅并发模式)
    #[error("session worker panicked: {0}")]
    WorkerPanicked(String),
}

pub type Result<T, E = CounterError> = std::result::Result<T, E>;
