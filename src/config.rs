//! 摄像头配置 - 通过JSON文件描述每路摄像头
//! Camera configuration file and run-wide settings

use crate::counting::BoundaryLine;
use crate::detection::classes::{ClassNames, DEFAULT_TARGET_CLASSES};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_WEIGHTS: &str = "yolov11m.pt";
pub const DEFAULT_SPLIT_LINE: [f64; 4] = [640.0, 0.0, 640.0, 720.0];
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// 配置文件: `{ "cameras": [ ... ] }`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CountingConfig {
    #[serde(default)]
    pub cameras: Vec<serde_json::Value>,
}

/// 单路摄像头原始配置 (所有字段可缺省,由 `validate` 校验)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RawCamera {
    id: Option<String>,
    name: Option<String>,
    source: Option<String>,
    weights: Option<String>,
    split_line: Option<Vec<f64>>,
    frame_scale: Option<f64>,
    out_video: Option<String>,
    target_classes: Option<Vec<String>>,
    class_names: Option<BTreeMap<i64, String>>,
}

/// 校验后的摄像头配置
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CameraConfig {
    pub id: String,
    pub name: String,
    /// 视频源 (回放适配器下为检测结果文件)
    pub source: String,
    pub weights: String,
    pub split_line: [f64; 4],
    pub frame_scale: f64,
    pub out_video: String,
    pub target_classes: Option<Vec<String>>,
    pub class_names: Option<BTreeMap<i64, String>>,
}

impl CameraConfig {
    /// Minimal camera with defaults for every optional field.
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            out_video: format!("{}_out.mp4", id),
            id,
            source: source.into(),
            weights: DEFAULT_WEIGHTS.to_string(),
            split_line: DEFAULT_SPLIT_LINE,
            frame_scale: 1.0,
            target_classes: None,
            class_names: None,
        }
    }

    pub fn with_split_line(mut self, split_line: [f64; 4]) -> Self {
        self.split_line = split_line;
        self
    }

    pub fn with_target_classes(mut self, classes: &[&str]) -> Self {
        self.target_classes = Some(classes.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn boundary_line(&self) -> BoundaryLine {
        BoundaryLine::from_coords(self.split_line)
    }

    pub fn class_names(&self) -> ClassNames {
        match &self.class_names {
            Some(map) => ClassNames::from_map(map.clone()),
            None => ClassNames::coco(),
        }
    }

    /// 摄像头级目标类别优先,否则使用全局设置
    pub fn resolve_target_classes(&self, settings: &RunSettings) -> Vec<String> {
        self.target_classes
            .clone()
            .unwrap_or_else(|| settings.target_classes.clone())
    }
}

impl RawCamera {
    fn validate(self, index: usize) -> Result<CameraConfig, ConfigError> {
        let id = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err(invalid(format!("#{}", index), "id", "must not be empty"))
            }
            Some(id) => id,
            None => format!("cam_{}", index),
        };
        let source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingField {
                index,
                field: "source",
            })?;

        let split_line = match self.split_line {
            None => DEFAULT_SPLIT_LINE,
            Some(v) => {
                let coords: [f64; 4] = v.as_slice().try_into().map_err(|_| {
                    invalid(&id, "split_line", format!("expected 4 numbers, got {}", v.len()))
                })?;
                if coords.iter().any(|c| !c.is_finite()) {
                    return Err(invalid(&id, "split_line", "coordinates must be finite"));
                }
                coords
            }
        };
        if BoundaryLine::from_coords(split_line).is_degenerate() {
            return Err(invalid(&id, "split_line", "endpoints must differ"));
        }

        let frame_scale = self.frame_scale.unwrap_or(1.0);
        if !frame_scale.is_finite() || frame_scale <= 0.0 {
            return Err(invalid(&id, "frame_scale", format!("{} is not > 0", frame_scale)));
        }

        if let Some(classes) = &self.target_classes {
            if classes.is_empty() {
                return Err(invalid(&id, "target_classes", "must not be empty"));
            }
        }

        Ok(CameraConfig {
            name: self.name.unwrap_or_else(|| id.clone()),
            out_video: self
                .out_video
                .unwrap_or_else(|| format!("{}_out.mp4", id)),
            weights: self.weights.unwrap_or_else(|| DEFAULT_WEIGHTS.to_string()),
            id,
            source,
            split_line,
            frame_scale,
            target_classes: self.target_classes,
            class_names: self.class_names,
        })
    }
}

fn invalid(camera: impl Into<String>, field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        camera: camera.into(),
        field,
        reason: reason.into(),
    }
}

impl CountingConfig {
    /// 从JSON文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("✅ 配置已从 {} 加载: {} 路摄像头", path.display(), config.cameras.len());
        Ok(config)
    }

    /// Validates every entry independently, so one bad camera does not block the rest.
    pub fn camera_entries(&self) -> Vec<Result<CameraConfig, ConfigError>> {
        let mut seen = HashSet::new();
        self.cameras
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let raw: RawCamera = serde_json::from_value(value.clone()).map_err(|e| {
                    invalid(format!("#{}", index), "entry", e.to_string())
                })?;
                let camera = raw.validate(index)?;
                if !seen.insert(camera.id.clone()) {
                    return Err(ConfigError::DuplicateId(camera.id));
                }
                Ok(camera)
            })
            .collect()
    }
}

/// 运行参数 (命令行)
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    /// 每路摄像头最多处理的帧数 (调试用)
    pub max_frames: Option<u64>,
    pub target_classes: Vec<String>,
    /// 连续多少帧解析失败后终止会话
    pub max_consecutive_bad_frames: u32,
    /// 超过该帧数未出现的轨迹被清除; None 表示从不清除
    pub track_idle_frames: Option<u64>,
    /// 生产线程 → 会话线程的通道容量
    pub channel_capacity: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_frames: None,
            target_classes: DEFAULT_TARGET_CLASSES.iter().map(|s| s.to_string()).collect(),
            max_consecutive_bad_frames: 3,
            track_idle_frames: None,
            channel_capacity: 60,
        }
    }
}

impl RunSettings {
    pub fn print_summary(&self) {
        info!("🎛️  输出目录: {}", self.output_dir.display());
        info!("  目标类别: {}", self.target_classes.join(", "));
        if let Some(n) = self.max_frames {
            info!("  每路最多处理 {} 帧", n);
        }
        if let Some(n) = self.track_idle_frames {
            info!("  轨迹闲置 {} 帧后清除", n);
        }
    }
}
