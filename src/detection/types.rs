/// 检测/跟踪数据结构定义
/// Canonical detection records handed from the adapter to the counting core
use crate::counting::Point2;

/// 检测框 (Detection bounding box), 左上/右下角坐标
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 中心点
    pub fn centroid(&self) -> Point2 {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x1: self.x1 * factor,
            y1: self.y1 * factor,
            x2: self.x2 * factor,
            y2: self.y2 * factor,
        }
    }
}

/// 已跟踪的单个目标 (仅在当前帧有效)
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    /// 跟踪器分配的持久ID
    pub track_id: i64,
    pub class_name: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BBox, track_id: i64, class_name: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            track_id,
            class_name: class_name.into(),
            confidence,
        }
    }

    pub fn centroid(&self) -> Point2 {
        self.bbox.centroid()
    }
}

/// 一帧的检测结果 (检测器 → 计数会话)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameBatch {
    pub detections: Vec<Detection>,
}

impl FrameBatch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}
