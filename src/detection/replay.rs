//! 检测结果回放适配器
//! Replays recorded detector/tracker output (one JSON object per frame).
//!
//! All tolerance for detector-library output variance lives here: field aliases,
//! untracked boxes and non-finite values are normalized or dropped before anything
//! reaches the counting core.

use super::classes::ClassNames;
use super::source::{DetectionSource, DetectorFactory, SourceResult};
use super::types::{BBox, Detection, FrameBatch};
use crate::config::CameraConfig;
use crate::error::DetectionStreamError;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// 单个原始检测框 (兼容不同导出格式的字段名)
#[derive(Debug, Deserialize)]
struct RawBox {
    #[serde(alias = "bbox", alias = "box")]
    xyxy: Option<Vec<f64>>,
    #[serde(alias = "track_id")]
    id: Option<i64>,
    #[serde(alias = "class_id", alias = "cls_id")]
    cls: Option<i64>,
    #[serde(alias = "confidence", alias = "score")]
    conf: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default, alias = "detections")]
    boxes: Vec<RawBox>,
}

pub struct ReplaySource<R> {
    lines: std::io::Lines<R>,
    classes: ClassNames,
    scale: f64,
    line_no: u64,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(
        path: impl AsRef<Path>,
        classes: ClassNames,
        scale: f64,
    ) -> Result<Self, DetectionStreamError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DetectionStreamError::Source(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::from_reader(BufReader::new(file), classes, scale))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn from_reader(reader: R, classes: ClassNames, scale: f64) -> Self {
        Self {
            lines: reader.lines(),
            classes,
            scale,
            line_no: 0,
        }
    }

    fn normalize(&self, raw: RawBox) -> Option<Detection> {
        let Some(id) = raw.id.filter(|id| *id >= 0) else {
            debug!("line {}: dropping untracked box", self.line_no);
            return None;
        };
        let coords = raw.xyxy.filter(|c| c.len() == 4)?;
        let bbox = BBox::new(coords[0], coords[1], coords[2], coords[3]).scaled(self.scale);
        let confidence = raw.conf.unwrap_or(0.0);
        if !bbox.is_finite() || !confidence.is_finite() {
            debug!("line {}: dropping non-finite box for track {}", self.line_no, id);
            return None;
        }
        let class_name = self.classes.name(raw.cls.unwrap_or(-1));
        Some(Detection::new(bbox, id, class_name, confidence))
    }
}

impl<R: BufRead> DetectionSource for ReplaySource<R> {
    fn next_batch(&mut self) -> SourceResult {
        loop {
            let line = match self.lines.next() {
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(DetectionStreamError::Source(format!(
                        "read failed after line {}: {}",
                        self.line_no, e
                    )))
                }
                Some(Ok(line)) => line,
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let raw: RawFrame = serde_json::from_str(&line).map_err(|e| {
                DetectionStreamError::MalformedFrame {
                    frame: self.line_no,
                    reason: e.to_string(),
                }
            })?;
            let detections = raw
                .boxes
                .into_iter()
                .filter_map(|b| self.normalize(b))
                .collect();
            return Ok(Some(FrameBatch::new(detections)));
        }
    }
}

/// 以摄像头配置的 `source` 路径作为回放文件
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayFactory;

impl DetectorFactory for ReplayFactory {
    fn open(
        &self,
        camera: &CameraConfig,
    ) -> Result<Box<dyn DetectionSource + Send>, DetectionStreamError> {
        let classes = camera.class_names();
        let source = ReplaySource::open(&camera.source, classes, camera.frame_scale)?;
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn replay(text: &str) -> ReplaySource<Cursor<Vec<u8>>> {
        ReplaySource::from_reader(Cursor::new(text.as_bytes().to_vec()), ClassNames::coco(), 1.0)
    }

    #[test]
    fn test_parses_canonical_and_alias_fields() {
        let mut src = replay(concat!(
            r#"{"frame":1,"boxes":[{"xyxy":[580,340,620,380],"id":4,"cls":2,"conf":0.9}]}"#,
            "\n",
            r#"{"detections":[{"bbox":[0,0,2,2],"track_id":5,"class_id":5,"confidence":0.5}]}"#,
            "\n"
        ));
        let first = src.next_batch().unwrap().unwrap();
        assert_eq!(first.detections.len(), 1);
        let d = &first.detections[0];
        assert_eq!(d.track_id, 4);
        assert_eq!(d.class_name, "car");
        assert_eq!(d.confidence, 0.9);
        assert_eq!(d.bbox, BBox::new(580.0, 340.0, 620.0, 380.0));

        let second = src.next_batch().unwrap().unwrap();
        assert_eq!(second.detections[0].class_name, "bus");
        assert_eq!(second.detections[0].track_id, 5);
        assert!(src.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_drops_untracked_and_invalid_boxes() {
        let mut src = replay(concat!(
            r#"{"boxes":[{"xyxy":[0,0,1,1],"cls":2,"conf":0.9},"#,
            r#"{"xyxy":[0,0,1,1],"id":-1,"cls":2},"#,
            r#"{"xyxy":[0,0,1],"id":3,"cls":2},"#,
            r#"{"xyxy":[0,0,1,1],"id":9,"cls":7}]}"#
        ));
        let batch = src.next_batch().unwrap().unwrap();
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].track_id, 9);
        assert_eq!(batch.detections[0].class_name, "truck");
        assert_eq!(batch.detections[0].confidence, 0.0);
    }

    #[test]
    fn test_blank_lines_skipped_and_empty_frames_kept() {
        let mut src = replay("\n\n{}\n{\"boxes\":[]}\n");
        assert!(src.next_batch().unwrap().unwrap().detections.is_empty());
        assert!(src.next_batch().unwrap().unwrap().detections.is_empty());
        assert!(src.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_is_recoverable() {
        let mut src = replay("not json\n{\"boxes\":[]}\n");
        match src.next_batch() {
            Err(e @ DetectionStreamError::MalformedFrame { frame: 1, .. }) => {
                assert!(e.is_recoverable())
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(src.next_batch().unwrap().is_some());
    }

    #[test]
    fn test_scale_applied() {
        let mut src = ReplaySource::from_reader(
            Cursor::new(br#"{"boxes":[{"xyxy":[10,20,30,40],"id":1,"cls":2,"conf":1}]}"#.to_vec()),
            ClassNames::coco(),
            0.5,
        );
        let batch = src.next_batch().unwrap().unwrap();
        assert_eq!(batch.detections[0].bbox, BBox::new(5.0, 10.0, 15.0, 20.0));
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let err = ReplaySource::open("/definitely/not/here.ndjson", ClassNames::coco(), 1.0)
            .err()
            .unwrap();
        assert!(!err.is_recoverable());
    }
}
