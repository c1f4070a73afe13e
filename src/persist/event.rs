//! 过线事件记录
//! Crossing event record (one JSON object per line in the event log)

use crate::counting::Direction;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

const HUMAN_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 同一时刻的两种时间表示
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    pub epoch: f64,
    pub human: String,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    pub fn from_datetime<Tz: TimeZone>(t: DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            epoch: t.timestamp_micros() as f64 / 1_000_000.0,
            human: t.format(HUMAN_FORMAT).to_string(),
        }
    }
}

/// 字段名属于兼容性约定,不可更改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub frame: u64,
    pub timestamp: f64,
    pub timestamp_human: String,
    pub track_id: i64,
    #[serde(rename = "class")]
    pub class_name: String,
    pub direction: Direction,
    pub centroid: [f64; 2],
    pub confidence: f64,
    pub camera_id: String,
    pub camera_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_timestamp_formats() {
        let offset = FixedOffset::east_opt(8 * 60 * 60).unwrap();
        let t = offset
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 5)
            .unwrap()
            + chrono::Duration::milliseconds(250);
        let ts = Timestamp::from_datetime(t);
        assert_eq!(ts.human, "2024-03-01 12:30:05.250");
        assert_eq!(ts.epoch, 1_709_267_405.25);
    }

    #[test]
    fn test_field_names() {
        let event = CrossingEvent {
            frame: 3,
            timestamp: 1.5,
            timestamp_human: "t".into(),
            track_id: 7,
            class_name: "car".into(),
            direction: Direction::Incoming,
            centroid: [600.0, 360.0],
            confidence: 0.9,
            camera_id: "cam1".into(),
            camera_name: "Gate".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "camera_id",
                "camera_name",
                "centroid",
                "class",
                "confidence",
                "direction",
                "frame",
                "timestamp",
                "timestamp_human",
                "track_id"
            ]
        );
        assert_eq!(value["direction"], "incoming");
        assert_eq!(value["centroid"], serde_json::json!([600.0, 360.0]));
    }
}
