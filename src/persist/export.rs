//! 表格导出 (CSV),供离线人工核对
//! Spreadsheet-friendly export of the final event list

use super::event::CrossingEvent;
use crate::error::PersistenceError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HEADER: [&str; 10] = [
    "frame",
    "timestamp",
    "timestamp_human",
    "track_id",
    "class",
    "direction",
    "centroid",
    "confidence",
    "camera_id",
    "camera_name",
];

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn row(event: &CrossingEvent) -> String {
    let centroid = format!("[{}, {}]", event.centroid[0], event.centroid[1]);
    [
        event.frame.to_string(),
        event.timestamp.to_string(),
        event.timestamp_human.clone(),
        event.track_id.to_string(),
        event.class_name.clone(),
        event.direction.to_string(),
        centroid,
        event.confidence.to_string(),
        event.camera_id.clone(),
        event.camera_name.clone(),
    ]
    .iter()
    .map(|f| quote(f))
    .collect::<Vec<_>>()
    .join(",")
}

/// 写出全部事件 (即使为空也写表头)
pub fn write_csv(path: &Path, events: &[CrossingEvent]) -> Result<(), PersistenceError> {
    let io_err = |e| PersistenceError::new("event export", path, e);
    let mut w = BufWriter::new(File::create(path).map_err(io_err)?);
    writeln!(w, "{}", HEADER.join(",")).map_err(io_err)?;
    for event in events {
        writeln!(w, "{}", row(event)).map_err(io_err)?;
    }
    w.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::Direction;
    use crate::test_util::scratch_dir;

    fn event(name: &str) -> CrossingEvent {
        CrossingEvent {
            frame: 2,
            timestamp: 10.5,
            timestamp_human: "2024-01-01 00:00:10.500".into(),
            track_id: 4,
            class_name: "car".into(),
            direction: Direction::Outgoing,
            centroid: [600.0, 360.5],
            confidence: 0.9,
            camera_id: "c1".into(),
            camera_name: name.into(),
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_write_csv() {
        let dir = scratch_dir("csv");
        let path = dir.join("events.csv");
        write_csv(&path, &[event("Gate"), event("North, East")]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "2,10.5,2024-01-01 00:00:10.500,4,car,outgoing,\"[600, 360.5]\",0.9,c1,Gate"
        );
        assert!(lines[2].ends_with(",c1,\"North, East\""));
    }

    #[test]
    fn test_empty_export_has_header() {
        let dir = scratch_dir("csv_empty");
        let path = dir.join("events.csv");
        write_csv(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }
}
