//! 事件发射器 / 实时持久化
//! Appends crossing events to the log, updates counts and rewrites the live status.
//!
//! Ordering per event: log line written and flushed → counts incremented → status
//! rewritten. A status file can therefore lag the log but never run ahead of it.

use super::event::CrossingEvent;
use super::snapshot::{write_json, FinalSummary, LiveStatus};
use super::SessionPaths;
use crate::counting::DirectionCounts;
use crate::error::PersistenceError;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use tracing::debug;

pub struct EventEmitter {
    camera_id: String,
    camera_name: String,
    paths: SessionPaths,
    /// None 表示日志已关闭
    log: Option<BufWriter<File>>,
    counts: DirectionCounts,
    events: Vec<CrossingEvent>,
    last_event_time: Option<String>,
}

impl EventEmitter {
    /// Truncates any previous log for this camera and writes an initial zero status.
    pub fn create(
        camera_id: &str,
        camera_name: &str,
        paths: SessionPaths,
        counts: DirectionCounts,
    ) -> Result<Self, PersistenceError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&paths.events_log)
            .map_err(|e| PersistenceError::new("event log", &paths.events_log, e))?;

        let emitter = Self {
            camera_id: camera_id.to_string(),
            camera_name: camera_name.to_string(),
            paths,
            log: Some(BufWriter::new(file)),
            counts,
            events: Vec::new(),
            last_event_time: None,
        };
        emitter.write_status()?;
        Ok(emitter)
    }

    pub fn emit(&mut self, event: CrossingEvent) -> Result<(), PersistenceError> {
        self.append(&event)?;
        self.counts.increment(event.direction, &event.class_name);
        self.last_event_time = Some(event.timestamp_human.clone());
        debug!(
            "[{}] frame {} track {} {} {}",
            self.camera_id, event.frame, event.track_id, event.class_name, event.direction
        );
        self.events.push(event);
        self.write_status()
    }

    fn append(&mut self, event: &CrossingEvent) -> Result<(), PersistenceError> {
        let path = &self.paths.events_log;
        let err = |e| PersistenceError::new("event log", path, e);
        let log = self.log.as_mut().ok_or_else(|| {
            err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "event log already closed",
            ))
        })?;
        let mut line = serde_json::to_string(event).map_err(|e| err(e.into()))?;
        line.push('\n');
        log.write_all(line.as_bytes()).map_err(err)?;
        log.flush().map_err(err)
    }

    pub fn status(&self) -> LiveStatus {
        LiveStatus {
            camera_id: self.camera_id.clone(),
            camera_name: self.camera_name.clone(),
            counts: self.counts.clone(),
            last_event_time: self.last_event_time.clone(),
            events_logged: self.events.len() as u64,
        }
    }

    fn write_status(&self) -> Result<(), PersistenceError> {
        write_json("live status", &self.paths.live_status, &self.status())
    }

    pub fn final_summary(&self) -> FinalSummary {
        FinalSummary {
            camera_id: self.camera_id.clone(),
            camera_name: self.camera_name.clone(),
            counts: self.counts.clone(),
            events: self.events.clone(),
        }
    }

    /// 释放日志文件句柄; 可重复调用
    pub fn close(&mut self) -> Result<(), PersistenceError> {
        match self.log.take() {
            Some(mut log) => log
                .flush()
                .map_err(|e| PersistenceError::new("event log", &self.paths.events_log, e)),
            None => Ok(()),
        }
    }

    pub fn counts(&self) -> &DirectionCounts {
        &self.counts
    }

    pub fn events(&self) -> &[CrossingEvent] {
        &self.events
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }
}
