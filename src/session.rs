//! 单路摄像头计数会话
//! Camera session: owns the line, track table, counters and output files of one camera,
//! drives the per-frame loop and finalizes exactly once on every exit path.

use crate::config::{CameraConfig, RunSettings};
use crate::counting::{BoundaryLine, DirectionCounts, TrackSideTable};
use crate::detection::{DetectionSource, FrameBatch};
use crate::error::{CounterError, DetectionStreamError, PersistenceError};
use crate::persist::{export, snapshot, CrossingEvent, EventEmitter, SessionPaths, Timestamp};
use std::collections::HashSet;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 会话结束原因
#[derive(Debug)]
pub enum SessionEnd {
    /// 数据流正常结束
    Completed,
    /// 达到调试帧数上限
    FrameCap,
    /// 外部中断 (不是错误)
    Cancelled,
    Failed(CounterError),
}

impl SessionEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::FrameCap => f.write_str("frame cap reached"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub camera_id: String,
    pub counts: DirectionCounts,
    pub frames: u64,
    pub events: u64,
    pub end: SessionEnd,
    /// finalize 阶段的写入错误 (不影响 counts)
    pub finalize_error: Option<PersistenceError>,
}

impl SessionOutcome {
    /// Outcome for a camera whose session could not even be opened.
    pub fn not_started(camera: &CameraConfig, settings: &RunSettings, err: CounterError) -> Self {
        Self::zero(camera, settings, SessionEnd::Failed(err))
    }

    /// 运行已被中断, 会话未打开 (不触碰该摄像头的输出文件)
    pub fn skipped(camera: &CameraConfig, settings: &RunSettings) -> Self {
        Self::zero(camera, settings, SessionEnd::Cancelled)
    }

    fn zero(camera: &CameraConfig, settings: &RunSettings, end: SessionEnd) -> Self {
        Self {
            camera_id: camera.id.clone(),
            counts: DirectionCounts::with_classes(camera.resolve_target_classes(settings)),
            frames: 0,
            events: 0,
            end,
            finalize_error: None,
        }
    }
}

pub struct CameraSession {
    camera: CameraConfig,
    line: BoundaryLine,
    targets: HashSet<String>,
    tracks: TrackSideTable,
    emitter: EventEmitter,
    frames: u64,
    max_frames: Option<u64>,
    max_bad_frames: u32,
    finalized: bool,
}

impl CameraSession {
    /// 创建输出目录与事件日志
    pub fn open(camera: CameraConfig, settings: &RunSettings) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(&settings.output_dir)
            .map_err(|e| PersistenceError::new("output directory", &settings.output_dir, e))?;

        let targets = camera.resolve_target_classes(settings);
        let paths = SessionPaths::new(&settings.output_dir, &camera.id);
        let emitter = EventEmitter::create(
            &camera.id,
            &camera.name,
            paths,
            DirectionCounts::with_classes(&targets),
        )?;

        Ok(Self {
            line: camera.boundary_line(),
            targets: targets.into_iter().collect(),
            tracks: TrackSideTable::with_idle_eviction(settings.track_idle_frames),
            emitter,
            frames: 0,
            max_frames: settings.max_frames,
            max_bad_frames: settings.max_consecutive_bad_frames,
            finalized: false,
            camera,
        })
    }

    pub fn counts(&self) -> &DirectionCounts {
        self.emitter.counts()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advances one frame; returns the number of crossings emitted.
    pub fn process_batch(&mut self, batch: &FrameBatch) -> Result<usize, PersistenceError> {
        self.frames += 1;
        let frame = self.frames;
        let mut emitted = 0;
        let targets = &self.targets;

        for det in batch
            .detections
            .iter()
            .filter(|d| targets.contains(&d.class_name))
        {
            let centroid = det.centroid();
            let obs = self.tracks.observe(det.track_id, centroid, &self.line, frame);
            let Some(direction) = obs.crossing else {
                continue;
            };
            let ts = Timestamp::now();
            self.emitter.emit(CrossingEvent {
                frame,
                timestamp: ts.epoch,
                timestamp_human: ts.human,
                track_id: det.track_id,
                class_name: det.class_name.clone(),
                direction,
                centroid: [centroid.x, centroid.y],
                confidence: det.confidence,
                camera_id: self.camera.id.clone(),
                camera_name: self.camera.name.clone(),
            })?;
            emitted += 1;
        }

        self.tracks.evict_idle(frame);
        Ok(emitted)
    }

    fn cap_reached(&self) -> bool {
        matches!(self.max_frames, Some(cap) if self.frames >= cap)
    }

    fn drive<S: DetectionSource + ?Sized>(
        &mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let mut bad_streak = 0u32;
        loop {
            if cancel.is_cancelled() {
                return SessionEnd::Cancelled;
            }
            if self.cap_reached() {
                return SessionEnd::FrameCap;
            }

            let batch = match source.next_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) if cancel.is_cancelled() => return SessionEnd::Cancelled,
                Ok(None) => return SessionEnd::Completed,
                Err(e) if e.is_recoverable() => {
                    self.frames += 1;
                    bad_streak += 1;
                    warn!("[{}] skipping frame {}: {}", self.camera.id, self.frames, e);
                    if bad_streak > self.max_bad_frames {
                        let e = DetectionStreamError::Source(format!(
                            "{} consecutive malformed frames, last: {}",
                            bad_streak, e
                        ));
                        return SessionEnd::Failed(e.into());
                    }
                    continue;
                }
                Err(e) => return SessionEnd::Failed(e.into()),
            };
            bad_streak = 0;

            if let Err(e) = self.process_batch(&batch) {
                return SessionEnd::Failed(e.into());
            }
        }
    }

    /// Runs the pull loop to its end, then finalizes.
    pub fn run<S: DetectionSource + ?Sized>(
        mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        info!(
            "[{}] 🎬 starting: name={} source={} weights={}",
            self.camera.id, self.camera.name, self.camera.source, self.camera.weights
        );
        let end = self.drive(source, cancel);
        self.into_outcome(end)
    }

    /// Ends the session without running the loop (e.g. the source failed to open).
    pub fn abort(self, err: CounterError) -> SessionOutcome {
        self.into_outcome(SessionEnd::Failed(err))
    }

    fn into_outcome(mut self, end: SessionEnd) -> SessionOutcome {
        match &end {
            SessionEnd::Cancelled => info!("[{}] ⏹️  interrupted by user", self.camera.id),
            SessionEnd::Failed(e) => error!("[{}] ❌ error during processing: {}", self.camera.id, e),
            _ => {}
        }

        let finalize_error = self.finalize().err();
        if let Some(e) = &finalize_error {
            error!("[{}] ❌ finalize failed: {}", self.camera.id, e);
        }

        let counts = self.emitter.counts().clone();
        info!(
            "[{}] 📁 events log: {}",
            self.camera.id,
            self.emitter.paths().events_log.display()
        );
        info!("[{}] ✅ final counts ({}): {}", self.camera.id, end, counts.summary_line());

        SessionOutcome {
            camera_id: self.camera.id.clone(),
            frames: self.frames,
            events: self.emitter.events().len() as u64,
            counts,
            end,
            finalize_error,
        }
    }

    /// 只执行一次: 释放日志句柄, 导出CSV, 写最终汇总
    fn finalize(&mut self) -> Result<(), PersistenceError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let closed = self.emitter.close();
        let paths = self.emitter.paths().clone();
        let exported = export::write_csv(&paths.events_csv, self.emitter.events());
        let summary = snapshot::write_json(
            "final summary",
            &paths.final_summary,
            &self.emitter.final_summary(),
        );
        // 任一步失败都不跳过其余步骤
        closed.and(exported).and(summary)
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(e) = self.finalize() {
                error!("[{}] ❌ finalize during unwind failed: {}", self.camera.id, e);
            }
        }
    }
}
