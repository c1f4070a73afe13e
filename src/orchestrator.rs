//! 多摄像头调度
//! Runs one session per configured camera and writes the aggregate report once.
//!
//! Two schedules share the same per-camera path:
//! - sequential: cameras run one after another;
//! - concurrent: one worker thread per camera.
//!
//! In both, the detection source is pumped on its own producer thread into a bounded
//! channel, so an interrupt reaches the session even while the source is blocked.
//! Every session holds a child cancellation token of the run.

use crate::config::{CameraConfig, RunSettings};
use crate::detection::{spawn_producer, ChannelSource, DetectorFactory};
use crate::error::{ConfigError, CounterError, PersistenceError};
use crate::persist::{aggregate_path, snapshot, AggregateReport};
use crate::session::{CameraSession, SessionOutcome};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 会话结束后等待生产线程退出的时间
const PRODUCER_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct RunReport {
    /// 按配置顺序
    pub outcomes: Vec<SessionOutcome>,
    /// 未能启动会话的配置项
    pub config_errors: Vec<ConfigError>,
    pub aggregate: AggregateReport,
    pub aggregate_path: PathBuf,
}

impl RunReport {
    pub fn failed_sessions(&self) -> usize {
        self.outcomes.iter().filter(|o| o.end.is_failure()).count()
    }
}

pub struct Orchestrator {
    factory: Arc<dyn DetectorFactory>,
    settings: RunSettings,
    /// camera_id → 会话取消令牌 (运行期间有效)
    sessions: Mutex<BTreeMap<String, CancellationToken>>,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn DetectorFactory>, settings: RunSettings) -> Self {
        Self {
            factory,
            settings,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Cancels a single running session; other cameras keep going.
    pub fn cancel_camera(&self, camera_id: &str) -> bool {
        match self.sessions().get(camera_id) {
            Some(token) => {
                info!("[{}] ⏹️  cancel requested", camera_id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// 令牌表只做插入/删除, panic 后的数据仍然有效
    fn sessions(&self) -> MutexGuard<'_, BTreeMap<String, CancellationToken>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, camera_id: &str, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        self.sessions().insert(camera_id.to_string(), token.clone());
        token
    }

    fn unregister(&self, camera_id: &str) {
        self.sessions().remove(camera_id);
    }

    /// 基线调度: 逐个摄像头运行
    pub fn run_sequential(
        &self,
        cameras: Vec<Result<CameraConfig, ConfigError>>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PersistenceError> {
        let (cameras, config_errors) = split_entries(cameras);
        let total = cameras.len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, camera) in cameras.into_iter().enumerate() {
            info!("📹 camera {}/{}: {}", idx + 1, total, camera.id);
            let token = self.register(&camera.id, cancel);
            let id = camera.id.clone();
            outcomes.push(self.run_camera(camera, &token));
            self.unregister(&id);
        }

        self.finish(outcomes, config_errors)
    }

    /// 重设计调度: 每路摄像头独立线程
    pub fn run_concurrent(
        &self,
        cameras: Vec<Result<CameraConfig, ConfigError>>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PersistenceError> {
        let (cameras, config_errors) = split_entries(cameras);

        let outcomes = std::thread::scope(|scope| {
            let workers: Vec<_> = cameras
                .into_iter()
                .map(|camera| {
                    let token = self.register(&camera.id, cancel);
                    let fallback = camera.clone();
                    let handle = scope.spawn(move || self.run_camera(camera, &token));
                    (fallback, handle)
                })
                .collect();

            workers
                .into_iter()
                .map(|(camera, handle)| {
                    let outcome = handle.join().unwrap_or_else(|panic| {
                        let msg = panic_message(panic.as_ref());
                        error!("[{}] ❌ session worker panicked: {}", camera.id, msg);
                        SessionOutcome::not_started(
                            &camera,
                            &self.settings,
                            CounterError::WorkerPanicked(msg),
                        )
                    });
                    self.unregister(&camera.id);
                    outcome
                })
                .collect::<Vec<_>>()
        });

        self.finish(outcomes, config_errors)
    }

    /// 单路摄像头: 打开会话 → 打开数据源 → 运行 → finalize
    fn run_camera(&self, camera: CameraConfig, cancel: &CancellationToken) -> SessionOutcome {
        // 已中断的运行不再打开 (截断) 该摄像头的输出文件
        if cancel.is_cancelled() {
            info!("[{}] ⏭️  run interrupted, session not started", camera.id);
            return SessionOutcome::skipped(&camera, &self.settings);
        }

        let session = match CameraSession::open(camera.clone(), &self.settings) {
            Ok(session) => session,
            Err(e) => {
                error!("[{}] ❌ cannot open session outputs: {}", camera.id, e);
                return SessionOutcome::not_started(&camera, &self.settings, e.into());
            }
        };

        let source = match self.factory.open(&camera) {
            Ok(source) => source,
            Err(e) => return session.abort(e.into()),
        };
        let (mut rx, producer) = spawn_producer(
            camera.id.clone(),
            source,
            self.settings.channel_capacity,
            cancel.clone(),
        );
        let outcome = session.run(&mut rx, cancel);
        release_producer(&camera.id, rx, producer, cancel);
        outcome
    }

    fn finish(
        &self,
        outcomes: Vec<SessionOutcome>,
        config_errors: Vec<ConfigError>,
    ) -> Result<RunReport, PersistenceError> {
        let output_dir = &self.settings.output_dir;
        std::fs::create_dir_all(output_dir)
            .map_err(|e| PersistenceError::new("output directory", output_dir, e))?;

        let aggregate: AggregateReport = outcomes
            .iter()
            .map(|o| (o.camera_id.clone(), o.counts.clone()))
            .collect();
        let path = aggregate_path(output_dir);
        snapshot::write_json("aggregate report", &path, &aggregate)?;
        info!("📊 all cameras processed, aggregate saved to {}", path.display());

        let report = RunReport {
            outcomes,
            config_errors,
            aggregate,
            aggregate_path: path,
        };
        if report.failed_sessions() > 0 || !report.config_errors.is_empty() {
            warn!(
                "⚠️  {} session(s) failed, {} camera(s) skipped for bad config",
                report.failed_sessions(),
                report.config_errors.len()
            );
        }
        Ok(report)
    }
}

/// 通知生产线程退出; 仍阻塞在数据源上的生产线程被分离, 不拖住调用方
fn release_producer(
    camera_id: &str,
    rx: ChannelSource,
    handle: JoinHandle<()>,
    cancel: &CancellationToken,
) {
    cancel.cancel();
    drop(rx);
    let deadline = Instant::now() + PRODUCER_GRACE;
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    if !handle.is_finished() {
        warn!("[{}] detection source still blocked, detaching producer", camera_id);
        return;
    }
    if handle.join().is_err() {
        warn!("[{}] detection producer thread panicked", camera_id);
    }
}

fn split_entries(
    entries: Vec<Result<CameraConfig, ConfigError>>,
) -> (Vec<CameraConfig>, Vec<ConfigError>) {
    let mut cameras = Vec::new();
    let mut errors = Vec::new();
    for entry in entries {
        match entry {
            Ok(camera) => cameras.push(camera),
            Err(e) => {
                error!("❌ skipping camera: {}", e);
                errors.push(e);
            }
        }
    }
    (cameras, errors)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
