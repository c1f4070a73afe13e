//! 检测数据源接口
//! Pull-based detection sources and the bounded-channel producer used by the supervisor

use super::types::FrameBatch;
use crate::config::CameraConfig;
use crate::error::DetectionStreamError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub type SourceResult = Result<Option<FrameBatch>, DetectionStreamError>;

/// 检测/跟踪器适配器统一接口
///
/// 每次调用阻塞直到下一帧可用; `Ok(None)` 表示流结束。
pub trait DetectionSource {
    fn next_batch(&mut self) -> SourceResult;
}

impl<S: DetectionSource + ?Sized> DetectionSource for Box<S> {
    fn next_batch(&mut self) -> SourceResult {
        (**self).next_batch()
    }
}

/// 为每个摄像头打开检测源
pub trait DetectorFactory: Send + Sync {
    fn open(
        &self,
        camera: &CameraConfig,
    ) -> Result<Box<dyn DetectionSource + Send>, DetectionStreamError>;
}

/// 内存数据源 (预先准备好的帧序列)
#[derive(Debug, Default)]
pub struct VecSource {
    items: VecDeque<Result<FrameBatch, DetectionStreamError>>,
}

impl VecSource {
    pub fn new(batches: Vec<FrameBatch>) -> Self {
        Self {
            items: batches.into_iter().map(Ok).collect(),
        }
    }

    pub fn from_results(items: Vec<Result<FrameBatch, DetectionStreamError>>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

impl DetectionSource for VecSource {
    fn next_batch(&mut self) -> SourceResult {
        match self.items.pop_front() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// 取消检查间隔
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// 通道数据源 (生产线程 → 会话线程)
///
/// 等待期间定期检查取消令牌, 数据源卡住时仍能及时结束。
pub struct ChannelSource {
    rx: Receiver<Result<FrameBatch, DetectionStreamError>>,
    cancel: CancellationToken,
}

impl ChannelSource {
    pub fn new(
        rx: Receiver<Result<FrameBatch, DetectionStreamError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { rx, cancel }
    }
}

impl DetectionSource for ChannelSource {
    fn next_batch(&mut self) -> SourceResult {
        loop {
            match self.rx.recv_timeout(CANCEL_POLL) {
                Ok(Ok(batch)) => return Ok(Some(batch)),
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) if self.cancel.is_cancelled() => return Ok(None),
                Err(RecvTimeoutError::Timeout) => continue,
                // 发送端关闭即流结束
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

/// Runs `source` on its own thread, forwarding batches through a bounded channel.
///
/// The producer stops at end-of-stream, after forwarding a fatal error, when the
/// consumer hangs up, or when `cancel` fires.
pub fn spawn_producer(
    camera_id: String,
    mut source: Box<dyn DetectionSource + Send>,
    capacity: usize,
    cancel: CancellationToken,
) -> (ChannelSource, JoinHandle<()>) {
    let (tx, rx) = bounded(capacity.max(1));
    let rx = ChannelSource::new(rx, cancel.clone());
    let handle = std::thread::spawn(move || pump(&camera_id, source.as_mut(), &tx, &cancel));
    (rx, handle)
}

fn pump(
    camera_id: &str,
    source: &mut (dyn DetectionSource + Send),
    tx: &Sender<Result<FrameBatch, DetectionStreamError>>,
    cancel: &CancellationToken,
) {
    let mut forwarded = 0u64;
    while !cancel.is_cancelled() {
        let item = match source.next_batch() {
            Ok(Some(batch)) => Ok(batch),
            Ok(None) => break,
            Err(e) => Err(e),
        };
        let fatal = matches!(&item, Err(e) if !e.is_recoverable());
        if tx.send(item).is_err() {
            warn!("[{}] session stopped consuming, producer exiting", camera_id);
            return;
        }
        forwarded += 1;
        if fatal {
            break;
        }
    }
    debug!("[{}] producer finished after {} frames", camera_id, forwarded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{BBox, Detection};

    fn batch(track_id: i64) -> FrameBatch {
        FrameBatch::new(vec![Detection::new(
            BBox::new(0.0, 0.0, 10.0, 10.0),
            track_id,
            "car",
            0.9,
        )])
    }

    #[test]
    fn test_vec_source_order_and_end() {
        let mut src = VecSource::new(vec![batch(1), batch(2)]);
        assert_eq!(src.next_batch().unwrap().unwrap().detections[0].track_id, 1);
        assert_eq!(src.next_batch().unwrap().unwrap().detections[0].track_id, 2);
        assert!(src.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_producer_forwards_everything() {
        let src = VecSource::new((0..20).map(batch).collect());
        let (mut rx, handle) =
            spawn_producer("cam".into(), Box::new(src), 2, CancellationToken::new());
        let mut ids = Vec::new();
        while let Some(b) = rx.next_batch().unwrap() {
            ids.push(b.detections[0].track_id);
        }
        handle.join().unwrap();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_producer_stops_after_fatal_error() {
        let src = VecSource::from_results(vec![
            Ok(batch(1)),
            Err(DetectionStreamError::Source("camera offline".into())),
            Ok(batch(2)),
        ]);
        let (mut rx, handle) =
            spawn_producer("cam".into(), Box::new(src), 4, CancellationToken::new());
        assert!(rx.next_batch().unwrap().is_some());
        assert!(rx.next_batch().is_err());
        assert!(rx.next_batch().unwrap().is_none());
        handle.join().unwrap();
    }

    #[test]
    fn test_producer_forwards_recoverable_errors() {
        let src = VecSource::from_results(vec![
            Err(DetectionStreamError::MalformedFrame {
                frame: 1,
                reason: "bad".into(),
            }),
            Ok(batch(5)),
        ]);
        let (mut rx, handle) =
            spawn_producer("cam".into(), Box::new(src), 4, CancellationToken::new());
        assert!(rx.next_batch().is_err());
        assert_eq!(rx.next_batch().unwrap().unwrap().detections[0].track_id, 5);
        assert!(rx.next_batch().unwrap().is_none());
        handle.join().unwrap();
    }

    /// 先产出一帧, 之后长时间阻塞
    struct StallingSource {
        sent: bool,
    }

    impl DetectionSource for StallingSource {
        fn next_batch(&mut self) -> SourceResult {
            if !self.sent {
                self.sent = true;
                return Ok(Some(batch(1)));
            }
            std::thread::sleep(Duration::from_secs(3));
            Ok(None)
        }
    }

    #[test]
    fn test_cancel_unblocks_stalled_source() {
        let cancel = CancellationToken::new();
        let (mut rx, _handle) = spawn_producer(
            "cam".into(),
            Box::new(StallingSource { sent: false }),
            1,
            cancel.clone(),
        );
        assert!(rx.next_batch().unwrap().is_some());

        let canceller = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });
        let started = std::time::Instant::now();
        assert!(rx.next_batch().unwrap().is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_cancelled_producer_sends_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let src = VecSource::new(vec![batch(1)]);
        let (mut rx, handle) = spawn_producer("cam".into(), Box::new(src), 1, cancel);
        handle.join().unwrap();
        assert!(rx.next_batch().unwrap().is_none());
    }
}
