//! 过线状态机
//! Per-track side memory and crossing decisions

use super::geometry::{BoundaryLine, Point2, Side};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 过线方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Incoming, Direction::Outgoing];

    /// A→B 为出, B→A 为进, 同侧不产生方向
    pub fn from_transition(prev: Side, new: Side) -> Option<Self> {
        match (prev, new) {
            (Side::A, Side::B) => Some(Self::Outgoing),
            (Side::B, Side::A) => Some(Self::Incoming),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条轨迹的观测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub side: Side,
    pub previous: Option<Side>,
    pub crossing: Option<Direction>,
}

#[derive(Debug, Clone, Copy)]
struct TrackEntry {
    side: Side,
    last_seen_frame: u64,
}

/// 轨迹侧别表: track_id → 最近一次所在侧
///
/// Owned by exactly one session. Entries are kept for the whole session unless
/// `idle_frames` is set, in which case tracks unseen for that many frames are dropped.
#[derive(Debug, Default)]
pub struct TrackSideTable {
    entries: HashMap<i64, TrackEntry>,
    idle_frames: Option<u64>,
}

impl TrackSideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_eviction(idle_frames: Option<u64>) -> Self {
        Self {
            entries: HashMap::new(),
            idle_frames,
        }
    }

    /// Classifies `centroid` and advances the track's state.
    pub fn observe(
        &mut self,
        track_id: i64,
        centroid: Point2,
        line: &BoundaryLine,
        frame: u64,
    ) -> Observation {
        let side = line.classify(centroid);
        self.observe_side(track_id, side, frame)
    }

    pub fn observe_side(&mut self, track_id: i64, side: Side, frame: u64) -> Observation {
        let previous = self
            .entries
            .insert(
                track_id,
                TrackEntry {
                    side,
                    last_seen_frame: frame,
                },
            )
            .map(|entry| entry.side);

        let crossing = previous.and_then(|prev| Direction::from_transition(prev, side));
        Observation {
            side,
            previous,
            crossing,
        }
    }

    /// Drops idle tracks; returns how many were removed. No-op without an idle limit.
    pub fn evict_idle(&mut self, current_frame: u64) -> usize {
        let Some(limit) = self.idle_frames else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, e| current_frame.saturating_sub(e.last_seen_frame) <= limit);
        before - self.entries.len()
    }

    pub fn side(&self, track_id: i64) -> Option<Side> {
        self.entries.get(&track_id).map(|e| e.side)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
