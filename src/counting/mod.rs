/// 过线计数核心 (Crossing Counting Core)
///
/// - geometry: 点相对分界线的侧别判定
/// - crossing: 每条轨迹的侧别状态机
/// - counts:   分方向、分类别计数
pub mod counts;
pub mod crossing;
pub mod geometry;

pub use counts::DirectionCounts;
pub use crossing::{Direction, Observation, TrackSideTable};
pub use geometry::{side_from_signed, side_of, BoundaryLine, Point2, Side};
