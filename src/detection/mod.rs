/// 检测系统适配层 (Detection Adapter)
///
/// 外部检测器/跟踪器输出在此统一为 `Detection`:
/// - types:   标准检测记录
/// - classes: 类别索引 → 类别名
/// - source:  拉取式数据源接口 + 通道生产线程
/// - replay:  检测结果回放
pub mod classes;
pub mod replay;
pub mod source;
pub mod types;

pub use classes::{ClassNames, DEFAULT_TARGET_CLASSES};
pub use replay::{ReplayFactory, ReplaySource};
pub use source::{
    spawn_producer, ChannelSource, DetectionSource, DetectorFactory, SourceResult, VecSource,
};
pub use types::{BBox, Detection, FrameBatch};
