//! ETT（估计传输时间）链路统计
//!
//! 以包对探测测量每个邻居链路的时延，供 [`crate::metric::EttMetric`] 计算带宽。

mod delay;
mod neighbor;
mod scheduler;
mod stat;

pub use delay::{DelayEntry, DelaySampler, LinkInfo, MAX_DELAY_US, aggregate, prune_older_than};
pub use neighbor::{NeighborTable, NodeEntry};
pub use scheduler::{BATCH_WARMUP, ProbeScheduler};
pub use stat::EttStat;
