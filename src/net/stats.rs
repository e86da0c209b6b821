//! 统计信息
//!
//! 定义网络仿真统计数据结构。

use serde::Serialize;

/// 网络统计信息
#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    pub sent_frames: u64,
    pub delivered_frames: u64,
    pub delivered_bytes: u64,
    /// 链路丢包
    pub dropped_loss: u64,
    /// 目的地址不是邻居（没有链路）
    pub dropped_no_link: u64,
    /// 过短/类型不对，被接收端丢弃
    pub dropped_invalid: u64,
}
