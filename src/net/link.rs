//! 无线链路类型
//!
//! 单向链路：传播时延 + 串行化时延（带宽）+ 确定性丢包。
//! 背靠背发送的两个帧在接收端的间隔等于第二个帧的串行化时间，这正是包对探测测量的量。

use super::id::NodeId;
use crate::sim::{SimTime, mix64};

/// 无线链路（单向）
#[derive(Debug)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    pub busy_until: SimTime,
    /// 丢包率（百分比，0..=100）
    pub loss_pct: u8,
    /// 丢包判定的盐
    pub salt: u64,
}

impl Link {
    /// 创建新链路
    pub fn new(from: NodeId, to: NodeId, latency: SimTime, bandwidth_bps: u64) -> Self {
        Self {
            from,
            to,
            latency,
            bandwidth_bps,
            busy_until: SimTime::ZERO,
            loss_pct: 0,
            salt: ((from.0 as u64) << 32) ^ (to.0 as u64),
        }
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u32) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128)
            + (self.bandwidth_bps as u128 - 1))
            / self.bandwidth_bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }

    /// 该帧是否在此链路上丢失（同一帧 id 判定结果固定）
    pub(crate) fn drops(&self, frame_id: u64) -> bool {
        if self.loss_pct == 0 {
            return false;
        }
        if self.loss_pct >= 100 {
            return true;
        }
        mix64(frame_id ^ self.salt) % 100 < self.loss_pct as u64
    }
}
