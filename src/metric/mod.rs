//! 链路/路径度量
//!
//! [`Metric`] 是可沿路径累加的度量值，`Bad` 表示不可用并吸收一切累加。
//! [`LinkMetric`] 是路由表看到的度量接口；[`EttMetric`] 把 ETX 与包对测得的时延组合为 ETT。

mod ett;

use serde::{Deserialize, Serialize};

use crate::net::EtherAddress;
use crate::sim::SimTime;

pub use ett::{EttMetric, composite_metric, packet_loss_ratio_metric};

/// 量化后表示“不可用”的字节
pub const BAD_BYTE: u8 = 0xff;

/// 量化前可承载的最大值（`0xfe * 10`）
pub const MAX_QUANTIZABLE: u32 = 2_540;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Good(u32),
    Bad,
}

impl Metric {
    pub fn good(&self) -> bool {
        matches!(self, Metric::Good(_))
    }

    pub fn val(&self) -> Option<u32> {
        match self {
            Metric::Good(v) => Some(*v),
            Metric::Bad => None,
        }
    }

    /// 路径累加：任一方不可用则结果不可用
    pub fn append(self, other: Metric) -> Metric {
        match (self, other) {
            (Metric::Good(a), Metric::Good(b)) => Metric::Good(a.saturating_add(b)),
            _ => Metric::Bad,
        }
    }

    /// 选路比较：两者都可用时比较大小，`Bad` 劣于任何可用值
    pub fn better_than(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Good(a), Metric::Good(b)) => a < b,
            (Metric::Good(_), Metric::Bad) => true,
            (Metric::Bad, _) => false,
        }
    }
}

/// 压缩为 1 字节：除以 10；不可用或超过上限时为 [`BAD_BYTE`]
pub fn quantize(m: Metric) -> u8 {
    match m {
        Metric::Good(v) if v <= MAX_QUANTIZABLE => (v / 10) as u8,
        _ => BAD_BYTE,
    }
}

/// 从 1 字节恢复：乘以 10；[`BAD_BYTE`] 表示不可用
pub fn dequantize(b: u8) -> Metric {
    if b == BAD_BYTE {
        Metric::Bad
    } else {
        Metric::Good(b as u32 * 10)
    }
}

/// 只比较数值大小（`Bad` 视为 0），与选路规则无关
pub fn metric_val_lt(a: Metric, b: Metric) -> bool {
    a.val().unwrap_or(0) < b.val().unwrap_or(0)
}

/// 双向投递率（百分比），来自 ETX 统计
pub trait DeliveryRatioSource {
    /// 我方发往 `peer` 的投递率；未知时为 `None`
    fn forward_rate(&self, peer: EtherAddress, now: SimTime) -> Option<u32>;
    /// `peer` 发往我方的投递率；未知时为 `None`
    fn reverse_rate(&self, peer: EtherAddress, now: SimTime) -> Option<u32>;
}

/// 包对时延，来自 ETT 统计
pub trait DelaySource {
    /// 我方到 `peer` 的聚合时延（微秒），无样本时为 65535
    fn reverse_delay_us(&mut self, peer: EtherAddress, now: SimTime) -> u32;
    /// 包对第二个帧的长度，即带宽估计的参考长度
    fn reference_size(&self) -> u32;
}

/// 路由表使用的单跳度量接口
pub trait LinkMetric {
    fn link_metric(&mut self, peer: EtherAddress, now: SimTime) -> Metric;

    fn append(&self, a: Metric, b: Metric) -> Metric {
        a.append(b)
    }

    fn prepend(&self, a: Metric, b: Metric) -> Metric {
        self.append(b, a)
    }

    fn val_lt(&self, a: Metric, b: Metric) -> bool {
        metric_val_lt(a, b)
    }

    fn scale_to_byte(&self, m: Metric) -> u8 {
        quantize(m)
    }

    fn unscale_from_byte(&self, b: u8) -> Metric {
        dequantize(b)
    }
}
