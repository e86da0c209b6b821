use tracing::debug;

use super::{DelaySource, DeliveryRatioSource, LinkMetric, Metric};
use crate::config::EttMetricConfig;
use crate::net::EtherAddress;
use crate::sim::SimTime;

/// ETX = 100·100·100 / (r_fwd·r_rev)，投递率为百分比，超过 100 按 100 计
pub fn packet_loss_ratio_metric(r_fwd: Option<u32>, r_rev: Option<u32>) -> Metric {
    let (Some(r_fwd), Some(r_rev)) = (r_fwd, r_rev) else {
        return Metric::Bad;
    };
    if r_fwd == 0 || r_rev == 0 {
        return Metric::Bad;
    }
    let (r_fwd, r_rev) = (r_fwd.min(100), r_rev.min(100));
    let etx = (100 * 100 * 100) / (r_fwd * r_rev);
    assert!(etx >= 100, "ETX {etx} below one transmission");
    Metric::Good(etx)
}

/// ETX × 传输时间。
///
/// `delay = reverse_delay - calibration`（至少 1 µs），带宽 = 参考长度 / delay（字节/µs），
/// 传输时间 = 截断(配置包长 / 带宽)。ETX 不可用时整体不可用。
pub fn composite_metric(
    etx: Metric,
    reverse_delay_us: u32,
    reference_size: u32,
    cfg: &EttMetricConfig,
) -> Metric {
    let Metric::Good(etx) = etx else {
        return Metric::Bad;
    };
    let delay = reverse_delay_us.saturating_sub(cfg.calibration_us).max(1);
    let bandwidth = reference_size as f64 / delay as f64;
    let tx = (cfg.packet_size as f64 / bandwidth) as u32;
    Metric::Good(etx.saturating_mul(tx))
}

/// 组合 ETX 统计与包对时延统计的度量源
pub struct EttMetric<'a> {
    ratios: &'a dyn DeliveryRatioSource,
    delays: &'a mut dyn DelaySource,
    cfg: &'a EttMetricConfig,
}

impl<'a> EttMetric<'a> {
    pub fn new(
        ratios: &'a dyn DeliveryRatioSource,
        delays: &'a mut dyn DelaySource,
        cfg: &'a EttMetricConfig,
    ) -> Self {
        Self {
            ratios,
            delays,
            cfg,
        }
    }

    pub fn etx(&self, peer: EtherAddress, now: SimTime) -> Metric {
        packet_loss_ratio_metric(
            self.ratios.forward_rate(peer, now),
            self.ratios.reverse_rate(peer, now),
        )
    }
}

impl LinkMetric for EttMetric<'_> {
    fn link_metric(&mut self, peer: EtherAddress, now: SimTime) -> Metric {
        let etx = self.etx(peer, now);
        let delay = self.delays.reverse_delay_us(peer, now);
        let m = composite_metric(etx, delay, self.delays.reference_size(), self.cfg);
        debug!(peer = %peer, ?etx, delay_us = delay, metric = ?m, "计算链路度量");
        m
    }
}
