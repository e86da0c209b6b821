use std::collections::HashMap;

use super::eth;
use crate::config::EttMetricConfig;
use crate::metric::{
    BAD_BYTE, DelaySource, DeliveryRatioSource, EttMetric, LinkMetric, MAX_QUANTIZABLE, Metric,
    composite_metric, dequantize, metric_val_lt, packet_loss_ratio_metric, quantize,
};
use crate::net::EtherAddress;
use crate::sim::SimTime;

#[derive(Default)]
struct FixedRatios(HashMap<EtherAddress, (Option<u32>, Option<u32>)>);

impl DeliveryRatioSource for FixedRatios {
    fn forward_rate(&self, peer: EtherAddress, _now: SimTime) -> Option<u32> {
        self.0.get(&peer).and_then(|r| r.0)
    }
    fn reverse_rate(&self, peer: EtherAddress, _now: SimTime) -> Option<u32> {
        self.0.get(&peer).and_then(|r| r.1)
    }
}

struct FixedDelay {
    delay_us: u32,
    size: u32,
    reads: usize,
}

impl DelaySource for FixedDelay {
    fn reverse_delay_us(&mut self, _peer: EtherAddress, _now: SimTime) -> u32 {
        self.reads += 1;
        self.delay_us
    }
    fn reference_size(&self) -> u32 {
        self.size
    }
}

#[test]
fn etx_of_perfect_link_is_one_transmission() {
    assert_eq!(packet_loss_ratio_metric(Some(100), Some(100)), Metric::Good(100));
    // 超过 100% 的报告按 100 处理
    assert_eq!(packet_loss_ratio_metric(Some(120), Some(100)), Metric::Good(100));
}

#[test]
fn etx_rounds_down() {
    assert_eq!(packet_loss_ratio_metric(Some(80), Some(90)), Metric::Good(138));
    assert_eq!(packet_loss_ratio_metric(Some(50), Some(50)), Metric::Good(400));
    assert_eq!(packet_loss_ratio_metric(Some(1), Some(1)), Metric::Good(1_000_000));
}

#[test]
fn etx_unknown_or_zero_rate_is_bad() {
    assert_eq!(packet_loss_ratio_metric(None, Some(90)), Metric::Bad);
    assert_eq!(packet_loss_ratio_metric(Some(90), None), Metric::Bad);
    assert_eq!(packet_loss_ratio_metric(Some(0), Some(90)), Metric::Bad);
}

#[test]
fn etx_is_never_below_100() {
    for f in (1..=100).step_by(7) {
        for r in (1..=100).step_by(11) {
            let v = packet_loss_ratio_metric(Some(f), Some(r)).val().expect("good");
            assert!(v >= 100, "r_fwd={f} r_rev={r} gave {v}");
        }
    }
}

#[test]
fn composite_worked_example() {
    let cfg = EttMetricConfig {
        packet_size: 1024,
        calibration_us: 100,
    };
    let etx = packet_loss_ratio_metric(Some(80), Some(90));
    assert_eq!(composite_metric(etx, 600, 1000, &cfg), Metric::Good(70_656));
}

#[test]
fn composite_clamps_delay_below_calibration() {
    let cfg = EttMetricConfig {
        packet_size: 30,
        calibration_us: 100,
    };
    // delay 被截到 1 µs：带宽 = 30 B/µs，传输时间 = 1
    assert_eq!(composite_metric(Metric::Good(100), 40, 30, &cfg), Metric::Good(100));
    assert_eq!(composite_metric(Metric::Good(100), 100, 30, &cfg), Metric::Good(100));
}

#[test]
fn composite_with_bad_etx_is_bad() {
    let cfg = EttMetricConfig::default();
    assert_eq!(composite_metric(Metric::Bad, 600, 1000, &cfg), Metric::Bad);
}

#[test]
fn append_is_bad_absorbing() {
    let a = Metric::Good(120);
    assert_eq!(a.append(Metric::Good(30)), Metric::Good(150));
    assert_eq!(a.append(Metric::Bad), Metric::Bad);
    assert_eq!(Metric::Bad.append(a), Metric::Bad);
    assert_eq!(
        Metric::Good(u32::MAX).append(Metric::Good(1)),
        Metric::Good(u32::MAX)
    );
}

#[test]
fn better_than_orders_good_before_bad() {
    assert!(Metric::Good(5).better_than(&Metric::Good(6)));
    assert!(!Metric::Good(6).better_than(&Metric::Good(6)));
    assert!(Metric::Good(u32::MAX).better_than(&Metric::Bad));
    assert!(!Metric::Bad.better_than(&Metric::Good(1)));
    assert!(!Metric::Bad.better_than(&Metric::Bad));
}

#[test]
fn val_lt_treats_bad_as_zero() {
    assert!(metric_val_lt(Metric::Bad, Metric::Good(1)));
    assert!(!metric_val_lt(Metric::Good(1), Metric::Bad));
    assert!(metric_val_lt(Metric::Good(1), Metric::Good(2)));
}

#[test]
fn quantize_loses_less_than_ten() {
    for v in [0u32, 9, 10, 99, 138, 1_999, MAX_QUANTIZABLE] {
        let back = dequantize(quantize(Metric::Good(v))).val().expect("good");
        assert!(back <= v && v - back < 10, "{v} came back as {back}");
    }
}

#[test]
fn quantize_saturates_to_bad_byte() {
    assert_eq!(quantize(Metric::Good(MAX_QUANTIZABLE)), 0xfe);
    assert_eq!(quantize(Metric::Good(MAX_QUANTIZABLE + 1)), BAD_BYTE);
    assert_eq!(quantize(Metric::Good(70_656)), BAD_BYTE);
    assert_eq!(quantize(Metric::Bad), BAD_BYTE);
    assert_eq!(dequantize(BAD_BYTE), Metric::Bad);
}

#[test]
fn ett_metric_combines_both_sources() {
    let peer = eth(1);
    let mut ratios = FixedRatios::default();
    ratios.0.insert(peer, (Some(80), Some(90)));
    let mut delays = FixedDelay {
        delay_us: 600,
        size: 1000,
        reads: 0,
    };
    let cfg = EttMetricConfig::default();
    let now = SimTime::from_secs(1);
    {
        let mut m = EttMetric::new(&ratios, &mut delays, &cfg);
        assert_eq!(m.etx(peer, now), Metric::Good(138));
        assert_eq!(m.link_metric(peer, now), Metric::Good(70_656));
        assert_eq!(m.link_metric(eth(2), now), Metric::Bad);
        assert_eq!(m.prepend(Metric::Good(1), Metric::Good(2)), Metric::Good(3));
        assert_eq!(m.unscale_from_byte(m.scale_to_byte(Metric::Good(138))), Metric::Good(130));
    }
    assert_eq!(delays.reads, 2);
}
