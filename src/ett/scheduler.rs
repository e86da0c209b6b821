//! 探测轮次调度
//!
//! 两个定时器：
//! - 轮次定时器：每个周期触发一次（错开模式带 ±10% 抖动）。
//! - 探测定时器：错开模式下每隔 `probe_delay` 给下一个尚未探测的邻居发一对探测。
//!
//! 抖动源在构造时注入，每轮以“本地地址 + 当前毫秒”重新播种。

use tracing::trace;

use crate::config::{EttConfig, ProbeSchedule};
use crate::net::EtherAddress;
use crate::sim::{Event, RandomSource, SimTime, Simulator, TimerHandle, disarm, rearm};

/// 批量模式在第一轮之前留给邻居发现的时间
pub const BATCH_WARMUP: SimTime = SimTime(4_000_000_000);

/// 错开模式下，邻居在这么多个周期内未被听到即过期
const STAGGERED_NEIGHBOR_PERIODS: u64 = 10;

#[derive(Debug)]
pub struct ProbeScheduler {
    schedule: ProbeSchedule,
    period: SimTime,
    margin: f64,
    samples: u8,
    probe_delay: SimTime,
    salt: u64,
    rng: Box<dyn RandomSource>,
    round_timer: Option<TimerHandle>,
    probe_timer: Option<TimerHandle>,
    cutoff: SimTime,
}

impl ProbeScheduler {
    /// `salt` 与地址、时间混合后作为每轮的种子
    pub fn new(cfg: &EttConfig, rng: Box<dyn RandomSource>, salt: u64) -> Self {
        Self {
            schedule: cfg.schedule,
            period: cfg.period(),
            margin: cfg.sample_margin,
            samples: cfg.samples,
            probe_delay: cfg.probe_delay(),
            salt,
            rng,
            round_timer: None,
            probe_timer: None,
            cutoff: SimTime::ZERO,
        }
    }

    pub fn schedule(&self) -> ProbeSchedule {
        self.schedule
    }

    /// 本轮的邻居过期阈值（`last_seen <= cutoff` 的邻居被删除）
    pub fn cutoff(&self) -> SimTime {
        self.cutoff
    }

    fn reseed(&mut self, local: EtherAddress, now: SimTime) {
        let seed = local.as_u64().wrapping_add(now.as_millis()) ^ self.salt;
        self.rng.reseed(seed);
    }

    /// 第一轮开始前的等待时间
    pub fn start_offset(&mut self, local: EtherAddress, now: SimTime) -> SimTime {
        match self.schedule {
            ProbeSchedule::Staggered => {
                self.reseed(local, now);
                let pct = self.rng.next_below(100);
                self.period.mul_f64(pct as f64 / 100.0)
            }
            ProbeSchedule::Batch => BATCH_WARMUP,
        }
    }

    /// 计算并保存本轮的过期阈值
    pub fn begin_round(&mut self, now: SimTime) -> SimTime {
        let periods = match self.schedule {
            ProbeSchedule::Staggered => STAGGERED_NEIGHBOR_PERIODS,
            ProbeSchedule::Batch => self.samples as u64,
        };
        let window = SimTime(self.period.0.saturating_mul(periods))
            .saturating_add(self.period.mul_f64(self.margin));
        self.cutoff = now.saturating_sub(window);
        trace!(cutoff = ?self.cutoff, "本轮邻居过期阈值");
        self.cutoff
    }

    /// 到下一轮的间隔
    pub fn next_round_delay(&mut self, local: EtherAddress, now: SimTime) -> SimTime {
        match self.schedule {
            ProbeSchedule::Staggered => {
                self.reseed(local, now);
                let period_ms = self.period.as_millis();
                let max_jitter = period_ms / 10;
                if max_jitter == 0 {
                    return self.period;
                }
                let j = self.rng.next_below(max_jitter * 2);
                SimTime::from_millis(period_ms + j - max_jitter)
            }
            ProbeSchedule::Batch => self.period,
        }
    }

    pub fn arm_round<E: Event>(&mut self, sim: &mut Simulator, delay: SimTime, ev: E) {
        rearm(&mut self.round_timer, sim, delay, ev);
    }

    pub fn arm_probe<E: Event>(&mut self, sim: &mut Simulator, ev: E) {
        rearm(&mut self.probe_timer, sim, self.probe_delay, ev);
    }

    pub fn round_armed(&self, sim: &Simulator) -> bool {
        self.round_timer.as_ref().is_some_and(|t| t.is_armed(sim))
    }

    pub fn probe_armed(&self, sim: &Simulator) -> bool {
        self.probe_timer.as_ref().is_some_and(|t| t.is_armed(sim))
    }

    /// 取消全部定时器
    pub fn stop(&mut self, sim: &mut Simulator) {
        disarm(&mut self.round_timer, sim);
        disarm(&mut self.probe_timer, sim);
    }
}
