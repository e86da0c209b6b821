//! 包对探测统计（每节点一个实例）
//!
//! 负责：
//! - 从发现广播中学习邻居
//! - 按轮次给邻居发送包对探测
//! - 接收包对、测量间隔，并按回报方式（直接回复/搭载）把结果告诉对端
//! - 对外提供正向/反向时延

use tracing::{debug, info, trace};

use super::delay::{DelayEntry, DelaySampler, MAX_DELAY_US};
use super::neighbor::NeighborTable;
use super::scheduler::ProbeScheduler;
use crate::config::{ConfigError, EttConfig, ProbeSchedule, ReplyMode};
use crate::metric::DelaySource;
use crate::net::{EtherAddress, Frame, NetApi, NodeId};
use crate::node::{EttProbeTick, EttRoundTick};
use crate::sim::{RandomSource, SimTime, Simulator};
use crate::wire::{
    ETHERTYPE_DISCOVERY, ETHERTYPE_PROBE, ETHERTYPE_PROBE_REPLY, EtherHeader, LinkEntry,
    LinkProbe, MIN_PROBE_FRAME, REPLY_FRAME_SIZE,
};

#[derive(Debug)]
pub struct EttStat {
    node: NodeId,
    eth: EtherAddress,
    cfg: EttConfig,
    sampler: DelaySampler,
    neighbors: NeighborTable,
    scheduler: ProbeScheduler,
}

impl EttStat {
    /// 校验配置并创建；`rng` 为抖动源
    pub fn new(
        node: NodeId,
        cfg: EttConfig,
        rng: Box<dyn RandomSource>,
        salt: u64,
    ) -> Result<EttStat, ConfigError> {
        cfg.validate()?;
        let eth = cfg.eth.ok_or(ConfigError::MissingLocalAddress)?;
        let period = cfg.period();
        let margin = period.mul_f64(cfg.sample_margin);
        let forward_window = period.saturating_add(margin);
        let reverse_window = SimTime(period.0.saturating_mul(cfg.samples as u64))
            .saturating_add(margin)
            .saturating_add(margin);
        Ok(EttStat {
            node,
            eth,
            sampler: DelaySampler::new(cfg.function, forward_window, reverse_window),
            neighbors: NeighborTable::new(),
            scheduler: ProbeScheduler::new(&cfg, rng, salt),
            cfg,
        })
    }

    pub fn eth(&self) -> EtherAddress {
        self.eth
    }

    pub fn config(&self) -> &EttConfig {
        &self.cfg
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn sampler(&self) -> &DelaySampler {
        &self.sampler
    }

    pub fn scheduler(&self) -> &ProbeScheduler {
        &self.scheduler
    }

    /// 参考包长（第二个探测帧的长度）
    pub fn packet_size(&self) -> u32 {
        self.cfg.second_size
    }

    /// 调度第一轮
    pub fn start(&mut self, sim: &mut Simulator) {
        let offset = self.scheduler.start_offset(self.eth, sim.now());
        info!(node = ?self.node, eth = %self.eth, offset = ?offset, "ETT 探测启动");
        self.scheduler
            .arm_round(sim, offset, EttRoundTick { node: self.node });
    }

    pub fn stop(&mut self, sim: &mut Simulator) {
        self.scheduler.stop(sim);
    }

    pub fn forward_delay(&mut self, peer: EtherAddress, now: SimTime) -> DelayEntry {
        self.sampler.forward_delay(peer, now)
    }

    pub fn reverse_delay(&mut self, peer: EtherAddress, now: SimTime) -> DelayEntry {
        self.sampler.reverse_delay(peer, now)
    }

    /// 轮次定时器
    #[tracing::instrument(skip(self, sim, net), fields(node = ?self.node))]
    pub fn on_round_timer(&mut self, sim: &mut Simulator, net: &mut dyn NetApi) {
        let now = sim.now();
        let cutoff = self.scheduler.begin_round(now);
        match self.scheduler.schedule() {
            ProbeSchedule::Staggered => {
                self.neighbors.clear_probe_flags();
                self.probe_next(cutoff, sim, net);
            }
            ProbeSchedule::Batch => {
                for peer in self.neighbors.sweep(cutoff) {
                    self.send_pair(peer, sim, net);
                }
            }
        }
        let next = self.scheduler.next_round_delay(self.eth, now);
        trace!(next = ?next, "下一轮");
        self.scheduler
            .arm_round(sim, next, EttRoundTick { node: self.node });
    }

    /// 探测定时器：继续给本轮尚未探测的邻居发送
    pub fn on_probe_timer(&mut self, sim: &mut Simulator, net: &mut dyn NetApi) {
        let cutoff = self.scheduler.cutoff();
        self.probe_next(cutoff, sim, net);
    }

    fn probe_next(&mut self, cutoff: SimTime, sim: &mut Simulator, net: &mut dyn NetApi) {
        let Some(peer) = self.neighbors.sweep_and_select(cutoff) else {
            trace!("本轮无待探测邻居");
            return;
        };
        self.send_pair(peer, sim, net);
        self.neighbors.mark_probed(peer);
        self.scheduler
            .arm_probe(sim, EttProbeTick { node: self.node });
    }

    /// 发送一对探测（序号 1、2）；搭载模式下两帧都携带对该邻居的正向时延
    #[tracing::instrument(skip(self, sim, net, peer), fields(node = ?self.node, peer = %peer))]
    fn send_pair(&mut self, peer: EtherAddress, sim: &mut Simulator, net: &mut dyn NetApi) {
        let report = match self.cfg.reply {
            ReplyMode::Piggyback => {
                let d = self.sampler.forward_delay(peer, sim.now());
                Some(LinkEntry::new(peer, d.delay_us.min(MAX_DELAY_US) as u16))
            }
            ReplyMode::Direct => None,
        };
        for (seq_no, size) in [(1u16, self.cfg.first_size), (2, self.cfg.second_size)] {
            let payload_len = (size as usize).saturating_sub(EtherHeader::LEN);
            let mut frame = net.make_frame(peer, self.eth, ETHERTYPE_PROBE, payload_len);
            let mut off = LinkProbe::new(seq_no).write(&mut frame.payload);
            if let Some(entry) = report
                && LinkProbe::max_entries(payload_len) > 0
            {
                off += entry.write(&mut frame.payload[off..]);
            }
            LinkProbe::update_cksum(&mut frame.payload[..off]);
            debug!(seq_no, len = frame.len(), "📤 发送探测");
            net.send(self.node, frame, sim);
        }
    }

    /// 发现广播：刷新邻居
    pub fn on_discovery(&mut self, from: EtherAddress, now: SimTime) {
        self.neighbors.on_discovery(from, now);
    }

    /// 处理探测/回复帧；其它类型返回 `false`
    #[tracing::instrument(skip(self, frame, sim, net), fields(node = ?self.node, src = %frame.src, ethertype = frame.ethertype))]
    pub fn on_frame(&mut self, frame: &Frame, sim: &mut Simulator, net: &mut dyn NetApi) -> bool {
        let now = sim.now();
        match frame.ethertype {
            ETHERTYPE_DISCOVERY => {
                self.on_discovery(frame.src, now);
                true
            }
            ETHERTYPE_PROBE | ETHERTYPE_PROBE_REPLY if frame.len() < MIN_PROBE_FRAME => {
                debug!(len = frame.len(), "探测帧过短");
                net.drop_invalid(self.node, frame);
                true
            }
            ETHERTYPE_PROBE => {
                self.on_probe(frame, sim, net);
                true
            }
            ETHERTYPE_PROBE_REPLY => {
                self.on_reply(frame, now);
                true
            }
            _ => false,
        }
    }

    fn on_probe(&mut self, frame: &Frame, sim: &mut Simulator, net: &mut dyn NetApi) {
        let now = sim.now();
        let Ok(probe) = LinkProbe::decode(&frame.payload) else {
            return;
        };
        if !LinkProbe::cksum_ok(&frame.payload) {
            debug!("探测校验和错误");
            return;
        }
        self.sampler.record_forward(frame.src, probe.seq_no, now);

        match self.cfg.reply {
            ReplyMode::Piggyback => self.fold_report(frame, now),
            ReplyMode::Direct => {
                let fwd = self.sampler.forward_delay(frame.src, now);
                if fwd.is_sentinel() {
                    return;
                }
                self.sampler.take_forward(frame.src);
                self.send_reply(frame.src, fwd.delay_us, sim, net);
            }
        }
    }

    fn send_reply(&mut self, to: EtherAddress, delay_us: u32, sim: &mut Simulator, net: &mut dyn NetApi) {
        let mut frame = net.make_frame(
            to,
            self.eth,
            ETHERTYPE_PROBE_REPLY,
            REPLY_FRAME_SIZE - EtherHeader::LEN,
        );
        let mut off = LinkProbe::new(1).write(&mut frame.payload);
        LinkProbe::update_cksum(&mut frame.payload[..off]);
        off += LinkEntry::new(to, delay_us as u16).write(&mut frame.payload[off..]);
        debug!(to = %to, delay_us, bytes = off, "↩️ 回复时延");
        net.send(self.node, frame, sim);
    }

    fn on_reply(&mut self, frame: &Frame, now: SimTime) {
        self.fold_report(frame, now);
    }

    /// 读取紧跟探测头的 LinkEntry；若它描述的是我方，则作为反向样本
    fn fold_report(&mut self, frame: &Frame, now: SimTime) {
        let Ok(entry) = LinkEntry::decode(&frame.payload[LinkProbe::SIZE..]) else {
            trace!("帧中没有时延报告");
            return;
        };
        if entry.peer != self.eth {
            return;
        }
        self.sampler
            .record_reverse(frame.src, entry.delay_us as u32, now);
    }
}

impl DelaySource for EttStat {
    fn reverse_delay_us(&mut self, peer: EtherAddress, now: SimTime) -> u32 {
        self.sampler.reverse_delay(peer, now).delay_us
    }

    fn reference_size(&self) -> u32 {
        self.packet_size()
    }
}
