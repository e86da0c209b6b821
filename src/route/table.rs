//! DSDV 路由表
//!
//! 不变式：度量可用的行恰好有一个待触发的过期定时器，其它行没有。
//! 每次 [`RouteTable::insert_route`] 前后都会检查，违反即 panic。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

use tracing::{debug, info, trace, warn};

use super::entry::{Reason, RtEntry};
use super::logger::{RouteLogRecord, RouteLogger};
use crate::config::{ConfigError, RouteTableConfig};
use crate::metric::{LinkMetric, Metric, dequantize, quantize};
use crate::net::{EtherAddress, NetApi, NodeId};
use crate::node::{RouteAdvertTick, RouteExpire, RouteLogDump, RouteTriggerTick};
use crate::sim::{RandomSource, SimTime, Simulator, TimerHandle, disarm, rearm};
use crate::wire::{AdvertEntry, ETHERTYPE_ROUTE_ADVERT, RouteAdvert};

/// 过期定时器与它所属的目的地，随行一起创建和销毁
#[derive(Debug)]
pub struct ExpireBinding {
    pub dest: Ipv4Addr,
    pub timer: TimerHandle,
}

#[derive(Debug)]
pub struct RouteTable {
    node: NodeId,
    ip: Ipv4Addr,
    eth: EtherAddress,
    cfg: RouteTableConfig,
    /// 本节点自己的序号（始终为偶数）
    seq_no: u32,
    rtes: BTreeMap<Ipv4Addr, RtEntry>,
    old_rtes: HashMap<Ipv4Addr, RtEntry>,
    expire: HashMap<Ipv4Addr, ExpireBinding>,
    rng: Box<dyn RandomSource>,
    advert_timer: Option<TimerHandle>,
    trigger_timer: Option<TimerHandle>,
    dump_timer: Option<TimerHandle>,
    last_advert: Option<SimTime>,
    logger: Option<Box<dyn RouteLogger>>,
}

impl RouteTable {
    pub fn new(
        node: NodeId,
        ip: Ipv4Addr,
        eth: EtherAddress,
        cfg: RouteTableConfig,
        rng: Box<dyn RandomSource>,
    ) -> Result<RouteTable, ConfigError> {
        cfg.validate()?;
        Ok(RouteTable {
            node,
            ip,
            eth,
            cfg,
            seq_no: 0,
            rtes: BTreeMap::new(),
            old_rtes: HashMap::new(),
            expire: HashMap::new(),
            rng,
            advert_timer: None,
            trigger_timer: None,
            dump_timer: None,
            last_advert: None,
            logger: None,
        })
    }

    pub fn set_logger(&mut self, logger: Box<dyn RouteLogger>) {
        self.logger = Some(logger);
    }

    /// 取出日志器中缓存的记录
    pub fn drain_log(&mut self) -> Vec<RouteLogRecord> {
        self.logger.as_mut().map(|l| l.drain()).unwrap_or_default()
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn eth(&self) -> EtherAddress {
        self.eth
    }

    pub fn seq_no(&self) -> u32 {
        self.seq_no
    }

    pub fn config(&self) -> &RouteTableConfig {
        &self.cfg
    }

    pub fn len(&self) -> usize {
        self.rtes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rtes.is_empty()
    }

    /// 当前行（不做旧路由替换）
    pub fn current(&self, dest: Ipv4Addr) -> Option<&RtEntry> {
        self.rtes.get(&dest)
    }

    pub fn old_route(&self, dest: Ipv4Addr) -> Option<&RtEntry> {
        self.old_rtes.get(&dest)
    }

    /// 有待触发过期定时器的目的地
    pub fn live_expiry_dests(&self, sim: &Simulator) -> BTreeSet<Ipv4Addr> {
        self.expire
            .iter()
            .filter(|(_, b)| b.timer.is_armed(sim))
            .map(|(dest, _)| *dest)
            .collect()
    }

    /// 度量可用的目的地
    pub fn good_dests(&self) -> BTreeSet<Ipv4Addr> {
        self.rtes
            .values()
            .filter(|r| r.good())
            .map(|r| r.dest_ip)
            .collect()
    }

    /// 全表一致性检查
    pub fn check_invariants(&self, sim: &Simulator) {
        for (dest, r) in &self.rtes {
            rt_assert!(*dest == r.dest_ip);
            r.check();
            let binding = self.expire.get(dest);
            if r.good() {
                rt_assert!(
                    binding.is_some_and(|b| b.dest == *dest && b.timer.is_armed(sim)),
                    "good route to {dest} has no live expiry timer"
                );
            } else {
                rt_assert!(binding.is_none(), "route to {dest} is not good but has a timer");
            }
        }
        for dest in self.expire.keys() {
            rt_assert!(self.rtes.contains_key(dest), "timer for unknown dest {dest}");
        }
        for (dest, old) in &self.old_rtes {
            if let Some(cur) = self.rtes.get(dest) {
                rt_assert!(old.seq_no < cur.seq_no, "old route to {dest} is not older");
            }
        }
    }

    /// 安装一行，替换该目的地的旧行
    #[tracing::instrument(skip(self, r, sim), fields(node = %self.ip, dest = %r.dest_ip, seq_no = r.seq_no))]
    pub fn insert_route(&mut self, r: RtEntry, why: Reason, sim: &mut Simulator) {
        self.check_invariants(sim);
        r.check();
        rt_assert!(!self.cfg.ignore_invalid_routes || r.metric.good());

        let dest = r.dest_ip;
        let old_r = self.rtes.get(&dest).cloned();
        let old_binding = self.expire.remove(&dest);
        match &old_r {
            Some(o) if o.good() => {
                rt_assert!(old_binding.as_ref().is_some_and(|b| b.timer.is_armed(sim)))
            }
            _ => rt_assert!(old_binding.is_none()),
        }
        if let Some(b) = old_binding {
            b.timer.cancel(sim);
        }

        if r.good() {
            let wait = r.ttl.min(self.cfg.timeout());
            let timer = TimerHandle::schedule_after(sim, wait, RouteExpire { node: self.node, dest });
            trace!(wait = ?wait, "装填过期定时器");
            self.expire.insert(dest, ExpireBinding { dest, timer });
        }

        if self.cfg.use_old_route
            && let Some(o) = old_r
            && o.seq_no < r.seq_no
        {
            self.old_rtes.insert(dest, o);
        }

        debug!(next_hop = %r.next_hop_ip, hops = r.num_hops, metric = ?r.metric, "安装路由");
        if let Some(log) = self.logger.as_mut() {
            log.log_added_route(sim.now(), &r, why);
        }
        self.rtes.insert(dest, r);

        self.check_invariants(sim);
    }

    /// 删除一行（不接受无效路由时，断开的路由直接删除）
    fn remove_route(&mut self, dest: Ipv4Addr, sim: &mut Simulator) {
        if let Some(b) = self.expire.remove(&dest) {
            b.timer.cancel(sim);
        }
        self.rtes.remove(&dest);
        self.old_rtes.remove(&dest);
        debug!(node = %self.ip, dest = %dest, "删除路由");
        self.check_invariants(sim);
    }

    fn install_broken(&mut self, r: RtEntry, why: Reason, sim: &mut Simulator) {
        if self.cfg.ignore_invalid_routes {
            self.remove_route(r.dest_ip, sim);
        } else {
            self.insert_route(r, why, sim);
        }
    }

    /// 为一跳路由填写度量；没有度量源时不可用
    pub fn init_metric(
        &mut self,
        r: &mut RtEntry,
        metric: Option<&mut dyn LinkMetric>,
        now: SimTime,
    ) {
        rt_assert!(r.num_hops == 1);
        r.metric = match metric {
            Some(m) => m.link_metric(r.dest_eth, now),
            None => Metric::Bad,
        };
        if let Some(log) = self.logger.as_mut() {
            log.log_metric_update(now, r);
        }
    }

    /// 新路由尚在稳定期内，且旧路由可用
    pub fn use_old_route(&self, dest: Ipv4Addr, now: SimTime) -> bool {
        if !self.cfg.use_old_route {
            return false;
        }
        match (self.rtes.get(&dest), self.old_rtes.get(&dest)) {
            (Some(real), Some(old)) => {
                real.good()
                    && old.good()
                    && real.advertise_ok_at > now
                    && real.seq_no > old.seq_no
            }
            _ => false,
        }
    }

    /// 全表快照（稳定期内的行以旧路由替换）
    pub fn get_all_entries(&self, now: SimTime) -> Vec<RtEntry> {
        self.rtes
            .values()
            .map(|r| match self.old_rtes.get(&r.dest_ip) {
                Some(old) if self.use_old_route(r.dest_ip, now) => old.clone(),
                _ => r.clone(),
            })
            .collect()
    }

    /// 查找可用路由
    pub fn lookup_route(&self, dest: Ipv4Addr, now: SimTime) -> Option<RtEntry> {
        let r = if self.use_old_route(dest, now) {
            self.old_rtes.get(&dest)?
        } else {
            self.rtes.get(&dest)?
        };
        r.good().then(|| r.clone())
    }

    /// 过期定时器触发：该行断开；若它是一跳邻居，经由它的所有路由一并断开
    #[tracing::instrument(skip(self, sim), fields(node = %self.ip))]
    pub fn expire_hook(&mut self, dest: Ipv4Addr, sim: &mut Simulator) {
        let now = sim.now();
        let Some(binding) = self.expire.get(&dest) else {
            warn!(dest = %dest, "过期事件没有对应的定时器");
            return;
        };
        if binding.timer.is_armed(sim) {
            warn!(dest = %dest, "过期事件与当前定时器不符");
            return;
        }
        self.expire.remove(&dest);
        let r = self.rtes.remove(&dest);
        rt_assert!(r.as_ref().is_some_and(|r| r.good()), "expired route to {dest} was not good");
        let Some(mut r) = r else { return };

        info!(dest = %dest, hops = r.num_hops, "⏰ 路由过期");
        let via: Vec<RtEntry> = if r.num_hops == 1 {
            self.rtes
                .values()
                .filter(|x| x.good() && x.next_hop_ip == dest)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        r.invalidate(now);
        r.ttl = self.cfg.timeout();
        self.install_broken(r, Reason::Expired, sim);
        for mut x in via {
            x.invalidate(now);
            x.ttl = self.cfg.timeout();
            self.install_broken(x, Reason::NextHopExpired, sim);
        }
        self.request_trigger(sim);
    }

    /// 处理邻居的路由通告。返回是否有行被改动。
    #[tracing::instrument(skip(self, adv, metric, sim), fields(node = %self.ip, sender = %sender_eth, entries = adv.entries.len()))]
    pub fn handle_advert(
        &mut self,
        sender_eth: EtherAddress,
        adv: &RouteAdvert,
        metric: Option<&mut dyn LinkMetric>,
        sim: &mut Simulator,
    ) -> bool {
        let now = sim.now();
        let Some(me) = adv
            .entries
            .iter()
            .find(|e| e.dest_eth == sender_eth && e.num_hops == 0 && e.seq_no & 1 == 0)
        else {
            debug!("通告中没有发送者自身的条目，忽略");
            return false;
        };
        let sender_ip = me.dest_ip;
        if sender_eth == self.eth || sender_ip == self.ip {
            return false;
        }

        let ttl = SimTime::from_millis(me.ttl_ms as u64).min(self.cfg.timeout());
        let mut hop = RtEntry::one_hop(sender_ip, sender_eth, me.seq_no, ttl, now);
        hop.advertise_ok_at = now.saturating_add(self.cfg.settle());
        self.init_metric(&mut hop, metric, now);
        let link = hop.metric;

        let mut changed = self.consider(hop, sim);
        for e in &adv.entries {
            if e.dest_eth == self.eth || e.dest_ip == self.ip || e.dest_eth == sender_eth {
                continue;
            }
            let odd = e.seq_no & 1 == 1;
            match (e.num_hops, odd) {
                (0, true) => changed |= self.consider_broken(e, sim),
                (h, false) if h > 0 => {
                    let cand = RtEntry {
                        dest_ip: e.dest_ip,
                        dest_eth: e.dest_eth,
                        next_hop_ip: sender_ip,
                        next_hop_eth: sender_eth,
                        seq_no: e.seq_no,
                        num_hops: h.saturating_add(1),
                        metric: link.append(dequantize(e.metric)),
                        ttl: SimTime::from_millis(e.ttl_ms as u64).min(self.cfg.timeout()),
                        last_updated: now,
                        advertise_ok_at: now.saturating_add(self.cfg.settle()),
                    };
                    changed |= self.consider(cand, sim);
                }
                _ => debug!(dest = %e.dest_ip, hops = e.num_hops, seq_no = e.seq_no, "条目格式错误，跳过"),
            }
        }
        changed
    }

    /// DSDV 接受规则：新目的地、更新的序号，或同序号下同一下一跳/更好的度量。
    ///
    /// 下一跳、跳数或度量有变化时请求触发式通告；纯刷新不请求。
    fn consider(&mut self, mut cand: RtEntry, sim: &mut Simulator) -> bool {
        if self.cfg.ignore_invalid_routes && !cand.metric.good() {
            return false;
        }
        let moved = self.rtes.get(&cand.dest_ip).is_none_or(|cur| {
            cur.next_hop_ip != cand.next_hop_ip
                || cur.num_hops != cand.num_hops
                || cur.metric != cand.metric
        });
        let why = match self.rtes.get(&cand.dest_ip) {
            None => Reason::NewDest,
            Some(cur) if cur.seq_no < cand.seq_no => Reason::NewSeq,
            Some(cur) if cur.seq_no == cand.seq_no && cur.next_hop_ip == cand.next_hop_ip => {
                cand.advertise_ok_at = cur.advertise_ok_at;
                Reason::SameNextHop
            }
            Some(cur) if cur.seq_no == cand.seq_no && cand.metric.better_than(&cur.metric) => {
                cand.advertise_ok_at = cur.advertise_ok_at;
                Reason::BetterMetric
            }
            Some(_) => return false,
        };
        let cand_dest = cand.dest_ip;
        self.insert_route(cand, why, sim);
        if moved {
            trace!(dest = %cand_dest, reason = ?why, "路由变化，请求触发式通告");
            self.request_trigger(sim);
        }
        true
    }

    /// 通告了一个比我们更新的断开路由
    fn consider_broken(&mut self, e: &AdvertEntry, sim: &mut Simulator) -> bool {
        let Some(cur) = self.rtes.get(&e.dest_ip) else {
            return false;
        };
        if cur.seq_no >= e.seq_no {
            return false;
        }
        let mut r = cur.clone();
        r.invalidate(sim.now());
        r.seq_no = e.seq_no;
        r.ttl = self.cfg.timeout();
        self.install_broken(r, Reason::BrokenAdvert, sim);
        self.request_trigger(sim);
        true
    }

    /// 构造通告：自身条目在前，然后是全表快照
    pub fn build_advert(&self, now: SimTime) -> RouteAdvert {
        let mut entries = vec![AdvertEntry {
            dest_ip: self.ip,
            dest_eth: self.eth,
            seq_no: self.seq_no,
            num_hops: 0,
            metric: quantize(Metric::Good(0)),
            ttl_ms: self.cfg.timeout_ms.min(u32::MAX as u64) as u32,
        }];
        for r in self.get_all_entries(now) {
            let ttl = r.remaining_ttl(now);
            if !r.broken() && ttl == SimTime::ZERO {
                continue;
            }
            entries.push(AdvertEntry {
                dest_ip: r.dest_ip,
                dest_eth: r.dest_eth,
                seq_no: r.seq_no,
                num_hops: r.num_hops,
                metric: quantize(r.metric),
                ttl_ms: ttl.as_millis().min(u32::MAX as u64) as u32,
            });
        }
        RouteAdvert { entries }
    }

    fn send_advert(&mut self, sim: &mut Simulator, net: &mut dyn NetApi) {
        let now = sim.now();
        let adv = self.build_advert(now);
        let mut frame = net.make_frame(
            EtherAddress::BROADCAST,
            self.eth,
            ETHERTYPE_ROUTE_ADVERT,
            adv.encoded_len(),
        );
        adv.write(&mut frame.payload);
        debug!(node = %self.ip, seq_no = self.seq_no, entries = adv.entries.len(), "📣 发送路由通告");
        net.broadcast(self.node, frame, sim);
        self.last_advert = Some(now);
    }

    fn jittered_period(&mut self) -> SimTime {
        let period_ms = self.cfg.period_ms;
        let max_jitter = period_ms / 10;
        if max_jitter == 0 {
            return self.cfg.period();
        }
        SimTime::from_millis(period_ms + self.rng.next_below(max_jitter * 2) - max_jitter)
    }

    /// 调度第一次通告（以及可选的日志快照）
    pub fn start(&mut self, sim: &mut Simulator) {
        let offset = SimTime::from_millis(self.rng.next_below(self.cfg.period_ms));
        rearm(&mut self.advert_timer, sim, offset, RouteAdvertTick { node: self.node });
        if let Some(ms) = self.cfg.log_dump_ms {
            rearm(
                &mut self.dump_timer,
                sim,
                SimTime::from_millis(ms),
                RouteLogDump { node: self.node },
            );
        }
    }

    /// 取消全部定时器并清空路由
    pub fn stop(&mut self, sim: &mut Simulator) {
        disarm(&mut self.advert_timer, sim);
        disarm(&mut self.trigger_timer, sim);
        disarm(&mut self.dump_timer, sim);
        for (_, b) in self.expire.drain() {
            b.timer.cancel(sim);
        }
        self.rtes.clear();
        self.old_rtes.clear();
    }

    /// 周期性全量通告：自身序号加 2
    pub fn on_advert_timer(&mut self, sim: &mut Simulator, net: &mut dyn NetApi) {
        self.seq_no = self.seq_no.wrapping_add(2);
        self.send_advert(sim, net);
        disarm(&mut self.trigger_timer, sim);
        let next = self.jittered_period();
        rearm(&mut self.advert_timer, sim, next, RouteAdvertTick { node: self.node });
    }

    /// 请求一次触发式通告（距上次通告至少 `min_triggered`）
    fn request_trigger(&mut self, sim: &mut Simulator) {
        if self.trigger_timer.as_ref().is_some_and(|t| t.is_armed(sim)) {
            return;
        }
        let now = sim.now();
        let earliest = self
            .last_advert
            .map_or(now, |t| t.saturating_add(self.cfg.min_triggered()));
        let delay = earliest.saturating_sub(now);
        rearm(&mut self.trigger_timer, sim, delay, RouteTriggerTick { node: self.node });
    }

    pub fn on_trigger_timer(&mut self, sim: &mut Simulator, net: &mut dyn NetApi) {
        trace!(node = %self.ip, "触发式通告");
        self.send_advert(sim, net);
    }

    pub fn on_log_dump(&mut self, sim: &mut Simulator) {
        let now = sim.now();
        let routes = self.get_all_entries(now);
        if let Some(log) = self.logger.as_mut() {
            log.log_route_dump(now, &routes);
        }
        if let Some(ms) = self.cfg.log_dump_ms {
            rearm(
                &mut self.dump_timer,
                sim,
                SimTime::from_millis(ms),
                RouteLogDump { node: self.node },
            );
        }
    }
}
