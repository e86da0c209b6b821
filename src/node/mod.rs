//! 无线网状网节点
//!
//! 把一个节点上的所有组件（LinkStat、EttStat、度量、路由表）组装在一起，
//! 按以太网类型把收到的帧分发给对应组件。

mod events;

use std::net::Ipv4Addr;

use tracing::{debug, info};

use crate::config::{ConfigError, EttMetricConfig, NodeConfig};
use crate::ett::EttStat;
use crate::linkstat::LinkStat;
use crate::metric::{EttMetric, LinkMetric, Metric};
use crate::net::{EtherAddress, Frame, Network, NodeId};
use crate::route::{JsonRouteLogger, RouteTable};
use crate::sim::{SimTime, Simulator, SplitMix64, mix64};
use crate::wire::{
    ETHERTYPE_DISCOVERY, ETHERTYPE_PROBE, ETHERTYPE_PROBE_REPLY, ETHERTYPE_ROUTE_ADVERT, RouteAdvert,
};

pub use events::{
    EttProbeTick, EttRoundTick, LinkStatTick, RouteAdvertTick, RouteExpire, RouteLogDump,
    RouteTriggerTick,
};

#[derive(Debug)]
pub struct MeshNode {
    id: NodeId,
    name: String,
    ip: Ipv4Addr,
    eth: EtherAddress,
    pub linkstat: LinkStat,
    pub ett: EttStat,
    metric_cfg: EttMetricConfig,
    pub routes: RouteTable,
}

impl MeshNode {
    /// 校验配置并创建节点；各组件的随机源由种子与地址派生
    pub fn new(id: NodeId, cfg: NodeConfig) -> Result<MeshNode, ConfigError> {
        cfg.validate()?;
        let base = cfg.seed ^ mix64(cfg.eth.as_u64());
        let linkstat = LinkStat::new(
            id,
            cfg.eth,
            cfg.linkstat,
            Box::new(SplitMix64::new(mix64(base ^ 1))),
        )?;
        let ett = EttStat::new(id, cfg.ett, Box::new(SplitMix64::new(mix64(base ^ 2))), base)?;
        let routes = RouteTable::new(
            id,
            cfg.ip,
            cfg.eth,
            cfg.routes,
            Box::new(SplitMix64::new(mix64(base ^ 3))),
        )?;
        Ok(MeshNode {
            id,
            name: cfg.name,
            ip: cfg.ip,
            eth: cfg.eth,
            linkstat,
            ett,
            metric_cfg: cfg.metric,
            routes,
        })
    }

    /// 启用 JSON 路由日志
    pub fn with_route_log(mut self) -> Self {
        self.routes.set_logger(Box::new(JsonRouteLogger::new(self.ip)));
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn eth(&self) -> EtherAddress {
        self.eth
    }

    pub fn metric_config(&self) -> &EttMetricConfig {
        &self.metric_cfg
    }

    /// 到某个邻居的 ETX × ETT 度量
    pub fn link_metric(&mut self, peer: EtherAddress, now: SimTime) -> Metric {
        EttMetric::new(&self.linkstat, &mut self.ett, &self.metric_cfg).link_metric(peer, now)
    }

    /// 调度所有组件的第一个定时器
    pub fn start(&mut self, sim: &mut Simulator) {
        info!(node = %self.name, ip = %self.ip, eth = %self.eth, "🚀 节点启动");
        self.linkstat.start(sim);
        self.ett.start(sim);
        self.routes.start(sim);
    }

    /// 取消全部定时器
    pub fn shutdown(&mut self, sim: &mut Simulator) {
        info!(node = %self.name, "节点关闭");
        self.linkstat.stop(sim);
        self.ett.stop(sim);
        self.routes.stop(sim);
    }

    /// 收到帧：按以太网类型分发
    #[tracing::instrument(skip(self, frame, sim, net), fields(node = %self.name, src = %frame.src, ethertype = frame.ethertype))]
    pub fn on_frame(&mut self, frame: Frame, sim: &mut Simulator, net: &mut Network) {
        let now = sim.now();
        match frame.ethertype {
            ETHERTYPE_DISCOVERY => {
                self.linkstat.on_frame(&frame, now);
                self.ett.on_discovery(frame.src, now);
            }
            ETHERTYPE_PROBE | ETHERTYPE_PROBE_REPLY => {
                self.ett.on_frame(&frame, sim, net);
            }
            ETHERTYPE_ROUTE_ADVERT => match RouteAdvert::decode(&frame.payload) {
                Ok(adv) => {
                    let mut metric = EttMetric::new(&self.linkstat, &mut self.ett, &self.metric_cfg);
                    self.routes
                        .handle_advert(frame.src, &adv, Some(&mut metric as &mut dyn LinkMetric), sim);
                }
                Err(e) => {
                    debug!(error = %e, "路由通告解析失败");
                    net.drop_invalid(self.id, &frame);
                }
            },
            other => {
                debug!(ethertype = other, "未知以太网类型");
                net.drop_invalid(self.id, &frame);
            }
        }
    }
}
