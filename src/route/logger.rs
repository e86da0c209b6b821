//! 路由日志
//!
//! 记录每次插入、单跳度量更新以及周期性的全表快照。
//! [`JsonRouteLogger`] 存在内存里，仿真结束后由调用方取出写成 JSON 文件。

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::entry::{Reason, RtEntry};
use crate::net::EtherAddress;
use crate::sim::SimTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteRecord {
    pub dest_ip: Ipv4Addr,
    pub dest_eth: EtherAddress,
    pub next_hop_ip: Ipv4Addr,
    pub seq_no: u32,
    pub num_hops: u8,
    /// `None` 表示度量不可用
    pub metric: Option<u32>,
}

impl From<&RtEntry> for RouteRecord {
    fn from(r: &RtEntry) -> Self {
        RouteRecord {
            dest_ip: r.dest_ip,
            dest_eth: r.dest_eth,
            next_hop_ip: r.next_hop_ip,
            seq_no: r.seq_no,
            num_hops: r.num_hops,
            metric: r.metric.val(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteLogEvent {
    AddedRoute {
        route: RouteRecord,
        reason: Reason,
    },
    MetricUpdate {
        neighbor: EtherAddress,
        metric: Option<u32>,
    },
    RouteDump {
        routes: Vec<RouteRecord>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLogRecord {
    /// 仿真时间（纳秒）
    pub t_ns: u64,
    pub node: Ipv4Addr,
    #[serde(flatten)]
    pub event: RouteLogEvent,
}

pub trait RouteLogger: std::fmt::Debug {
    fn log_added_route(&mut self, at: SimTime, r: &RtEntry, why: Reason);
    fn log_metric_update(&mut self, at: SimTime, r: &RtEntry);
    fn log_route_dump(&mut self, at: SimTime, routes: &[RtEntry]);

    /// 取出已缓存的记录
    fn drain(&mut self) -> Vec<RouteLogRecord> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct JsonRouteLogger {
    node: Option<Ipv4Addr>,
    pub records: Vec<RouteLogRecord>,
}

impl JsonRouteLogger {
    pub fn new(node: Ipv4Addr) -> Self {
        Self {
            node: Some(node),
            records: Vec::new(),
        }
    }

    fn push(&mut self, at: SimTime, event: RouteLogEvent) {
        self.records.push(RouteLogRecord {
            t_ns: at.0,
            node: self.node.unwrap_or(Ipv4Addr::UNSPECIFIED),
            event,
        });
    }
}

impl RouteLogger for JsonRouteLogger {
    fn log_added_route(&mut self, at: SimTime, r: &RtEntry, why: Reason) {
        self.push(
            at,
            RouteLogEvent::AddedRoute {
                route: r.into(),
                reason: why,
            },
        );
    }

    fn log_metric_update(&mut self, at: SimTime, r: &RtEntry) {
        self.push(
            at,
            RouteLogEvent::MetricUpdate {
                neighbor: r.dest_eth,
                metric: r.metric.val(),
            },
        );
    }

    fn log_route_dump(&mut self, at: SimTime, routes: &[RtEntry]) {
        self.push(
            at,
            RouteLogEvent::RouteDump {
                routes: routes.iter().map(RouteRecord::from).collect(),
            },
        );
    }

    fn drain(&mut self) -> Vec<RouteLogRecord> {
        std::mem::take(&mut self.records)
    }
}
