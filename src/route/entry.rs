use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::net::EtherAddress;
use crate::sim::SimTime;

/// 路由表中的一行
///
/// 序号为偶数的行由目的节点自己产生；序号为奇数表示“已断开”，此时跳数为 0、度量不可用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtEntry {
    pub dest_ip: Ipv4Addr,
    pub dest_eth: EtherAddress,
    pub next_hop_ip: Ipv4Addr,
    pub next_hop_eth: EtherAddress,
    pub seq_no: u32,
    pub num_hops: u8,
    pub metric: Metric,
    /// 安装时的剩余有效期
    pub ttl: SimTime,
    pub last_updated: SimTime,
    /// 在此之前新路由不对外通告（期间读取者可使用旧路由）
    pub advertise_ok_at: SimTime,
}

impl RtEntry {
    /// 直连邻居的一跳路由，度量待 `init_metric` 填写
    pub fn one_hop(
        dest_ip: Ipv4Addr,
        dest_eth: EtherAddress,
        seq_no: u32,
        ttl: SimTime,
        now: SimTime,
    ) -> RtEntry {
        RtEntry {
            dest_ip,
            dest_eth,
            next_hop_ip: dest_ip,
            next_hop_eth: dest_eth,
            seq_no,
            num_hops: 1,
            metric: Metric::Bad,
            ttl,
            last_updated: now,
            advertise_ok_at: now,
        }
    }

    pub fn broken(&self) -> bool {
        self.num_hops == 0
    }

    /// 可用于转发：未断开且度量可用
    pub fn good(&self) -> bool {
        !self.broken() && self.metric.good()
    }

    /// 标记为断开：序号加一（变为奇数）、跳数清零、度量不可用
    pub fn invalidate(&mut self, now: SimTime) {
        if self.seq_no & 1 == 0 {
            self.seq_no = self.seq_no.wrapping_add(1);
        }
        self.num_hops = 0;
        self.metric = Metric::Bad;
        self.last_updated = now;
        self.advertise_ok_at = now;
    }

    pub fn remaining_ttl(&self, now: SimTime) -> SimTime {
        self.ttl.saturating_sub(now.saturating_sub(self.last_updated))
    }

    /// 行内一致性检查，失败即 panic
    pub fn check(&self) {
        rt_assert!(
            (self.num_hops > 0) != (self.seq_no & 1 == 1),
            "dest {} hops {} seq {}",
            self.dest_ip,
            self.num_hops,
            self.seq_no
        );
        rt_assert!(!self.broken() || !self.metric.good(), "dest {}", self.dest_ip);
        if self.num_hops == 1 {
            rt_assert!(
                self.next_hop_ip == self.dest_ip && self.next_hop_eth == self.dest_eth,
                "dest {}",
                self.dest_ip
            );
        }
        rt_assert!(!self.dest_eth.is_broadcast());
    }
}

/// 插入原因（写入路由日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NewDest,
    NewSeq,
    BetterMetric,
    /// 同一序号、同一下一跳的刷新
    SameNextHop,
    BrokenAdvert,
    Expired,
    NextHopExpired,
}
