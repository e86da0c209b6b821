//! DSDV 路由通告
//!
//! 布局：`count: u16`，之后是 `count` 个 20 字节的 [`AdvertEntry`]：
//! 目的 IP 4、目的链路地址 6、序号 4、跳数 1、量化度量 1、剩余 TTL（毫秒）4。

use std::net::Ipv4Addr;

use super::{WireError, need, read_eth, read_u16, read_u32, write_u16, write_u32};
use crate::net::EtherAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertEntry {
    pub dest_ip: Ipv4Addr,
    pub dest_eth: EtherAddress,
    pub seq_no: u32,
    /// 通告者到目的地的跳数；0 表示通告者自身
    pub num_hops: u8,
    /// 量化后的度量（0xff 表示不可用）
    pub metric: u8,
    pub ttl_ms: u32,
}

impl AdvertEntry {
    pub const SIZE: usize = 20;

    fn write(&self, d: &mut [u8]) {
        d[0..4].copy_from_slice(&self.dest_ip.octets());
        d[4..10].copy_from_slice(self.dest_eth.octets());
        write_u32(d, 10, self.seq_no);
        d[14] = self.num_hops;
        d[15] = self.metric;
        write_u32(d, 16, self.ttl_ms);
    }

    fn read(d: &[u8]) -> AdvertEntry {
        AdvertEntry {
            dest_ip: Ipv4Addr::new(d[0], d[1], d[2], d[3]),
            dest_eth: read_eth(d, 4),
            seq_no: read_u32(d, 10),
            num_hops: d[14],
            metric: d[15],
            ttl_ms: read_u32(d, 16),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteAdvert {
    pub entries: Vec<AdvertEntry>,
}

impl RouteAdvert {
    pub const HEADER: usize = 2;

    pub fn encoded_len(&self) -> usize {
        Self::HEADER + self.entries.len() * AdvertEntry::SIZE
    }

    pub fn write(&self, d: &mut [u8]) -> usize {
        write_u16(d, 0, self.entries.len() as u16);
        let mut off = Self::HEADER;
        for e in &self.entries {
            e.write(&mut d[off..off + AdvertEntry::SIZE]);
            off += AdvertEntry::SIZE;
        }
        off
    }

    pub fn decode(d: &[u8]) -> Result<RouteAdvert, WireError> {
        need(d, Self::HEADER)?;
        let count = read_u16(d, 0) as usize;
        need(d, Self::HEADER + count * AdvertEntry::SIZE)?;
        let entries = (0..count)
            .map(|i| {
                let off = Self::HEADER + i * AdvertEntry::SIZE;
                AdvertEntry::read(&d[off..off + AdvertEntry::SIZE])
            })
            .collect();
        Ok(RouteAdvert { entries })
    }
}
