//! 邻居发现广播
//!
//! 布局：`seq_no: u32`、`period_ms: u32`、`count: u16`，之后是 `count` 个 [`RateEntry`]。

use super::{WireError, need, read_eth, read_u16, read_u32, write_u16, write_u32};
use crate::net::EtherAddress;

/// 某邻居的接收率报告（百分比）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateEntry {
    pub peer: EtherAddress,
    pub rate_pct: u16,
}

impl RateEntry {
    pub const SIZE: usize = 8;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryProbe {
    pub seq_no: u32,
    pub period_ms: u32,
    pub entries: Vec<RateEntry>,
}

impl DiscoveryProbe {
    pub const HEADER: usize = 10;

    pub fn encoded_len(&self) -> usize {
        Self::HEADER + self.entries.len() * RateEntry::SIZE
    }

    /// 写入 `d`（`d` 至少 `encoded_len()` 字节），返回写入字节数
    pub fn write(&self, d: &mut [u8]) -> usize {
        write_u32(d, 0, self.seq_no);
        write_u32(d, 4, self.period_ms);
        write_u16(d, 8, self.entries.len() as u16);
        let mut off = Self::HEADER;
        for e in &self.entries {
            d[off..off + 6].copy_from_slice(e.peer.octets());
            write_u16(d, off + 6, e.rate_pct);
            off += RateEntry::SIZE;
        }
        off
    }

    pub fn decode(d: &[u8]) -> Result<DiscoveryProbe, WireError> {
        need(d, Self::HEADER)?;
        let count = read_u16(d, 8) as usize;
        need(d, Self::HEADER + count * RateEntry::SIZE)?;
        let entries = (0..count)
            .map(|i| {
                let off = Self::HEADER + i * RateEntry::SIZE;
                RateEntry {
                    peer: read_eth(d, off),
                    rate_pct: read_u16(d, off + 6),
                }
            })
            .collect();
        Ok(DiscoveryProbe {
            seq_no: read_u32(d, 0),
            period_ms: read_u32(d, 4),
            entries,
        })
    }
}
