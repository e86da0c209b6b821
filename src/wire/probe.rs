//! 包对探测报文

use super::{EtherHeader, WireError, need, read_eth, read_u16, write_u16};
use crate::net::EtherAddress;

/// 最小探测帧长：以太网头 + LinkProbe
pub const MIN_PROBE_FRAME: usize = EtherHeader::LEN + LinkProbe::SIZE;

/// 直接回复帧的固定长度
pub const REPLY_FRAME_SIZE: usize = 42;

/// 探测头：`seq_no` 为 1 表示包对中的第一个，2 表示第二个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkProbe {
    pub seq_no: u16,
}

impl LinkProbe {
    pub const SIZE: usize = 2;

    pub fn new(seq_no: u16) -> Self {
        Self { seq_no }
    }

    pub fn decode(d: &[u8]) -> Result<LinkProbe, WireError> {
        need(d, Self::SIZE)?;
        Ok(LinkProbe {
            seq_no: read_u16(d, 0),
        })
    }

    /// 写入线上格式，返回写入字节数
    pub fn write(&self, d: &mut [u8]) -> usize {
        write_u16(d, 0, self.seq_no);
        Self::SIZE
    }

    /// 探测头之后最多能容纳的 LinkEntry 数量
    pub fn max_entries(payload_len: usize) -> usize {
        payload_len.saturating_sub(Self::SIZE) / LinkEntry::SIZE
    }

    /// 更新校验和（目前不计算）
    pub fn update_cksum(_d: &mut [u8]) {}

    /// 计算校验和；始终为 0，因此校验总是通过
    pub fn calc_cksum(_d: &[u8]) -> u16 {
        0
    }

    pub fn cksum_ok(d: &[u8]) -> bool {
        Self::calc_cksum(d) == 0
    }
}

/// 搭载在探测报文后的时延报告：对端地址 + 时延（微秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEntry {
    pub peer: EtherAddress,
    pub delay_us: u16,
}

impl LinkEntry {
    pub const SIZE: usize = 8;

    pub fn new(peer: EtherAddress, delay_us: u16) -> Self {
        Self { peer, delay_us }
    }

    pub fn decode(d: &[u8]) -> Result<LinkEntry, WireError> {
        need(d, Self::SIZE)?;
        Ok(LinkEntry {
            peer: read_eth(d, 0),
            delay_us: read_u16(d, 6),
        })
    }

    pub fn write(&self, d: &mut [u8]) -> usize {
        d[0..6].copy_from_slice(self.peer.octets());
        write_u16(d, 6, self.delay_us);
        Self::SIZE
    }
}
