//! 线上格式（所有整数均为大端序）
//!
//! - 以太网头：目的地址 6 + 源地址 6 + 类型 2
//! - [`LinkProbe`]：2 字节序号，后跟零个或多个 [`LinkEntry`]
//! - [`DiscoveryProbe`]：邻居发现广播（携带各邻居的接收率）
//! - [`RouteAdvert`]：DSDV 路由通告
//!
//! 解码只做长度检查，不做协议层面的校验；调用方负责先检查最小帧长与以太网类型。

mod advert;
mod discovery;
mod probe;

use thiserror::Error;

use crate::net::EtherAddress;

pub use advert::{AdvertEntry, RouteAdvert};
pub use discovery::{DiscoveryProbe, RateEntry};
pub use probe::{LinkEntry, LinkProbe, MIN_PROBE_FRAME, REPLY_FRAME_SIZE};

/// 链路层发现广播（ETX 的 LinkStat）
pub const ETHERTYPE_DISCOVERY: u16 = 0x7ffe;
/// 包对探测
pub const ETHERTYPE_PROBE: u16 = 0x7ffb;
/// 包对探测的直接回复
pub const ETHERTYPE_PROBE_REPLY: u16 = 0x7ffc;
/// DSDV 路由通告
pub const ETHERTYPE_ROUTE_ADVERT: u16 = 0x7fff;

/// 线上格式错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated input: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("malformed link-layer address `{0}`")]
    BadAddress(String),
}

pub(crate) fn need(d: &[u8], n: usize) -> Result<(), WireError> {
    if d.len() < n {
        return Err(WireError::Truncated {
            need: n,
            have: d.len(),
        });
    }
    Ok(())
}

pub(crate) fn read_u16(d: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([d[at], d[at + 1]])
}

pub(crate) fn write_u16(d: &mut [u8], at: usize, v: u16) {
    d[at..at + 2].copy_from_slice(&v.to_be_bytes());
}

pub(crate) fn read_u32(d: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([d[at], d[at + 1], d[at + 2], d[at + 3]])
}

pub(crate) fn write_u32(d: &mut [u8], at: usize, v: u32) {
    d[at..at + 4].copy_from_slice(&v.to_be_bytes());
}

pub(crate) fn read_eth(d: &[u8], at: usize) -> EtherAddress {
    let mut b = [0u8; 6];
    b.copy_from_slice(&d[at..at + 6]);
    EtherAddress(b)
}

/// 以太网头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtherHeader {
    pub dst: EtherAddress,
    pub src: EtherAddress,
    pub ethertype: u16,
}

impl EtherHeader {
    pub const LEN: usize = 14;

    pub fn read(d: &[u8]) -> Result<EtherHeader, WireError> {
        need(d, Self::LEN)?;
        Ok(EtherHeader {
            dst: read_eth(d, 0),
            src: read_eth(d, 6),
            ethertype: read_u16(d, 12),
        })
    }

    /// 写入 `d` 的前 14 字节；`d` 必须至少 14 字节
    pub fn write(&self, d: &mut [u8]) -> usize {
        d[0..6].copy_from_slice(self.dst.octets());
        d[6..12].copy_from_slice(self.src.octets());
        write_u16(d, 12, self.ethertype);
        Self::LEN
    }
}
