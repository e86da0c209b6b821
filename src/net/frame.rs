//! 链路层帧
//!
//! 帧 = 以太网头（目的 6 + 源 6 + 类型 2）+ 载荷。`len()` 与线上字节数一致。

use super::id::EtherAddress;
use crate::wire::{EtherHeader, WireError};

/// 链路层帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 仿真内部编号（不上线），用于确定性丢包判定
    pub id: u64,
    pub dst: EtherAddress,
    pub src: EtherAddress,
    pub ethertype: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    /// 帧总长（字节）
    pub fn len(&self) -> usize {
        EtherHeader::LEN + self.payload.len()
    }

    pub fn header(&self) -> EtherHeader {
        EtherHeader {
            dst: self.dst,
            src: self.src,
            ethertype: self.ethertype,
        }
    }

    /// 线上字节表示
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len()];
        self.header().write(&mut out[..EtherHeader::LEN]);
        out[EtherHeader::LEN..].copy_from_slice(&self.payload);
        out
    }

    /// 从线上字节恢复帧
    pub fn from_bytes(id: u64, d: &[u8]) -> Result<Frame, WireError> {
        let h = EtherHeader::read(d)?;
        Ok(Frame {
            id,
            dst: h.dst,
            src: h.src,
            ethertype: h.ethertype,
            payload: d[EtherHeader::LEN..].to_vec(),
        })
    }
}
