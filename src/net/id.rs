//! 标识符类型
//!
//! 定义节点标识符与链路层（以太网）地址。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::wire::WireError;

/// 节点标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// 链路标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub usize);

/// 6 字节链路层地址
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EtherAddress(pub [u8; 6]);

impl EtherAddress {
    pub const LEN: usize = 6;
    pub const ZERO: EtherAddress = EtherAddress([0; 6]);
    pub const BROADCAST: EtherAddress = EtherAddress([0xff; 6]);

    /// 按节点序号派生的本地管理地址：`02:00:00:00:hi:lo`
    pub fn for_index(idx: usize) -> EtherAddress {
        let [hi, lo] = (idx as u16).to_be_bytes();
        EtherAddress([0x02, 0, 0, 0, hi, lo])
    }

    pub fn from_slice(d: &[u8]) -> Option<EtherAddress> {
        let bytes: [u8; 6] = d.get(..Self::LEN)?.try_into().ok()?;
        Some(EtherAddress(bytes))
    }

    pub fn octets(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// 用于播种随机源的 64-bit 值
    pub fn as_u64(&self) -> u64 {
        let mut b = [0u8; 8];
        b[2..].copy_from_slice(&self.0);
        u64::from_be_bytes(b)
    }
}

impl fmt::Display for EtherAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            d[0], d[1], d[2], d[3], d[4], d[5]
        )
    }
}

impl fmt::Debug for EtherAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for EtherAddress {
    type Err = WireError;

    /// 接受 `aa:bb:cc:dd:ee:ff` 或 `aa-bb-cc-dd-ee-ff`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split([':', '-']).collect();
        if parts.len() != Self::LEN {
            return Err(WireError::BadAddress(s.to_string()));
        }
        let mut out = [0u8; 6];
        for (o, p) in out.iter_mut().zip(parts) {
            *o = u8::from_str_radix(p, 16).map_err(|_| WireError::BadAddress(s.to_string()))?;
        }
        Ok(EtherAddress(out))
    }
}

impl Serialize for EtherAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EtherAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
