//! 配置
//!
//! 各组件的参数结构（可由 JSON 反序列化，缺省字段取默认值）以及启动时的校验。
//! 校验失败返回 [`ConfigError`]，对应组件不会被创建。

mod scenario;

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::EtherAddress;
use crate::sim::SimTime;
use crate::wire::{DiscoveryProbe, EtherHeader, MIN_PROBE_FRAME};

pub use scenario::{LinkDefaults, LinkSpec, ScenarioSpec, TopologySpec};

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{which} probe size {size} is less than the minimum probe size of {min}")]
    PacketTooSmall {
        which: &'static str,
        size: u32,
        min: usize,
    },
    #[error("cannot have a zero sample count")]
    ZeroSamples,
    #[error("sample function must be either 0 (MIN) or 1 (EWMA), got {0}")]
    UnknownSampleFunction(u8),
    #[error("source link-layer address must be specified to send probes")]
    MissingLocalAddress,
    #[error("`{0}` must be positive")]
    ZeroPeriod(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// 时延样本的聚合方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleFunction {
    /// 窗口内最小值
    #[default]
    Min,
    /// 未实现：返回最新样本
    Ewma,
}

impl SampleFunction {
    /// 数值编码：0 = MIN，1 = EWMA
    pub fn from_code(code: u8) -> Result<SampleFunction, ConfigError> {
        match code {
            0 => Ok(SampleFunction::Min),
            1 => Ok(SampleFunction::Ewma),
            other => Err(ConfigError::UnknownSampleFunction(other)),
        }
    }
}

/// 探测轮次的发送方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSchedule {
    /// 每个 `probe_delay` 只给一个邻居发一对探测
    #[default]
    Staggered,
    /// 轮次定时器内一次性给所有邻居发送
    Batch,
}

/// 接收方回报时延的方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplyMode {
    /// 收到包对后立即单播回复
    #[default]
    Direct,
    /// 搭载在下一轮发往该邻居的探测中
    Piggyback,
}

/// 包对探测（ETT 统计）参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EttConfig {
    /// 反向时延窗口覆盖的采样周期数
    pub samples: u8,
    pub period_ms: u64,
    /// 周期的容差比例
    pub sample_margin: f64,
    /// 包对中第一个帧的长度（含以太网头）
    pub first_size: u32,
    /// 包对中第二个帧的长度（含以太网头），也是带宽估计的参考长度
    pub second_size: u32,
    /// 错开发送时相邻两对探测之间的间隔
    pub probe_delay_ms: u64,
    pub function: SampleFunction,
    pub eth: Option<EtherAddress>,
    pub schedule: ProbeSchedule,
    pub reply: ReplyMode,
}

impl Default for EttConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            period_ms: 1_000,
            sample_margin: 0.1,
            first_size: 30,
            second_size: 30,
            probe_delay_ms: 1,
            function: SampleFunction::Min,
            eth: None,
            schedule: ProbeSchedule::Staggered,
            reply: ReplyMode::Direct,
        }
    }
}

impl EttConfig {
    pub fn period(&self) -> SimTime {
        SimTime::from_millis(self.period_ms)
    }

    pub fn probe_delay(&self) -> SimTime {
        SimTime::from_millis(self.probe_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (which, size) in [("first", self.first_size), ("second", self.second_size)] {
            if (size as usize) < MIN_PROBE_FRAME {
                return Err(ConfigError::PacketTooSmall {
                    which,
                    size,
                    min: MIN_PROBE_FRAME,
                });
            }
        }
        if self.samples == 0 {
            return Err(ConfigError::ZeroSamples);
        }
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("ett.period_ms"));
        }
        if !(self.sample_margin.is_finite() && self.sample_margin >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "ett.sample_margin must be a non-negative number, got {}",
                self.sample_margin
            )));
        }
        if self.eth.is_none() {
            return Err(ConfigError::MissingLocalAddress);
        }
        Ok(())
    }
}

/// ETX 邻居发现/接收率统计参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkStatConfig {
    pub period_ms: u64,
    /// 统计窗口
    pub tau_ms: u64,
    /// 广播帧长（含以太网头）
    pub probe_size: u32,
}

impl Default for LinkStatConfig {
    fn default() -> Self {
        Self {
            period_ms: 1_000,
            tau_ms: 10_000,
            probe_size: 134,
        }
    }
}

impl LinkStatConfig {
    pub fn period(&self) -> SimTime {
        SimTime::from_millis(self.period_ms)
    }

    pub fn tau(&self) -> SimTime {
        SimTime::from_millis(self.tau_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("linkstat.period_ms"));
        }
        let min = EtherHeader::LEN + DiscoveryProbe::HEADER;
        if (self.probe_size as usize) < min {
            return Err(ConfigError::PacketTooSmall {
                which: "discovery",
                size: self.probe_size,
                min,
            });
        }
        if self.tau_ms < self.period_ms {
            return Err(ConfigError::Invalid(format!(
                "linkstat.tau_ms ({}) must be at least linkstat.period_ms ({})",
                self.tau_ms, self.period_ms
            )));
        }
        Ok(())
    }
}

/// ETX × ETT 组合度量参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EttMetricConfig {
    /// 计算传输时间所用的包长（字节）
    pub packet_size: u32,
    /// 反向时延的偏差校正（微秒）
    pub calibration_us: u32,
}

impl Default for EttMetricConfig {
    fn default() -> Self {
        Self {
            packet_size: 1024,
            calibration_us: 100,
        }
    }
}

/// DSDV 路由表参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTableConfig {
    /// 周期性全量通告间隔
    pub period_ms: u64,
    /// 路由过期的全表上限
    pub timeout_ms: u64,
    /// 新路由的最短通告间隔；旧路由在此窗口内可被读取
    pub settle_ms: u64,
    pub use_old_route: bool,
    /// 为真时不接受度量无效的路由
    pub ignore_invalid_routes: bool,
    /// 两次触发式通告之间的最小间隔
    pub min_triggered_ms: u64,
    /// 周期性向日志器输出全表；None 表示关闭
    pub log_dump_ms: Option<u64>,
}

impl Default for RouteTableConfig {
    fn default() -> Self {
        Self {
            period_ms: 15_000,
            timeout_ms: 60_000,
            settle_ms: 3_000,
            use_old_route: true,
            ignore_invalid_routes: false,
            min_triggered_ms: 1_000,
            log_dump_ms: None,
        }
    }
}

impl RouteTableConfig {
    pub fn period(&self) -> SimTime {
        SimTime::from_millis(self.period_ms)
    }

    pub fn timeout(&self) -> SimTime {
        SimTime::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> SimTime {
        SimTime::from_millis(self.settle_ms)
    }

    pub fn min_triggered(&self) -> SimTime {
        SimTime::from_millis(self.min_triggered_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod("routes.period_ms"));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroPeriod("routes.timeout_ms"));
        }
        if self.log_dump_ms == Some(0) {
            return Err(ConfigError::ZeroPeriod("routes.log_dump_ms"));
        }
        Ok(())
    }
}

/// 单个节点的完整配置
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub ip: Ipv4Addr,
    pub eth: EtherAddress,
    pub ett: EttConfig,
    pub linkstat: LinkStatConfig,
    pub metric: EttMetricConfig,
    pub routes: RouteTableConfig,
    /// 随机源种子（与地址混合后使用）
    pub seed: u64,
}

impl NodeConfig {
    /// 以默认参数为序号 `idx` 的节点生成配置（地址由序号派生）
    pub fn for_index(idx: usize) -> NodeConfig {
        let eth = EtherAddress::for_index(idx);
        let [hi, lo] = ((idx + 1) as u16).to_be_bytes();
        NodeConfig {
            name: format!("n{idx}"),
            ip: Ipv4Addr::new(10, 0, hi, lo),
            eth,
            ett: EttConfig {
                eth: Some(eth),
                ..EttConfig::default()
            },
            linkstat: LinkStatConfig::default(),
            metric: EttMetricConfig::default(),
            routes: RouteTableConfig::default(),
            seed: 1,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ett.validate()?;
        self.linkstat.validate()?;
        self.routes.validate()?;
        if self.metric.packet_size == 0 {
            return Err(ConfigError::Invalid("metric.packet_size must be positive".into()));
        }
        Ok(())
    }
}
