//! 每邻居的时延样本窗口
//!
//! 两个互相独立的映射：
//! - 正向（forward）：对端是探测发送方，我们在本地测得包对间隔；只保留最后一个样本。
//! - 反向（reverse）：我们是探测发送方，对端把测得的间隔回报给我们；保留历史，按年龄淘汰。
//!
//! 淘汰是惰性的：每次读取前执行，不另设定时器。

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::config::SampleFunction;
use crate::net::EtherAddress;
use crate::sim::SimTime;

/// 可表示的最大时延（微秒），同时作为“无样本”的哨兵值
pub const MAX_DELAY_US: u32 = 65_535;

/// 一个时延样本，创建后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayEntry {
    pub delay_us: u32,
    pub observed_at: SimTime,
}

impl DelayEntry {
    pub fn new(delay_us: u32, observed_at: SimTime) -> Self {
        Self {
            delay_us,
            observed_at,
        }
    }

    /// “没有可用样本”
    pub fn sentinel(now: SimTime) -> Self {
        Self::new(MAX_DELAY_US, now)
    }

    pub fn is_sentinel(&self) -> bool {
        self.delay_us >= MAX_DELAY_US
    }
}

/// 某个方向上与某个邻居的链路信息
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub peer: EtherAddress,
    /// 最近一次收到包对第一个帧的时间
    pub last_probe_mark: Option<SimTime>,
    /// 样本，最新的在前
    pub delays: VecDeque<DelayEntry>,
}

impl LinkInfo {
    pub fn new(peer: EtherAddress) -> Self {
        Self {
            peer,
            last_probe_mark: None,
            delays: VecDeque::new(),
        }
    }
}

/// 删除年龄超过 `max_age` 的样本（窗口按新到旧排列）
pub fn prune_older_than(window: &mut VecDeque<DelayEntry>, max_age: SimTime, now: SimTime) {
    let cutoff = now.saturating_sub(max_age);
    // 新到旧有序：找到第一个过期样本，截断其后的全部
    if let Some(idx) = window.iter().position(|e| cutoff > e.observed_at) {
        window.truncate(idx);
    }
}

/// 按聚合方式从窗口中取一个代表值
pub fn aggregate(window: &VecDeque<DelayEntry>, mode: SampleFunction) -> Option<DelayEntry> {
    match mode {
        SampleFunction::Min => window.iter().fold(None, |best: Option<&DelayEntry>, e| match best {
            Some(b) if b.delay_us <= e.delay_us => Some(b),
            _ => Some(e),
        }),
        // EWMA 未实现：返回最新样本
        SampleFunction::Ewma => window.front(),
    }
    .copied()
}

/// 正反两个方向的时延统计
#[derive(Debug, Clone)]
pub struct DelaySampler {
    forward: HashMap<EtherAddress, LinkInfo>,
    reverse: HashMap<EtherAddress, LinkInfo>,
    function: SampleFunction,
    forward_window: SimTime,
    reverse_window: SimTime,
}

impl DelaySampler {
    /// `forward_window`/`reverse_window` 为两个方向读取时允许的最大样本年龄
    pub fn new(function: SampleFunction, forward_window: SimTime, reverse_window: SimTime) -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            function,
            forward_window,
            reverse_window,
        }
    }

    pub fn function(&self) -> SampleFunction {
        self.function
    }

    /// 记录一个收到的探测帧。返回本次得到的时延样本（若有）。
    ///
    /// 序号 1 只打时间戳；紧随其后的序号 2 计算间隔。其它序号组合清除时间戳以重新同步。
    pub fn record_forward(&mut self, peer: EtherAddress, seq_no: u16, now: SimTime) -> Option<u32> {
        let info = self
            .forward
            .entry(peer)
            .or_insert_with(|| LinkInfo::new(peer));

        match (seq_no, info.last_probe_mark) {
            (1, _) => {
                trace!(peer = %peer, "包对第一个帧");
                info.last_probe_mark = Some(now);
                None
            }
            (2, Some(mark)) => {
                info.last_probe_mark = None;
                let elapsed = now.saturating_sub(mark).as_micros();
                if elapsed < MAX_DELAY_US as u64 {
                    debug!(peer = %peer, delay_us = elapsed, "记录正向时延");
                    info.delays.clear();
                    info.delays.push_front(DelayEntry::new(elapsed as u32, now));
                    Some(elapsed as u32)
                } else {
                    debug!(peer = %peer, delay_us = elapsed, "间隔超出上限，丢弃样本");
                    None
                }
            }
            _ => {
                trace!(peer = %peer, seq_no, "序号不成对，重新同步");
                info.last_probe_mark = None;
                None
            }
        }
    }

    /// 记录对端回报的（我方到对端的）时延
    pub fn record_reverse(&mut self, peer: EtherAddress, delay_us: u32, now: SimTime) {
        debug!(peer = %peer, delay_us, "记录反向时延");
        self.reverse
            .entry(peer)
            .or_insert_with(|| LinkInfo::new(peer))
            .delays
            .push_front(DelayEntry::new(delay_us, now));
    }

    /// 最近一次测得的正向时延；无样本时返回哨兵值
    pub fn forward_delay(&mut self, peer: EtherAddress, now: SimTime) -> DelayEntry {
        let Some(info) = self.forward.get_mut(&peer) else {
            return DelayEntry::sentinel(now);
        };
        prune_older_than(&mut info.delays, self.forward_window, now);
        info.delays
            .front()
            .copied()
            .unwrap_or_else(|| DelayEntry::sentinel(now))
    }

    /// 聚合后的反向时延；无样本时返回哨兵值
    pub fn reverse_delay(&mut self, peer: EtherAddress, now: SimTime) -> DelayEntry {
        let Some(info) = self.reverse.get_mut(&peer) else {
            return DelayEntry::sentinel(now);
        };
        prune_older_than(&mut info.delays, self.reverse_window, now);
        aggregate(&info.delays, self.function).unwrap_or_else(|| DelayEntry::sentinel(now))
    }

    /// 取走最新的正向样本（直接回复后使用，避免重复回报）
    pub fn take_forward(&mut self, peer: EtherAddress) -> Option<DelayEntry> {
        self.forward.get_mut(&peer)?.delays.pop_front()
    }

    pub fn forward_link(&self, peer: EtherAddress) -> Option<&LinkInfo> {
        self.forward.get(&peer)
    }

    pub fn reverse_link(&self, peer: EtherAddress) -> Option<&LinkInfo> {
        self.reverse.get(&peer)
    }
}
