//! 队列中的事件
//!
//! 堆按 (触发时间, 事件编号) 取最小；同一时刻的事件按调度先后执行。

use super::event::{Event, EventId};
use super::time::SimTime;
use std::cmp::{Ordering, Reverse};

pub(crate) struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) id: EventId,
    pub(crate) ev: Box<dyn Event>,
}

impl ScheduledEvent {
    fn key(&self) -> Reverse<(SimTime, EventId)> {
        Reverse((self.at, self.id))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}
