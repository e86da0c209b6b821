//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。
//! 所有回调（定时器触发、帧到达）严格串行执行，执行期间不会被其它事件打断。

use super::event::{Event, EventId};
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
    /// 已调度且尚未执行/取消的事件
    live: HashSet<EventId>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 调度事件在指定时间执行，返回可用于取消的 [`EventId`]
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) -> EventId {
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        let id = EventId(seq);
        self.q.push(ScheduledEvent {
            at,
            id,
            ev: Box::new(ev),
        });
        self.live.insert(id);

        debug!(queue_size = self.q.len(), "事件已加入队列");
        id
    }

    /// 在当前时间之后 `delay` 调度事件
    pub fn schedule_after<E: Event>(&mut self, delay: SimTime, ev: E) -> EventId {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev)
    }

    /// 取消一个尚未执行的事件。返回 `false` 表示事件已执行或已被取消。
    ///
    /// 被取消的事件仍留在堆中，出队时直接丢弃。
    pub fn cancel(&mut self, id: EventId) -> bool {
        let removed = self.live.remove(&id);
        trace!(seq = id.0, removed, "取消事件");
        removed
    }

    /// 事件是否仍处于待执行状态
    pub fn is_pending(&self, id: EventId) -> bool {
        self.live.contains(&id)
    }

    /// 待执行（未取消）事件数量
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    /// 弹出下一个有效事件；被取消的事件在这里被跳过。
    fn pop_live(&mut self, until: Option<SimTime>) -> Option<ScheduledEvent> {
        while let Some(top) = self.q.peek() {
            if until.is_some_and(|u| top.at > u) {
                return None;
            }
            let item = self.q.pop()?;
            if self.live.remove(&item.id) {
                return Some(item);
            }
            trace!(seq = item.id.0, "跳过已取消事件");
        }
        None
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(item) = self.pop_live(Some(until)) {
            self.now = item.at;
            item.ev.execute(self, world);
            world.on_tick(self);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let mut event_count = 0;
        while let Some(item) = self.pop_live(None) {
            event_count += 1;
            self.now = item.at;

            debug!(
                event_num = event_count,
                now = ?self.now,
                seq = item.id.0,
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
            world.on_tick(self);
        }

        info!(
            total_events = event_count,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }
}
