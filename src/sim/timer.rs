//! 定时器句柄
//!
//! 把一个已调度事件包装为独占所有权的句柄：持有者负责在替换/销毁自身状态之前取消它。

use super::event::{Event, EventId};
use super::simulator::Simulator;
use super::time::SimTime;

/// 独占的定时器句柄（不可 Clone）。
#[derive(Debug, PartialEq, Eq)]
pub struct TimerHandle {
    id: EventId,
    fires_at: SimTime,
}

impl TimerHandle {
    /// 在 `at` 时刻调度事件并返回其句柄
    pub fn schedule<E: Event>(sim: &mut Simulator, at: SimTime, ev: E) -> TimerHandle {
        let id = sim.schedule(at, ev);
        TimerHandle { id, fires_at: at }
    }

    /// 在当前时间之后 `delay` 调度
    pub fn schedule_after<E: Event>(sim: &mut Simulator, delay: SimTime, ev: E) -> TimerHandle {
        let at = sim.now().saturating_add(delay);
        Self::schedule(sim, at, ev)
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn fires_at(&self) -> SimTime {
        self.fires_at
    }

    /// 定时器是否仍在等待触发
    pub fn is_armed(&self, sim: &Simulator) -> bool {
        sim.is_pending(self.id)
    }

    /// 取消并销毁句柄
    pub fn cancel(self, sim: &mut Simulator) {
        sim.cancel(self.id);
    }
}

/// 重新装填一个可选定时器槽位：先取消旧定时器，再放入新的。
pub fn rearm<E: Event>(
    slot: &mut Option<TimerHandle>,
    sim: &mut Simulator,
    delay: SimTime,
    ev: E,
) {
    if let Some(old) = slot.take() {
        old.cancel(sim);
    }
    *slot = Some(TimerHandle::schedule_after(sim, delay, ev));
}

/// 取消槽位中的定时器（若有）
pub fn disarm(slot: &mut Option<TimerHandle>, sim: &mut Simulator) {
    if let Some(old) = slot.take() {
        old.cancel(sim);
    }
}
