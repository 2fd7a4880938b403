//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件循环终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 下一个事件晚于 horizon（或恰好没有事件而时间已推进到 horizon）
    Horizon,
    /// 事件队列已空
    QueueEmpty,
}

/// 一次 `run_until` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub events: u64,
    pub final_time: SimTime,
}

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 队列中尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定时间执行。早于当前时间的调度会被钳到 `now`。
    #[tracing::instrument(level = "trace", skip(self, ev), fields(event_type = ev.label(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
    }

    /// 在 `now + delay` 调度事件
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev);
    }

    /// 运行直到事件队列为空或下一个事件晚于 `until`。
    ///
    /// 恰好在 `until` 时刻的事件仍会执行；到达 horizon 时 `now` 推进到 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) -> RunOutcome {
        info!(horizon = %until, queue_size = self.q.len(), "▶️  开始运行仿真");

        let mut events = 0u64;
        let reason = loop {
            let Some(top) = self.q.peek() else {
                break StopReason::QueueEmpty;
            };
            if top.at > until {
                break StopReason::Horizon;
            }
            let Some(item) = self.q.pop() else {
                break StopReason::QueueEmpty;
            };
            events += 1;
            self.now = item.at;
            trace!(
                event_num = events,
                now = ?self.now,
                seq = item.seq,
                event = item.ev.label(),
                "执行事件"
            );
            item.ev.execute(self, world);
            world.on_tick(self);
        };

        if reason == StopReason::QueueEmpty {
            debug!(now = ?self.now, "事件队列已空");
        }
        if until != SimTime::MAX {
            self.now = self.now.max(until);
        }
        world.on_finish(self);

        info!(
            total_events = events,
            final_time = %self.now,
            reason = ?reason,
            "✅ 仿真完成"
        );
        RunOutcome {
            reason,
            events,
            final_time: self.now,
        }
    }

    /// 运行所有事件直到队列为空。
    pub fn run(&mut self, world: &mut dyn World) -> RunOutcome {
        self.run_until(SimTime::MAX, world)
    }
}
