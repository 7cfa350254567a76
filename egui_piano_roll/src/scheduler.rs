//! 可取消的定时事件队列。
//!
//! 事件以 (截止时间, 动作) 的形式提交，由宿主每帧用当前时钟调用 [`TimerQueue::pop_due`]
//! 取出到期的动作。取消全部待处理事件只需一次 [`TimerQueue::cancel_all`]。

use std::collections::VecDeque;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Debug)]
struct Timer<A> {
    handle: TimerHandle,
    deadline: f64, // seconds on the host clock
    action: A,
}

/// Pending actions kept sorted by deadline. Actions with equal deadlines fire
/// in submission order.
#[derive(Clone, Debug)]
pub struct TimerQueue<A> {
    timers: VecDeque<Timer<A>>,
    next_handle: u64,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self {
            timers: VecDeque::new(),
            next_handle: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.front().map(|t| t.deadline)
    }

    pub fn schedule_at(&mut self, deadline: f64, action: A) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let index = self.timers.partition_point(|t| t.deadline <= deadline);
        self.timers.insert(
            index,
            Timer {
                handle,
                deadline,
                action,
            },
        );
        handle
    }

    pub fn schedule_after(&mut self, now: f64, delay: Duration, action: A) -> TimerHandle {
        self.schedule_at(now + delay.as_secs_f64(), action)
    }

    /// Submits a batch of (offset, action) pairs relative to `now`.
    pub fn schedule_all<I>(&mut self, now: f64, batch: I) -> Vec<TimerHandle>
    where
        I: IntoIterator<Item = (Duration, A)>,
    {
        batch
            .into_iter()
            .map(|(delay, action)| self.schedule_after(now, delay, action))
            .collect()
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        before != self.timers.len()
    }

    /// Drops every pending action. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    /// Removes and returns the earliest action whose deadline has passed,
    /// together with that deadline.
    pub fn pop_due(&mut self, now: f64) -> Option<(f64, A)> {
        if self.timers.front()?.deadline <= now {
            self.timers.pop_front().map(|t| (t.deadline, t.action))
        } else {
            None
        }
    }
}

pub fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64((ms / 1000.0).max(0.0))
}
