// Deferred store commands with cancellation handles.
use std::time::Duration;

use bevy::prelude::*;

/// Handle returned by [`Scheduler::schedule`]. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Follow-up work a store command can queue for later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    HideMessage,
    /// First link of the win chain: fires with the win message hide.
    BeginStageAdvance,
    AdvanceStage,
    ClearFallDebounce,
}

struct Pending {
    id: TaskId,
    timer: Timer,
    action: Deferred,
}

#[derive(Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<Pending>,
}

impl Scheduler {
    pub fn schedule(&mut self, delay: Duration, action: Deferred) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.pending.push(Pending {
            id,
            timer: Timer::new(delay, TimerMode::Once),
            action,
        });
        id
    }

    /// Returns false if the task already fired or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|task| task.id != id);
        self.pending.len() != before
    }

    #[cfg(test)]
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.iter().any(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Advances every timer by `delta` and drains the ones that finished,
    /// in the order they were scheduled.
    pub fn tick(&mut self, delta: Duration) -> Vec<Deferred> {
        let mut fired = Vec::new();
        self.pending.retain_mut(|task| {
            if task.timer.tick(delta).just_finished() {
                fired.push(task.action);
                false
            } else {
                true
            }
        });
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_delay() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(Duration::from_secs(2), Deferred::ClearFallDebounce);

        assert!(scheduler.tick(Duration::from_millis(1500)).is_empty());
        assert_eq!(
            scheduler.tick(Duration::from_millis(600)),
            vec![Deferred::ClearFallDebounce]
        );
        assert!(scheduler.tick(Duration::from_secs(10)).is_empty());
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut scheduler = Scheduler::default();
        let hide = scheduler.schedule(Duration::from_secs(6), Deferred::HideMessage);
        assert!(scheduler.is_pending(hide));
        assert!(scheduler.cancel(hide));
        assert!(!scheduler.cancel(hide));
        assert!(scheduler.tick(Duration::from_secs(7)).is_empty());
    }

    #[test]
    fn simultaneous_tasks_fire_in_schedule_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(Duration::from_secs(6), Deferred::HideMessage);
        scheduler.schedule(Duration::from_secs(6), Deferred::BeginStageAdvance);
        assert_eq!(
            scheduler.tick(Duration::from_secs(6)),
            vec![Deferred::HideMessage, Deferred::BeginStageAdvance]
        );
    }
}
