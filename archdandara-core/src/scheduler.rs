use std::collections::VecDeque;

/// Tasks waiting for a number of frame boundaries to pass.
///
/// Nothing blocks: the host calls [`FrameScheduler::advance`] once per
/// frame and receives whatever became due, in scheduling order.
#[derive(Debug, Clone)]
pub struct FrameScheduler<T> {
    pending: VecDeque<(T, u32)>,
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }
}

impl<T> FrameScheduler<T> {
    /// Queues `task` to come due after `frames` calls to `advance`. Zero is
    /// treated as one: a task never runs inside the frame that queued it.
    pub fn schedule(&mut self, task: T, frames: u32) {
        self.pending.push_back((task, frames.max(1)));
    }

    pub fn advance(&mut self) -> Vec<T> {
        let mut due = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.pending.len());
        for (task, frames) in self.pending.drain(..) {
            if frames <= 1 {
                due.push(task);
            } else {
                waiting.push_back((task, frames - 1));
            }
        }
        self.pending = waiting;
        due
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = &T> {
        self.pending.iter().map(|(task, _)| task)
    }
}

#[cfg(test)]
mod tests {
    use super::FrameScheduler;

    #[test]
    fn task_comes_due_on_its_frame() {
        let mut scheduler = FrameScheduler::default();
        scheduler.schedule("Hub", 2);

        assert!(scheduler.advance().is_empty());
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.advance(), vec!["Hub"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn due_tasks_keep_scheduling_order() {
        let mut scheduler = FrameScheduler::default();
        scheduler.schedule("Hub", 2);
        scheduler.advance();
        scheduler.schedule("Valley", 1);
        scheduler.schedule("Cave", 0);

        assert_eq!(scheduler.pending().copied().collect::<Vec<_>>(), ["Hub", "Valley", "Cave"]);
        assert_eq!(scheduler.advance(), vec!["Hub", "Valley", "Cave"]);
    }
}
