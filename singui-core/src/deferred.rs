//! Deferred Tasks
//!
//! Bindings want to go live "as soon as possible", even for nodes that are
//! never attached through the builder. Rust has no ambient event loop to
//! post that work to, so it is queued here and the host drains the queue
//! when it is convenient: a browser host from a macrotask, a server
//! renderer right before serializing, a test whenever it likes.
//!
//! # How Flushing Works
//!
//! [`DeferredQueue::flush`] pops tasks one at a time and runs them with no
//! borrow held, so a task may schedule more tasks. Those run in the same
//! flush, after everything queued before them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

type Task = Box<dyn FnOnce()>;

/// A FIFO of one-shot tasks. Clones share the queue.
#[derive(Clone, Default)]
pub struct DeferredQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task for the next flush.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + 'static,
    {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run queued tasks until the queue is empty. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            task();
            ran += 1;
        }
        if ran > 0 {
            debug!(tasks = ran, "flushed deferred tasks");
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn tasks_run_in_order_on_flush() {
        let queue = DeferredQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            queue.schedule(move || log.borrow_mut().push(i));
        }

        assert!(log.borrow().is_empty());
        assert_eq!(queue.flush(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(queue.flush(), 0);
    }

    #[test]
    fn tasks_may_schedule_tasks() {
        let queue = DeferredQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (q, l) = (queue.clone(), log.clone());
        queue.schedule(move || {
            l.borrow_mut().push("outer");
            let l = l.clone();
            q.schedule(move || l.borrow_mut().push("inner"));
        });

        assert_eq!(queue.flush(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
        assert!(queue.is_empty());
    }
}
