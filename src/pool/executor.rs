//! Lock-free command serialization (§9 "Command-executor pattern", §4.4).
//!
//! Every pool state mutation is a boxed closure ("command") pushed onto a
//! [`crossbeam_queue::SegQueue`]. Whichever caller finds the "draining" flag
//! unset claims it and drains the queue to empty, running each command in
//! FIFO order with no reentrancy; any other caller just enqueues and returns.
//! This gives single-writer semantics over `PoolState` without a lock, and
//! without pinning all mutation to one dedicated task the way a literal
//! "event loop" thread would.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crossbeam_queue::SegQueue;

type Command = Box<dyn FnOnce() + Send>;

struct Inner {
    queue: SegQueue<Command>,
    draining: AtomicBool,
}

/// A cloneable handle to the command queue for one pool.
#[derive(Clone)]
pub(crate) struct CommandExecutor {
    inner: Arc<Inner>,
}

impl CommandExecutor {
    pub(crate) fn new() -> Self {
        CommandExecutor {
            inner: Arc::new(Inner {
                queue: SegQueue::new(),
                draining: AtomicBool::new(false),
            }),
        }
    }

    /// Submit a command. Runs inline (possibly along with other queued
    /// commands) if no drain is in progress, otherwise enqueues and returns
    /// immediately — the command runs on whichever thread is (or becomes)
    /// the drainer.
    pub(crate) fn submit<F>(&self, command: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.queue.push(Box::new(command));
        self.drain_if_claimable();
    }

    fn drain_if_claimable(&self) {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // someone else is already draining; they will see our push.
            return;
        }

        loop {
            while let Some(command) = self.inner.queue.pop() {
                command();
            }
            // Release the flag, then re-check: a command may have been
            // pushed by another thread between our last `pop` returning
            // `None` and us clearing the flag.
            self.inner.draining.store(false, Ordering::Release);
            if self.inner.queue.is_empty() {
                break;
            }
            if self
                .inner
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn commands_run_in_fifo_order() {
        let exec = CommandExecutor::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let order = order.clone();
            exec.submit(move || order.lock().unwrap().push(i));
        }

        assert_eq!(order.lock().unwrap().as_slice(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn nested_submit_from_within_a_command_still_runs() {
        let exec = CommandExecutor::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let exec2 = exec.clone();
        let order2 = order.clone();
        exec.submit(move || {
            order2.lock().unwrap().push(1);
            let order3 = order2.clone();
            exec2.submit(move || order3.lock().unwrap().push(2));
        });

        assert_eq!(order.lock().unwrap().as_slice(), &[1, 2]);
    }
}
