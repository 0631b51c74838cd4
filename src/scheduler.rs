//! Tick Scheduler
//!
//! Virtual-time queue of one-shot continuations driven by the frame loop.
//! Typing reveal, choice transitions, dialog cooldown and objective
//! confirmation windows all run through here instead of real timers.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

/// Handle for cancelling a scheduled continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type Task = Box<dyn FnOnce()>;

#[derive(Default)]
pub struct Scheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    /// Due time + insertion order keeps firing order stable
    queue: RefCell<BTreeMap<(Duration, TimerId), Task>>,
    due_times: RefCell<HashMap<TimerId, Duration>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Number of continuations still waiting to fire
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.due_times.borrow().contains_key(&id)
    }

    /// Run `task` once `delay` of virtual time has passed
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let due = self.now.get() + delay;
        self.queue.borrow_mut().insert((due, id), Box::new(task));
        self.due_times.borrow_mut().insert(id, due);
        id
    }

    /// Like [`schedule`](Self::schedule), but the task is skipped if `ticket`
    /// has gone stale by the time it fires
    pub fn schedule_guarded(
        &self,
        delay: Duration,
        ticket: Ticket,
        task: impl FnOnce() + 'static,
    ) -> TimerId {
        self.schedule(delay, move || {
            if ticket.is_current() {
                task();
            } else {
                trace!(generation = ticket.value, "dropping stale continuation");
            }
        })
    }

    /// Cancel a pending continuation; returns false if it already fired
    pub fn cancel(&self, id: TimerId) -> bool {
        let Some(due) = self.due_times.borrow_mut().remove(&id) else {
            return false;
        };
        self.queue.borrow_mut().remove(&(due, id)).is_some()
    }

    /// Drop every pending continuation without running it
    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
        self.due_times.borrow_mut().clear();
    }

    /// Move the clock forward by `dt`, firing everything that comes due
    ///
    /// Each continuation runs with the clock set to its own due time, so work
    /// it schedules is timed correctly and may fire in this same call.
    pub fn advance(&self, dt: Duration) -> usize {
        let target = self.now.get() + dt;
        let mut fired = 0;

        loop {
            // Release the queue borrow before running the task
            let next = {
                let mut queue = self.queue.borrow_mut();
                match queue.first_key_value() {
                    Some((&(due, _), _)) if due <= target => queue.pop_first(),
                    _ => None,
                }
            };
            let Some(((due, id), task)) = next else {
                break;
            };

            self.due_times.borrow_mut().remove(&id);
            self.now.set(due);
            task();
            fired += 1;
        }

        self.now.set(target);
        fired
    }
}

/// Shared counter identifying the current session of some piece of work
#[derive(Debug, Clone, Default)]
pub struct Generation {
    counter: Rc<Cell<u64>>,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.counter.get()
    }

    /// Ticket for the current generation
    pub fn ticket(&self) -> Ticket {
        Ticket {
            counter: Rc::clone(&self.counter),
            value: self.counter.get(),
        }
    }

    /// Invalidate all outstanding tickets and return one for the new generation
    pub fn bump(&self) -> Ticket {
        self.counter.set(self.counter.get() + 1);
        self.ticket()
    }
}

/// Captured generation value; stale once the generation is bumped
#[derive(Debug, Clone)]
pub struct Ticket {
    counter: Rc<Cell<u64>>,
    value: u64,
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.counter.get() == self.value
    }
}

/// Convert configured milliseconds to a delay
pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
