//! Event scheduler interface
//!
//! The chip core never owns the clock. It asks a host-provided scheduler for
//! the current cycle and, for hardware-backed instances, books future
//! callbacks on it. Ownership of a scheduler by one chip instance is expressed
//! by a [`SchedulerLease`], which cancels its outstanding event exactly once
//! when it is dropped.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Scheduler time in chip cycles
pub type EventClock = u64;

/// Sub-cycle clock edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPhase {
    /// First clock phase
    Phi1,
    /// Second clock phase
    Phi2,
}

/// Phase used for all chip timing
pub const CHIP_PHASE: EventPhase = EventPhase::Phi1;

/// Identifier of a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

/// Cooperative event scheduler provided by the host
pub trait EventScheduler {
    /// Current time at the given clock phase
    fn get_time(&self, phase: EventPhase) -> EventClock;

    /// Book a callback `delay` cycles from now
    fn schedule(&mut self, delay: EventClock, phase: EventPhase) -> EventId;

    /// Cancel a booked callback; unknown ids are ignored
    fn cancel(&mut self, event: EventId);
}

/// Shared handle to the host scheduler
pub type SchedulerHandle = Arc<Mutex<dyn EventScheduler + Send>>;

/// Exclusive association between one chip instance and a scheduler
///
/// Holds at most one outstanding event. Rescheduling replaces it, and dropping
/// the lease cancels it, so a callback can never fire after the owning
/// instance has been unlocked.
///
/// The lease locks the scheduler mutex when it is dropped; callers must not
/// hold that mutex while unlocking a chip.
pub struct SchedulerLease {
    scheduler: SchedulerHandle,
    pending: Option<EventId>,
}

impl SchedulerLease {
    pub(crate) fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            scheduler,
            pending: None,
        }
    }

    /// Current chip time
    pub fn time(&self) -> EventClock {
        self.scheduler.lock().get_time(CHIP_PHASE)
    }

    /// Book the lease's event, replacing any outstanding one
    pub fn schedule(&mut self, delay: EventClock) -> EventId {
        let mut scheduler = self.scheduler.lock();
        if let Some(old) = self.pending.take() {
            scheduler.cancel(old);
        }
        let id = scheduler.schedule(delay, CHIP_PHASE);
        self.pending = Some(id);
        id
    }

    /// Consume a fired event; returns false if it is not ours
    pub fn acknowledge(&mut self, event: EventId) -> bool {
        if self.pending == Some(event) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Outstanding event, if any
    pub fn pending(&self) -> Option<EventId> {
        self.pending
    }

    /// Cancel the outstanding event, if any
    pub fn cancel(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.lock().cancel(id);
        }
    }

    /// Whether this lease is bound to `scheduler`
    pub fn is_bound_to(&self, scheduler: &SchedulerHandle) -> bool {
        Arc::ptr_eq(&self.scheduler, scheduler)
    }
}

impl Drop for SchedulerLease {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for SchedulerLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerLease")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Hand-driven scheduler
///
/// Time only moves when the host calls [`ManualScheduler::advance`], which
/// returns the events that became due, in due order. Useful for offline
/// rendering and tests.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: EventClock,
    next_id: u64,
    queue: Vec<(EventClock, EventId)>,
}

impl ManualScheduler {
    /// Create a scheduler at cycle 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into a shareable handle
    pub fn into_handle(self) -> SchedulerHandle {
        Arc::new(Mutex::new(self))
    }

    /// Advance time and collect due events
    pub fn advance(&mut self, cycles: EventClock) -> Vec<EventId> {
        self.now += cycles;
        let now = self.now;
        let mut due: Vec<(EventClock, EventId)> =
            self.queue.iter().copied().filter(|&(at, _)| at <= now).collect();
        self.queue.retain(|&(at, _)| at > now);
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    /// Set the absolute time without firing anything
    pub fn set_time(&mut self, now: EventClock) {
        self.now = now;
    }

    /// Number of booked events
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether `event` is still booked
    pub fn is_pending(&self, event: EventId) -> bool {
        self.queue.iter().any(|&(_, id)| id == event)
    }
}

impl EventScheduler for ManualScheduler {
    fn get_time(&self, _phase: EventPhase) -> EventClock {
        self.now
    }

    fn schedule(&mut self, delay: EventClock, _phase: EventPhase) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.queue.push((self.now + delay, id));
        id
    }

    fn cancel(&mut self, event: EventId) {
        self.queue.retain(|&(_, id)| id != event);
    }
}
