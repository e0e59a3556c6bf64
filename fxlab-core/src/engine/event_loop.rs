//! Single-threaded event loop over simulated time.
//!
//! The loop owns the only clock in the system. Work is dispatched in a total
//! order: events at the same timestamp execute in insertion order, zero-delay
//! "chores" drain to exhaustion before the next future event fires, and
//! replayable sources are stepped one timestamped batch at a time. Two runs
//! over the same inputs dispatch the exact same sequence.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::rc::Rc;

use thiserror::Error;

use crate::domain::time::{TimestampNs, NO_EVENT};

/// A scheduled callback. Fires exactly once.
pub type Event = Box<dyn FnOnce()>;

/// Sequence number used to break ties between simultaneous events.
pub type EventId = i64;

/// Upper bound on registered replayable sources.
const MAX_REPLAYABLES: usize = 4096;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("replayable limit reached ({MAX_REPLAYABLES})")]
    ReplayableLimit,
}

/// Access to the simulated clock and scheduler, as exposed to strategies and
/// venue simulators. Components must source time exclusively from here.
pub trait EventDispatcher {
    /// Current simulated time.
    fn event_time(&self) -> TimestampNs;

    /// Schedules `event` to run `delta_ns` from now. A zero delta enqueues a
    /// chore that runs before any future event; simultaneous events run in
    /// posting order.
    fn post_event(&self, delta_ns: TimestampNs, event: Event) -> EventId;
}

/// A source of timestamped callbacks driven by the loop, e.g. a market-data
/// replayer. The loop polls [`next_event_time`](Replayable::next_event_time)
/// after every step and re-arms until the source reports [`NO_EVENT`].
pub trait Replayable {
    fn next_event_time(&self) -> TimestampNs;
    fn dispatch_next_event(&self);
    fn skip(&self, ts: TimestampNs);
}

/// A future event keyed by `(expire_time, event_id)`.
///
/// Ordering is inverted so that `BinaryHeap` pops the earliest event; the
/// monotonically assigned id gives insertion-order tie-breaking without
/// relying on heap stability.
struct TimedEvent {
    event_id: EventId,
    expire_time: TimestampNs,
    event: Event,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.expire_time == other.expire_time && self.event_id == other.event_id
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.expire_time, other.event_id).cmp(&(self.expire_time, self.event_id))
    }
}

struct LoopCore {
    now: TimestampNs,
    future: BinaryHeap<TimedEvent>,
    chores: VecDeque<(EventId, Event)>,
    registered_replayables: usize,
    active_replayables: usize,
    last_event_id: EventId,
    enabled: bool,
}

/// The event loop. Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct EventLoop {
    core: Rc<RefCell<LoopCore>>,
}

impl EventLoop {
    pub fn new(start: TimestampNs) -> Self {
        Self {
            core: Rc::new(RefCell::new(LoopCore {
                now: start,
                future: BinaryHeap::new(),
                chores: VecDeque::new(),
                registered_replayables: 0,
                active_replayables: 0,
                last_event_id: 0,
                enabled: true,
            })),
        }
    }

    /// Current simulated time.
    pub fn event_time(&self) -> TimestampNs {
        self.core.borrow().now
    }

    /// Schedules `event` to run `delta_ns` from now.
    ///
    /// Chores (zero delta) receive even ids; future events receive odd ids.
    /// The counter advances by two on every post so that simultaneous chores
    /// and future events interleave identically from run to run.
    pub fn post_event(&self, delta_ns: TimestampNs, event: Event) -> EventId {
        let mut core = self.core.borrow_mut();
        core.last_event_id += 2;
        let mut event_id = core.last_event_id;
        if delta_ns == 0 {
            core.chores.push_back((event_id, event));
        } else {
            event_id += 1;
            let expire_time = core.now + delta_ns;
            core.future.push(TimedEvent {
                event_id,
                expire_time,
                event,
            });
        }
        event_id
    }

    /// Registers a replayable source and arms its first dispatch.
    ///
    /// The source is skipped up to the current time first; when every
    /// registered source is exhausted the loop stops itself.
    pub fn add(&self, replayable: Rc<dyn Replayable>) -> Result<(), EngineError> {
        {
            let mut core = self.core.borrow_mut();
            if core.registered_replayables >= MAX_REPLAYABLES {
                return Err(EngineError::ReplayableLimit);
            }
            core.registered_replayables += 1;
            core.active_replayables += 1;
        }
        replayable.skip(self.event_time());
        self.arm(replayable);
        Ok(())
    }

    /// Runs until both queues are empty or a stop fires.
    ///
    /// On entry, time fast-forwards to the earliest scheduled future event so
    /// that a freshly wired loop starts at the first data timestamp.
    pub fn dispatch(&self) {
        {
            let mut core = self.core.borrow_mut();
            core.enabled = true;
            if let Some(next) = core.future.peek() {
                core.now = next.expire_time;
            }
        }

        loop {
            {
                let core = self.core.borrow();
                if !core.enabled || (core.future.is_empty() && core.chores.is_empty()) {
                    break;
                }
            }
            self.run_chores();
            self.run_next_future_event();
        }
    }

    /// Schedules a stop `delta_ns` from now.
    ///
    /// The stop event takes the maximum id so that any event scheduled for
    /// the same instant completes first.
    pub fn stop(&self, delta_ns: TimestampNs) {
        let this = self.clone();
        let mut core = self.core.borrow_mut();
        let expire_time = core.now + delta_ns;
        core.future.push(TimedEvent {
            event_id: EventId::MAX,
            expire_time,
            event: Box::new(move || this.core.borrow_mut().enabled = false),
        });
    }

    /// Discards all pending work.
    ///
    /// Queued events capture loop handles; dropping them releases the
    /// reference cycles a finished run would otherwise leave behind.
    pub fn clear(&self) {
        let mut core = self.core.borrow_mut();
        core.future.clear();
        core.chores.clear();
    }

    fn run_chores(&self) {
        loop {
            let event = {
                let mut core = self.core.borrow_mut();
                if !core.enabled {
                    return;
                }
                match core.chores.pop_front() {
                    Some((_id, event)) => event,
                    None => return,
                }
            };
            event();
        }
    }

    fn run_next_future_event(&self) {
        let event = {
            let mut core = self.core.borrow_mut();
            if !core.enabled {
                return;
            }
            match core.future.pop() {
                Some(timed) => {
                    core.now = timed.expire_time;
                    timed.event
                }
                None => return,
            }
        };
        event();
    }

    /// Steps a replayable once it has work, or retires it.
    fn arm(&self, replayable: Rc<dyn Replayable>) {
        let next = replayable.next_event_time();
        if next == NO_EVENT {
            self.replayable_done();
            return;
        }
        let now = self.event_time();
        let delta = (next - now).max(0);
        let this = self.clone();
        self.post_event(
            delta,
            Box::new(move || {
                replayable.dispatch_next_event();
                this.arm(replayable);
            }),
        );
    }

    fn replayable_done(&self) {
        let all_done = {
            let mut core = self.core.borrow_mut();
            core.active_replayables -= 1;
            core.active_replayables == 0
        };
        if all_done {
            self.stop(0);
        }
    }
}

impl EventDispatcher for EventLoop {
    fn event_time(&self) -> TimestampNs {
        EventLoop::event_time(self)
    }

    fn post_event(&self, delta_ns: TimestampNs, event: Event) -> EventId {
        EventLoop::post_event(self, delta_ns, event)
    }
}
