//! Typed, topic-keyed publish/subscribe fabric.
//!
//! Three roles cooperate around a record type `R`:
//!
//! - a [`Publisher`] owns per-topic [`PublisherEntry`] handles bound to
//!   producer-owned record slots and announces coherent groups of updates
//!   with [`end_batch`](Publisher::end_batch);
//! - a [`Consumer`] lets interested parties install a per-topic callback;
//! - a [`Subscriber`] is told when a topic first appears (and may subscribe
//!   through the consumer at that point) and when a batch completes.
//!
//! Records live in [`SharedRecord`] slots owned by the producer; entries,
//! caches and subscribers hold cheap clones of the slot handle, so a retained
//! record always reads the latest published value for its topic.
//!
//! The concrete pieces are [`DirectConsumer`] (consumer and publisher in
//! one), [`CacheSubscriber`] (latest-record cache) and [`Proxy`] (ordered
//! fan-out to downstream publishers with batch boundaries preserved).

pub mod cache;
pub mod direct;
pub mod proxy;

use std::cell::RefCell;
use std::rc::Rc;

pub use cache::CacheSubscriber;
pub use direct::DirectConsumer;
pub use proxy::Proxy;

/// A producer-owned record slot. Cloning shares the slot.
pub type SharedRecord<R> = Rc<RefCell<R>>;

/// Creates a fresh record slot.
pub fn shared_record<R>(value: R) -> SharedRecord<R> {
    Rc::new(RefCell::new(value))
}

/// Per-topic update callback: `(topic, record)`.
pub type UpdateCallback<R> = Rc<dyn Fn(&str, &R)>;

/// Subscribes per-topic callbacks to record updates.
pub trait Consumer<R> {
    /// Installs `callback` for `topic`, replacing any previous callback.
    fn subscribe(&self, topic: &str, callback: UpdateCallback<R>);
}

/// Long-lived receiver of topic announcements and batch boundaries.
pub trait Subscriber<R> {
    /// A topic has been announced. The subscriber may call back into
    /// `consumer` to subscribe, and may retain the record handle.
    fn notify(&self, consumer: &dyn Consumer<R>, topic: &str, record: &SharedRecord<R>);

    /// A coherent group of updates is complete.
    fn end_of_batch(&self, consumer: &dyn Consumer<R>);
}

/// Handle to a (topic, publisher) pair; publishing emits the current value of
/// the bound record downstream.
pub trait PublisherEntry {
    fn publish(&self);
}

/// Emits records to a downstream subscriber, one entry per topic.
pub trait Publisher<R> {
    /// Binds (or rebinds) `topic` to `record` and announces it downstream.
    /// Returns the topic's entry.
    fn create_entry(&self, topic: &str, record: &SharedRecord<R>) -> Rc<dyn PublisherEntry>;

    /// Closes the current batch if any updates were delivered since the
    /// previous boundary.
    fn end_batch(&self);
}
