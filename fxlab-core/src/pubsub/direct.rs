//! Direct one-subscriber consumption with per-topic callbacks.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::pubsub::{
    Consumer, Publisher, PublisherEntry, SharedRecord, Subscriber, UpdateCallback,
};

/// Both a [`Consumer`] and a [`Publisher`]: holds one entry per topic pairing
/// a callback (initially absent) with the latest record slot.
///
/// Announcing a topic via [`create_entry`](Publisher::create_entry)
/// synchronously notifies the subscriber, which gets the chance to call
/// [`subscribe`](Consumer::subscribe) and install a real callback before the
/// first publish. [`end_batch`](Publisher::end_batch) forwards the boundary
/// to the subscriber only when at least one callback actually ran since the
/// previous boundary.
pub struct DirectConsumer<R: 'static> {
    subscriber: Rc<dyn Subscriber<R>>,
    entries: RefCell<HashMap<String, Rc<DirectEntry<R>>>>,
    updates_seen: Rc<Cell<bool>>,
}

struct DirectEntry<R> {
    topic: String,
    record: RefCell<Option<SharedRecord<R>>>,
    callback: RefCell<Option<UpdateCallback<R>>>,
    updates_seen: Rc<Cell<bool>>,
}

impl<R> PublisherEntry for DirectEntry<R> {
    fn publish(&self) {
        let record = self.record.borrow();
        let record = record
            .as_ref()
            .expect("publish on an entry with no record bound");
        let callback = self.callback.borrow().clone();
        if let Some(callback) = callback {
            callback(&self.topic, &record.borrow());
            self.updates_seen.set(true);
        }
    }
}

impl<R: 'static> DirectConsumer<R> {
    pub fn new(subscriber: Rc<dyn Subscriber<R>>) -> Rc<Self> {
        Rc::new(Self {
            subscriber,
            entries: RefCell::new(HashMap::new()),
            updates_seen: Rc::new(Cell::new(false)),
        })
    }

    /// Looks up or lazily creates the entry for `topic`.
    fn entry(&self, topic: &str) -> Rc<DirectEntry<R>> {
        self.entries
            .borrow_mut()
            .entry(topic.to_string())
            .or_insert_with(|| {
                Rc::new(DirectEntry {
                    topic: topic.to_string(),
                    record: RefCell::new(None),
                    callback: RefCell::new(None),
                    updates_seen: self.updates_seen.clone(),
                })
            })
            .clone()
    }
}

impl<R: 'static> Publisher<R> for DirectConsumer<R> {
    fn create_entry(&self, topic: &str, record: &SharedRecord<R>) -> Rc<dyn PublisherEntry> {
        let entry = self.entry(topic);
        *entry.record.borrow_mut() = Some(record.clone());
        self.subscriber.notify(self, topic, record);
        entry
    }

    fn end_batch(&self) {
        if self.updates_seen.replace(false) {
            self.subscriber.end_of_batch(self);
        }
    }
}

impl<R: 'static> Consumer<R> for DirectConsumer<R> {
    fn subscribe(&self, topic: &str, callback: UpdateCallback<R>) {
        let entry = self.entry(topic);
        *entry.callback.borrow_mut() = Some(callback);
    }
}
