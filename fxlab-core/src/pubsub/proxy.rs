//! Ordered fan-out to downstream publishers.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::pubsub::{Consumer, Publisher, PublisherEntry, SharedRecord, Subscriber};

/// Subscriber that republishes every update to an ordered list of downstream
/// publishers, preserving batch boundaries.
///
/// List position decides delivery order: a publisher added at the front sees
/// each update before publishers behind it. This is how a cache is interposed
/// ahead of strategies, so the cache is warm by the time a strategy callback
/// observes the update.
pub struct Proxy<R: 'static> {
    topics: RefCell<BTreeMap<String, Rc<ProxyTopic<R>>>>,
    publishers: RefCell<Vec<Rc<dyn Publisher<R>>>>,
}

/// Per-topic fan-out state: the upstream record slot plus one downstream
/// entry per publisher, in list order.
struct ProxyTopic<R> {
    record: SharedRecord<R>,
    entries: RefCell<Vec<Rc<dyn PublisherEntry>>>,
}

impl<R> ProxyTopic<R> {
    fn on_update(&self) {
        let entries: Vec<_> = self.entries.borrow().clone();
        for entry in entries {
            entry.publish();
        }
    }
}

impl<R: 'static> Proxy<R> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            topics: RefCell::new(BTreeMap::new()),
            publishers: RefCell::new(Vec::new()),
        })
    }

    /// Adds a downstream publisher ahead of every existing one.
    pub fn add_front(&self, publisher: Rc<dyn Publisher<R>>) {
        self.insert(0, publisher);
    }

    /// Adds a downstream publisher behind every existing one.
    pub fn add_back(&self, publisher: Rc<dyn Publisher<R>>) {
        let index = self.publishers.borrow().len();
        self.insert(index, publisher);
    }

    /// Inserts `publisher` at `index`, retroactively creating entries for
    /// every known topic at the same position.
    fn insert(&self, index: usize, publisher: Rc<dyn Publisher<R>>) {
        self.publishers
            .borrow_mut()
            .insert(index, publisher.clone());
        let topics: Vec<(String, Rc<ProxyTopic<R>>)> = self
            .topics
            .borrow()
            .iter()
            .map(|(topic, state)| (topic.clone(), state.clone()))
            .collect();
        for (topic, state) in topics {
            let entry = publisher.create_entry(&topic, &state.record);
            state.entries.borrow_mut().insert(index, entry);
        }
    }
}

impl<R: 'static> Subscriber<R> for Proxy<R> {
    fn notify(&self, consumer: &dyn Consumer<R>, topic: &str, record: &SharedRecord<R>) {
        if self.topics.borrow().contains_key(topic) {
            return;
        }
        let state = Rc::new(ProxyTopic {
            record: record.clone(),
            entries: RefCell::new(Vec::new()),
        });
        self.topics
            .borrow_mut()
            .insert(topic.to_string(), state.clone());

        let publishers: Vec<_> = self.publishers.borrow().clone();
        for publisher in publishers {
            let entry = publisher.create_entry(topic, record);
            state.entries.borrow_mut().push(entry);
        }

        let fan_out = state.clone();
        consumer.subscribe(topic, Rc::new(move |_topic, _record| fan_out.on_update()));
    }

    fn end_of_batch(&self, _consumer: &dyn Consumer<R>) {
        let publishers: Vec<_> = self.publishers.borrow().clone();
        for publisher in publishers {
            publisher.end_batch();
        }
    }
}
