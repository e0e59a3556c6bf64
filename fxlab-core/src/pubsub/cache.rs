//! Latest-record cache.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::pubsub::{Consumer, SharedRecord, Subscriber};

/// Subscriber that caches the record slot of every announced topic.
///
/// The cache holds slot handles, not values: a cached record always reads the
/// latest published value for its topic. Iteration order is the topic's sort
/// order, so summaries built from the cache are deterministic.
pub struct CacheSubscriber<R> {
    cache: RefCell<BTreeMap<String, SharedRecord<R>>>,
}

impl<R> CacheSubscriber<R> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            cache: RefCell::new(BTreeMap::new()),
        })
    }

    /// The record slot for `topic`, if the topic has been announced.
    pub fn cached_record(&self, topic: &str) -> Option<SharedRecord<R>> {
        self.cache.borrow().get(topic).cloned()
    }

    /// A point-in-time copy of every cached (topic, value) pair, in topic
    /// order.
    pub fn snapshot(&self) -> Vec<(String, R)>
    where
        R: Clone,
    {
        self.cache
            .borrow()
            .iter()
            .map(|(topic, record)| (topic.clone(), record.borrow().clone()))
            .collect()
    }
}

impl<R> Subscriber<R> for CacheSubscriber<R> {
    fn notify(&self, _consumer: &dyn Consumer<R>, topic: &str, record: &SharedRecord<R>) {
        self.cache
            .borrow_mut()
            .insert(topic.to_string(), record.clone());
    }

    fn end_of_batch(&self, _consumer: &dyn Consumer<R>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{shared_record, DirectConsumer, Publisher};

    #[test]
    fn cache_tracks_latest_value_through_the_slot() {
        let cache = CacheSubscriber::<f64>::new();
        let publisher = DirectConsumer::new(cache.clone() as Rc<dyn Subscriber<f64>>);

        let record = shared_record(1.25);
        publisher.create_entry("EUR/USD", &record);

        let cached = cache.cached_record("EUR/USD").unwrap();
        assert_eq!(*cached.borrow(), 1.25);

        // The producer overwrites its slot; the cache sees the new value.
        *record.borrow_mut() = 1.26;
        assert_eq!(*cached.borrow(), 1.26);
    }

    #[test]
    fn missing_topic_is_none() {
        let cache = CacheSubscriber::<f64>::new();
        assert!(cache.cached_record("GBP/USD").is_none());
    }

    #[test]
    fn snapshot_is_topic_ordered() {
        let cache = CacheSubscriber::<i64>::new();
        let publisher = DirectConsumer::new(cache.clone() as Rc<dyn Subscriber<i64>>);

        publisher.create_entry("USD", &shared_record(2));
        publisher.create_entry("EUR", &shared_record(1));
        publisher.create_entry("JPY", &shared_record(3));

        let snapshot = cache.snapshot();
        let topics: Vec<&str> = snapshot.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(topics, vec!["EUR", "JPY", "USD"]);
    }
}
