//! A strategy that does nothing. Used to replay data without trading.

use std::rc::Rc;

use fxlab_core::domain::{Position, TopOfBook};
use fxlab_core::pubsub::{Consumer, SharedRecord, Subscriber};

pub struct Noop;

impl Noop {
    pub fn new() -> Rc<Self> {
        Rc::new(Self)
    }
}

impl Subscriber<TopOfBook> for Noop {
    fn notify(
        &self,
        _consumer: &dyn Consumer<TopOfBook>,
        _topic: &str,
        _record: &SharedRecord<TopOfBook>,
    ) {
    }

    fn end_of_batch(&self, _consumer: &dyn Consumer<TopOfBook>) {}
}

impl Subscriber<Position> for Noop {
    fn notify(
        &self,
        _consumer: &dyn Consumer<Position>,
        _topic: &str,
        _record: &SharedRecord<Position>,
    ) {
    }

    fn end_of_batch(&self, _consumer: &dyn Consumer<Position>) {}
}
