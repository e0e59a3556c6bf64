//! Strategy registry.
//!
//! A strategy is an opaque subscriber pair: it observes top-of-book and
//! position batches through the fabric and submits orders through the
//! gateway. The engine never looks inside it.

pub mod flipper;
pub mod noop;

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use anyhow::bail;

use fxlab_core::domain::{Gateway, Position, TopOfBook};
use fxlab_core::engine::EventDispatcher;
use fxlab_core::pubsub::Subscriber;
use fxlab_core::risk::Risk;

pub use flipper::Flipper;
pub use noop::Noop;

/// Shared output stream for the deterministic CSV log lines.
pub type Sink = Rc<RefCell<dyn Write>>;

/// Everything a strategy is constructed from. Time and scheduling come
/// exclusively from the dispatcher, so strategies behave identically in
/// simulation and replay.
pub struct StrategyContext {
    pub dispatcher: Rc<dyn EventDispatcher>,
    pub gateway: Rc<dyn Gateway>,
    pub risk: Rc<dyn Risk>,
    pub sink: Sink,
}

/// The two subscriber faces of one strategy instance.
pub struct StrategyHandles {
    pub market_data: Rc<dyn Subscriber<TopOfBook>>,
    pub positions: Rc<dyn Subscriber<Position>>,
}

impl std::fmt::Debug for StrategyHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyHandles").finish_non_exhaustive()
    }
}

/// Instantiates a registered strategy by name.
pub fn create_strategy(name: &str, ctx: StrategyContext) -> anyhow::Result<StrategyHandles> {
    match name {
        "flipper" => Ok(split(Flipper::new(ctx))),
        "noop" => Ok(split(Noop::new())),
        other => bail!("unknown strategy `{other}`"),
    }
}

fn split<S>(strategy: Rc<S>) -> StrategyHandles
where
    S: Subscriber<TopOfBook> + Subscriber<Position> + 'static,
{
    StrategyHandles {
        market_data: strategy.clone() as Rc<dyn Subscriber<TopOfBook>>,
        positions: strategy as Rc<dyn Subscriber<Position>>,
    }
}
