//! Single-run orchestration.
//!
//! Builds the reference wiring around the core engine:
//!
//! 1. A market-data fan-out with a front-inserted cache, fed by the replayer.
//! 2. A positions fan-out with its own front-inserted cache, fed by the
//!    venue simulator.
//! 3. A priming dispatch (zero-delay stop) that advances the clock to the
//!    first market-data timestamp before the strategy exists.
//! 4. The strategy, attached behind both caches so every cache is warm by
//!    the time a strategy callback fires.
//! 5. A dispatch to exhaustion and a final summary line over the cached
//!    positions.

use std::cell::RefCell;
use std::io::{Cursor, Read};
use std::rc::Rc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use fxlab_core::data::MarketDataReplayer;
use fxlab_core::domain::{Gateway, Position, TimestampNs, TopOfBook};
use fxlab_core::engine::{EventDispatcher, EventLoop};
use fxlab_core::execution::{LpSim, Settings};
use fxlab_core::pubsub::{CacheSubscriber, DirectConsumer, Proxy, Publisher, Subscriber};
use fxlab_core::risk::{Risk, SpotRiskModel};

use crate::config::RunConfig;
use crate::fingerprint::run_fingerprint;
use crate::strategies::{self, StrategyContext};

pub use crate::strategies::Sink;

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub last_event_time: TimestampNs,
    pub pnl: f64,
    pub nop: f64,
    pub fingerprint: String,
    pub completed_at: DateTime<Utc>,
}

/// Runs per config, writing the deterministic log to standard output.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let sink: Sink = Rc::new(RefCell::new(std::io::stdout()));
    run_with_sink(config, sink)
}

/// Runs per config into an arbitrary sink.
pub fn run_with_sink(config: &RunConfig, sink: Sink) -> Result<RunSummary> {
    let data = if config.run.input == "-" {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .context("reading market data from stdin")?;
        data
    } else {
        std::fs::read(&config.run.input)
            .with_context(|| format!("reading market data from {}", config.run.input))?
    };

    run_stream(
        data,
        config.venue.settings(),
        &config.run.strategy,
        config.run.start_ns,
        sink,
    )
}

/// Runs an in-memory market-data stream through the full wiring.
pub fn run_stream(
    data: Vec<u8>,
    settings: Settings,
    strategy: &str,
    start_ns: TimestampNs,
    sink: Sink,
) -> Result<RunSummary> {
    let fingerprint = run_fingerprint(&data, &settings, strategy);
    tracing::info!(fingerprint = %fingerprint, strategy, bytes = data.len(), "starting run");

    let event_loop = EventLoop::new(start_ns);

    // Market-data fan-out: cache in front of everything else.
    let md_proxy = Proxy::<TopOfBook>::new();
    let md_cache = CacheSubscriber::<TopOfBook>::new();
    let md_pub = DirectConsumer::new(md_proxy.clone() as Rc<dyn Subscriber<TopOfBook>>);
    let md_cache_pub = DirectConsumer::new(md_cache.clone() as Rc<dyn Subscriber<TopOfBook>>);
    md_proxy.add_front(md_cache_pub as Rc<dyn Publisher<TopOfBook>>);

    let replayer = MarketDataReplayer::new(
        &event_loop,
        md_pub as Rc<dyn Publisher<TopOfBook>>,
        Cursor::new(data),
    )
    .context("initialising market-data replayer")?;

    let risk = SpotRiskModel::new(md_cache.clone());

    // Positions fan-out, same shape.
    let positions_proxy = Proxy::<Position>::new();
    let positions_cache = CacheSubscriber::<Position>::new();
    let positions_pub =
        DirectConsumer::new(positions_proxy.clone() as Rc<dyn Subscriber<Position>>);
    let positions_cache_pub =
        DirectConsumer::new(positions_cache.clone() as Rc<dyn Subscriber<Position>>);
    positions_proxy.add_front(positions_cache_pub as Rc<dyn Publisher<Position>>);

    let dispatcher: Rc<dyn EventDispatcher> = Rc::new(event_loop.clone());
    let gateway: Rc<dyn Gateway> = Rc::new(LpSim::new(
        dispatcher.clone(),
        md_cache,
        positions_pub as Rc<dyn Publisher<Position>>,
        settings,
    ));

    // Prime the clock to the first market-data timestamp.
    {
        let inner = event_loop.clone();
        event_loop.post_event(0, Box::new(move || inner.stop(0)));
    }
    event_loop.dispatch();
    if let Some(err) = replayer.take_error() {
        return Err(err).context("replaying market data");
    }

    // The strategy attaches behind the caches on both fan-outs.
    let handles = strategies::create_strategy(
        strategy,
        StrategyContext {
            dispatcher,
            gateway,
            risk: Rc::new(risk.clone()),
            sink: sink.clone(),
        },
    )?;
    let md_strategy_pub = DirectConsumer::new(handles.market_data);
    md_proxy.add_back(md_strategy_pub as Rc<dyn Publisher<TopOfBook>>);
    let positions_strategy_pub = DirectConsumer::new(handles.positions);
    positions_proxy.add_back(positions_strategy_pub as Rc<dyn Publisher<Position>>);

    // Run the simulation to exhaustion.
    event_loop.dispatch();
    if let Some(err) = replayer.take_error() {
        return Err(err).context("replaying market data");
    }

    // The run is over; drop whatever was still scheduled (strategy timers,
    // in-flight venue events).
    event_loop.clear();

    // Final summary over the cached positions.
    let snapshot = positions_cache.snapshot();
    let pnl = risk.pnl(&mut snapshot.iter().map(|(asset, p)| (asset.as_str(), *p)));
    let nop = risk.nop(&mut snapshot.iter().map(|(asset, p)| (asset.as_str(), *p)));
    let last_event_time = event_loop.event_time();

    {
        let mut sink = sink.borrow_mut();
        writeln!(sink, "lastEventTime:{last_event_time},pnl:{pnl} ,nop:{nop}")
            .context("writing run summary")?;
    }

    let summary = RunSummary {
        last_event_time,
        pnl,
        nop,
        fingerprint,
        completed_at: Utc::now(),
    };
    tracing::info!(
        last_event_time = summary.last_event_time,
        pnl = summary.pnl,
        nop = summary.nop,
        "run complete"
    );
    Ok(summary)
}
