//! Tick-stream replayer.
//!
//! Reads a time-ordered CSV stream of top-of-book records and republishes
//! them through a [`Publisher<TopOfBook>`], batching all records that share a
//! timestamp under a single `end_batch`. The replayer owns the per-symbol
//! record slots; caches and subscribers downstream hold handles into them.
//!
//! Record format, one per line, no header:
//!
//! ```text
//! timestamp_ns,symbol,bid_size,bid_price,ask_size,ask_price
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::BufRead;
use std::rc::Rc;

use thiserror::Error;

use crate::domain::{Symbol, TimestampNs, TopOfBook, NO_EVENT};
use crate::engine::{EngineError, EventLoop, Replayable};
use crate::pubsub::{shared_record, Publisher, PublisherEntry, SharedRecord};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// The next parsed record, held one step ahead of publication.
struct Lookahead {
    timestamp: TimestampNs,
    symbol: Symbol,
    book: TopOfBook,
}

struct ReplayState {
    input: Box<dyn BufRead>,
    records: HashMap<Symbol, (SharedRecord<TopOfBook>, Rc<dyn PublisherEntry>)>,
    lookahead: Lookahead,
    line: usize,
    /// First failure encountered while reading; terminates the stream.
    error: Option<ReplayError>,
}

/// A [`Replayable`] that drives the event loop from a record stream.
pub struct MarketDataReplayer {
    publisher: Rc<dyn Publisher<TopOfBook>>,
    state: RefCell<ReplayState>,
}

impl MarketDataReplayer {
    /// Creates the replayer, reads the first record, and registers with the
    /// event loop.
    pub fn new(
        event_loop: &EventLoop,
        publisher: Rc<dyn Publisher<TopOfBook>>,
        input: impl BufRead + 'static,
    ) -> Result<Rc<Self>, ReplayError> {
        let replayer = Rc::new(Self {
            publisher,
            state: RefCell::new(ReplayState {
                input: Box::new(input),
                records: HashMap::new(),
                lookahead: Lookahead {
                    timestamp: 0,
                    symbol: Symbol::new(),
                    book: TopOfBook {
                        bid_size: 0.0,
                        bid_price: 0.0,
                        ask_size: 0.0,
                        ask_price: 0.0,
                    },
                },
                line: 0,
                error: None,
            }),
        });
        replayer.read_next_line();
        replayer.state.borrow_mut().take_startup_error()?;
        event_loop.add(replayer.clone() as Rc<dyn Replayable>)?;
        Ok(replayer)
    }

    /// The first failure encountered while reading, if any. A failure ends
    /// the stream; callers should check this after dispatch returns.
    pub fn take_error(&self) -> Option<ReplayError> {
        self.state.borrow_mut().error.take()
    }

    /// Publishes the lookahead record through the per-symbol entry, creating
    /// the slot and entry on first sight of the symbol.
    fn publish_lookahead(&self) {
        let entry = {
            let mut state = self.state.borrow_mut();
            let symbol = state.lookahead.symbol.clone();
            let book = state.lookahead.book;
            match state.records.get(&symbol) {
                Some((slot, entry)) => {
                    *slot.borrow_mut() = book;
                    entry.clone()
                }
                None => {
                    let slot = shared_record(book);
                    let entry = self.publisher.create_entry(&symbol, &slot);
                    state.records.insert(symbol, (slot, entry.clone()));
                    entry
                }
            }
        };
        entry.publish();
    }

    fn read_next_line(&self) {
        let mut state = self.state.borrow_mut();
        if state.error.is_some() {
            state.lookahead.timestamp = NO_EVENT;
            return;
        }
        let mut line = String::new();
        state.line += 1;
        match state.input.read_line(&mut line) {
            Ok(0) => state.lookahead.timestamp = NO_EVENT,
            Ok(_) => {
                let line_no = state.line;
                match parse_record(line.trim_end(), line_no) {
                    Ok(lookahead) => state.lookahead = lookahead,
                    Err(err) => {
                        state.error = Some(err);
                        state.lookahead.timestamp = NO_EVENT;
                    }
                }
            }
            Err(err) => {
                state.error = Some(ReplayError::Io(err));
                state.lookahead.timestamp = NO_EVENT;
            }
        }
    }
}

impl ReplayState {
    fn take_startup_error(&mut self) -> Result<(), ReplayError> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Replayable for MarketDataReplayer {
    fn next_event_time(&self) -> TimestampNs {
        self.state.borrow().lookahead.timestamp
    }

    /// Publishes every record sharing the current timestamp, then closes the
    /// batch: simultaneous records are one atomic market update.
    fn dispatch_next_event(&self) {
        let start_time = self.next_event_time();
        if start_time == NO_EVENT {
            return;
        }
        loop {
            self.publish_lookahead();
            self.read_next_line();
            if self.next_event_time() != start_time {
                break;
            }
        }
        self.publisher.end_batch();
    }

    /// Advances past records older than `ts` without publishing.
    fn skip(&self, ts: TimestampNs) {
        while self.next_event_time() < ts {
            self.read_next_line();
        }
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<Lookahead, ReplayError> {
    let malformed = |reason: &str| ReplayError::Malformed {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut fields = line.split(',');
    let mut next_field = |name: &str| {
        fields
            .next()
            .ok_or_else(|| malformed(&format!("missing field `{name}`")))
    };

    let timestamp = next_field("timestamp_ns")?
        .trim()
        .parse::<TimestampNs>()
        .map_err(|e| malformed(&format!("bad timestamp: {e}")))?;
    let symbol = next_field("symbol")?.trim().to_string();

    let mut price_field = |name: &str| -> Result<f64, ReplayError> {
        next_field(name)?
            .trim()
            .parse::<f64>()
            .map_err(|e| malformed(&format!("bad {name}: {e}")))
    };
    let bid_size = price_field("bid_size")?;
    let bid_price = price_field("bid_price")?;
    let ask_size = price_field("ask_size")?;
    let ask_price = price_field("ask_price")?;

    Ok(Lookahead {
        timestamp,
        symbol,
        book: TopOfBook {
            bid_size,
            bid_price,
            ask_size,
            ask_price,
        },
    })
}
