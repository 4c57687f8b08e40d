//! Engine - a venue owning one book per instrument.
//!
//! An engine is single-threaded: parallelism comes from partitioning
//! instruments across engines, one per worker. With the `runtime` feature an
//! engine can be driven from an rtrb ring buffer on a pinned core.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::command::{Command, ExecutionReport, ReportState, AGGRESSOR_ID};
use crate::config::BookConfig;
use crate::error::BookError;
use crate::order_book::OrderBook;
use crate::price::Quote;

pub type BoxedBook = Box<dyn OrderBook + Send>;

/// Routes commands to the book of their ticker and hands back its reports.
#[derive(Default)]
pub struct Engine {
    books: FxHashMap<String, BoxedBook>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// List an instrument, replacing (and returning) any book it had.
    pub fn list(&mut self, ticker: impl Into<String>, book: BoxedBook) -> Option<BoxedBook> {
        let ticker = ticker.into();
        info!(%ticker, "instrument listed");
        self.books.insert(ticker, book)
    }

    /// # Errors
    /// Whatever [`BookConfig::build`] rejects.
    pub fn list_with_config(
        &mut self,
        ticker: impl Into<String>,
        config: &BookConfig,
    ) -> Result<(), BookError> {
        let book = config.build()?;
        self.list(ticker, book);
        Ok(())
    }

    /// Remove an instrument and its resting orders.
    pub fn delist(&mut self, ticker: &str) -> Option<BoxedBook> {
        self.books.remove(ticker)
    }

    pub fn book(&self, ticker: &str) -> Option<&(dyn OrderBook + Send)> {
        self.books.get(ticker).map(|b| b.as_ref())
    }

    /// Listed tickers, sorted.
    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<_> = self.books.keys().map(String::as_str).collect();
        tickers.sort_unstable();
        tickers
    }

    /// Process a single command and return the reports it produced.
    ///
    /// Book errors are logged; their reports (if any) are still returned.
    /// A placement for an unlisted ticker yields one `invalid` report, a
    /// cancellation for one yields nothing.
    pub fn process_command(&mut self, command: &Command) -> Vec<ExecutionReport> {
        let book = match self.book_mut(command.ticker()) {
            Ok(book) => book,
            Err(error) => {
                warn!(%error, "command rejected");
                return Self::unroutable(command);
            }
        };

        let outcome = match command {
            Command::Place(order) => book.insert(order),
            Command::Cancel(cancel) => book.cancel(cancel.order_id),
        };
        if let Err(error) = outcome {
            warn!(ticker = command.ticker(), %error, "command failed");
        }
        book.take_reports()
    }

    /// # Errors
    /// [`BookError::UnknownTicker`] if the instrument is not listed.
    pub fn book_mut(&mut self, ticker: &str) -> Result<&mut BoxedBook, BookError> {
        self.books
            .get_mut(ticker)
            .ok_or_else(|| BookError::UnknownTicker(ticker.to_owned()))
    }

    fn unroutable(command: &Command) -> Vec<ExecutionReport> {
        match command {
            Command::Place(order) => vec![ExecutionReport {
                state: ReportState::Invalid,
                side: order.side,
                quantity: order.quantity,
                identifier: AGGRESSOR_ID,
                limit: order.limit,
                owner: order.owner,
            }],
            Command::Cancel(_) => Vec::new(),
        }
    }

    /// Run the engine event loop.
    ///
    /// Returns once the producer side of `input` is dropped and drained.
    /// Reports that do not fit in `output` are dropped.
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<Command>,
        output: &mut rtrb::Producer<ExecutionReport>,
        pin_to_core: bool,
    ) {
        if pin_to_core {
            self.pin_to_core();
        }

        loop {
            while let Ok(command) = input.pop() {
                for report in self.process_command(&command) {
                    if output.push(report).is_err() {
                        warn!("report ring full, dropping report");
                    }
                }
            }
            if input.is_abandoned() && input.is_empty() {
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) -> bool {
        let pinned = core_affinity::get_core_ids()
            .and_then(|ids| ids.last().copied())
            .is_some_and(core_affinity::set_for_current);
        if !pinned {
            warn!("could not pin engine thread to a core");
        }
        pinned
    }

    #[inline]
    pub fn bid(&self, ticker: &str) -> Option<Quote> {
        self.books.get(ticker)?.bid()
    }

    #[inline]
    pub fn ask(&self, ticker: &str) -> Option<Quote> {
        self.books.get(ticker)?.ask()
    }

    /// Resting orders across all instruments.
    pub fn order_count(&self) -> usize {
        self.books.values().map(|b| b.order_count()).sum()
    }

    /// Compute state hash for determinism testing.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for ticker in self.tickers() {
            let book = &self.books[ticker];
            ticker.hash(&mut hasher);
            book.bid().hash(&mut hasher);
            book.ask().hash(&mut hasher);
            book.orders().hash(&mut hasher);
            book.resting_quantity().hash(&mut hasher);
            let depth = book.depth(usize::MAX);
            for level in depth.bids.iter().chain(&depth.asks) {
                level.price.hash(&mut hasher);
                level.quantity.hash(&mut hasher);
                level.orders.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}
