//! Order-flow replay - drives an [`Engine`] from CSV rows.
//!
//! Each row is either a placement or a cancellation:
//!
//! ```text
//! action,reference,ticker,owner,side,price,quantity,lifetime
//! place,1,ACME,7,buy,4.75,500,gtc
//! place,2,ACME,8,sell,4.80,200,ioc
//! cancel,1,ACME,,,,,
//! ```
//!
//! Prices are decimal amounts in the instrument's currency. `reference` is
//! chosen by the writer of the file; a `cancel` row targets the order whose
//! `place` row carried the same reference.

use std::io;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::command::{
    CancelOrder, Command, ExecutionReport, Lifetime, LimitOrder, OrderId, OwnerId, ReportState,
    Side,
};
use crate::config::BookConfig;
use crate::engine::Engine;
use crate::error::{BookError, ReplayError};
use crate::price::{Currency, Price, Quote};

/// One line of an order-flow file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFlowRow {
    pub action: String,
    pub reference: Option<u64>,
    pub ticker: String,
    pub owner: Option<OwnerId>,
    pub side: Option<Side>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
    pub lifetime: Option<Lifetime>,
}

/// Tally of what a replay did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub rows: usize,
    /// Rows that could not be applied: unlisted ticker, unknown reference, or
    /// a cancel for an order that no longer rests
    pub skipped: usize,
    pub placements: usize,
    /// Executions, counted once per aggressor fill
    pub executions: usize,
    pub executed_quantity: u64,
    pub cancels: usize,
    pub invalid: usize,
}

impl ReplaySummary {
    fn record(&mut self, reports: &[ExecutionReport]) {
        for report in reports {
            match report.state {
                ReportState::Placement => self.placements += 1,
                ReportState::Match if report.is_aggressor() => {
                    self.executions += 1;
                    self.executed_quantity += u64::from(report.quantity);
                }
                ReportState::Match => {}
                ReportState::Cancel => self.cancels += 1,
                ReportState::Invalid => self.invalid += 1,
            }
        }
    }
}

#[derive(Default)]
pub struct Replay {
    engine: Engine,
    /// Quote unit per listed ticker
    units: FxHashMap<String, (Currency, u64)>,
    /// Client reference -> (ticker, identifier of the resting order)
    references: FxHashMap<u64, (String, OrderId)>,
    /// Ticker -> resting identifier -> (client reference, unfilled quantity)
    resting: FxHashMap<String, FxHashMap<OrderId, (u64, u32)>>,
    summary: ReplaySummary,
}

impl Replay {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Whatever [`BookConfig::build`] rejects.
    pub fn list(&mut self, ticker: impl Into<String>, config: &BookConfig) -> Result<(), BookError> {
        let ticker = ticker.into();
        self.engine.list_with_config(ticker.clone(), config)?;
        self.units.insert(ticker, config.unit());
        Ok(())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    /// Replay every row of a CSV stream with a header line.
    ///
    /// # Errors
    /// Stops at the first row that cannot be read or parsed.
    pub fn run<R: io::Read>(&mut self, reader: R) -> Result<&ReplaySummary, ReplayError> {
        let mut rows = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        for (i, row) in rows.deserialize::<OrderFlowRow>().enumerate() {
            // Header is line 1
            self.apply(i + 2, &row?)?;
        }
        Ok(&self.summary)
    }

    /// Apply a single row; `line` is used in errors and logs.
    ///
    /// # Errors
    /// If a required field is missing, the action is unknown or the price
    /// has no exact minor-unit representation.
    pub fn apply(
        &mut self,
        line: usize,
        row: &OrderFlowRow,
    ) -> Result<Vec<ExecutionReport>, ReplayError> {
        self.summary.rows += 1;
        let Some(command) = self.command(line, row)? else {
            self.summary.skipped += 1;
            return Ok(Vec::new());
        };

        let reports = self.engine.process_command(&command);
        self.summary.record(&reports);

        match &command {
            Command::Place(order) => self.track(&order.ticker, row.reference, &reports),
            Command::Cancel(cancel) => {
                if reports.is_empty() {
                    warn!(
                        line,
                        order_id = cancel.order_id,
                        "cancel found no resting order, skipping"
                    );
                    self.summary.skipped += 1;
                }
                if let Some(orders) = self.resting.get_mut(&cancel.ticker) {
                    orders.remove(&cancel.order_id);
                }
                if let Some(reference) = row.reference {
                    self.references.remove(&reference);
                }
            }
        }
        Ok(reports)
    }

    /// Record the order a placement left resting and wear down the makers it
    /// traded against, forgetting the references of those filled in full.
    fn track(&mut self, ticker: &str, reference: Option<u64>, reports: &[ExecutionReport]) {
        for report in reports.iter().filter(|r| !r.is_aggressor()) {
            match report.state {
                ReportState::Match => {
                    let Some(orders) = self.resting.get_mut(ticker) else {
                        continue;
                    };
                    let Some((owner_ref, remaining)) = orders.get_mut(&report.identifier) else {
                        continue;
                    };
                    *remaining = remaining.saturating_sub(report.quantity);
                    if *remaining > 0 {
                        continue;
                    }
                    let owner_ref = *owner_ref;
                    orders.remove(&report.identifier);
                    // The reference may since have been reused by a later placement
                    if matches!(
                        self.references.get(&owner_ref),
                        Some((t, id)) if t == ticker && *id == report.identifier
                    ) {
                        self.references.remove(&owner_ref);
                    }
                    debug!(reference = owner_ref, ticker, "order filled, reference released");
                }
                ReportState::Placement => {
                    let Some(reference) = reference else {
                        continue;
                    };
                    self.references
                        .insert(reference, (ticker.to_owned(), report.identifier));
                    self.resting
                        .entry(ticker.to_owned())
                        .or_default()
                        .insert(report.identifier, (reference, report.quantity));
                }
                ReportState::Cancel | ReportState::Invalid => {}
            }
        }
    }

    fn command(&self, line: usize, row: &OrderFlowRow) -> Result<Option<Command>, ReplayError> {
        match row.action.to_ascii_lowercase().as_str() {
            "place" => self.place_command(line, row),
            "cancel" => {
                let reference = row.reference.ok_or(ReplayError::MissingField {
                    row: line,
                    field: "reference",
                })?;
                let Some((ticker, order_id)) = self.references.get(&reference) else {
                    warn!(line, reference, "cancel refers to no resting order, skipping");
                    return Ok(None);
                };
                Ok(Some(Command::Cancel(CancelOrder {
                    ticker: ticker.clone(),
                    order_id: *order_id,
                })))
            }
            _ => Err(ReplayError::UnknownAction {
                row: line,
                action: row.action.clone(),
            }),
        }
    }

    fn place_command(&self, line: usize, row: &OrderFlowRow) -> Result<Option<Command>, ReplayError> {
        let missing = |field: &'static str| ReplayError::MissingField { row: line, field };
        let side = row.side.ok_or_else(|| missing("side"))?;
        let amount = row.price.ok_or_else(|| missing("price"))?;
        let quantity = row.quantity.ok_or_else(|| missing("quantity"))?;

        let Some(&(currency, lot)) = self.units.get(&row.ticker) else {
            warn!(line, ticker = %row.ticker, "order for unlisted instrument, skipping");
            return Ok(None);
        };
        let price = Price::from_decimal(amount, currency).ok_or(ReplayError::UnrepresentablePrice {
            row: line,
            price: amount,
        })?;

        debug!(line, ticker = %row.ticker, %side, %amount, quantity, "replaying order");
        Ok(Some(Command::Place(LimitOrder::new(
            row.ticker.clone(),
            row.owner.unwrap_or_default(),
            side,
            Quote { price, lot },
            quantity,
            row.lifetime.unwrap_or_default(),
        ))))
    }
}
