//! Backtest driver: the simulated calendar and the buy/sell state machine.
//!
//! The driver ticks once per calendar day from `start_date` to `end_date`
//! inclusive. While seeking entry it buys the scanner's top candidate;
//! while holding it asks the model's exit function about the open
//! position. Exactly one of the two runs per tick. The state is
//! `HoldingPosition` if and only if the ledger holds a position, and a
//! tick that finds otherwise fails with `InvariantViolation`.

use chrono::NaiveDate;
use log::{debug, info, warn};

use super::config::{EndOfRunPolicy, RunConfig};
use super::error::SignalTraderError;
use super::exit_policy::{ExitAction, ExitReason, ExitRequest};
use super::position::{ClosedTrade, Position};
use super::scanner::{self, CandidateRanking};
use crate::ports::ledger_port::{Ledger, LedgerSummary, OpenOutcome};
use crate::ports::model_port::PredictiveModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingState {
    SeekingEntry,
    HoldingPosition,
}

impl std::fmt::Display for TradingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingState::SeekingEntry => f.write_str("seeking entry"),
            TradingState::HoldingPosition => f.write_str("holding position"),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    Bought {
        date: NaiveDate,
        code: String,
        price: f64,
        quantity: i64,
    },
    /// Top candidate could not be afforded; still seeking.
    BuyRejected {
        date: NaiveDate,
        code: String,
        price: f64,
    },
    NoCandidates {
        date: NaiveDate,
    },
    Sold {
        date: NaiveDate,
        code: String,
        price: f64,
        pnl: f64,
        reason: Option<ExitReason>,
    },
    Held {
        date: NaiveDate,
        code: String,
    },
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub run_id: String,
    pub summary: LedgerSummary,
    pub trades: Vec<ClosedTrade>,
    /// Positions still open at the end of the run, by instrument.
    pub open_positions: Vec<Position>,
    pub final_state: TradingState,
    pub days_simulated: i64,
    pub events: Vec<TickEvent>,
}

pub struct BacktestDriver<'a, M: PredictiveModel + ?Sized, L: Ledger> {
    config: RunConfig,
    model: &'a M,
    ledger: L,
    day: NaiveDate,
    finished: bool,
    state: TradingState,
    days_simulated: i64,
    events: Vec<TickEvent>,
}

impl<'a, M: PredictiveModel + ?Sized, L: Ledger> BacktestDriver<'a, M, L> {
    /// Validates `config` and takes ownership of a ledger with no open
    /// positions.
    pub fn new(config: RunConfig, model: &'a M, ledger: L) -> Result<Self, SignalTraderError> {
        config.validate()?;
        if !ledger.open_positions().is_empty() {
            return Err(SignalTraderError::invariant(
                "ledger must start without open positions",
            ));
        }
        let day = config.start_date;
        Ok(BacktestDriver {
            config,
            model,
            ledger,
            day,
            finished: false,
            state: TradingState::SeekingEntry,
            days_simulated: 0,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> TradingState {
        self.state
    }

    /// Day the next tick processes; stays on `end_date` once finished.
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process the current day, then advance the clock by one day.
    pub fn tick(&mut self) -> Result<TickEvent, SignalTraderError> {
        if self.is_finished() {
            return Err(SignalTraderError::invariant(format!(
                "tick after end of run ({})",
                self.config.end_date
            )));
        }
        self.check_invariant()?;

        let event = match self.state {
            TradingState::SeekingEntry => self.seek_entry()?,
            TradingState::HoldingPosition => self.check_exit()?,
        };

        self.check_invariant()?;
        self.events.push(event.clone());
        self.days_simulated += 1;
        if self.day >= self.config.end_date {
            self.finished = true;
        } else {
            self.day = self.day.succ_opt().ok_or_else(|| {
                SignalTraderError::invariant(format!("calendar overflow after {}", self.day))
            })?;
        }
        Ok(event)
    }

    /// Run through `end_date`, then apply the end-of-run
    /// policy and collect the result.
    pub fn run(mut self) -> Result<BacktestResult, SignalTraderError> {
        info!(
            "running {} instruments from {} to {} ({} days)",
            self.config.universe.len(),
            self.config.start_date,
            self.config.end_date,
            self.config.total_days()
        );

        while !self.is_finished() {
            self.tick()?;
        }

        if self.config.end_of_run == EndOfRunPolicy::ForceClose {
            self.force_close()?;
        }

        let summary = self.ledger.summary();
        info!(
            "finished: {} closed trades, total gain {:.2}, state {}",
            self.ledger.history().len(),
            summary.total_gain,
            self.state
        );

        Ok(BacktestResult {
            run_id: self.config.run_id(self.model.name()),
            summary,
            trades: self.ledger.history().to_vec(),
            open_positions: self.ledger.open_positions().values().cloned().collect(),
            final_state: self.state,
            days_simulated: self.days_simulated,
            events: self.events,
        })
    }

    fn check_invariant(&self) -> Result<(), SignalTraderError> {
        let open = self.ledger.open_positions().len();
        let consistent = match self.state {
            TradingState::SeekingEntry => open == 0,
            TradingState::HoldingPosition => open == 1,
        };
        if consistent {
            Ok(())
        } else {
            Err(SignalTraderError::invariant(format!(
                "state is {} but the ledger has {} open positions on {}",
                self.state, open, self.day
            )))
        }
    }

    fn rank(&self) -> CandidateRanking {
        scanner::scan(
            self.day,
            &self.config.universe,
            self.model,
            self.config.threshold,
            self.config.lookback_days,
            self.config.parallel_scan,
        )
    }

    fn seek_entry(&mut self) -> Result<TickEvent, SignalTraderError> {
        let day = self.day;
        let ranking = self.rank();
        let Some(top) = ranking.top() else {
            debug!("{day}: no candidates");
            return Ok(TickEvent::NoCandidates { date: day });
        };
        debug!(
            "{day}: {} candidates, top {} (score {:.4})",
            ranking.len(),
            top.code,
            top.score
        );

        match self.ledger.open_position(&top.code, top.close_price, day)? {
            OpenOutcome::Opened(position) => {
                self.state = TradingState::HoldingPosition;
                Ok(TickEvent::Bought {
                    date: day,
                    code: position.code,
                    price: position.entry_price,
                    quantity: position.quantity,
                })
            }
            OpenOutcome::InsufficientCapital => {
                warn!(
                    "{day}: cannot afford {} at {:.4}; staying out of the market",
                    top.code, top.close_price
                );
                Ok(TickEvent::BuyRejected {
                    date: day,
                    code: top.code.clone(),
                    price: top.close_price,
                })
            }
        }
    }

    fn held_position(&self) -> Result<Position, SignalTraderError> {
        self.ledger
            .open_positions()
            .values()
            .next()
            .cloned()
            .ok_or_else(|| {
                SignalTraderError::invariant(format!("holding with no open position on {}", self.day))
            })
    }

    fn check_exit(&mut self) -> Result<TickEvent, SignalTraderError> {
        let day = self.day;
        let position = self.held_position()?;
        let request = ExitRequest {
            code: &position.code,
            entry_price: position.entry_price,
            entry_date: position.entry_date,
            current_date: day,
            params: self.config.exit_params(),
        };
        let decision = self.model.decide_exit(&request)?;

        match (decision.action, decision.price) {
            (ExitAction::Sell, Some(price)) => {
                let trade =
                    self.ledger
                        .close_position(&position.code, price, position.entry_date, day)?;
                self.state = TradingState::SeekingEntry;
                if let Some(reason) = decision.reason {
                    debug!("{day}: closed {} on {reason}", trade.code);
                }
                Ok(TickEvent::Sold {
                    date: day,
                    code: trade.code,
                    price,
                    pnl: trade.pnl,
                    reason: decision.reason,
                })
            }
            (ExitAction::Sell, None) => Err(SignalTraderError::Model {
                reason: format!("SELL for {} on {day} without a price", position.code),
            }),
            (ExitAction::Hold, _) => Ok(TickEvent::Held {
                date: day,
                code: position.code,
            }),
        }
    }

    /// Close a leftover position at the last simulated day's price.
    fn force_close(&mut self) -> Result<(), SignalTraderError> {
        if self.state != TradingState::HoldingPosition {
            return Ok(());
        }
        let last_day = self.config.end_date;
        let position = self.held_position()?;
        let request = ExitRequest {
            code: &position.code,
            entry_price: position.entry_price,
            entry_date: position.entry_date,
            current_date: last_day,
            params: self.config.exit_params(),
        };
        let price = self.model.decide_exit(&request)?.price;
        let Some(price) = price else {
            warn!(
                "no price for {} on {last_day}; leaving the position open",
                position.code
            );
            return Ok(());
        };

        let trade = self
            .ledger
            .close_position(&position.code, price, position.entry_date, last_day)?;
        self.state = TradingState::SeekingEntry;
        info!("force-closed {} at end of run", trade.code);
        self.events.push(TickEvent::Sold {
            date: last_day,
            code: trade.code,
            price,
            pnl: trade.pnl,
            reason: None,
        });
        Ok(())
    }
}
