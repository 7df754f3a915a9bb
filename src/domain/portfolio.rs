//! Paper Portfolio
//!
//! Lot-sized cash/shares position that reacts to BUY/SELL signals.
//! Money is kept in `Decimal` so thousands of ticks never drift.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::signal::Signal;

/// Default board lot for the simulator
pub const DEFAULT_LOT_SIZE: u64 = 100;

/// Cash and position of one simulated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: Decimal,
    /// Always a multiple of the lot size
    pub shares_held: u64,
    pub trade_count: u32,
}

/// Why a BUY/SELL left the portfolio untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Cash does not cover a single lot
    InsufficientFunds,
    /// SELL with nothing to sell
    NoPosition,
    /// Price was zero or negative
    InvalidPrice,
}

/// Result of applying one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Bought { shares: u64, price: Decimal, cost: Decimal },
    Sold { shares: u64, price: Decimal, proceeds: Decimal },
    Skipped(SkipReason),
    Held,
}

impl TradeOutcome {
    pub fn is_fill(&self) -> bool {
        matches!(self, TradeOutcome::Bought { .. } | TradeOutcome::Sold { .. })
    }
}

/// Mark-to-market snapshot, computed on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub cash: Decimal,
    pub position_value: Decimal,
    pub total_assets: Decimal,
    pub return_pct: Decimal,
}

impl PortfolioState {
    pub fn new(initial_funds: Decimal) -> Self {
        Self {
            cash: initial_funds,
            shares_held: 0,
            trade_count: 0,
        }
    }

    /// Apply a signal and return the new state with what happened.
    ///
    /// BUY spends as many whole lots as cash allows, SELL liquidates the
    /// entire position. Neither ever produces a partial lot or negative cash.
    pub fn apply(self, signal: Signal, price: Decimal, lot_size: u64) -> (Self, TradeOutcome) {
        match signal {
            Signal::Hold => (self, TradeOutcome::Held),
            Signal::Buy => self.buy(price, lot_size),
            Signal::Sell => self.sell(price),
        }
    }

    fn buy(mut self, price: Decimal, lot_size: u64) -> (Self, TradeOutcome) {
        if price <= Decimal::ZERO || lot_size == 0 {
            return (self, TradeOutcome::Skipped(SkipReason::InvalidPrice));
        }

        let shares = affordable_shares(self.cash, price, lot_size);
        if shares == 0 {
            return (self, TradeOutcome::Skipped(SkipReason::InsufficientFunds));
        }

        let cost = Decimal::from(shares) * price;
        self.cash -= cost;
        self.shares_held += shares;
        self.trade_count += 1;
        (self, TradeOutcome::Bought { shares, price, cost })
    }

    fn sell(mut self, price: Decimal) -> (Self, TradeOutcome) {
        if self.shares_held == 0 {
            return (self, TradeOutcome::Skipped(SkipReason::NoPosition));
        }
        if price <= Decimal::ZERO {
            return (self, TradeOutcome::Skipped(SkipReason::InvalidPrice));
        }

        let shares = self.shares_held;
        let proceeds = Decimal::from(shares) * price;
        self.cash += proceeds;
        self.shares_held = 0;
        self.trade_count += 1;
        (self, TradeOutcome::Sold { shares, price, proceeds })
    }

    /// Value the state at `price` against the session's starting funds
    pub fn valuation(&self, price: Decimal, initial_funds: Decimal) -> Valuation {
        let position_value = Decimal::from(self.shares_held) * price;
        let total_assets = self.cash + position_value;
        let return_pct = if initial_funds > Decimal::ZERO {
            (total_assets - initial_funds) / initial_funds * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        Valuation {
            cash: self.cash,
            position_value,
            total_assets,
            return_pct,
        }
    }
}

/// Whole-lot share count that `cash` can buy at `price`
pub fn affordable_shares(cash: Decimal, price: Decimal, lot_size: u64) -> u64 {
    if price <= Decimal::ZERO || lot_size == 0 || cash <= Decimal::ZERO {
        return 0;
    }
    let lot_cost = price * Decimal::from(lot_size);
    let lots = (cash / lot_cost).floor().to_u64().unwrap_or(0);
    lots * lot_size
}

/// Simulated portfolio for one monitored instrument
#[derive(Debug, Clone)]
pub struct PortfolioSimulator {
    initial_funds: Decimal,
    lot_size: u64,
    state: PortfolioState,
}

impl PortfolioSimulator {
    pub fn new(initial_funds: Decimal, lot_size: u64) -> Self {
        Self {
            initial_funds,
            lot_size,
            state: PortfolioState::new(initial_funds),
        }
    }

    /// Apply a signal at `price` and return the new state
    pub fn apply(&mut self, signal: Signal, price: Decimal) -> PortfolioState {
        self.execute(signal, price);
        self.state
    }

    /// Apply a signal at `price` and report what happened
    pub fn execute(&mut self, signal: Signal, price: Decimal) -> TradeOutcome {
        let (state, outcome) = self.state.apply(signal, price, self.lot_size);
        self.state = state;

        match outcome {
            TradeOutcome::Bought { shares, cost, .. } => tracing::info!(
                shares,
                price = %price,
                cost = %cost,
                cash = %self.state.cash,
                "[PAPER] BUY filled"
            ),
            TradeOutcome::Sold { shares, proceeds, .. } => tracing::info!(
                shares,
                price = %price,
                proceeds = %proceeds,
                cash = %self.state.cash,
                "[PAPER] SELL filled"
            ),
            TradeOutcome::Skipped(reason) => tracing::debug!(
                signal = %signal,
                ?reason,
                "[PAPER] Signal skipped"
            ),
            TradeOutcome::Held => {}
        }

        outcome
    }

    pub fn state(&self) -> PortfolioState {
        self.state
    }

    pub fn valuation(&self, price: Decimal) -> Valuation {
        self.state.valuation(price, self.initial_funds)
    }

    pub fn initial_funds(&self) -> Decimal {
        self.initial_funds
    }

    pub fn lot_size(&self) -> u64 {
        self.lot_size
    }

    /// Start a new simulation session from the initial funds
    pub fn reset(&mut self) {
        self.state = PortfolioState::new(self.initial_funds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn simulator() -> PortfolioSimulator {
        PortfolioSimulator::new(dec!(10000.0), DEFAULT_LOT_SIZE)
    }

    #[test]
    fn test_buy_whole_lots() {
        let mut sim = simulator();
        let state = sim.apply(Signal::Buy, dec!(9.04));

        // floor(10000 / 904) = 11 lots
        assert_eq!(state.shares_held, 1100);
        assert_eq!(state.cash, dec!(56.00));
        assert_eq!(state.trade_count, 1);
    }

    #[test]
    fn test_round_trip_scenario() {
        let mut sim = simulator();
        sim.apply(Signal::Buy, dec!(9.04));
        let state = sim.apply(Signal::Sell, dec!(9.20));

        assert_eq!(state.cash, dec!(10176.00));
        assert_eq!(state.shares_held, 0);
        assert_eq!(state.trade_count, 2);

        let valuation = sim.valuation(dec!(9.20));
        assert_eq!(valuation.total_assets, dec!(10176.00));
        assert_eq!(valuation.return_pct, dec!(1.76));
    }

    #[test]
    fn test_second_buy_without_cash_is_noop() {
        let mut sim = simulator();
        let first = sim.apply(Signal::Buy, dec!(9.04));
        let outcome = sim.execute(Signal::Buy, dec!(9.04));
        let second = sim.state();

        assert_eq!(outcome, TradeOutcome::Skipped(SkipReason::InsufficientFunds));
        assert_eq!(first, second);
        assert_eq!(second.shares_held % DEFAULT_LOT_SIZE, 0);
    }

    #[test]
    fn test_buy_below_one_lot_is_noop() {
        let mut sim = PortfolioSimulator::new(dec!(500), DEFAULT_LOT_SIZE);
        let outcome = sim.execute(Signal::Buy, dec!(9.04));

        assert_eq!(outcome, TradeOutcome::Skipped(SkipReason::InsufficientFunds));
        assert_eq!(sim.state(), PortfolioState::new(dec!(500)));
    }

    #[test]
    fn test_sell_without_position_is_noop() {
        let mut sim = simulator();
        let outcome = sim.execute(Signal::Sell, dec!(9.20));

        assert_eq!(outcome, TradeOutcome::Skipped(SkipReason::NoPosition));
        assert_eq!(sim.state().trade_count, 0);
        assert_eq!(sim.state().cash, dec!(10000));
    }

    #[test]
    fn test_hold_changes_nothing() {
        let mut sim = simulator();
        sim.apply(Signal::Buy, dec!(9.04));
        let before = sim.state();
        assert_eq!(sim.execute(Signal::Hold, dec!(12.00)), TradeOutcome::Held);
        assert_eq!(sim.state(), before);
    }

    #[test]
    fn test_buy_adds_to_position_when_cash_allows() {
        let mut sim = PortfolioSimulator::new(dec!(2000), DEFAULT_LOT_SIZE);
        sim.apply(Signal::Buy, dec!(9.00));
        assert_eq!(sim.state().shares_held, 200);
        assert_eq!(sim.state().cash, dec!(200));

        sim.apply(Signal::Buy, dec!(1.50));
        assert_eq!(sim.state().shares_held, 300);
        assert_eq!(sim.state().cash, dec!(50));
        assert_eq!(sim.state().trade_count, 2);
    }

    #[test]
    fn test_shares_stay_lot_multiples() {
        let mut sim = PortfolioSimulator::new(dec!(12345.67), DEFAULT_LOT_SIZE);
        let prices = [dec!(9.04), dec!(9.046), dec!(10.50), dec!(5.25), dec!(3.333)];
        for (i, price) in prices.iter().enumerate() {
            let signal = if i % 2 == 0 { Signal::Buy } else { Signal::Sell };
            let state = sim.apply(signal, *price);
            assert_eq!(state.shares_held % DEFAULT_LOT_SIZE, 0);
            assert!(state.cash >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_valuation_marks_to_market() {
        let mut sim = simulator();
        sim.apply(Signal::Buy, dec!(9.04));

        let valuation = sim.valuation(dec!(9.14));
        assert_eq!(valuation.position_value, dec!(10054.00));
        assert_eq!(valuation.total_assets, dec!(10110.00));
        assert_eq!(valuation.return_pct, dec!(1.1));
    }

    #[test]
    fn test_reset_restores_initial_funds() {
        let mut sim = simulator();
        sim.apply(Signal::Buy, dec!(9.04));
        sim.reset();
        assert_eq!(sim.state(), PortfolioState::new(dec!(10000.0)));
    }

    #[test]
    fn test_invalid_price_skipped() {
        let mut sim = simulator();
        let outcome = sim.execute(Signal::Buy, Decimal::ZERO);
        assert_eq!(outcome, TradeOutcome::Skipped(SkipReason::InvalidPrice));
    }
}
