//! Accounts and the store that issues them

use super::Position;
use crate::execution::Order;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Account identifier, unique within one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account value at one point of the replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Cash, positions and order history of one simulated portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub initial_cash: Decimal,
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    /// Filled orders in execution order
    pub orders: Vec<Order>,
    pub realized_pnl: Decimal,
    pub fees_paid: Decimal,
    /// Latest observed price per symbol
    pub marks: HashMap<String, Decimal>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Account {
    fn new(id: AccountId, initial_cash: Decimal) -> Self {
        Self {
            id,
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            orders: vec![],
            realized_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            marks: HashMap::new(),
            equity_curve: vec![],
        }
    }

    /// Held quantity of a symbol (zero when absent)
    pub fn held(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Cash plus open positions at cost. Always equals
    /// `initial_cash + realized_pnl - fees_paid`.
    pub fn book_value(&self) -> Decimal {
        self.cash + self.positions.values().map(Position::book_value).sum::<Decimal>()
    }

    /// Cash plus open positions at their latest marks, falling back to
    /// cost for symbols never marked
    pub fn equity(&self) -> Decimal {
        let positions: Decimal = self
            .positions
            .iter()
            .map(|(symbol, pos)| match self.marks.get(symbol) {
                Some(price) => pos.market_value(*price),
                None => pos.book_value(),
            })
            .sum();
        self.cash + positions
    }

    /// Unrealized P&L across all marked positions
    pub fn unrealized_pnl(&self) -> Decimal {
        self.equity() - self.book_value()
    }

    /// Most recent `n` filled orders, oldest first
    pub fn latest_orders(&self, n: usize) -> &[Order] {
        &self.orders[self.orders.len().saturating_sub(n)..]
    }

    pub(crate) fn mark(&mut self, symbol: &str, price: Decimal) {
        match self.marks.get_mut(symbol) {
            Some(mark) => *mark = price,
            None => {
                self.marks.insert(symbol.to_string(), price);
            }
        }
    }

    /// Record equity at `timestamp`, collapsing points that share a time
    pub(crate) fn snapshot(&mut self, timestamp: DateTime<Utc>) -> EquityPoint {
        let point = EquityPoint {
            timestamp,
            equity: self.equity(),
        };
        match self.equity_curve.last_mut() {
            Some(last) if last.timestamp == timestamp => *last = point,
            _ => self.equity_curve.push(point),
        }
        point
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "account {}: cash {}, equity {}, {} open positions, {} orders",
            self.id,
            self.cash.round_dp(2),
            self.equity().round_dp(2),
            self.positions.values().filter(|p| !p.is_flat()).count(),
            self.orders.len()
        )
    }
}

/// Owns every account of a run.
///
/// Moved onto the dispatcher task while ticks flow and handed back through
/// the task's join result, so readers only ever see it after the join.
#[derive(Debug, Default)]
pub struct AccountStore {
    next_id: u64,
    accounts: BTreeMap<AccountId, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account funded with `initial_cash`
    pub fn create_account(&mut self, initial_cash: Decimal) -> AccountId {
        self.next_id += 1;
        let id = AccountId(self.next_id);
        self.accounts.insert(id, Account::new(id, initial_cash));
        tracing::debug!(account = %id, %initial_cash, "Account created");
        id
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn positions(&self, id: AccountId) -> Option<&BTreeMap<String, Position>> {
        self.accounts.get(&id).map(|a| &a.positions)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Remove and return an account
    pub fn take(&mut self, id: AccountId) -> Option<Account> {
        self.accounts.remove(&id)
    }

    pub(crate) fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    /// Record the latest price of `symbol` on every account
    pub(crate) fn mark(&mut self, symbol: &str, price: Decimal) {
        for account in self.accounts.values_mut() {
            account.mark(symbol, price);
        }
    }

    /// Record an equity point for every account
    pub(crate) fn snapshot(&mut self, timestamp: DateTime<Utc>) -> Vec<(AccountId, EquityPoint)> {
        self.accounts
            .values_mut()
            .map(|a| (a.id, a.snapshot(timestamp)))
            .collect()
    }
}
