//! Simulated order execution against an account

use super::{FillPricer, Order, OrderStatus, RejectReason, RequestedPrice, Side};
use crate::account::Account;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Half-open `[start, end)` range of order times the executor accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradingWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TradingWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| time >= start) && self.end.map_or(true, |end| time < end)
    }
}

/// Validates orders and applies fills to accounts.
///
/// Each call either commits every account change of the fill or none.
pub struct OrderExecutor {
    window: TradingWindow,
    pricer: Box<dyn FillPricer>,
    fee_rate: Decimal,
    allow_short: bool,
}

impl Default for OrderExecutor {
    fn default() -> Self {
        Self::new(TradingWindow::default(), Box::new(RequestedPrice))
    }
}

impl OrderExecutor {
    pub fn new(window: TradingWindow, pricer: Box<dyn FillPricer>) -> Self {
        Self {
            window,
            pricer,
            fee_rate: Decimal::ZERO,
            allow_short: false,
        }
    }

    /// Fee charged as a fraction of fill notional
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Let sells exceed the held quantity
    pub fn with_short_selling(mut self, allow_short: bool) -> Self {
        self.allow_short = allow_short;
        self
    }

    pub fn window(&self) -> TradingWindow {
        self.window
    }

    /// Execute `order` for `account`, returning the filled copy that was
    /// appended to the account's history
    pub fn execute(&self, order: &Order, account: &mut Account) -> Result<Order, RejectReason> {
        if order.account_id != account.id {
            return Err(RejectReason::UnknownAccount(order.account_id));
        }
        if order.quantity <= Decimal::ZERO {
            return Err(RejectReason::InvalidQuantity(order.quantity));
        }
        if order.price <= Decimal::ZERO {
            return Err(RejectReason::InvalidPrice(order.price));
        }
        if !self.window.contains(order.timestamp) {
            return Err(RejectReason::OutsideWindow(order.timestamp));
        }

        let price = self.pricer.fill_price(order);
        if price <= Decimal::ZERO {
            return Err(RejectReason::InvalidPrice(price));
        }
        let notional = price * order.quantity;
        let fee = notional * self.fee_rate;

        match order.side {
            Side::Buy => {
                let required = notional + fee;
                if required > account.cash {
                    return Err(RejectReason::InsufficientCash {
                        required,
                        available: account.cash,
                    });
                }
            }
            Side::Sell => {
                let held = account.held(&order.symbol);
                if !self.allow_short && held < order.quantity {
                    return Err(RejectReason::InsufficientQuantity {
                        symbol: order.symbol.clone(),
                        held,
                        requested: order.quantity,
                    });
                }
            }
        }

        let realized = account
            .positions
            .entry(order.symbol.clone())
            .or_default()
            .apply(order.side, order.quantity, price);

        account.cash -= order.side.sign() * notional + fee;
        account.realized_pnl += realized;
        account.fees_paid += fee;

        let mut filled = order.clone();
        filled.fill_price = Some(price);
        filled.fee = fee;
        filled.status = OrderStatus::Filled;
        account.orders.push(filled.clone());

        tracing::debug!(
            account = %account.id,
            symbol = %filled.symbol,
            side = ?filled.side,
            quantity = %filled.quantity,
            %price,
            "Order filled"
        );

        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountId, AccountStore};
    use crate::execution::SlippageBps;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2011, 12, 20, 0, 0, 0).unwrap()
    }

    fn setup(cash: Decimal) -> (AccountStore, AccountId) {
        let mut store = AccountStore::new();
        let id = store.create_account(cash);
        (store, id)
    }

    fn assert_conserved(account: &Account) {
        assert_eq!(
            account.book_value(),
            account.initial_cash + account.realized_pnl - account.fees_paid
        );
    }

    #[test]
    fn test_buy_fills_at_requested_price() {
        let (mut store, id) = setup(dec!(200000));
        let executor = OrderExecutor::default();
        let account = store.account_mut(id).unwrap();

        let order = Order::buy(id, "AAPL", dec!(10), dec!(100), t0());
        let filled = executor.execute(&order, account).unwrap();

        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(filled.fill_price, Some(dec!(100)));
        assert_eq!(account.cash, dec!(199000));
        assert_eq!(account.held("AAPL"), dec!(10));
        assert_eq!(account.orders.len(), 1);
        assert_conserved(account);
    }

    #[test]
    fn test_buy_rejected_without_cash() {
        let (mut store, id) = setup(dec!(500));
        let executor = OrderExecutor::default();
        let account = store.account_mut(id).unwrap();

        let order = Order::buy(id, "AAPL", dec!(10), dec!(100), t0());
        let err = executor.execute(&order, account).unwrap_err();

        assert!(matches!(err, RejectReason::InsufficientCash { .. }));
        assert_eq!(account.cash, dec!(500));
        assert!(account.orders.is_empty());
        assert!(account.positions.is_empty());
    }

    #[test]
    fn test_sell_requires_holding() {
        let (mut store, id) = setup(dec!(1000));
        let executor = OrderExecutor::default();
        let account = store.account_mut(id).unwrap();

        let order = Order::sell(id, "AAPL", dec!(1), dec!(100), t0());
        let err = executor.execute(&order, account).unwrap_err();

        assert_eq!(
            err,
            RejectReason::InsufficientQuantity {
                symbol: "AAPL".to_string(),
                held: dec!(0),
                requested: dec!(1),
            }
        );
        assert_eq!(account.cash, dec!(1000));
    }

    #[test]
    fn test_short_selling_when_enabled() {
        let (mut store, id) = setup(dec!(1000));
        let executor = OrderExecutor::default().with_short_selling(true);
        let account = store.account_mut(id).unwrap();

        executor
            .execute(&Order::sell(id, "AAPL", dec!(5), dec!(100), t0()), account)
            .unwrap();
        assert_eq!(account.cash, dec!(1500));
        assert_eq!(account.held("AAPL"), dec!(-5));

        executor
            .execute(&Order::buy(id, "AAPL", dec!(5), dec!(90), t0()), account)
            .unwrap();
        assert_eq!(account.realized_pnl, dec!(50));
        assert_eq!(account.cash, dec!(1050));
        assert_conserved(account);
    }

    #[test]
    fn test_round_trip_with_fees_conserves_value() {
        let (mut store, id) = setup(dec!(10000));
        let executor = OrderExecutor::default().with_fee_rate(dec!(0.001));
        let account = store.account_mut(id).unwrap();

        executor
            .execute(&Order::buy(id, "AAPL", dec!(10), dec!(100), t0()), account)
            .unwrap();
        executor
            .execute(&Order::buy(id, "MSFT", dec!(4), dec!(25), t0()), account)
            .unwrap();
        executor
            .execute(&Order::sell(id, "AAPL", dec!(6), dec!(120), t0()), account)
            .unwrap();

        assert_eq!(account.realized_pnl, dec!(120));
        // 1000*0.001 + 100*0.001 + 720*0.001
        assert_eq!(account.fees_paid, dec!(1.82));
        assert_conserved(account);
    }

    #[test]
    fn test_window_is_half_open() {
        let (mut store, id) = setup(dec!(10000));
        let window = TradingWindow::new(Some(t0()), Some(t0() + Duration::days(10)));
        let executor = OrderExecutor::new(window, Box::new(RequestedPrice));
        let account = store.account_mut(id).unwrap();

        let early = Order::buy(id, "AAPL", dec!(1), dec!(1), t0() - Duration::days(1));
        let late = Order::buy(id, "AAPL", dec!(1), dec!(1), t0() + Duration::days(10));
        let inside = Order::buy(id, "AAPL", dec!(1), dec!(1), t0());

        assert!(matches!(
            executor.execute(&early, account),
            Err(RejectReason::OutsideWindow(_))
        ));
        assert!(matches!(
            executor.execute(&late, account),
            Err(RejectReason::OutsideWindow(_))
        ));
        assert!(executor.execute(&inside, account).is_ok());
    }

    #[test]
    fn test_invalid_orders_rejected() {
        let (mut store, id) = setup(dec!(10000));
        let executor = OrderExecutor::default();
        let account = store.account_mut(id).unwrap();

        let zero_qty = Order::buy(id, "AAPL", dec!(0), dec!(1), t0());
        let bad_price = Order::buy(id, "AAPL", dec!(1), dec!(-1), t0());
        let other_account = Order::buy(AccountId(42), "AAPL", dec!(1), dec!(1), t0());

        assert_eq!(
            executor.execute(&zero_qty, account),
            Err(RejectReason::InvalidQuantity(dec!(0)))
        );
        assert_eq!(
            executor.execute(&bad_price, account),
            Err(RejectReason::InvalidPrice(dec!(-1)))
        );
        assert_eq!(
            executor.execute(&other_account, account),
            Err(RejectReason::UnknownAccount(AccountId(42)))
        );
    }

    #[test]
    fn test_slippage_pricer_applies() {
        let (mut store, id) = setup(dec!(10000));
        let executor =
            OrderExecutor::new(TradingWindow::default(), Box::new(SlippageBps::new(dec!(50))));
        let account = store.account_mut(id).unwrap();

        let filled = executor
            .execute(&Order::buy(id, "AAPL", dec!(10), dec!(100), t0()), account)
            .unwrap();
        assert_eq!(filled.fill_price, Some(dec!(100.5)));
        assert_eq!(account.cash, dec!(8995));
        assert_conserved(account);
    }

    #[test]
    fn test_non_positive_fill_price_rejected() {
        let (mut store, id) = setup(dec!(200000));
        let executor = OrderExecutor::new(
            TradingWindow::default(),
            Box::new(SlippageBps::new(dec!(-20000))),
        );
        let account = store.account_mut(id).unwrap();

        let order = Order::buy(id, "AAPL", dec!(10), dec!(100), t0());
        assert_eq!(
            executor.execute(&order, account),
            Err(RejectReason::InvalidPrice(dec!(-100)))
        );
        assert_eq!(account.cash, dec!(200000));
        assert!(account.positions.is_empty());
        assert!(account.orders.is_empty());
    }
}
