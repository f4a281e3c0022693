//! Paper execution — a simulated long-only spot account.
//!
//! Orders submitted through `ExecutionBoundary` are queued and filled at the
//! open of the next bar. The decision engine never learns about rejections;
//! they are counted here and logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sentilab_core::domain::{Kline, OrderSide};
use sentilab_core::execution::ExecutionBoundary;

const QTY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingOrder {
    Buy(f64),
    Sell(f64),
    Close,
}

/// One executed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub time: DateTime<Utc>,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
}

/// A realized (possibly partial) round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// When the position left zero.
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub quantity: f64,
    /// Volume-weighted average entry price of the position.
    pub entry_price: f64,
    pub exit_price: f64,
    pub gross_pnl: f64,
    /// Entry commission share plus exit commission.
    pub commission: f64,
    pub net_pnl: f64,
    /// Net P&L relative to the entry notional, in percent.
    pub return_pct: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}

/// Snapshot of the position still open at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone)]
struct OpenLot {
    entry_time: DateTime<Utc>,
    quantity: f64,
    cost: f64,
    entry_commission: f64,
}

impl OpenLot {
    fn avg_price(&self) -> f64 {
        self.cost / self.quantity
    }
}

/// Simulated account implementing the execution boundary.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    cash: f64,
    commission_rate: f64,
    position: f64,
    lot: Option<OpenLot>,
    pending: Vec<PendingOrder>,
    fills: Vec<Fill>,
    trades: Vec<TradeRecord>,
    rejected: usize,
}

impl PaperBroker {
    pub fn new(start_balance: f64, commission_rate: f64) -> Self {
        Self {
            cash: start_balance,
            commission_rate,
            position: 0.0,
            lot: None,
            pending: Vec::new(),
            fills: Vec::new(),
            trades: Vec::new(),
            rejected: 0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Orders queued for the next bar's open.
    pub fn pending_orders(&self) -> usize {
        self.pending.len()
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn rejected_orders(&self) -> usize {
        self.rejected
    }

    /// Cash plus position marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position * price
    }

    pub fn open_position(&self, mark_price: f64) -> Option<OpenPosition> {
        self.lot.as_ref().map(|lot| OpenPosition {
            entry_time: lot.entry_time,
            quantity: lot.quantity,
            entry_price: lot.avg_price(),
            mark_price,
            unrealized_pnl: (mark_price - lot.avg_price()) * lot.quantity,
        })
    }

    /// Fill everything queued since the previous bar at this bar's open.
    pub fn on_bar_open(&mut self, kline: &Kline) {
        let orders = std::mem::take(&mut self.pending);
        for order in orders {
            match order {
                PendingOrder::Buy(qty) => self.fill_buy(kline.open_time, qty, kline.open),
                PendingOrder::Sell(qty) => self.fill_sell(kline.open_time, qty, kline.open),
                // Closing a flat account is a no-op, not a rejection.
                PendingOrder::Close if self.lot.is_none() => {}
                PendingOrder::Close => self.fill_sell(kline.open_time, self.position, kline.open),
            }
        }
    }

    fn fill_buy(&mut self, time: DateTime<Utc>, quantity: f64, price: f64) {
        let notional = quantity * price;
        let commission = notional * self.commission_rate;
        if notional + commission > self.cash + QTY_EPSILON {
            self.rejected += 1;
            tracing::warn!(
                quantity,
                price,
                cash = self.cash,
                "buy rejected: insufficient cash"
            );
            return;
        }

        self.cash -= notional + commission;
        self.position += quantity;
        match self.lot.as_mut() {
            Some(lot) => {
                lot.quantity += quantity;
                lot.cost += notional;
                lot.entry_commission += commission;
            }
            None => {
                self.lot = Some(OpenLot {
                    entry_time: time,
                    quantity,
                    cost: notional,
                    entry_commission: commission,
                })
            }
        }
        self.fills.push(Fill {
            time,
            side: OrderSide::Buy,
            quantity,
            price,
            commission,
        });
    }

    fn fill_sell(&mut self, time: DateTime<Utc>, requested: f64, price: f64) {
        let Some(lot) = self.lot.as_mut() else {
            self.rejected += 1;
            tracing::warn!(quantity = requested, "sell rejected: no open position");
            return;
        };
        let quantity = requested.min(lot.quantity);
        if quantity <= QTY_EPSILON {
            return;
        }
        if requested > lot.quantity + QTY_EPSILON {
            tracing::debug!(requested, held = lot.quantity, "sell capped to held quantity");
        }

        let notional = quantity * price;
        let exit_commission = notional * self.commission_rate;
        let fraction = quantity / lot.quantity;
        let avg = lot.avg_price();
        let entry_commission = lot.entry_commission * fraction;
        let gross_pnl = (price - avg) * quantity;
        let commission = entry_commission + exit_commission;
        let net_pnl = gross_pnl - commission;
        let entry_notional = avg * quantity;

        self.trades.push(TradeRecord {
            entry_time: lot.entry_time,
            exit_time: time,
            quantity,
            entry_price: avg,
            exit_price: price,
            gross_pnl,
            commission,
            net_pnl,
            return_pct: if entry_notional > 0.0 {
                net_pnl / entry_notional * 100.0
            } else {
                0.0
            },
        });

        lot.cost -= entry_notional;
        lot.entry_commission -= entry_commission;
        lot.quantity -= quantity;
        let closed = lot.quantity <= QTY_EPSILON;

        self.cash += notional - exit_commission;
        self.position -= quantity;
        if closed {
            self.lot = None;
            self.position = 0.0;
        }
        self.fills.push(Fill {
            time,
            side: OrderSide::Sell,
            quantity,
            price,
            commission: exit_commission,
        });
    }
}

impl ExecutionBoundary for PaperBroker {
    fn current_position_size(&self) -> f64 {
        self.position
    }

    fn submit_buy(&mut self, quantity: f64) {
        self.pending.push(PendingOrder::Buy(quantity));
    }

    fn submit_sell(&mut self, quantity: f64) {
        self.pending.push(PendingOrder::Sell(quantity));
    }

    fn close_position(&mut self) {
        self.pending.push(PendingOrder::Close);
    }
}
