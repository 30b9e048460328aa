//! Trade execution and fill simulation.
//!
//! Fills happen at the requested price with no slippage; every fill pays
//! `commission_rate * notional`.

use chrono::NaiveDateTime;

use super::portfolio::Portfolio;
use super::position::{Direction, ExitReason, Position, Trade};

pub fn calculate_commission(notional: f64, commission_rate: f64) -> f64 {
    notional * commission_rate
}

/// An entry the engine wants to make on the current bar.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrder {
    pub direction: Direction,
    pub price: f64,
    pub timestamp: NaiveDateTime,
    /// Requested units; reduced to what the cash can cover.
    pub size: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered { size: f64, commission: f64 },
    PositionOpen,
    InsufficientCapital,
}

/// Open a position.
///
/// 1. Refuse if a position is already open
/// 2. Clamp size so that size * price * (1 + commission_rate) <= cash
/// 3. Deduct notional + commission from cash (a short escrows its notional)
/// 4. Store the position with its bracket levels
pub fn enter_position(
    portfolio: &mut Portfolio,
    symbol: &str,
    order: &EntryOrder,
    commission_rate: f64,
) -> EntryResult {
    if !portfolio.is_flat() {
        return EntryResult::PositionOpen;
    }
    if order.price <= 0.0 || !order.price.is_finite() {
        return EntryResult::InsufficientCapital;
    }

    let affordable = portfolio.cash / (order.price * (1.0 + commission_rate));
    let size = order.size.min(affordable);
    if size.is_nan() || size <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let notional = size * order.price;
    let commission = calculate_commission(notional, commission_rate);
    // the clamp above leaves at most rounding noise below zero
    portfolio.cash = (portfolio.cash - notional - commission).max(0.0);

    portfolio.position = Some(Position {
        symbol: symbol.to_string(),
        direction: order.direction,
        size,
        entry_price: order.price,
        opened_at: order.timestamp,
        stop_loss: order.stop_loss,
        take_profit: order.take_profit,
        entry_commission: commission,
    });

    EntryResult::Entered { size, commission }
}

/// Close the open position at `price`.
///
/// Long exits receive the sale proceeds; short exits get the escrowed entry
/// notional back plus the price difference. Both pay the exit commission.
/// Returns `None` when flat.
pub fn exit_position(
    portfolio: &mut Portfolio,
    price: f64,
    timestamp: NaiveDateTime,
    reason: ExitReason,
    commission_rate: f64,
) -> Option<Trade> {
    let position = portfolio.position.take()?;

    let exit_value = position.size * price;
    let exit_commission = calculate_commission(exit_value, commission_rate);
    portfolio.cash += position.mark_to_market(price) - exit_commission;

    let pnl = position.unrealized_pnl(price) - position.entry_commission - exit_commission;
    let return_pct = if position.entry_price > 0.0 {
        position.direction.sign() * (price - position.entry_price) / position.entry_price * 100.0
    } else {
        0.0
    };

    let trade = Trade {
        symbol: position.symbol,
        direction: position.direction,
        size: position.size,
        entry_price: position.entry_price,
        exit_price: price,
        entry_time: position.opened_at,
        exit_time: timestamp,
        pnl,
        return_pct,
        exit_reason: reason,
    };
    portfolio.record_trade(trade.clone());

    Some(trade)
}
