//! Open positions and closed trades.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::RoboError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Which entry directions a run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeDirection {
    #[default]
    Long,
    Short,
    Both,
}

impl TradeDirection {
    pub fn allows(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (TradeDirection::Both, _)
                | (TradeDirection::Long, Direction::Long)
                | (TradeDirection::Short, Direction::Short)
        )
    }
}

impl FromStr for TradeDirection {
    type Err = RoboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(TradeDirection::Long),
            "short" => Ok(TradeDirection::Short),
            "both" => Ok(TradeDirection::Both),
            other => Err(RoboError::invalid(
                "strategy",
                "trade_direction",
                format!("expected long, short or both, got '{}'", other),
            )),
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "long"),
            TradeDirection::Short => write!(f, "short"),
            TradeDirection::Both => write!(f, "both"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => write!(f, "signal"),
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::EndOfData => write!(f, "end_of_data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    /// Absolute units held.
    pub size: f64,
    pub entry_price: f64,
    pub opened_at: NaiveDateTime,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub entry_commission: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn notional(&self) -> f64 {
        self.size * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.size * (price - self.entry_price)
    }

    /// Cash value of the position if closed at `price` before commission.
    /// Shorts hold their entry notional in escrow.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => self.size * price,
            Direction::Short => self.notional() + self.unrealized_pnl(price),
        }
    }

    pub fn should_stop_loss(&self, high: f64, low: f64) -> bool {
        match (self.stop_loss, self.direction) {
            (Some(sl), Direction::Long) => low <= sl,
            (Some(sl), Direction::Short) => high >= sl,
            (None, _) => false,
        }
    }

    pub fn should_take_profit(&self, high: f64, low: f64) -> bool {
        match (self.take_profit, self.direction) {
            (Some(tp), Direction::Long) => high >= tp,
            (Some(tp), Direction::Short) => low <= tp,
            (None, _) => false,
        }
    }

    /// Bracket level touched within [low, high], stop-loss first.
    pub fn bracket_hit(&self, high: f64, low: f64) -> Option<(ExitReason, f64)> {
        if self.should_stop_loss(high, low) {
            return self.stop_loss.map(|sl| (ExitReason::StopLoss, sl));
        }
        if self.should_take_profit(high, low) {
            return self.take_profit.map(|tp| (ExitReason::TakeProfit, tp));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,
    pub size: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    /// Realized PnL net of entry and exit commissions.
    pub pnl: f64,
    /// Directional price move in percent, before commissions.
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }
}
