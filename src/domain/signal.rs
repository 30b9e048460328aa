//! Trading signals and crossing-event detection.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    /// Numeric encoding: Buy = 1, Sell = -1, Hold = 0.
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }

    pub fn from_i8(value: i8) -> Self {
        match value.signum() {
            1 => Signal::Buy,
            -1 => Signal::Sell,
            _ => Signal::Hold,
        }
    }

    /// Level comparison with an undefined side mapping to Hold.
    pub fn from_levels(fast: Option<f64>, slow: Option<f64>) -> Self {
        match (fast, slow) {
            (Some(f), Some(s)) if f > s => Signal::Buy,
            (Some(f), Some(s)) if f < s => Signal::Sell,
            _ => Signal::Hold,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

/// Entry and exit streams for one series.
///
/// Level strategies use the same stream for both. Crossing strategies keep them
/// apart because their trend filter applies to entries only.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPlan {
    pub entries: Vec<Signal>,
    pub exits: Vec<Signal>,
}

impl SignalPlan {
    pub fn uniform(signals: Vec<Signal>) -> Self {
        SignalPlan {
            exits: signals.clone(),
            entries: signals,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `fast` moved from at-or-below `slow` on bar i-1 to above it on bar i.
pub fn crossed_above(fast: &[Option<f64>], slow: &[Option<f64>], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    match (fast[i - 1], slow[i - 1], fast[i], slow[i]) {
        (Some(pf), Some(ps), Some(cf), Some(cs)) => cf > cs && pf <= ps,
        _ => false,
    }
}

/// `fast` moved from at-or-above `slow` on bar i-1 to below it on bar i.
pub fn crossed_below(fast: &[Option<f64>], slow: &[Option<f64>], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    match (fast[i - 1], slow[i - 1], fast[i], slow[i]) {
        (Some(pf), Some(ps), Some(cf), Some(cs)) => cf < cs && pf >= ps,
        _ => false,
    }
}
