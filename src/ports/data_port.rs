//! Data access port trait.

use crate::domain::error::RoboError;
use crate::domain::ohlcv::OhlcvBar;

/// Source of OHLCV history, one series per symbol.
///
/// Implementations return bars sorted by timestamp with duplicates removed;
/// the full validation contract is enforced by the caller.
pub trait DataPort {
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, RoboError>;

    fn list_symbols(&self) -> Result<Vec<String>, RoboError>;
}
