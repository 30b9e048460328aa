//! Result export port trait.

use std::path::Path;

use crate::domain::aggregate::ResultRecord;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::RoboError;

/// Port for persisting sweep results in tabular form.
pub trait ReportPort {
    fn write_results(&self, results: &[BacktestResult], output_path: &Path) -> Result<(), RoboError>;

    fn read_results(&self, input_path: &Path) -> Result<Vec<ResultRecord>, RoboError>;
}
