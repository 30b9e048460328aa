//! Tabular export of sweep results.
//!
//! Numbers are written as plain decimal text so the file opens cleanly in a
//! spreadsheet and parses back to the same values.

use std::fs;
use std::path::Path;

use crate::domain::aggregate::{ResultRecord, RESULT_COLUMNS};
use crate::domain::backtest::BacktestResult;
use crate::domain::error::RoboError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultsCsvAdapter;

impl ResultsCsvAdapter {
    pub fn new() -> Self {
        ResultsCsvAdapter
    }
}

fn record_fields(r: &ResultRecord) -> [String; 11] {
    [
        r.strategy.clone(),
        r.symbol.clone(),
        r.params.clone(),
        r.total_return.to_string(),
        r.total_trades.to_string(),
        r.winning_trades.to_string(),
        r.losing_trades.to_string(),
        r.win_rate.to_string(),
        r.max_drawdown.to_string(),
        r.sharpe_ratio.to_string(),
        r.final_capital.to_string(),
    ]
}

pub fn write_records<W: std::io::Write>(writer: W, results: &[BacktestResult]) -> Result<(), RoboError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(RESULT_COLUMNS)?;
    for result in results {
        wtr.write_record(record_fields(&result.to_record()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_records<R: std::io::Read>(reader: R) -> Result<Vec<ResultRecord>, RoboError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.iter().ne(RESULT_COLUMNS.iter().copied()) {
        return Err(RoboError::DataValidation {
            symbol: "results".to_string(),
            reason: format!(
                "unexpected header '{}', expected '{}'",
                headers.iter().collect::<Vec<_>>().join(","),
                RESULT_COLUMNS.join(",")
            ),
        });
    }

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let text = |i: usize| record.get(i).unwrap_or("").to_string();
        let float = |i: usize| -> Result<f64, RoboError> {
            let raw = record.get(i).unwrap_or("");
            raw.trim().parse().map_err(|_| invalid_cell(row + 1, i, raw))
        };
        let count = |i: usize| -> Result<usize, RoboError> {
            let raw = record.get(i).unwrap_or("");
            raw.trim().parse().map_err(|_| invalid_cell(row + 1, i, raw))
        };

        records.push(ResultRecord {
            strategy: text(0),
            symbol: text(1),
            params: text(2),
            total_return: float(3)?,
            total_trades: count(4)?,
            winning_trades: count(5)?,
            losing_trades: count(6)?,
            win_rate: float(7)?,
            max_drawdown: float(8)?,
            sharpe_ratio: float(9)?,
            final_capital: float(10)?,
        });
    }
    Ok(records)
}

fn invalid_cell(row: usize, column: usize, raw: &str) -> RoboError {
    RoboError::DataValidation {
        symbol: "results".to_string(),
        reason: format!("row {}: invalid {} value '{}'", row, RESULT_COLUMNS[column], raw),
    }
}

impl ReportPort for ResultsCsvAdapter {
    fn write_results(&self, results: &[BacktestResult], output_path: &Path) -> Result<(), RoboError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_records(fs::File::create(output_path)?, results)
    }

    fn read_results(&self, input_path: &Path) -> Result<Vec<ResultRecord>, RoboError> {
        read_records(fs::File::open(input_path)?)
    }
}
