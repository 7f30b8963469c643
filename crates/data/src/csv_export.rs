use ledgerlink_core::{DataError, Trade};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Column order of exported trade files.
pub const TRADE_COLUMNS: [&str; 10] = [
    "timestamp",
    "pair",
    "type",
    "rate",
    "cost",
    "cost_currency",
    "fee",
    "fee_currency",
    "amount",
    "location",
];

/// Write trades as CSV, header first. Returns the number of rows written.
///
/// The header is written even when `trades` is empty.
pub fn write_trades<W: Write>(writer: W, trades: &[Trade]) -> Result<usize, DataError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(TRADE_COLUMNS)
        .map_err(|e| DataError::CsvError(format!("Failed to write header: {}", e)))?;
    for trade in trades {
        wtr.serialize(trade)
            .map_err(|e| DataError::CsvError(format!("Failed to write trade: {}", e)))?;
    }
    wtr.flush()?;

    Ok(trades.len())
}

/// Read trades previously written by [`write_trades`].
pub fn read_trades<R: Read>(reader: R) -> Result<Vec<Trade>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    rdr.deserialize()
        .map(|record| {
            record.map_err(|e| DataError::CsvError(format!("CSV record error: {}", e)))
        })
        .collect()
}

pub fn export_trades_to_csv(path: &Path, trades: &[Trade]) -> Result<usize, DataError> {
    let file = File::create(path)?;
    let count = write_trades(file, trades)?;
    tracing::info!(path = %path.display(), trades = count, "Exported trades");
    Ok(count)
}

pub fn load_trades_from_csv(path: &Path) -> Result<Vec<Trade>, DataError> {
    let file = File::open(path)?;
    read_trades(file)
}
