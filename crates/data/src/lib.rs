pub mod csv_export;

pub use csv_export::{export_trades_to_csv, load_trades_from_csv, read_trades, write_trades};
