use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use ledgerlink_binance::{BinanceClient, BinanceConfig};
use ledgerlink_core::{Exchange, Timestamp, Trade};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ledgerlink")]
#[command(about = "Pull trade history from Binance and export it in a normalized form")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Path to a TOML config file
    #[arg(short, long, env = "LEDGERLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Binance API key (overrides the config file)
    #[arg(long, env = "BINANCE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Binance API secret (overrides the config file)
    #[arg(long, env = "BINANCE_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the markets Binance currently offers
    Markets,

    /// Fetch and normalize the account's trade history
    Trades {
        /// First day to include (YYYY-MM-DD, UTC)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD, UTC)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Exchange symbol to query (e.g. "BTCUSDT"); repeatable, replaces configured markets
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => BinanceConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => BinanceConfig::default(),
    };
    if let Some(key) = cli.api_key {
        config.api_key = key;
    }
    if let Some(secret) = cli.api_secret {
        config.api_secret = secret;
    }

    match cli.command {
        Commands::Markets => {
            let client = BinanceClient::new(config)?;
            list_markets(&client).await?;
        }
        Commands::Trades {
            start,
            end,
            symbols,
            format,
            output,
        } => {
            if !symbols.is_empty() {
                config.markets = symbols;
            }
            let client = BinanceClient::new(config)?;
            let start_ts = start.map(day_start).unwrap_or(0);
            let end_ts = end.map(day_end).unwrap_or(Timestamp::MAX);
            if start_ts > end_ts {
                anyhow::bail!("--start must not be after --end");
            }
            export_trades(&client, start_ts, end_ts, format, output).await?;
        }
    }

    Ok(())
}

async fn list_markets(client: &BinanceClient) -> Result<()> {
    let symbols = client.first_connection().await?;
    tracing::info!(markets = symbols.len(), "Loaded exchange metadata");

    let mut markets: Vec<_> = symbols.iter().collect();
    markets.sort_unstable_by_key(|(symbol, _)| *symbol);

    let mut stdout = std::io::stdout().lock();
    for (symbol, pair) in markets {
        writeln!(stdout, "{:<14} {}", symbol, pair)?;
    }
    Ok(())
}

async fn export_trades(
    client: &BinanceClient,
    start_ts: Timestamp,
    end_ts: Timestamp,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    tracing::info!(start = start_ts, end = end_ts, "Querying trade history");
    let trades = client.query_trade_history(start_ts, end_ts).await?;
    tracing::info!(trades = trades.len(), "Trade history normalized");

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_output(file, &trades, format)?;
            println!("Wrote {} trades to {}", trades.len(), path.display());
        }
        None => write_output(std::io::stdout().lock(), &trades, format)?,
    }
    Ok(())
}

fn write_output<W: Write>(mut writer: W, trades: &[Trade], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, trades)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            ledgerlink_data::write_trades(writer, trades)?;
        }
    }
    Ok(())
}

fn day_start(date: NaiveDate) -> Timestamp {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn day_end(date: NaiveDate) -> Timestamp {
    day_start(date) + 86_399
}
