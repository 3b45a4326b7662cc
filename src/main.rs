use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use rusty_charting::resample::{AggregationRules, Resampler};
use rusty_charting::source::read_symbol_csv;
use rusty_charting::structs::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reshape and resample daily stock tables for charting.
#[derive(Parser, Debug)]
#[command(name = "rusty-charting", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the symbols in a table file.
    Symbols { file: PathBuf },
    /// Cut a date range out of a table file.
    Slice {
        file: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
        /// Write here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print one symbol's daily bars as JSON.
    Daily {
        file: PathBuf,
        symbol: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Print one symbol's weekly (or monthly) bars as JSON.
    Resample {
        file: PathBuf,
        symbol: String,
        /// Weekday that closes each week.
        #[arg(long, default_value = "fri")]
        anchor: Weekday,
        /// Days to shift each label by, e.g. -4 to label Friday weeks by Monday.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        #[arg(long)]
        monthly: bool,
        /// Also sum volume, when the symbol has it.
        #[arg(long)]
        volume: bool,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Merge per-symbol OHLCV csv files into one table file.
    Convert {
        /// Symbol is taken from the upper-cased file stem.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Partial date such as 2017, 5-2017 or 2017-05:2017-09.
    #[arg(long)]
    period: Option<String>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl RangeArgs {
    fn resolve(&self) -> rusty_charting::Result<DateRange> {
        DateRange::resolve(self.period.as_deref(), self.start, self.end)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Symbols { file } => {
            let table = open(&file)?;
            for symbol in table.symbols() {
                println!("{symbol}");
            }
        }
        Command::Slice { file, range, out } => {
            let table = open(&file)?.slice_range(&range.resolve()?);
            info!(rows = table.len(), "sliced table");
            write_table(&table, out)?;
        }
        Command::Daily { file, symbol, range } => {
            let view = open(&file)?.project(&symbol)?.slice_range(&range.resolve()?);
            print_json(&TimeSeries::daily(&view))?;
        }
        Command::Resample { file, symbol, anchor, offset, monthly, volume, range } => {
            let view = open(&file)?.project(&symbol)?.slice_range(&range.resolve()?);
            let resampler = if monthly { Resampler::monthly() } else { Resampler::weekly(anchor) };
            let fields = view.fields().into_iter().filter(|f| volume || *f != Field::Volume);
            let rules = AggregationRules::for_fields(fields);
            let series = resampler.with_rules(rules).with_offset(offset).resample(&view)?;
            print_json(&series)?;
        }
        Command::Convert { inputs, out } => {
            let mut rows = Vec::new();
            for path in &inputs {
                let symbol = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_uppercase)
                    .with_context(|| format!("no symbol in file name {}", path.display()))?;
                let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
                rows.extend(read_symbol_csv(file, &symbol)?);
            }
            // Stable: keeps each symbol's own field order within a date.
            rows.sort_by_key(|o| o.date);
            let table = Table::load(rows)?;
            info!(symbols = table.symbols().len(), rows = table.len(), "converted");
            write_table(&table, out)?;
        }
    }
    Ok(())
}

fn open(path: &Path) -> anyhow::Result<Table> {
    Table::read_file(path).with_context(|| format!("reading table {}", path.display()))
}

fn write_table(table: &Table, out: Option<PathBuf>) -> anyhow::Result<()> {
    match out {
        Some(path) => table.write_file(&path).with_context(|| format!("writing {}", path.display()))?,
        None => table.export(io::stdout().lock())?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
