//! Flat file layout of a `Table`.
//!
//! ```text
//! Attributes,Open,Close,Open,Close
//! Symbols,GE,GE,MSFT,MSFT
//! 2020-06-01,6.8,6.9,182.5,182.8
//! ```
//!
//! Two header rows (field, symbol) followed by one row per date. Empty cells are
//! "no data". Files written by pandas carry an extra `Date,,,` row which is skipped
//! on import, as are columns for fields outside the canonical five.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, warn};

use crate::error::{ChartingError, Result};
use crate::structs::{ColumnKey, Field, Table};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const FIELD_ROW: &str = "Attributes";
const SYMBOL_ROW: &str = "Symbols";

impl Table {
    pub fn export<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        let columns: Vec<_> = self.columns().collect();

        let mut fields = vec![FIELD_ROW.to_string()];
        let mut symbols = vec![SYMBOL_ROW.to_string()];
        for (key, _) in &columns {
            fields.push(key.field.header().to_string());
            symbols.push(key.symbol.clone());
        }
        wtr.write_record(&fields)?;
        wtr.write_record(&symbols)?;

        for (idx, date) in self.dates().iter().enumerate() {
            let mut record = Vec::with_capacity(columns.len() + 1);
            record.push(date.format(DATE_FORMAT).to_string());
            for (_, values) in &columns {
                record.push(values[idx].map(|v| v.to_string()).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export_to_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.export(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ChartingError::InternalConsistency(e.to_string()))
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.export(file)?;
        debug!(path = %path.as_ref().display(), rows = self.len(), "exported table");
        Ok(())
    }

    pub fn import<R: Read>(reader: R) -> Result<Table> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();

        let field_row = records
            .next()
            .ok_or_else(|| ChartingError::malformed("missing field header row"))??;
        let symbol_row = records
            .next()
            .ok_or_else(|| ChartingError::malformed("missing symbol header row"))??;
        if field_row.len() != symbol_row.len() {
            return Err(ChartingError::malformed(format!(
                "header rows disagree: {} field cells vs {} symbol cells",
                field_row.len(),
                symbol_row.len()
            )));
        }
        let width = field_row.len();

        // Column position -> key, for the columns we keep.
        let mut layout: Vec<(usize, ColumnKey)> = Vec::new();
        let mut symbols: Vec<String> = Vec::new();
        for pos in 1..width {
            let name = field_row[pos].trim();
            let symbol = symbol_row[pos].trim();
            let field = match name.parse::<Field>() {
                Ok(field) => field,
                Err(_) => {
                    warn!(column = pos, field = name, symbol, "skipping non-canonical column");
                    continue;
                }
            };
            if symbol.is_empty() {
                return Err(ChartingError::malformed(format!("column {pos} has no symbol")));
            }
            let key = ColumnKey::new(field, symbol);
            if layout.iter().any(|(_, k)| *k == key) {
                return Err(ChartingError::malformed(format!("duplicate column {name}/{symbol}")));
            }
            if !symbols.iter().any(|s| s == symbol) {
                symbols.push(symbol.to_string());
            }
            layout.push((pos, key));
        }

        let mut dates = Vec::new();
        let mut series: BTreeMap<ColumnKey, Vec<Option<f64>>> =
            layout.iter().map(|(_, k)| (k.clone(), Vec::new())).collect();

        for (line, record) in records.enumerate() {
            let record = record?;
            if line == 0 && is_index_name_row(&record) {
                continue;
            }
            if record.len() != width {
                return Err(ChartingError::malformed(format!(
                    "row {} has {} cells, header has {}",
                    line + 3,
                    record.len(),
                    width
                )));
            }
            let date = NaiveDate::parse_from_str(record[0].trim(), DATE_FORMAT).map_err(|e| {
                ChartingError::malformed(format!("bad date '{}': {e}", &record[0]))
            })?;
            dates.push(date);
            for (pos, key) in &layout {
                let cell = record[*pos].trim();
                let value = if cell.is_empty() {
                    None
                } else {
                    let value = cell.parse::<f64>().map_err(|e| {
                        ChartingError::malformed(format!("bad value '{cell}' on {date}: {e}"))
                    })?;
                    // Absence is the only way to say "no data".
                    if !value.is_finite() {
                        return Err(ChartingError::malformed(format!(
                            "non-finite value '{cell}' for {}/{} on {date}",
                            key.field, key.symbol
                        )));
                    }
                    Some(value)
                };
                if let Some(column) = series.get_mut(key) {
                    column.push(value);
                }
            }
        }

        debug!(dates = dates.len(), columns = layout.len(), "imported table");
        Table::from_parts(dates, symbols, series)
    }

    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Table> {
        let file = File::open(path)?;
        Table::import(file)
    }
}

/// The `Date,,,...` row pandas writes under a two-level header.
fn is_index_name_row(record: &StringRecord) -> bool {
    record.get(0).map_or(false, |c| c.trim().eq_ignore_ascii_case("date"))
        && record.iter().skip(1).all(|c| c.trim().is_empty())
}

#[cfg(test)]
fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
pub fn test_export_layout() {
    use crate::structs::Observation;

    let table = Table::load(vec![
        Observation::new(day(2020, 6, 1), "MSFT", Field::Close, 182.83),
        Observation::new(day(2020, 6, 1), "GE", Field::Open, 6.8),
        Observation::new(day(2020, 6, 1), "MSFT", Field::Open, 182.54),
        Observation::new(day(2020, 6, 2), "GE", Field::Open, 6.95),
    ])
    .unwrap();
    let text = table.export_to_string().unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Attributes,Open,Close,Open");
    assert_eq!(lines[1], "Symbols,MSFT,MSFT,GE");
    assert_eq!(lines[2], "2020-06-01,182.54,182.83,6.8");
    assert_eq!(lines[3], "2020-06-02,,,6.95");

    assert_eq!(Table::import(text.as_bytes()).unwrap(), table);
}

#[test]
pub fn test_import_pandas_layout() {
    let text = "\
Attributes,Adj Close,Adj Close,Close,Close,Volume,Volume
Symbols,MSFT,GE,MSFT,GE,MSFT,GE
Date,,,,,,
2010-01-04,23.9,10.1,30.95,15.2,38409100,67100000
2010-01-05,23.9,10.2,30.96,15.3,49749600,53120000
";
    let table = Table::import(text.as_bytes()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.symbols(), &["MSFT".to_string(), "GE".to_string()]);
    assert_eq!(table.value(day(2010, 1, 5), Field::Close, "GE"), Some(15.3));
    assert_eq!(table.value(day(2010, 1, 4), Field::Volume, "MSFT"), Some(38409100.0));
    assert_eq!(table.columns().count(), 4);
}

#[test]
pub fn test_import_rejects_arity_mismatch() {
    let short_row = "Attributes,Close,Close\nSymbols,GE,MSFT\n2010-01-04,15.2\n";
    assert!(matches!(Table::import(short_row.as_bytes()), Err(ChartingError::MalformedInput(_))));

    let ragged_header = "Attributes,Close,Close\nSymbols,GE\n";
    assert!(matches!(Table::import(ragged_header.as_bytes()), Err(ChartingError::MalformedInput(_))));

    assert!(matches!(Table::import("".as_bytes()), Err(ChartingError::MalformedInput(_))));
}

#[test]
pub fn test_import_rejects_unordered_dates() {
    let text = "Attributes,Close\nSymbols,GE\n2010-01-05,1\n2010-01-04,2\n";
    assert!(matches!(Table::import(text.as_bytes()), Err(ChartingError::MalformedInput(_))));
}

#[test]
pub fn test_import_rejects_non_finite() {
    for cell in ["NaN", "inf", "-inf", "infinity"] {
        let text = format!("Attributes,Close\nSymbols,GE\n2010-01-04,1.5\n2010-01-05,{cell}\n");
        assert!(
            matches!(Table::import(text.as_bytes()), Err(ChartingError::MalformedInput(_))),
            "{cell}"
        );
    }
}

#[test]
pub fn test_import_symbol_cells() {
    let padded = "Attributes,Close\nSymbols, GE \n2010-01-04,1.5\n";
    assert_eq!(Table::import(padded.as_bytes()).unwrap().symbols(), &["GE".to_string()]);

    let blank = "Attributes,Close\nSymbols,\n2010-01-04,1.5\n";
    assert!(matches!(Table::import(blank.as_bytes()), Err(ChartingError::MalformedInput(_))));
}
