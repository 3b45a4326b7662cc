use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChartingError, Result};
use crate::structs::{DateRange, Field, SymbolView};

/// Two-level column key: which field of which symbol.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey {
    pub field: Field,
    pub symbol: String,
}

impl ColumnKey {
    pub fn new(field: Field, symbol: impl Into<String>) -> Self {
        Self { field, symbol: symbol.into() }
    }
}

/// One raw value as supplied by a data source.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub symbol: String,
    pub field: Field,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, symbol: impl Into<String>, field: Field, value: f64) -> Self {
        Self { date, symbol: symbol.into(), field, value }
    }
}

/// Symbols are exported as bare header cells, so they must be non-empty and
/// carry no surrounding whitespace.
pub(crate) fn check_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() || symbol.trim() != symbol {
        return Err(ChartingError::malformed(format!("invalid symbol '{symbol}'")));
    }
    Ok(())
}

/// Multi-symbol daily table: a shared, strictly increasing date axis and one
/// series per (field, symbol), each exactly as long as the axis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    series: BTreeMap<ColumnKey, Vec<Option<f64>>>,
}

impl Table {
    /// Builds a table from observations grouped by date in ascending order.
    /// A date may not reappear once a later date has been seen, and a cell may
    /// only be given one value.
    pub fn load<I>(rows: I) -> Result<Table>
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut symbols: Vec<String> = Vec::new();
        let mut series: BTreeMap<ColumnKey, Vec<Option<f64>>> = BTreeMap::new();

        for obs in rows {
            match dates.last().copied() {
                Some(last) if obs.date < last => {
                    return Err(ChartingError::malformed(format!(
                        "date {} appears after {}; rows must be grouped by ascending date",
                        obs.date, last
                    )));
                }
                Some(last) if obs.date == last => {}
                _ => dates.push(obs.date),
            }
            if !obs.value.is_finite() {
                return Err(ChartingError::malformed(format!(
                    "non-finite {} for {} on {}",
                    obs.field, obs.symbol, obs.date
                )));
            }
            if !symbols.contains(&obs.symbol) {
                check_symbol(&obs.symbol)?;
                symbols.push(obs.symbol.clone());
            }

            let idx = dates.len() - 1;
            let column = series
                .entry(ColumnKey::new(obs.field, obs.symbol.as_str()))
                .or_default();
            column.resize(dates.len(), None);
            let existing = column[idx];
            match existing {
                Some(existing) if existing != obs.value => {
                    return Err(ChartingError::malformed(format!(
                        "conflicting {} for {} on {}: {} vs {}",
                        obs.field, obs.symbol, obs.date, existing, obs.value
                    )));
                }
                _ => column[idx] = Some(obs.value),
            }
        }

        for column in series.values_mut() {
            column.resize(dates.len(), None);
        }
        debug!(dates = dates.len(), symbols = symbols.len(), columns = series.len(), "loaded table");
        Ok(Table { dates, symbols, series })
    }

    /// Assembles a table from already-aligned parts, checking every invariant.
    pub(crate) fn from_parts(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        series: BTreeMap<ColumnKey, Vec<Option<f64>>>,
    ) -> Result<Table> {
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ChartingError::malformed(format!(
                "date axis not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }
        for (key, column) in &series {
            if column.len() != dates.len() {
                return Err(ChartingError::malformed(format!(
                    "column {}/{} has {} values for {} dates",
                    key.field,
                    key.symbol,
                    column.len(),
                    dates.len()
                )));
            }
            if !symbols.contains(&key.symbol) {
                return Err(ChartingError::malformed(format!("column for unlisted symbol {}", key.symbol)));
            }
            if let Some(pos) = column.iter().position(|v| v.map_or(false, |v| !v.is_finite())) {
                return Err(ChartingError::malformed(format!(
                    "non-finite {} for {} on {}",
                    key.field, key.symbol, dates[pos]
                )));
            }
        }
        for symbol in &symbols {
            check_symbol(symbol)?;
        }
        Ok(Table { dates, symbols, series })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Symbols in first-seen order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    pub fn series(&self, field: Field, symbol: &str) -> Option<&[Option<f64>]> {
        self.series
            .get(&ColumnKey::new(field, symbol))
            .map(Vec::as_slice)
    }

    pub fn value(&self, date: NaiveDate, field: Field, symbol: &str) -> Option<f64> {
        let idx = self.dates.binary_search(&date).ok()?;
        self.series(field, symbol)?[idx]
    }

    /// Columns in export order: symbols first-seen, fields canonical within a symbol.
    pub fn columns(&self) -> impl Iterator<Item = (&ColumnKey, &[Option<f64>])> + '_ {
        self.symbols.iter().flat_map(move |symbol| {
            Field::ALL.into_iter().filter_map(move |field| {
                self.series
                    .get_key_value(&ColumnKey::new(field, symbol.as_str()))
                    .map(|(k, v)| (k, v.as_slice()))
            })
        })
    }

    /// Present cells as observations, date-major; `load` of the result rebuilds the
    /// table as long as no column is entirely empty.
    pub fn observations(&self) -> Vec<Observation> {
        let columns: Vec<_> = self.columns().collect();
        let mut out = Vec::new();
        for (idx, date) in self.dates.iter().enumerate() {
            for (key, values) in &columns {
                if let Some(value) = values[idx] {
                    out.push(Observation::new(*date, key.symbol.as_str(), key.field, value));
                }
            }
        }
        out
    }

    /// Rows between `start` and `end`, both inclusive and both optional.
    pub fn slice(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Table> {
        let range = DateRange::new(start, end)?;
        Ok(self.slice_range(&range))
    }

    pub fn slice_range(&self, range: &DateRange) -> Table {
        let (lo, hi) = bounds(&self.dates, range);
        Table {
            dates: self.dates[lo..hi].to_vec(),
            symbols: self.symbols.clone(),
            series: self
                .series
                .iter()
                .map(|(k, v)| (k.clone(), v[lo..hi].to_vec()))
                .collect(),
        }
    }

    /// Re-keys one symbol's columns by field.
    pub fn project(&self, symbol: &str) -> Result<SymbolView> {
        if !self.contains_symbol(symbol) {
            return Err(ChartingError::UnknownSymbol(symbol.to_string()));
        }
        let columns = self
            .series
            .iter()
            .filter(|(k, _)| k.symbol == symbol)
            .map(|(k, v)| (k.field, v.clone()))
            .collect();
        Ok(SymbolView::new(symbol.to_string(), self.dates.clone(), columns))
    }

    /// Every symbol's series for a single field.
    pub fn select_field(&self, field: Field) -> Table {
        let series: BTreeMap<_, _> = self
            .series
            .iter()
            .filter(|(k, _)| k.field == field)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let symbols = self
            .symbols
            .iter()
            .filter(|s| series.keys().any(|k| &k.symbol == *s))
            .cloned()
            .collect();
        Table { dates: self.dates.clone(), symbols, series }
    }

    /// Keeps the given symbols, in the table's own first-seen order.
    pub fn select_symbols<S: AsRef<str>>(&self, wanted: &[S]) -> Result<Table> {
        for s in wanted {
            if !self.contains_symbol(s.as_ref()) {
                return Err(ChartingError::UnknownSymbol(s.as_ref().to_string()));
            }
        }
        let keep = |symbol: &str| wanted.iter().any(|w| w.as_ref() == symbol);
        Ok(Table {
            dates: self.dates.clone(),
            symbols: self.symbols.iter().filter(|s| keep(s.as_str())).cloned().collect(),
            series: self
                .series
                .iter()
                .filter(|(k, _)| keep(k.symbol.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// Half-open index bounds of `range` within a sorted date axis.
pub(crate) fn bounds(dates: &[NaiveDate], range: &DateRange) -> (usize, usize) {
    let lo = range
        .start
        .map_or(0, |s| dates.partition_point(|d| *d < s));
    let hi = range
        .end
        .map_or(dates.len(), |e| dates.partition_point(|d| *d <= e));
    (lo, hi.max(lo))
}

#[cfg(test)]
fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[cfg(test)]
fn sample() -> Table {
    Table::load(vec![
        Observation::new(day(2020, 6, 1), "MSFT", Field::Close, 182.8),
        Observation::new(day(2020, 6, 1), "GE", Field::Close, 6.9),
        Observation::new(day(2020, 6, 1), "GE", Field::Open, 6.8),
        Observation::new(day(2020, 6, 2), "MSFT", Field::Close, 184.9),
        Observation::new(day(2020, 6, 2), "GE", Field::Close, 7.2),
        Observation::new(day(2020, 6, 3), "GE", Field::Close, 7.8),
    ])
    .unwrap()
}

#[test]
pub fn test_load_aligns_columns() {
    let table = sample();
    assert_eq!(table.dates(), &[day(2020, 6, 1), day(2020, 6, 2), day(2020, 6, 3)]);
    assert_eq!(table.symbols(), &["MSFT".to_string(), "GE".to_string()]);
    assert_eq!(table.series(Field::Close, "MSFT").unwrap(), &[Some(182.8), Some(184.9), None]);
    assert_eq!(table.series(Field::Open, "GE").unwrap(), &[Some(6.8), None, None]);
    assert_eq!(table.value(day(2020, 6, 2), Field::Close, "GE"), Some(7.2));
    assert_eq!(table.value(day(2020, 6, 2), Field::Open, "GE"), None);
}

#[test]
pub fn test_load_rejects_conflicts_and_disorder() {
    let conflict = Table::load(vec![
        Observation::new(day(2020, 6, 1), "GE", Field::Close, 6.9),
        Observation::new(day(2020, 6, 1), "GE", Field::Close, 7.0),
    ]);
    assert!(matches!(conflict, Err(ChartingError::MalformedInput(_))));

    let repeated = Table::load(vec![
        Observation::new(day(2020, 6, 1), "GE", Field::Close, 6.9),
        Observation::new(day(2020, 6, 1), "GE", Field::Close, 6.9),
    ]);
    assert!(repeated.is_ok());

    let regrouped = Table::load(vec![
        Observation::new(day(2020, 6, 1), "GE", Field::Close, 6.9),
        Observation::new(day(2020, 6, 2), "GE", Field::Close, 7.2),
        Observation::new(day(2020, 6, 1), "MSFT", Field::Close, 182.8),
    ]);
    assert!(matches!(regrouped, Err(ChartingError::MalformedInput(_))));
}

#[test]
pub fn test_load_rejects_blank_symbols() {
    for symbol in ["", " GE", "GE ", "\tGE"] {
        let table = Table::load(vec![Observation::new(day(2020, 6, 1), symbol, Field::Close, 6.9)]);
        assert!(matches!(table, Err(ChartingError::MalformedInput(_))), "{symbol:?}");
    }
    let inner_space = Table::load(vec![Observation::new(day(2020, 6, 1), "BRK A", Field::Close, 1.0)]).unwrap();
    assert_eq!(Table::import(inner_space.export_to_string().unwrap().as_bytes()).unwrap(), inner_space);
}

#[test]
pub fn test_slice_bounds() {
    let table = sample();
    let full = table.slice(Some(day(2020, 6, 1)), Some(day(2020, 6, 3))).unwrap();
    assert_eq!(full, table);

    let tail = table.slice(Some(day(2020, 6, 2)), None).unwrap();
    assert_eq!(tail.dates(), &[day(2020, 6, 2), day(2020, 6, 3)]);
    assert_eq!(tail.series(Field::Open, "GE").unwrap(), &[None, None]);

    let empty = table.slice(Some(day(2021, 1, 1)), None).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.symbols(), table.symbols());

    let inverted = table.slice(Some(day(2020, 6, 3)), Some(day(2020, 6, 1)));
    assert!(matches!(inverted, Err(ChartingError::Range { .. })));
}

#[test]
pub fn test_project_and_unknown_symbol() {
    let table = sample();
    let ge = table.project("GE").unwrap();
    assert_eq!(ge.symbol(), "GE");
    assert_eq!(ge.fields(), vec![Field::Open, Field::Close]);
    assert_eq!(ge.column(Field::Close).unwrap(), &[Some(6.9), Some(7.2), Some(7.8)]);
    assert!(matches!(table.project("ZZZ"), Err(ChartingError::UnknownSymbol(s)) if s == "ZZZ"));
}

#[test]
pub fn test_cross_sections() {
    let table = sample();
    let opens = table.select_field(Field::Open);
    assert_eq!(opens.symbols(), &["GE".to_string()]);
    assert_eq!(opens.columns().count(), 1);

    let ge = table.select_symbols(&["GE"]).unwrap();
    assert_eq!(ge.columns().count(), 2);
    assert!(table.select_symbols(&["GE", "AAPL"]).is_err());
}

#[test]
pub fn test_observations_reload() {
    let table = sample();
    assert_eq!(Table::load(table.observations()).unwrap(), table);
}
