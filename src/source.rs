//! Adapters turning vendor payloads into `Observation`s for `Table::load`.
//! Nothing here fetches; callers hand in bytes they already have.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{ChartingError, Result};
use crate::flat_file::DATE_FORMAT;
use crate::structs::{Field, Observation, Point};

/// One row of a single-symbol OHLCV download.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: Option<f64>,
    #[serde(alias = "High", alias = "high")]
    high: Option<f64>,
    #[serde(alias = "Low", alias = "low")]
    low: Option<f64>,
    #[serde(alias = "Close", alias = "close")]
    close: Option<f64>,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: Option<f64>,
}

/// Reads a `Date,Open,High,Low,Close[,Adj Close],Volume` file for one symbol.
/// Rows must be in ascending date order.
pub fn read_symbol_csv<R: Read>(reader: R, symbol: &str) -> Result<Vec<Observation>> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize::<CsvRow>() {
        let row = row?;
        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
            .map_err(|e| ChartingError::malformed(format!("bad date '{}': {e}", row.date)))?;
        let point = Point {
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        out.extend(point.values().map(|(field, value)| Observation::new(date, symbol, field, value)));
    }
    debug!(symbol, observations = out.len(), "read symbol csv");
    Ok(out)
}

/*
{
  "Meta Data": {
    "1. Information": "Daily Prices (open, high, low, close) and Volumes",
    "2. Symbol": "IBM",
    "3. Last Refreshed": "2024-05-28",
    "4. Output Size": "Compact",
    "5. Time Zone": "US/Eastern"
  },
  "Time Series (Daily)": {
    "2024-05-28": {
      "1. open": "170.4400",
      "2. high": "171.0850",
      "3. low": "168.6500",
      "4. close": "169.6600",
      "5. volume": "2629331"
    },
    ...
*/
#[derive(Deserialize, Debug)]
pub struct DailyStock {
    #[serde(alias = "Meta Data")]
    meta_data: MetaData,
    #[serde(alias = "Time Series (Daily)")]
    time_series: DatePointMap,
}

impl DailyStock {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ChartingError::malformed(e.to_string()))
    }

    pub fn symbol(&self) -> &str {
        &self.meta_data.symbol
    }

    /// Observations in ascending date order; the vendor lists newest first.
    pub fn observations(&self) -> Vec<Observation> {
        let symbol = self.symbol();
        self.time_series
            .map
            .iter()
            .flat_map(|(date, point)| {
                point
                    .values()
                    .map(move |(field, value)| Observation::new(*date, symbol, field, value))
            })
            .collect()
    }
}

#[derive(Deserialize, Debug)]
struct DatePointMap {
    #[serde(flatten, deserialize_with = "deserialize_point_map")]
    map: BTreeMap<NaiveDate, Point>,
}

#[derive(Deserialize, Debug)]
struct CandleStick {
    #[serde(alias = "1. open")]
    open: String,
    #[serde(alias = "2. high")]
    high: String,
    #[serde(alias = "3. low")]
    low: String,
    #[serde(alias = "4. close")]
    close: String,
    #[serde(alias = "5. volume")]
    volume: String,
}

#[derive(Deserialize, Debug)]
struct MetaData {
    #[serde(alias = "2. Symbol")]
    symbol: String,
}

fn deserialize_point_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<NaiveDate, Point>, D::Error>
where
    D: Deserializer<'de>,
{
    struct MapVisitor;

    impl<'de> Visitor<'de> for MapVisitor {
        type Value = BTreeMap<NaiveDate, Point>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("map of dates to candle stick data")
        }

        fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let parse = |field: Field, s: &str| -> std::result::Result<f64, M::Error> {
                s.trim()
                    .parse::<f64>()
                    .map_err(|e| serde::de::Error::custom(format!("{field}: {e}")))
            };
            let mut result = BTreeMap::new();
            while let Some((key, candle)) = map.next_entry::<String, CandleStick>()? {
                let date = NaiveDate::parse_from_str(&key, DATE_FORMAT).map_err(serde::de::Error::custom)?;
                let point = Point::new(
                    parse(Field::Open, &candle.open)?,
                    parse(Field::High, &candle.high)?,
                    parse(Field::Low, &candle.low)?,
                    parse(Field::Close, &candle.close)?,
                    parse(Field::Volume, &candle.volume)?,
                );
                result.insert(date, point);
            }
            Ok(result)
        }
    }

    deserializer.deserialize_map(MapVisitor)
}

#[test]
pub fn test_symbol_csv() {
    let text = "\
Date,Open,High,Low,Close,Adj Close,Volume
2017-05-01,29.0,29.3,28.9,29.1,26.5,31000000
2017-05-02,29.1,29.2,,29.0,26.4,28000000
";
    let rows = read_symbol_csv(text.as_bytes(), "GE").unwrap();
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0], Observation::new(NaiveDate::from_ymd_opt(2017, 5, 1).unwrap(), "GE", Field::Open, 29.0));

    let table = crate::structs::Table::load(rows).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2017, 5, 2).unwrap();
    assert_eq!(table.value(d2, Field::Low, "GE"), None);
    assert_eq!(table.value(d2, Field::Volume, "GE"), Some(28000000.0));
}

#[test]
pub fn test_daily_json_gets_deserialized_properly() {
    let json_str = r#"
    {
        "Meta Data": {
            "1. Information": "Daily Prices (open, high, low, close) and Volumes",
            "2. Symbol": "IBM",
            "3. Last Refreshed": "2024-05-28",
            "4. Output Size": "Compact",
            "5. Time Zone": "US/Eastern"
        },
        "Time Series (Daily)": {
            "2024-05-28": {
                "1. open": "170.4400",
                "2. high": "171.0850",
                "3. low": "168.6500",
                "4. close": "169.6600",
                "5. volume": "2629331"
            },
            "2024-05-24": {
                "1. open": "168.9500",
                "2. high": "171.0800",
                "3. low": "168.6500",
                "4. close": "170.8900",
                "5. volume": "2587664"
            }
        }
    }
    "#;
    let stock = DailyStock::from_json(json_str).unwrap();
    assert_eq!(stock.symbol(), "IBM");
    let rows = stock.observations();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 5, 24).unwrap());

    let table = crate::structs::Table::load(rows).unwrap();
    let d = NaiveDate::from_ymd_opt(2024, 5, 28).unwrap();
    assert_eq!(table.value(d, Field::Open, "IBM"), Some(170.44));
}
