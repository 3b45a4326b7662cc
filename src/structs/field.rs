use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChartingError;

/// One of the five per-day price/volume fields. The declaration order is the
/// canonical column order used by exports.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [Field::Open, Field::High, Field::Low, Field::Close, Field::Volume];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    /// Header spelling used in flat files ("Open", "Close", ...).
    pub fn header(&self) -> &'static str {
        match self {
            Field::Open => "Open",
            Field::High => "High",
            Field::Low => "Low",
            Field::Close => "Close",
            Field::Volume => "Volume",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ChartingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "o" => Ok(Field::Open),
            "high" | "h" => Ok(Field::High),
            "low" | "l" => Ok(Field::Low),
            "close" | "c" => Ok(Field::Close),
            "volume" | "v" => Ok(Field::Volume),
            other => Err(ChartingError::malformed(format!("unknown field '{other}'"))),
        }
    }
}

#[test]
pub fn test_field_parses_vendor_headers() {
    assert_eq!("Close".parse::<Field>().unwrap(), Field::Close);
    assert_eq!(" volume ".parse::<Field>().unwrap(), Field::Volume);
    assert!("Adj Close".parse::<Field>().is_err());
}

#[test]
pub fn test_field_canonical_order() {
    let mut fields = vec![Field::Volume, Field::Close, Field::Open, Field::Low, Field::High];
    fields.sort();
    assert_eq!(fields, Field::ALL.to_vec());
}
