use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusty_charting::resample::{define_weekly_periods, relabel, AggregationRules, Resampler};
use rusty_charting::structs::{Field, Observation, Table, TimeRange};
use rusty_charting::ChartingError;

const TICKER_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.-, ";
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekday trading calendar with random holidays.
fn random_dates(rng: &mut StdRng, len: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(len);
    let mut date = day(2010, 1, 4);
    while dates.len() < len {
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        if !weekend && rng.gen_bool(0.95) {
            dates.push(date);
        }
        date = date + Days::new(1);
    }
    dates
}

/// Distinct tickers that start with a letter and never end in a space.
fn random_symbols(rng: &mut StdRng) -> Vec<String> {
    let count = rng.gen_range(1..=4);
    let mut symbols: Vec<String> = Vec::with_capacity(count);
    while symbols.len() < count {
        let len = rng.gen_range(0..6);
        let mut symbol = String::new();
        symbol.push(char::from(b'A' + rng.gen_range(0..26u8)));
        for _ in 0..len {
            symbol.push(char::from(TICKER_CHARS[rng.gen_range(0..TICKER_CHARS.len())]));
        }
        let symbol = symbol.trim_end().to_string();
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// Fully populated table of random walks.
fn random_table(rng: &mut StdRng) -> Table {
    let len = rng.gen_range(1..120);
    let dates = random_dates(rng, len);
    let symbols = random_symbols(rng);
    let mut prices: Vec<f64> = symbols.iter().map(|_| rng.gen_range(5.0..300.0)).collect();

    let mut rows = Vec::new();
    for date in &dates {
        for (s, symbol) in symbols.iter().enumerate() {
            let open = prices[s];
            let close = (open * rng.gen_range(0.95..1.05)).max(0.01);
            let high = open.max(close) * rng.gen_range(1.0..1.02);
            let low = open.min(close) * rng.gen_range(0.98..1.0);
            let volume = rng.gen_range(1_000..50_000_000) as f64;
            for (field, value) in [
                (Field::Open, open),
                (Field::High, high),
                (Field::Low, low),
                (Field::Close, close),
                (Field::Volume, volume),
            ] {
                rows.push(Observation::new(*date, symbol.as_str(), field, value));
            }
            prices[s] = close;
        }
    }
    Table::load(rows).unwrap()
}

#[test]
fn export_import_round_trip() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let table = random_table(&mut rng);
        let text = table.export_to_string().unwrap();
        let back = Table::import(text.as_bytes()).unwrap();
        assert_eq!(back, table);
    }
}

#[test]
fn symbols_that_cannot_round_trip_are_rejected() {
    let date = day(2020, 6, 1);
    for symbol in ["", " GE", "GE "] {
        let rows = vec![Observation::new(date, symbol, Field::Close, 1.0)];
        assert!(matches!(Table::load(rows), Err(ChartingError::MalformedInput(_))));
    }
    let table = Table::load(vec![Observation::new(date, "BRK.B, CL A", Field::Close, 1.0)]).unwrap();
    let text = table.export_to_string().unwrap();
    assert_eq!(Table::import(text.as_bytes()).unwrap(), table);
}

#[test]
fn periods_partition_the_axis() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let len = rng.gen_range(1..200);
        let dates = random_dates(&mut rng, len);
        let anchor = WEEKDAYS[rng.gen_range(0..7)];
        let periods = define_weekly_periods(&dates, anchor).unwrap();

        let joined: Vec<NaiveDate> = periods.iter().flat_map(|p| p.dates().to_vec()).collect();
        assert_eq!(joined, dates);
        for period in &periods {
            assert!(!period.dates().is_empty());
            assert_eq!(period.close().weekday(), anchor);
            assert!(period.last().unwrap() <= period.close());
            // No anchor day strictly inside a period.
            for d in &period.dates()[..period.dates().len() - 1] {
                assert_ne!(d.weekday(), anchor);
            }
        }
        for pair in periods.windows(2) {
            assert!(pair[0].close() < pair[1].first().unwrap());
        }
    }
}

#[test]
fn empty_partition_fails_for_every_weekday() {
    for anchor in WEEKDAYS {
        assert!(matches!(define_weekly_periods(&[], anchor), Err(ChartingError::EmptyInput)));
    }
}

#[test]
fn relabel_only_moves_dates() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..30 {
        let table = random_table(&mut rng);
        let view = table.project(table.symbols()[0].as_str()).unwrap();
        let rows = Resampler::weekly(Weekday::Fri)
            .with_rules(AggregationRules::ohlcv())
            .rows(&view)
            .unwrap();
        let shifted = relabel(&rows, -4).unwrap();
        assert_eq!(shifted.len(), rows.len());
        for (before, after) in rows.iter().zip(&shifted) {
            assert_eq!(after.point, before.point);
            assert_eq!((after.first, after.last), (before.first, before.last));
            assert_eq!(after.date.weekday(), Weekday::Mon);
        }
    }
}

#[test]
fn weekly_bars_match_daily_extremes() {
    let mut rng = StdRng::seed_from_u64(31);
    let table = random_table(&mut rng);
    let symbol = table.symbols()[0].clone();
    let view = table.project(&symbol).unwrap();
    let rows = Resampler::weekly(Weekday::Fri)
        .with_rules(AggregationRules::ohlcv())
        .rows(&view)
        .unwrap();

    for row in rows {
        let week = view.slice(Some(row.first), Some(row.last)).unwrap();
        let col = |f: Field| -> Vec<f64> { week.column(f).unwrap().iter().flatten().copied().collect() };
        assert_eq!(row.point.open, col(Field::Open).first().copied());
        assert_eq!(row.point.close, col(Field::Close).last().copied());
        assert_eq!(row.point.high, col(Field::High).into_iter().reduce(f64::max));
        assert_eq!(row.point.low, col(Field::Low).into_iter().reduce(f64::min));
        assert_eq!(row.point.volume, col(Field::Volume).into_iter().reduce(|a, b| a + b));
    }
}

#[test]
fn slice_with_own_bounds_is_identity() {
    let mut rng = StdRng::seed_from_u64(43);
    let table = random_table(&mut rng);
    let first = table.dates().first().copied();
    let last = table.dates().last().copied();
    assert_eq!(table.slice(first, last).unwrap(), table);
    assert_eq!(table.slice(None, None).unwrap(), table);
}

#[test]
fn weekly_chart_for_may_2017() {
    // Mon 2017-05-29 is Memorial Day.
    let mut rows = Vec::new();
    let mut date = day(2017, 5, 1);
    let mut close = 29.0;
    while date <= day(2017, 6, 2) {
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        if !weekend && date != day(2017, 5, 29) {
            for field in [Field::Open, Field::High, Field::Low, Field::Close] {
                rows.push(Observation::new(date, "GE", field, close));
            }
            close += 0.25;
        }
        date = date + Days::new(1);
    }
    let table = Table::load(rows).unwrap();
    let view = table.project("GE").unwrap();
    let series = Resampler::weekly(Weekday::Fri).with_offset(-4).resample(&view).unwrap();

    assert_eq!(series.time_range_unit(), &TimeRange::Week { anchor: Weekday::Fri });
    let labels: Vec<NaiveDate> = series.data().iter().map(|b| b.date).collect();
    assert_eq!(
        labels,
        vec![day(2017, 5, 1), day(2017, 5, 8), day(2017, 5, 15), day(2017, 5, 22), day(2017, 5, 29)]
    );
    // Holiday week opens on Tuesday's price.
    assert_eq!(series.data()[4].point.open, table.value(day(2017, 5, 30), Field::Open, "GE"));
}

#[test]
fn unknown_symbol() {
    let mut rng = StdRng::seed_from_u64(3);
    let table = random_table(&mut rng);
    assert!(matches!(table.project("ZZ?"), Err(ChartingError::UnknownSymbol(_))));
}
