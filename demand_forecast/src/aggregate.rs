//! Weekly aggregation of transaction records
//!
//! Transactions are grouped by family and by the Monday that starts their
//! ISO week. Quantities are summed as integers so the weekly totals match the
//! raw table exactly.

use crate::data::TransactionRecord;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One family's sales for one ISO week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub family: String,
    /// ISO year of `week_start`
    pub year: i32,
    pub iso_week: u32,
    /// Calendar month of `week_start`
    pub month: u32,
    /// Monday of the ISO week
    pub week_start: NaiveDate,
    pub mean_price_initial: f64,
    pub mean_price_sold: f64,
    pub total_revenue: f64,
    pub total_discount: f64,
    pub total_quantity: i64,
}

/// Parse a `YYYY-MM-DD` transaction date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ForecastError::InvalidSchedule(format!("'{}': {}", raw, e)))
}

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

#[derive(Default)]
struct WeekAccumulator {
    count: usize,
    price_initial: f64,
    price_sold: f64,
    revenue: f64,
    discount: f64,
    quantity: i64,
}

/// Collapse transactions into weekly per-family aggregates
///
/// `families` restricts the input; an empty slice keeps every family. The
/// output is sorted by family, then week.
pub fn aggregate_weekly<'a, I>(records: I, families: &[&str]) -> Result<Vec<WeeklyAggregate>>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut groups: BTreeMap<(String, NaiveDate), WeekAccumulator> = BTreeMap::new();

    for record in records {
        if !families.is_empty() && !families.contains(&record.family.as_str()) {
            continue;
        }

        let date = parse_date(&record.date)?;
        let acc = groups
            .entry((record.family.clone(), week_start(date)))
            .or_default();

        acc.count += 1;
        acc.price_initial += record.price_initial;
        acc.price_sold += record.price_sold;
        acc.revenue += record.revenue;
        acc.discount += record.discount_amount;
        acc.quantity += record.quantity;
    }

    if groups.is_empty() {
        return Err(ForecastError::EmptyInput(if families.is_empty() {
            "no transactions to aggregate".to_string()
        } else {
            format!("no transactions for families {:?}", families)
        }));
    }

    Ok(groups
        .into_iter()
        .map(|((family, monday), acc)| {
            let iso = monday.iso_week();
            let n = acc.count as f64;
            WeeklyAggregate {
                family,
                year: iso.year(),
                iso_week: iso.week(),
                month: monday.month(),
                week_start: monday,
                mean_price_initial: acc.price_initial / n,
                mean_price_sold: acc.price_sold / n,
                total_revenue: acc.revenue,
                total_discount: acc.discount,
                total_quantity: acc.quantity,
            }
        })
        .collect())
}

/// Rows of one family, in week order
pub fn family_series<'a>(weekly: &'a [WeeklyAggregate], family: &str) -> Vec<&'a WeeklyAggregate> {
    let mut rows: Vec<&WeeklyAggregate> = weekly.iter().filter(|w| w.family == family).collect();
    rows.sort_by_key(|w| w.week_start);
    rows
}
