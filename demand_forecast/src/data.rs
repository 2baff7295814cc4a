//! Transaction table loading

use crate::error::{ForecastError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

/// One line of the raw sales table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub client_id: String,
    /// Calendar date as `YYYY-MM-DD`; validated during aggregation
    pub date: String,
    pub channel: String,
    pub product_id: String,
    pub product_label: String,
    pub family: String,
    pub price_initial: f64,
    pub price_sold: f64,
    pub discount_amount: f64,
    pub quantity: i64,
    pub revenue: f64,
}

/// Columns every transaction file must provide
pub const TRANSACTION_COLUMNS: [&str; 12] = [
    "transaction_id",
    "client_id",
    "date",
    "channel",
    "product_id",
    "product_label",
    "family",
    "price_initial",
    "price_sold",
    "discount_amount",
    "quantity",
    "revenue",
];

/// Loader for transaction tables
#[derive(Debug)]
pub struct TransactionLoader;

impl TransactionLoader {
    /// Load transactions from a CSV file
    ///
    /// Rows with a missing value in any column are dropped and counted.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionRecord>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let records = Self::from_dataframe(&df)?;
        info!(
            path = %path.display(),
            rows = records.len(),
            "loaded transaction table"
        );
        Ok(records)
    }

    /// Convert an existing DataFrame into transaction records
    pub fn from_dataframe(df: &DataFrame) -> Result<Vec<TransactionRecord>> {
        let present = df.get_column_names();
        let missing: Vec<&str> = TRANSACTION_COLUMNS
            .iter()
            .copied()
            .filter(|name| !present.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::DataError(format!(
                "Transaction table is missing columns: {}",
                missing.join(", ")
            )));
        }

        let transaction_id = utf8_column(df, "transaction_id")?;
        let client_id = utf8_column(df, "client_id")?;
        let date = utf8_column(df, "date")?;
        let channel = utf8_column(df, "channel")?;
        let product_id = utf8_column(df, "product_id")?;
        let product_label = utf8_column(df, "product_label")?;
        let family = utf8_column(df, "family")?;
        let price_initial = f64_column(df, "price_initial")?;
        let price_sold = f64_column(df, "price_sold")?;
        let discount_amount = f64_column(df, "discount_amount")?;
        let quantity = i64_column(df, "quantity")?;
        let revenue = f64_column(df, "revenue")?;

        let mut records = Vec::with_capacity(df.height());
        let mut dropped = 0usize;

        for i in 0..df.height() {
            let row = (|| {
                Some(TransactionRecord {
                    transaction_id: transaction_id[i].clone()?,
                    client_id: client_id[i].clone()?,
                    date: date[i].clone()?,
                    channel: channel[i].clone()?,
                    product_id: product_id[i].clone()?,
                    product_label: product_label[i].clone()?,
                    family: family[i].clone()?,
                    price_initial: price_initial[i]?,
                    price_sold: price_sold[i]?,
                    discount_amount: discount_amount[i]?,
                    quantity: quantity[i]?,
                    revenue: revenue[i]?,
                })
            })();

            match row {
                Some(record) => records.push(record),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(dropped, "dropped transaction rows with missing values");
        }

        Ok(records)
    }

    /// Write transactions to a CSV file with the standard header
    pub fn to_csv<P: AsRef<Path>>(records: &[TransactionRecord], path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Distinct families present in the records, sorted
pub fn families(records: &[TransactionRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.family.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Keep the records whose family is listed; an empty list keeps everything
pub fn filter_families<'a>(
    records: &'a [TransactionRecord],
    families: &[&str],
) -> Vec<&'a TransactionRecord> {
    records
        .iter()
        .filter(|r| families.is_empty() || families.contains(&r.family.as_str()))
        .collect()
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map_err(|e| ForecastError::DataError(format!("Column '{}' not found: {}", name, e)))
}

fn utf8_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?.cast(&DataType::Utf8)?;
    let values = series
        .utf8()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}

fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = column(df, name)?.cast(&DataType::Int64)?;
    let values = series.i64()?.into_iter().collect();
    Ok(values)
}
