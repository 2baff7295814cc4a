//! Descriptive summaries of the transaction table

use crate::aggregate::parse_date;
use crate::data::TransactionRecord;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Headline figures for a set of transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesKpis {
    pub transactions: usize,
    pub unique_products: usize,
    pub unique_clients: usize,
    pub total_revenue: f64,
    pub total_quantity: i64,
}

impl SalesKpis {
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        let products: HashSet<&str> = records.iter().map(|r| r.product_id.as_str()).collect();
        let clients: HashSet<&str> = records.iter().map(|r| r.client_id.as_str()).collect();

        Self {
            transactions: records.len(),
            unique_products: products.len(),
            unique_clients: clients.len(),
            total_revenue: records.iter().map(|r| r.revenue).sum(),
            total_quantity: records.iter().map(|r| r.quantity).sum(),
        }
    }
}

impl fmt::Display for SalesKpis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transactions: {}", self.transactions)?;
        writeln!(f, "Unique products: {}", self.unique_products)?;
        writeln!(f, "Unique clients: {}", self.unique_clients)?;
        writeln!(f, "Total revenue: {:.2}", self.total_revenue)?;
        write!(f, "Total quantity: {}", self.total_quantity)
    }
}

/// Quantity sold by one family in one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyQuantity {
    /// `YYYY-MM`
    pub month: String,
    pub family: String,
    pub quantity: i64,
}

/// Quantity sold per product label within a family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuantity {
    pub family: String,
    pub product_label: String,
    pub quantity: i64,
}

fn selected<'a>(
    records: &'a [TransactionRecord],
    families: &'a [&str],
) -> impl Iterator<Item = &'a TransactionRecord> {
    records
        .iter()
        .filter(move |r| families.is_empty() || families.contains(&r.family.as_str()))
}

/// Monthly quantity per family, sorted by month then family
pub fn monthly_quantity(records: &[TransactionRecord], families: &[&str]) -> Result<Vec<MonthlyQuantity>> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for record in selected(records, families) {
        let month = parse_date(&record.date)?.format("%Y-%m").to_string();
        *totals.entry((month, record.family.clone())).or_insert(0) += record.quantity;
    }

    Ok(totals
        .into_iter()
        .map(|((month, family), quantity)| MonthlyQuantity {
            month,
            family,
            quantity,
        })
        .collect())
}

/// Quantity per `(family, product_label)`, sorted by family then label
pub fn family_distribution(records: &[TransactionRecord], families: &[&str]) -> Vec<ProductQuantity> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for record in selected(records, families) {
        *totals
            .entry((record.family.clone(), record.product_label.clone()))
            .or_insert(0) += record.quantity;
    }

    totals
        .into_iter()
        .map(|((family, product_label), quantity)| ProductQuantity {
            family,
            product_label,
            quantity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(client: &str, product: &str, family: &str, date: &str, quantity: i64) -> TransactionRecord {
        TransactionRecord {
            transaction_id: format!("{}-{}-{}", client, product, date),
            client_id: client.to_string(),
            date: date.to_string(),
            channel: "Store".to_string(),
            product_id: product.to_string(),
            product_label: format!("{} {}", family, product),
            family: family.to_string(),
            price_initial: 10.0,
            price_sold: 8.0,
            discount_amount: 2.0 * quantity as f64,
            quantity,
            revenue: 8.0 * quantity as f64,
        }
    }

    fn sample() -> Vec<TransactionRecord> {
        vec![
            record("C1", "P1", "Hoodie", "2024-01-15", 3),
            record("C2", "P1", "Hoodie", "2024-01-20", 4),
            record("C1", "P2", "Shirt", "2024-02-01", 2),
            record("C3", "P3", "Activewear", "2024-02-11", 5),
        ]
    }

    #[test]
    fn test_kpis() {
        let kpis = SalesKpis::from_records(&sample());
        assert_eq!(kpis.transactions, 4);
        assert_eq!(kpis.unique_products, 3);
        assert_eq!(kpis.unique_clients, 3);
        assert_eq!(kpis.total_quantity, 14);
        assert_eq!(kpis.total_revenue, 112.0);
    }

    #[test]
    fn test_monthly_quantity_filtered() {
        let monthly = monthly_quantity(&sample(), &["Hoodie", "Shirt"]).unwrap();
        assert_eq!(
            monthly,
            vec![
                MonthlyQuantity {
                    month: "2024-01".to_string(),
                    family: "Hoodie".to_string(),
                    quantity: 7,
                },
                MonthlyQuantity {
                    month: "2024-02".to_string(),
                    family: "Shirt".to_string(),
                    quantity: 2,
                },
            ]
        );
    }

    #[test]
    fn test_family_distribution() {
        let dist = family_distribution(&sample(), &[]);
        assert_eq!(dist.len(), 3);
        assert_eq!(dist[1].family, "Hoodie");
        assert_eq!(dist[1].product_label, "Hoodie P1");
        assert_eq!(dist[1].quantity, 7);
    }

    #[test]
    fn test_bad_date() {
        let records = vec![record("C1", "P1", "Shirt", "not-a-date", 1)];
        assert!(monthly_quantity(&records, &[]).is_err());
    }
}
