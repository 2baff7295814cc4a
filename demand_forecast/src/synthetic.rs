//! Synthetic transaction generator
//!
//! Produces a transaction table and a matching promotion calendar with
//! family-specific behaviour: Activewear peaks in early summer, Shirt in
//! spring, and Hoodie responds mostly to promotions. All draws come from a
//! single seeded RNG so a seed fully determines the output.

use crate::data::TransactionRecord;
use crate::error::{ForecastError, Result};
use crate::promotion::{PromotionChannel, PromotionEntry, PromotionLookup};
use chrono::{Datelike, Duration, NaiveDate};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

const SALES_CHANNELS: [&str; 2] = ["Store", "Online"];
const LABEL_LETTERS: [char; 4] = ['Z', 'X', 'M', 'A'];

/// Generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub families: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Number of baskets drawn; each basket holds 2 to 5 items
    pub baskets: usize,
    pub clients: usize,
    pub products_per_family: usize,
    /// Rows whose quantity is multiplied by ten
    pub outliers: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            families: vec![
                "Hoodie".to_string(),
                "Shirt".to_string(),
                "Activewear".to_string(),
            ],
            start: NaiveDate::from_ymd_opt(2022, 3, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap_or_default(),
            baskets: 6000,
            clients: 500,
            products_per_family: 30,
            outliers: 0,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.families.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one family is required".to_string(),
            ));
        }
        if self.end < self.start {
            return Err(ForecastError::InvalidParameter(format!(
                "End date {} precedes start date {}",
                self.end, self.start
            )));
        }
        if self.clients == 0 || self.products_per_family == 0 {
            return Err(ForecastError::InvalidParameter(
                "Clients and products per family must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generated transactions and their promotion calendar
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub transactions: Vec<TransactionRecord>,
    pub promotions: PromotionLookup,
}

#[derive(Debug, Clone)]
struct Product {
    id: String,
    label: String,
    family: String,
    price: f64,
}

#[derive(Debug, Clone, Copy)]
enum ClientProfile {
    Sporty,
    Formal,
    Urban,
}

/// Demand multiplier for a family in a calendar month
pub fn seasonal_multiplier(family: &str, month: u32) -> f64 {
    match family {
        "Activewear" => match month {
            5 => 2.0,
            6 => 3.2,
            7 | 8 => 2.5,
            _ => 0.6,
        },
        "Hoodie" => 1.1,
        "Shirt" => match month {
            4 | 5 => 2.2,
            3 | 9 => 1.5,
            _ => 0.9,
        },
        _ => 1.0,
    }
}

/// Mid-year bump centred on ISO week 26
pub fn weekly_modulator(iso_week: u32) -> f64 {
    1.0 + 0.5 * (-((iso_week as f64 - 26.0) / 4.0).powi(2)).exp()
}

/// Quantity multiplier for a promotion channel
pub fn promotion_boost(family: &str, channel: PromotionChannel) -> f64 {
    match (family, channel) {
        ("Hoodie", PromotionChannel::Online) => 2.0,
        ("Hoodie", PromotionChannel::Store) => 1.5,
        ("Hoodie", PromotionChannel::Both) => 2.5,
        ("Shirt", PromotionChannel::Online) => 1.1,
        ("Shirt", PromotionChannel::Both) => 1.2,
        _ => 1.0,
    }
}

fn discount_range(family: &str) -> (f64, f64) {
    match family {
        "Shirt" => (0.05, 0.20),
        "Activewear" => (0.10, 0.25),
        "Hoodie" => (0.02, 0.15),
        _ => (0.0, 0.10),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Seeded generator of synthetic sales data
#[derive(Debug)]
pub struct SyntheticGenerator {
    config: SyntheticConfig,
    rng: StdRng,
}

impl SyntheticGenerator {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn dates(&self) -> Vec<NaiveDate> {
        let days = (self.config.end - self.config.start).num_days();
        (0..=days)
            .map(|d| self.config.start + Duration::days(d))
            .collect()
    }

    /// Discount rate and channel for every (family, ISO week) in the range
    fn promotion_calendar(&mut self, dates: &[NaiveDate]) -> Result<PromotionLookup> {
        let mut entries = Vec::new();
        let mut last_key = None;
        for date in dates {
            let iso = date.iso_week();
            if last_key == Some((iso.year(), iso.week())) {
                continue;
            }
            last_key = Some((iso.year(), iso.week()));

            for family in &self.config.families {
                let (low, high) = discount_range(family);
                let avg_discount = self.rng.gen_range(low..high);
                let channel = *PromotionChannel::ALL
                    .choose(&mut self.rng)
                    .unwrap_or(&PromotionChannel::None);
                entries.push((
                    (family.clone(), iso.year(), iso.week()),
                    PromotionEntry {
                        avg_discount,
                        channel,
                    },
                ));
            }
        }
        PromotionLookup::from_entries(entries)
    }

    fn products(&mut self) -> Vec<Product> {
        let mut products = Vec::new();
        for family in &self.config.families {
            for _ in 0..self.config.products_per_family {
                let letter = LABEL_LETTERS[self.rng.gen_range(0..LABEL_LETTERS.len())];
                products.push(Product {
                    id: format!("P{:04}", products.len()),
                    label: format!("{} {}{}", family, letter, self.rng.gen_range(10..100)),
                    family: family.clone(),
                    price: round2(self.rng.gen_range(20.0..100.0)),
                });
            }
        }
        products
    }

    fn family_weights(&self, profile: ClientProfile) -> Vec<f64> {
        self.config
            .families
            .iter()
            .map(|family| match (profile, family.as_str()) {
                (ClientProfile::Sporty, "Activewear") => 8.0,
                (ClientProfile::Formal, "Shirt") => 8.0,
                (ClientProfile::Urban, _) => 3.0,
                _ => 1.0,
            })
            .collect()
    }

    /// Generate transactions and the promotion calendar they were drawn with
    pub fn generate(&mut self) -> Result<SyntheticData> {
        let dates = self.dates();
        let promotions = self.promotion_calendar(&dates)?;
        let products = self.products();

        let profile_weights = WeightedIndex::new([0.3, 0.3, 0.4])
            .map_err(|e| ForecastError::DataError(e.to_string()))?;
        let profiles: Vec<ClientProfile> = (0..self.config.clients)
            .map(|_| match profile_weights.sample(&mut self.rng) {
                0 => ClientProfile::Sporty,
                1 => ClientProfile::Formal,
                _ => ClientProfile::Urban,
            })
            .collect();

        let mut by_family: HashMap<&str, Vec<&Product>> = HashMap::new();
        for product in &products {
            by_family.entry(product.family.as_str()).or_default().push(product);
        }

        let base_quantity =
            Normal::new(5.0, 0.1).map_err(|e| ForecastError::DataError(e.to_string()))?;
        let mut weekly_base: HashMap<(i32, u32, String), f64> = HashMap::new();

        let mut transactions = Vec::new();
        for _ in 0..self.config.baskets {
            let client = self.rng.gen_range(0..self.config.clients);
            let profile = profiles[client];
            let date = dates[self.rng.gen_range(0..dates.len())];
            let iso = date.iso_week();
            let channel = SALES_CHANNELS[self.rng.gen_range(0..SALES_CHANNELS.len())];
            let n_items = self.rng.gen_range(2..6);

            let family_index = WeightedIndex::new(self.family_weights(profile))
                .map_err(|e| ForecastError::DataError(e.to_string()))?;

            for _ in 0..n_items {
                let family = self.config.families[family_index.sample(&mut self.rng)].as_str();
                let candidates = match by_family.get(family) {
                    Some(c) if !c.is_empty() => c,
                    _ => continue,
                };
                let product = candidates[self.rng.gen_range(0..candidates.len())];

                let base = *weekly_base
                    .entry((iso.year(), iso.week(), family.to_string()))
                    .or_insert_with(|| base_quantity.sample(&mut self.rng));
                let promotion = promotions.get(family, iso.year(), iso.week()).channel;
                let quantity = match family {
                    "Hoodie" => base * promotion_boost(family, promotion),
                    "Activewear" => base * seasonal_multiplier(family, date.month()) * weekly_modulator(iso.week()),
                    _ => {
                        base * seasonal_multiplier(family, date.month())
                            * weekly_modulator(iso.week())
                            * promotion_boost(family, promotion)
                    }
                };
                let quantity = quantity.clamp(1.0, 25.0) as i64;

                let max_rate = if channel == "Online" { 0.3 } else { 0.2 };
                let discount = round2(self.rng.gen_range(0.1..max_rate) * product.price);
                let price_sold = (product.price - discount).max(0.0);

                transactions.push(TransactionRecord {
                    transaction_id: format!("T{:07}", transactions.len()),
                    client_id: format!("C{:04}", client + 1),
                    date: date.format("%Y-%m-%d").to_string(),
                    channel: channel.to_string(),
                    product_id: product.id.clone(),
                    product_label: product.label.clone(),
                    family: product.family.clone(),
                    price_initial: product.price,
                    price_sold,
                    discount_amount: round2(discount * quantity as f64),
                    quantity,
                    revenue: round2(price_sold * quantity as f64),
                });
            }
        }

        for _ in 0..self.config.outliers.min(transactions.len()) {
            let idx = self.rng.gen_range(0..transactions.len());
            let row = &mut transactions[idx];
            row.quantity *= 10;
            row.revenue = round2(row.price_sold * row.quantity as f64);
        }

        info!(
            transactions = transactions.len(),
            families = self.config.families.len(),
            promotion_weeks = promotions.len(),
            "Generated synthetic sales"
        );

        Ok(SyntheticData {
            transactions,
            promotions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SyntheticConfig {
        SyntheticConfig {
            start: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            baskets: 300,
            clients: 40,
            products_per_family: 5,
            seed,
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = SyntheticGenerator::new(small_config(1)).unwrap().generate().unwrap();
        let b = SyntheticGenerator::new(small_config(1)).unwrap().generate().unwrap();
        assert_eq!(a.transactions, b.transactions);
        assert_eq!(a.promotions.len(), b.promotions.len());
    }

    #[test]
    fn test_rows_are_consistent() {
        let data = SyntheticGenerator::new(small_config(9)).unwrap().generate().unwrap();
        assert!(!data.transactions.is_empty());
        for row in &data.transactions {
            assert!((1..=25).contains(&row.quantity));
            assert!(row.price_sold <= row.price_initial);
            assert!(["Hoodie", "Shirt", "Activewear"].contains(&row.family.as_str()));
        }
        // 26 ISO weeks in range, three families
        assert_eq!(data.promotions.len(), 26 * 3);
    }

    #[test]
    fn test_activewear_peaks_in_june() {
        assert!(seasonal_multiplier("Activewear", 6) > seasonal_multiplier("Activewear", 1));
        assert!(weekly_modulator(26) > weekly_modulator(10));
        assert_eq!(promotion_boost("Hoodie", PromotionChannel::None), 1.0);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let config = SyntheticConfig {
            start: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            ..SyntheticConfig::default()
        };
        assert!(SyntheticGenerator::new(config).is_err());
    }
}
