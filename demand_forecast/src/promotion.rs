//! Promotion and discount calendar
//!
//! The calendar is loaded once and then shared read-only by the feature
//! builder and the horizon projector. Lookups never fail: a week without an
//! entry resolves to no discount and no promotion.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Channel a promotion runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionChannel {
    Online,
    Store,
    Both,
    #[default]
    None,
}

impl PromotionChannel {
    /// All channels, in indicator column order
    pub const ALL: [PromotionChannel; 4] = [
        PromotionChannel::Online,
        PromotionChannel::Store,
        PromotionChannel::Both,
        PromotionChannel::None,
    ];

    /// Lowercase tag used in calendar files
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionChannel::Online => "online",
            PromotionChannel::Store => "store",
            PromotionChannel::Both => "both",
            PromotionChannel::None => "none",
        }
    }

    /// One-hot encoding in [`PromotionChannel::ALL`] order
    pub fn indicators(&self) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (slot, channel) in out.iter_mut().zip(Self::ALL.iter()) {
            if channel == self {
                *slot = 1.0;
            }
        }
        out
    }
}

impl fmt::Display for PromotionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromotionChannel {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(PromotionChannel::Online),
            "store" => Ok(PromotionChannel::Store),
            "both" => Ok(PromotionChannel::Both),
            "none" | "" => Ok(PromotionChannel::None),
            other => Err(ForecastError::DataError(format!(
                "Unknown promotion type: {}",
                other
            ))),
        }
    }
}

/// Promotion covariates for one (family, year, week)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PromotionEntry {
    /// Average discount rate in [0, 1]
    pub avg_discount: f64,
    pub channel: PromotionChannel,
}

#[derive(Debug, Deserialize, Serialize)]
struct DiscountRow {
    family: String,
    year: i32,
    week: u32,
    avg_discount: f64,
}

#[derive(Debug, Deserialize, Serialize)]
struct PromotionTypeRow {
    family: String,
    year: i32,
    week: u32,
    promotion_type: String,
}

type CalendarKey = (String, i32, u32);

/// Immutable (family, year, week) -> promotion lookup
#[derive(Debug, Clone, Default)]
pub struct PromotionLookup {
    entries: HashMap<CalendarKey, PromotionEntry>,
}

impl PromotionLookup {
    /// Empty calendar; every lookup yields the default entry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a calendar from explicit entries
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = ((String, i32, u32), PromotionEntry)>,
    {
        let mut map = HashMap::new();
        for (key, entry) in entries {
            validate_discount(&key, entry.avg_discount)?;
            map.insert(key, entry);
        }
        Ok(Self { entries: map })
    }

    /// Load the discount and promotion-type tables and merge them by key
    ///
    /// A key present in only one table takes the default for the other field.
    pub fn from_csv<P: AsRef<Path>, Q: AsRef<Path>>(discount_path: P, promotion_path: Q) -> Result<Self> {
        let mut entries: HashMap<CalendarKey, PromotionEntry> = HashMap::new();

        let mut discounts = csv::Reader::from_path(discount_path.as_ref())?;
        for row in discounts.deserialize() {
            let row: DiscountRow = row?;
            let key = (row.family, row.year, row.week);
            validate_discount(&key, row.avg_discount)?;
            entries.entry(key).or_default().avg_discount = row.avg_discount;
        }

        let mut promotions = csv::Reader::from_path(promotion_path.as_ref())?;
        for row in promotions.deserialize() {
            let row: PromotionTypeRow = row?;
            let channel: PromotionChannel = row.promotion_type.parse()?;
            entries
                .entry((row.family, row.year, row.week))
                .or_default()
                .channel = channel;
        }

        info!(entries = entries.len(), "loaded promotion calendar");
        Ok(Self { entries })
    }

    /// Write the calendar back out as the two source tables
    pub fn to_csv<P: AsRef<Path>, Q: AsRef<Path>>(&self, discount_path: P, promotion_path: Q) -> Result<()> {
        let mut keys: Vec<&CalendarKey> = self.entries.keys().collect();
        keys.sort();

        let mut discounts = csv::Writer::from_writer(BufWriter::new(File::create(discount_path)?));
        let mut promotions =
            csv::Writer::from_writer(BufWriter::new(File::create(promotion_path)?));

        for key in keys {
            let entry = self.entries[key];
            discounts.serialize(DiscountRow {
                family: key.0.clone(),
                year: key.1,
                week: key.2,
                avg_discount: entry.avg_discount,
            })?;
            promotions.serialize(PromotionTypeRow {
                family: key.0.clone(),
                year: key.1,
                week: key.2,
                promotion_type: entry.channel.to_string(),
            })?;
        }

        discounts.flush()?;
        promotions.flush()?;
        Ok(())
    }

    /// Promotion covariates for a week, defaulting when the calendar has no entry
    pub fn get(&self, family: &str, year: i32, week: u32) -> PromotionEntry {
        match self.entries.get(&(family.to_string(), year, week)) {
            Some(entry) => *entry,
            None => {
                debug!(family, year, week, "no promotion entry, using default");
                PromotionEntry::default()
            }
        }
    }

    /// Whether the calendar holds an explicit entry for the week
    pub fn contains(&self, family: &str, year: i32, week: u32) -> bool {
        self.entries.contains_key(&(family.to_string(), year, week))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_discount(key: &CalendarKey, avg_discount: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&avg_discount) {
        return Err(ForecastError::DataError(format!(
            "Discount {} for {} {}-W{} is outside [0, 1]",
            avg_discount, key.0, key.1, key.2
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_key_defaults() {
        let lookup = PromotionLookup::empty();
        let entry = lookup.get("Hoodie", 2023, 10);
        assert_eq!(entry.avg_discount, 0.0);
        assert_eq!(entry.channel, PromotionChannel::None);
    }

    #[test]
    fn test_channel_parsing_and_indicators() {
        assert_eq!("Both".parse::<PromotionChannel>().unwrap(), PromotionChannel::Both);
        assert!("radio".parse::<PromotionChannel>().is_err());
        assert_eq!(PromotionChannel::Store.indicators(), [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(PromotionChannel::None.indicators(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_from_csv_merges_tables() {
        let mut discounts = NamedTempFile::new().unwrap();
        writeln!(discounts, "family,year,week,avg_discount").unwrap();
        writeln!(discounts, "Hoodie,2023,1,0.12").unwrap();
        writeln!(discounts, "Shirt,2023,1,0.05").unwrap();

        let mut promotions = NamedTempFile::new().unwrap();
        writeln!(promotions, "family,year,week,promotion_type").unwrap();
        writeln!(promotions, "Hoodie,2023,1,online").unwrap();
        writeln!(promotions, "Hoodie,2023,2,store").unwrap();

        let lookup = PromotionLookup::from_csv(discounts.path(), promotions.path()).unwrap();
        assert_eq!(lookup.len(), 3);

        let hoodie = lookup.get("Hoodie", 2023, 1);
        assert_eq!(hoodie.avg_discount, 0.12);
        assert_eq!(hoodie.channel, PromotionChannel::Online);

        let shirt = lookup.get("Shirt", 2023, 1);
        assert_eq!(shirt.channel, PromotionChannel::None);

        let week2 = lookup.get("Hoodie", 2023, 2);
        assert_eq!(week2.avg_discount, 0.0);
        assert_eq!(week2.channel, PromotionChannel::Store);
    }

    #[test]
    fn test_rejects_out_of_range_discount() {
        let result = PromotionLookup::from_entries(vec![(
            ("Shirt".to_string(), 2023, 4),
            PromotionEntry {
                avg_discount: 1.5,
                channel: PromotionChannel::Both,
            },
        )]);
        assert!(result.is_err());
    }
}
