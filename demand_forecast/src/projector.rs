//! Future covariate rows for multi-week horizons
//!
//! Calendar fields and promotion-calendar values are known for future weeks;
//! sales are not. The projector emits only what is knowable.

use crate::aggregate::WeeklyAggregate;
use crate::error::{ForecastError, Result};
use crate::features::KnownCovariates;
use crate::promotion::PromotionLookup;
use chrono::{Days, NaiveDate};

/// One future week with its known covariates
#[derive(Debug, Clone, PartialEq)]
pub struct FutureRow {
    pub week_start: NaiveDate,
    pub covariates: KnownCovariates,
}

/// Successive Mondays after `last_week`
///
/// Fails with `InvalidParameter` when the last requested week falls outside
/// the representable calendar.
pub fn future_weeks(last_week: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    let out_of_range = || {
        ForecastError::InvalidParameter(format!(
            "Horizon of {} weeks after {} is past the end of the calendar",
            horizon, last_week
        ))
    };
    let week = |k: u64| {
        k.checked_mul(7)
            .and_then(|days| last_week.checked_add_days(Days::new(days)))
    };

    week(horizon as u64).ok_or_else(out_of_range)?;
    (1..=horizon as u64)
        .map(|k| week(k).ok_or_else(out_of_range))
        .collect()
}

/// Synthesizes future covariate rows for one family
#[derive(Debug, Clone, Copy)]
pub struct HorizonProjector<'a> {
    promotions: &'a PromotionLookup,
}

impl<'a> HorizonProjector<'a> {
    pub fn new(promotions: &'a PromotionLookup) -> Self {
        Self { promotions }
    }

    /// `horizon` rows starting the week after `last_week`
    pub fn project(
        &self,
        family: &str,
        last_week: NaiveDate,
        horizon: usize,
    ) -> Result<Vec<FutureRow>> {
        Ok(future_weeks(last_week, horizon)?
            .into_iter()
            .map(|week_start| FutureRow {
                week_start,
                covariates: KnownCovariates::for_week(family, week_start, self.promotions),
            })
            .collect())
    }

    /// Project from the latest week of a family's history
    pub fn project_from_history(
        &self,
        history: &[WeeklyAggregate],
        horizon: usize,
    ) -> Result<Vec<FutureRow>> {
        let last = history
            .iter()
            .max_by_key(|w| w.week_start)
            .ok_or_else(|| ForecastError::EmptyInput("no history to project from".to_string()))?;

        self.project(&last.family, last.week_start, horizon)
    }
}
