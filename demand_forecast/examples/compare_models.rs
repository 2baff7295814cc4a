use chrono::NaiveDate;
use demand_forecast::aggregate::aggregate_weekly;
use demand_forecast::evaluation::evaluate;
use demand_forecast::features::FeatureBuilder;
use demand_forecast::models::{FamilyHistory, ModelKind, ModelSettings, PredictionContext, TrainedForecastModel};
use demand_forecast::synthetic::{SyntheticConfig, SyntheticGenerator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Model Comparison");
    println!("=================================\n");

    let data = SyntheticGenerator::new(SyntheticConfig {
        end: NaiveDate::from_ymd_opt(2024, 8, 31).ok_or("bad date")?,
        baskets: 8000,
        ..SyntheticConfig::default()
    })?
    .generate()?;

    // Hold out everything from March 2024 onwards
    let cutoff = "2024-03-01";
    let (train, test): (Vec<_>, Vec<_>) = data
        .transactions
        .iter()
        .partition(|r| r.date.as_str() < cutoff);

    let settings = ModelSettings::default();
    let context = PredictionContext::new(&data.promotions).with_seed(42);
    let horizon = 26;

    for family in ["Hoodie", "Shirt", "Activewear"] {
        let weekly = aggregate_weekly(train.iter().copied(), &[family])?;
        let truth = aggregate_weekly(test.iter().copied(), &[family])?;
        let features = FeatureBuilder::default().build(&weekly, &data.promotions)?;
        let history = FamilyHistory::new(weekly, features)?;

        println!("{}", family);
        println!("  {:<14} {:>8} {:>8} {:>8} {:>6}", "model", "RMSE", "MAE", "R2", "weeks");
        for kind in ModelKind::ALL {
            let model = settings.fit(kind, &history)?;
            let forecast = model.predict(horizon, &context)?;
            let report = evaluate(&forecast, &truth)?;
            println!(
                "  {:<14} {:>8.2} {:>8.2} {:>8.3} {:>6}",
                kind.as_str(),
                report.rmse,
                report.mae,
                report.r2,
                report.n_matched_weeks
            );
        }
        println!();
    }

    Ok(())
}
