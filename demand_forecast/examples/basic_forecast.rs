use demand_forecast::aggregate::aggregate_weekly;
use demand_forecast::cleaning::OutlierFilter;
use demand_forecast::features::FeatureBuilder;
use demand_forecast::models::{
    FamilyHistory, ForecastModel, PredictionContext, TrainedForecastModel, TreeRegressionModel,
};
use demand_forecast::summary::SalesKpis;
use demand_forecast::synthetic::{SyntheticConfig, SyntheticGenerator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Basic Forecasting Example");
    println!("==========================================\n");

    // Two years of synthetic sales with a few injected spikes
    let data = SyntheticGenerator::new(SyntheticConfig {
        outliers: 20,
        ..SyntheticConfig::default()
    })?
    .generate()?;

    let (records, report) = OutlierFilter::default().apply(data.transactions);
    println!(
        "Cleaned {} rows, removed {} outliers\n",
        report.input_rows, report.outliers_removed
    );
    println!("{}\n", SalesKpis::from_records(&records));

    let weekly = aggregate_weekly(&records, &["Hoodie"])?;
    println!("Hoodie: {} weeks of history", weekly.len());

    let features = FeatureBuilder::default().build(&weekly, &data.promotions)?;
    let history = FamilyHistory::new(weekly, features)?;

    let model = TreeRegressionModel::default().fit(&history)?;
    let forecast = model.predict(8, &PredictionContext::new(&data.promotions))?;

    println!("\n8-week forecast:");
    for point in forecast.points() {
        println!("  {}  {:>6.1}", point.date, point.predicted_quantity);
    }

    println!("\nMost used covariates:");
    let mut importance = model.feature_importance();
    importance.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, splits) in importance.iter().take(4) {
        println!("  {:<14} {} splits", name, splits);
    }

    Ok(())
}
