use clap::{Parser, Subcommand};
use demand_forecast::cleaning::OutlierFilter;
use demand_forecast::config::PipelineConfig;
use demand_forecast::data::TransactionLoader;
use demand_forecast::models::ModelKind;
use demand_forecast::pipeline::{train_all, ForecastService};
use demand_forecast::promotion::PromotionLookup;
use demand_forecast::store::ModelStore;
use demand_forecast::summary::SalesKpis;
use demand_forecast::synthetic::{SyntheticConfig, SyntheticGenerator};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "demand-forecast")]
#[command(about = "Weekly product-family demand forecasting", long_about = None)]
#[command(after_help = "Log level is read from DEMAND_LOG (default: info).")]
struct Cli {
    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train every model kind for every configured family
    Train,

    /// Forecast a family with a stored model
    Predict {
        family: String,

        /// Model kind (rolling_mean, tree, seasonal)
        model: ModelKind,

        /// Number of weeks to forecast
        weeks: usize,

        /// Output CSV file (optional; prints to stdout otherwise)
        out: Option<PathBuf>,
    },

    /// Score a stored model against held-out transactions
    Evaluate {
        family: String,

        /// Model kind (rolling_mean, tree, seasonal)
        model: ModelKind,

        /// Number of weeks to forecast
        weeks: usize,

        /// Transaction CSV with the held-out weeks
        test: PathBuf,
    },

    /// Print sales KPIs for the configured transaction table
    Summary,

    /// Write synthetic transactions and promotion calendars
    Generate {
        /// Output directory
        dir: PathBuf,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Initialize tracing with the DEMAND_LOG environment variable
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("DEMAND_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_promotions(config: &PipelineConfig) -> Result<PromotionLookup, Box<dyn Error>> {
    Ok(PromotionLookup::from_csv(
        &config.data.avg_discount,
        &config.data.promotion_type,
    )?)
}

fn service(config: &PipelineConfig) -> Result<ForecastService, Box<dyn Error>> {
    let promotions = Arc::new(load_promotions(config)?);
    Ok(ForecastService::new(ModelStore::new(&config.model_dir), promotions).with_seed(config.seed))
}

fn train(config: &PipelineConfig) -> Result<(), Box<dyn Error>> {
    let records = TransactionLoader::from_csv(&config.data.transactions)?;
    let (records, report) = OutlierFilter::new(config.outlier_threshold)?.apply(records);
    let promotions = load_promotions(config)?;
    let store = ModelStore::new(&config.model_dir);

    let summary = train_all(&records, config, &promotions, &store)?;
    println!(
        "Cleaned {} rows ({} outliers removed)",
        report.input_rows, report.outliers_removed
    );
    for (family, paths) in &summary.trained {
        println!("{}: {} artifacts", family, paths.len());
    }
    for (family, error) in &summary.failed {
        println!("{}: FAILED ({})", family, error);
    }
    if !summary.is_success() {
        return Err(format!("{} families failed to train", summary.failed.len()).into());
    }
    Ok(())
}

fn predict(
    config: &PipelineConfig,
    family: &str,
    kind: ModelKind,
    horizon: usize,
    out: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let forecast = service(config)?.predict(family, kind, horizon)?;
    match out {
        Some(out) => {
            forecast.to_csv(out)?;
            info!(path = %out.display(), "Wrote forecast");
        }
        None => {
            println!("date,family,model,prediction");
            for point in forecast.points() {
                println!(
                    "{},{},{},{:.2}",
                    point.date,
                    forecast.family(),
                    forecast.kind(),
                    point.predicted_quantity
                );
            }
        }
    }
    Ok(())
}

fn evaluate(
    config: &PipelineConfig,
    family: &str,
    kind: ModelKind,
    horizon: usize,
    test: &Path,
) -> Result<(), Box<dyn Error>> {
    let test = TransactionLoader::from_csv(test)?;
    let report = service(config)?.evaluate_transactions(family, kind, horizon, &test)?;
    println!("{}", report);
    Ok(())
}

fn summary(config: &PipelineConfig) -> Result<(), Box<dyn Error>> {
    let records = TransactionLoader::from_csv(&config.data.transactions)?;
    println!("{}", SalesKpis::from_records(&records));
    Ok(())
}

fn generate(dir: &Path, seed: u64) -> Result<(), Box<dyn Error>> {
    let synthetic = SyntheticConfig {
        outliers: 20,
        seed,
        ..SyntheticConfig::default()
    };

    let data = SyntheticGenerator::new(synthetic)?.generate()?;
    fs::create_dir_all(dir.join("raw"))?;
    TransactionLoader::to_csv(&data.transactions, dir.join("raw").join("transactions.csv"))?;
    data.promotions.to_csv(
        dir.join("avg_discount.csv"),
        dir.join("promotion_type.csv"),
    )?;
    println!(
        "Wrote {} transactions to {}",
        data.transactions.len(),
        dir.display()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Train => train(&config),
        Commands::Predict {
            family,
            model,
            weeks,
            out,
        } => predict(&config, &family, model, weeks, out.as_deref()),
        Commands::Evaluate {
            family,
            model,
            weeks,
            test,
        } => evaluate(&config, &family, model, weeks, &test),
        Commands::Summary => summary(&config),
        Commands::Generate { dir, seed } => generate(&dir, seed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "demand-forecast", "predict", "Shirt", "--config", "c.json", "tree", "4",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        match cli.command {
            Commands::Predict {
                family,
                model,
                weeks,
                out,
            } => {
                assert_eq!(family, "Shirt");
                assert_eq!(model, ModelKind::TreeRegression);
                assert_eq!(weeks, 4);
                assert_eq!(out, None);
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_model_aliases_and_bad_input() {
        let cli = Cli::try_parse_from([
            "demand-forecast", "evaluate", "Hoodie", "prophet", "13", "test.csv",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Evaluate { model: ModelKind::SeasonalAdditive, .. }
        ));

        assert!(Cli::try_parse_from(["demand-forecast", "predict", "Shirt", "arima", "4"]).is_err());
        assert!(Cli::try_parse_from(["demand-forecast", "predict", "Shirt", "tree", "many"]).is_err());
    }

    #[test]
    fn test_generate_seed_default() {
        let cli = Cli::try_parse_from(["demand-forecast", "generate", "data"]).unwrap();
        assert!(matches!(cli.command, Commands::Generate { seed: 42, .. }));
    }
}
