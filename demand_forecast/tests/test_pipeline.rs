use approx::assert_relative_eq;
use chrono::NaiveDate;
use demand_forecast::aggregate::aggregate_weekly;
use demand_forecast::config::PipelineConfig;
use demand_forecast::data::TransactionRecord;
use demand_forecast::models::{ModelKind, PredictionContext, TrainedForecastModel};
use demand_forecast::pipeline::{train_all, train_family, ForecastService};
use demand_forecast::store::ModelStore;
use demand_forecast::synthetic::{SyntheticConfig, SyntheticData, SyntheticGenerator};
use demand_forecast::ForecastError;
use std::sync::Arc;
use tempfile::tempdir;

const CUTOFF: &str = "2023-10-02";

fn small_dataset() -> SyntheticData {
    let config = SyntheticConfig {
        start: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
        end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        baskets: 800,
        clients: 50,
        products_per_family: 5,
        ..SyntheticConfig::default()
    };
    SyntheticGenerator::new(config).unwrap().generate().unwrap()
}

fn split(records: &[TransactionRecord]) -> (Vec<TransactionRecord>, Vec<TransactionRecord>) {
    records
        .iter()
        .cloned()
        .partition(|r| r.date.as_str() < CUTOFF)
}

#[test]
fn test_train_then_serve_every_kind() {
    let data = small_dataset();
    let (train, test) = split(&data.transactions);
    let dir = tempdir().unwrap();
    let store = ModelStore::new(dir.path());

    let summary = train_all(&train, &PipelineConfig::default(), &data.promotions, &store).unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.trained.len(), 3);

    let service = ForecastService::new(store, Arc::new(data.promotions)).with_seed(Some(3));
    for family in ["Activewear", "Hoodie", "Shirt"] {
        for kind in ModelKind::ALL {
            let forecast = service.predict(family, kind, 13).unwrap();
            assert_eq!(forecast.horizons(), 13);
            assert!(forecast.dates()[0] <= NaiveDate::from_ymd_opt(2023, 10, 2).unwrap());

            let report = service.evaluate_transactions(family, kind, 13, &test).unwrap();
            assert!(report.n_matched_weeks > 0);
            assert!(report.rmse.is_finite() && report.mae.is_finite());
        }
    }
}

#[test]
fn test_store_round_trip_preserves_predictions() {
    let data = small_dataset();
    let (train, _) = split(&data.transactions);
    let models = train_family(&train, "Hoodie", &PipelineConfig::default(), &data.promotions).unwrap();

    let dir = tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    let context = PredictionContext::new(&data.promotions).with_seed(9);

    for model in &models {
        store.save(model).unwrap();
        let loaded = store.load(model.kind(), "Hoodie").unwrap();
        assert_eq!(loaded.last_week(), model.last_week());

        let before = model.predict(8, &context).unwrap().values();
        let after = loaded.predict(8, &context).unwrap().values();
        for (b, a) in before.iter().zip(after.iter()) {
            assert_relative_eq!(*b, *a, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_missing_artifact_is_reported() {
    let dir = tempdir().unwrap();
    let store = ModelStore::new(dir.path());

    match store.load(ModelKind::SeasonalAdditive, "Hoodie") {
        Err(ForecastError::ModelArtifactNotFound { kind, family, .. }) => {
            assert_eq!(kind, ModelKind::SeasonalAdditive);
            assert_eq!(family, "Hoodie");
        }
        other => panic!("expected missing artifact, got {:?}", other),
    }
}

#[test]
fn test_family_filter_limits_training() {
    let data = small_dataset();
    let dir = tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    let config = PipelineConfig {
        families: vec!["Shirt".to_string()],
        ..PipelineConfig::default()
    };

    let summary = train_all(&data.transactions, &config, &data.promotions, &store).unwrap();
    assert_eq!(summary.trained.len(), 1);
    assert!(store.exists(ModelKind::TreeRegression, "Shirt"));
    assert!(!store.exists(ModelKind::TreeRegression, "Hoodie"));
}

#[test]
fn test_weekly_totals_match_transactions() {
    let data = small_dataset();
    let weekly = aggregate_weekly(&data.transactions, &[]).unwrap();

    let from_weeks: i64 = weekly.iter().map(|w| w.total_quantity).sum();
    let from_records: i64 = data.transactions.iter().map(|r| r.quantity).sum();
    assert_eq!(from_weeks, from_records);
}
