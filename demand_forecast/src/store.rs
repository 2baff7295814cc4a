//! On-disk artifacts for trained models
//!
//! One file per (model kind, family). Rolling-mean and tree models are stored
//! with bincode; seasonal models are stored as JSON so their parameters can be
//! inspected without this library.

use crate::error::{ForecastError, Result};
use crate::models::{ModelKind, TrainedForecastModel, TrainedModel, TrainedSeasonalAdditive};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory of model artifacts
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `model_<kind>_<family>.<ext>` inside the store directory
    pub fn artifact_path(&self, kind: ModelKind, family: &str) -> PathBuf {
        let extension = match kind {
            ModelKind::SeasonalAdditive => "json",
            ModelKind::RollingMean | ModelKind::TreeRegression => "bin",
        };
        let family: String = family
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir
            .join(format!("model_{}_{}.{}", kind.as_str(), family, extension))
    }

    pub fn exists(&self, kind: ModelKind, family: &str) -> bool {
        self.artifact_path(kind, family).is_file()
    }

    /// Staging file a save writes before it replaces the artifact
    fn staging_path(path: &Path) -> PathBuf {
        path.with_extension("tmp")
    }

    /// Write a trained model, replacing any previous artifact
    ///
    /// The model is written to a staging file first and renamed into place,
    /// so a failed save leaves the previous artifact untouched.
    pub fn save(&self, model: &TrainedModel) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(model.kind(), model.family());
        let staging = Self::staging_path(&path);

        let written = (|| -> Result<()> {
            let mut writer = BufWriter::new(File::create(&staging)?);
            match model {
                TrainedModel::SeasonalAdditive(m) => writer.write_all(m.to_json()?.as_bytes())?,
                TrainedModel::RollingMean(m) => bincode::serialize_into(&mut writer, m)?,
                TrainedModel::TreeRegression(m) => bincode::serialize_into(&mut writer, m)?,
            }
            writer.flush()?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        fs::rename(&staging, &path)?;

        info!(
            family = model.family(),
            model = %model.kind(),
            path = %path.display(),
            "Saved model artifact"
        );
        Ok(path)
    }

    /// Read the artifact for `(kind, family)`
    pub fn load(&self, kind: ModelKind, family: &str) -> Result<TrainedModel> {
        let path = self.artifact_path(kind, family);
        if !path.is_file() {
            return Err(ForecastError::ModelArtifactNotFound {
                kind,
                family: family.to_string(),
                path,
            });
        }

        let mut reader = BufReader::new(File::open(&path)?);
        let model: TrainedModel = match kind {
            ModelKind::SeasonalAdditive => {
                let mut json = String::new();
                reader.read_to_string(&mut json)?;
                TrainedSeasonalAdditive::from_json(&json)?.into()
            }
            ModelKind::RollingMean => {
                TrainedModel::RollingMean(bincode::deserialize_from(&mut reader)?)
            }
            ModelKind::TreeRegression => {
                TrainedModel::TreeRegression(bincode::deserialize_from(&mut reader)?)
            }
        };

        if model.family() != family {
            return Err(ForecastError::DataError(format!(
                "Artifact {} holds family '{}', expected '{}'",
                path.display(),
                model.family(),
                family
            )));
        }

        debug!(family, model = %kind, path = %path.display(), "Loaded model artifact");
        Ok(model)
    }
}
