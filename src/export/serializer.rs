//! Model artifact persistence
//!
//! Artifacts are a bincode-encoded [`SerializedModel`] envelope: magic bytes,
//! a format version, [`ModelMetadata`], the bincode payload of the object and
//! an FNV-1a checksum of that payload.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamSet;

/// Descriptive header stored alongside the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Registry name of the model, e.g. "Linear Regression"
    pub model_name: String,
    /// Version of this crate that wrote the artifact
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    pub n_features: usize,
    /// Held-out R² reported when the model was selected
    pub test_score: f64,
    pub best_params: ParamSet,
}

impl ModelMetadata {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            n_features: 0,
            test_score: f64::NAN,
            best_params: ParamSet::new(),
        }
    }

    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.n_features = n_features;
        self
    }

    pub fn with_test_score(mut self, score: f64) -> Self {
        self.test_score = score;
        self
    }

    pub fn with_best_params(mut self, params: ParamSet) -> Self {
        self.best_params = params;
        self
    }
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedModel {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub model_data: Vec<u8>,
    pub checksum: u64,
}

impl SerializedModel {
    pub const MAGIC: [u8; 4] = *b"KOLM";
    pub const VERSION: u32 = 1;

    pub fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = fnv1a(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    pub fn verify_checksum(&self) -> bool {
        fnv1a(&self.model_data) == self.checksum
    }

    /// Check magic, version and checksum.
    pub fn validate(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(KolosalError::SerializationError(
                "not a model artifact (bad magic bytes)".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(KolosalError::SerializationError(format!(
                "unsupported artifact format version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if !self.verify_checksum() {
            return Err(KolosalError::SerializationError(
                "checksum verification failed, artifact may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Serialize `obj` to `path`, creating parent directories as needed.
///
/// Overwrites any existing file.
pub fn save_object<T: Serialize>(path: impl AsRef<Path>, obj: &T, metadata: ModelMetadata) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let model_data = bincode::serialize(obj)?;
    let envelope = SerializedModel::new(metadata, model_data);

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, &envelope)?;
    writer.flush()?;

    debug!(path = %path.display(), bytes = envelope.model_data.len(), "Saved object");
    Ok(())
}

/// Read an object written by [`save_object`], returning it with its metadata.
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<(T, ModelMetadata)> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let envelope: SerializedModel = bincode::deserialize_from(reader)?;
    envelope.validate()?;

    let obj: T = bincode::deserialize(&envelope.model_data)?;
    Ok((obj, envelope.metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestModel {
        weights: Vec<f64>,
        bias: f64,
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("kolosal_test_serializer_{}_{}", name, std::process::id()))
            .join("nested")
            .join("model.pkl")
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut envelope = SerializedModel::new(ModelMetadata::new("test"), vec![1, 2, 3, 4, 5]);
        assert!(envelope.validate().is_ok());

        envelope.model_data[0] = 99;
        assert!(!envelope.verify_checksum());
        assert!(matches!(envelope.validate(), Err(KolosalError::SerializationError(_))));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut envelope = SerializedModel::new(ModelMetadata::new("test"), vec![]);
        envelope.magic = *b"PKL!";
        assert!(envelope.validate().is_err());

        let mut envelope = SerializedModel::new(ModelMetadata::new("test"), vec![]);
        envelope.format_version = 9;
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_save_creates_dirs_and_loads() {
        let path = temp_path("roundtrip");
        let root = path.parent().and_then(|p| p.parent()).unwrap().to_path_buf();

        let model = TestModel {
            weights: vec![1.0, 2.0, 3.0],
            bias: 0.5,
        };
        let metadata = ModelMetadata::new("Linear Regression")
            .with_n_features(3)
            .with_test_score(0.97)
            .with_best_params(ParamSet(vec![("alpha".to_string(), ParameterValue::Float(0.1))]));

        save_object(&path, &model, metadata.clone()).unwrap();
        let (loaded, loaded_meta): (TestModel, ModelMetadata) = load_object(&path).unwrap();

        assert_eq!(loaded, model);
        assert_eq!(loaded_meta, metadata);
        assert_eq!(loaded_meta.crate_version, env!("CARGO_PKG_VERSION"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_object::<TestModel>(temp_path("missing")).unwrap_err();
        assert!(matches!(err, KolosalError::IoError(_)));
    }
}
