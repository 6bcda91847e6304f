use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read class labels from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("class labels must be a JSON array of strings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("class registry is empty")]
    Empty,
    #[error("class label {0:?} appears more than once")]
    Duplicate(String),
}

/// Ordered class labels the classifier was trained on. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRegistry {
    labels: Vec<String>,
}

impl ClassRegistry {
    pub fn new(labels: Vec<String>) -> Result<Self, RegistryError> {
        if labels.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(RegistryError::Duplicate(label.clone()));
            }
        }
        Ok(Self { labels })
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let labels: Vec<String> = serde_json::from_str(json)?;
        Self::new(labels)
    }

    /// Load a JSON array of labels, e.g. `["Happy", "Sad", "Victorious"]`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Sidecar label file for a model: `body_language.onnx` → `body_language.classes.json`.
    pub fn default_path_for<P: AsRef<Path>>(model_path: P) -> PathBuf {
        model_path.as_ref().with_extension("classes.json")
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}
