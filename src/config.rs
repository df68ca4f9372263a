use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoContext, PlsaError, Result};
use crate::utils::datastruct::table::StoragePolicy;

/// Seed the toolkit has always used for its initial noise.
pub const DEFAULT_SEED: u64 = 100;

/// Knobs for a training run.
///
/// Any field missing from a JSON config file takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of latent topics K
    pub topics: usize,
    pub max_iterations: usize,
    pub workers: usize,
    /// Amplitude of the uniform noise added to the initial word weights
    pub noise: f32,
    /// Size of the frequency-weighted special topic 0; 0 disables it
    pub special_topic_words: usize,
    pub seed: u64,
    /// Backend of the document-topic table
    pub storage: StoragePolicy,
    /// Directory for the mapped document-topic table
    pub temp_dir: Option<PathBuf>,
    /// Write a text dump of W here after training
    pub text_dump: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            topics: 10,
            max_iterations: 10,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
            noise: 0.5,
            special_topic_words: 0,
            seed: DEFAULT_SEED,
            storage: StoragePolicy::Heap,
            temp_dir: None,
            text_dump: None,
        }
    }
}

impl TrainConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.topics == 0 {
            return Err(PlsaError::invalid_config("topics must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(PlsaError::invalid_config("max_iterations must be positive"));
        }
        if self.workers == 0 {
            return Err(PlsaError::invalid_config("workers must be positive"));
        }
        if !(0.0..1.0).contains(&self.noise) {
            return Err(PlsaError::invalid_config(format!("noise {} outside [0, 1)", self.noise)));
        }
        Ok(())
    }
}

/// Knobs for inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferConfig {
    /// Expected topic count; 0 adopts the model's
    pub topics: usize,
    pub max_iterations: usize,
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            topics: 0,
            max_iterations: 20,
        }
    }
}

impl InferConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(PlsaError::invalid_config("max_iterations must be positive"));
        }
        Ok(())
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_path(path)?;
    serde_json::from_str(&text)
        .map_err(|e| PlsaError::invalid_config(format!("{}: {e}", path.display())))
}
