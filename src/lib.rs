/// This crate is a multithreaded PLSA (probabilistic latent semantic analysis)
/// topic model engine: EM training over a tokenized corpus and per-document
/// topic inference against a trained model.
pub mod config;
pub mod error;
pub mod plsa;
pub mod utils;

/// Vocabulary
/// Ordered token table of a model. Each token's id is its position, and each
/// token carries the corpus frequency it was counted with.
///
/// Ids are stable once assigned and the table is saved inside every model file,
/// so inference always encodes documents against the vocabulary it was trained on.
pub use plsa::vocab::Vocabulary;

/// Corpus
/// Packed word-id documents. `DocumentCorpus` is the read-only view training and
/// inference work against; `Corpus` is its in-memory implementation.
pub use plsa::corpus::{Corpus, DocumentCorpus};

/// PLSA Model
/// The vocabulary plus the word-topic table `W` (`vocabulary x topics`, each
/// column a distribution over words).
///
/// # Serialization
/// Binary model files via `plsa::serde::{save, load}`; a text dump via
/// `plsa::serde::save_text`.
pub use plsa::model::PlsaModel;

/// Training
/// `Trainer` runs EM iterations on a worker pool and checkpoints the model after
/// each one. `WordTopicSource` picks random initialization or resuming from the
/// checkpoint on disk.
pub use plsa::train::{train, Trainer, TrainingReport, WordTopicSource};

/// Inference
/// Fixed-point estimation of a document's topic weights against a frozen model,
/// with optional topic and word feature output.
pub use plsa::inference::{infer, FeatureSinks, Inference, InferenceOutcome, TopicEstimate};

/// Configuration for training and inference, loadable from JSON.
pub use config::{InferConfig, TrainConfig};

pub use error::{PlsaError, Result};

/// Dense row-major table with heap or temp-file-mapped storage.
pub use utils::datastruct::table::{StoragePolicy, Table};

/// Fixed-size worker pool that fans jobs out and folds their results on the
/// calling thread.
pub use utils::dispatch::Dispatcher;
