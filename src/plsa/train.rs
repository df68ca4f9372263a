use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::TrainConfig;
use crate::error::{PlsaError, Result};
use crate::plsa::accumulator::{Accumulator, DocumentContribution};
use crate::plsa::corpus::{Corpus, DocumentCorpus};
use crate::plsa::expectation::Expectation;
use crate::plsa::model::PlsaModel;
use crate::plsa::vocab::Vocabulary;
use crate::plsa::{serde, TRAIN_TOPIC_THRESHOLD};
use crate::utils::datastruct::table::Table;
use crate::utils::dispatch::Dispatcher;

/// Where the initial word-topic table comes from.
#[derive(Debug, Clone)]
pub enum WordTopicSource {
    /// Random initialization over this vocabulary (sorted by descending
    /// frequency when a special topic is requested).
    Fresh(Vocabulary),
    /// Continue from the model file at the training model path.
    Resume,
}

/// Log-likelihood after each completed iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub log_likelihoods: Vec<f64>,
}

impl TrainingReport {
    pub fn iterations(&self) -> usize {
        self.log_likelihoods.len()
    }

    pub fn final_log_likelihood(&self) -> Option<f64> {
        self.log_likelihoods.last().copied()
    }
}

/// EM driver for PLSA.
///
/// One iteration dispatches an expectation task per document, waits for all
/// of them, folds the pseudo-counts into a fresh `W`, and checkpoints the
/// model. Iterations never overlap.
pub struct Trainer {
    config: TrainConfig,
    dispatcher: Dispatcher,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.workers)?;
        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Builds or loads the starting model.
    pub fn initial_model(&self, source: WordTopicSource, model_path: &Path) -> Result<PlsaModel> {
        match source {
            WordTopicSource::Fresh(vocabulary) => PlsaModel::random(
                vocabulary,
                self.config.topics,
                self.config.noise,
                self.config.special_topic_words,
                self.config.seed,
            ),
            WordTopicSource::Resume => serde::load(model_path, self.config.topics),
        }
    }

    /// Runs `max_iterations` EM iterations over `corpus`, rewriting the
    /// checkpoint at `model_path` after each one.
    pub fn train<C: DocumentCorpus>(
        &self,
        model: &mut PlsaModel,
        corpus: &C,
        model_path: &Path,
    ) -> Result<TrainingReport> {
        let docs = corpus.document_count();
        if docs == 0 {
            return Err(PlsaError::invalid_config("training corpus has no documents"));
        }
        let k = model.topics();
        let words = model.vocabulary().size();

        info!(
            documents = docs,
            topics = k,
            workers = self.dispatcher.workers(),
            storage = ?self.config.storage,
            "allocating document-topic table"
        );
        let mut h = Table::<f32>::with_policy(
            docs,
            k,
            self.config.storage,
            self.config.temp_dir.as_deref(),
        )?;
        h.fill(1.0 / k as f32);
        let mut acc = Accumulator::new(words, k)?;

        let mut report = TrainingReport::default();
        for iteration in 1..=self.config.max_iterations {
            let started = Instant::now();
            acc.reset();
            self.expectation_step(model.word_topics(), corpus, &mut h, &mut acc)?;

            let frozen = acc.normalize_into(model.word_topics_mut());
            if !frozen.is_empty() {
                warn!(
                    iteration,
                    topics = ?frozen,
                    "topics without pseudo-counts keep their previous column"
                );
            }
            model.check_topic_mass((0..k).filter(|t| !frozen.contains(t)))?;

            let ll = acc.log_likelihood();
            report.log_likelihoods.push(ll);
            let elapsed = started.elapsed();
            info!(iteration, log_likelihood = ll, ?elapsed, "iteration done");

            serde::save(model, model_path)?;
        }
        debug!("releasing training tables");
        Ok(report)
    }

    /// E-step over every document; returns after the last task has finished.
    fn expectation_step<C: DocumentCorpus>(
        &self,
        word_topics: &Table<f32>,
        corpus: &C,
        h: &mut Table<f32>,
        acc: &mut Accumulator,
    ) -> Result<()> {
        let step = Expectation::new(word_topics, TRAIN_TOPIC_THRESHOLD);
        let mut failure = None;
        self.dispatcher.run_all(
            h.par_rows_mut().enumerate(),
            |(doc, row)| {
                // a zero weight is a topic pruned in an earlier iteration
                let mut active: Vec<bool> = row.iter().map(|&x| x > 0.0).collect();
                let words = corpus.words(doc);
                step.pass(doc, words, row, &mut active, true).map(|stats| DocumentContribution {
                    doc,
                    log_likelihood: stats.log_likelihood,
                    counts: stats.counts,
                })
            },
            |result| match result {
                Ok(contribution) => acc.absorb(corpus.words(contribution.doc), &contribution),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            },
        );
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Trains a model over tokenized documents and leaves it at `model_path`.
///
/// With `WordTopicSource::Fresh` the documents are encoded against the given
/// vocabulary; with `Resume` against the vocabulary stored in the model.
pub fn train<D, T>(
    documents: &[D],
    source: WordTopicSource,
    model_path: &Path,
    config: TrainConfig,
) -> Result<TrainingReport>
where
    D: AsRef<[T]>,
    T: AsRef<str>,
{
    let trainer = Trainer::new(config)?;
    let mut model = trainer.initial_model(source, model_path)?;
    let corpus = Corpus::encode(documents, model.vocabulary());
    let report = trainer.train(&mut model, &corpus, model_path)?;
    if let Some(dump) = &trainer.config().text_dump {
        serde::save_text(&model, dump)?;
    }
    Ok(report)
}
