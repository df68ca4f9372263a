use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::InferConfig;
use crate::error::Result;
use crate::plsa::corpus::{Corpus, DocumentCorpus};
use crate::plsa::expectation::Expectation;
use crate::plsa::features::{
    save_word_features, TopicFeatureWriter, WORD_FEATURE_DOCUMENT_LIMIT,
};
use crate::plsa::model::PlsaModel;
use crate::plsa::{serde, DELTA_THRESHOLD, INFER_TOPIC_THRESHOLD};

/// Topic weights of one document plus the topics still in play.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicEstimate {
    h: Vec<f32>,
    active: Vec<bool>,
}

impl TopicEstimate {
    /// `1/K` everywhere, every topic active
    pub fn uniform(topics: usize) -> Self {
        Self {
            h: vec![1.0 / topics as f32; topics],
            active: vec![true; topics],
        }
    }

    /// Starts from explicit weights with every topic active.
    pub fn from_weights(h: Vec<f32>) -> Self {
        let active = vec![true; h.len()];
        Self { h, active }
    }

    #[inline]
    pub fn topics(&self) -> &[f32] {
        &self.h
    }

    #[inline]
    pub fn is_active(&self, topic: usize) -> bool {
        self.active[topic]
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }
}

#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub estimate: TopicEstimate,
    /// Passes actually run
    pub iterations: usize,
    /// Stopped because no topic moved more than the delta threshold
    pub converged: bool,
    /// Negated log-likelihood accumulated over every pass
    pub neg_log_likelihood: f64,
}

/// Where inference writes its per-document artifacts.
#[derive(Debug, Clone, Default)]
pub struct FeatureSinks {
    /// Appended with one line of topic weights per document
    pub topic_features: Option<PathBuf>,
    /// Base name of the per-document word feature files
    pub word_features: Option<PathBuf>,
}

/// Per-document fixed-point topic estimation against a frozen model.
pub struct Inference<'m> {
    model: &'m PlsaModel,
    max_iterations: usize,
}

impl<'m> Inference<'m> {
    pub fn new(model: &'m PlsaModel, max_iterations: usize) -> Self {
        Self {
            model,
            max_iterations,
        }
    }

    /// Estimates `words`' topics starting from the uniform distribution.
    pub fn estimate(&self, doc: usize, words: &[u32]) -> Result<InferenceOutcome> {
        self.refine(doc, words, TopicEstimate::uniform(self.model.topics()))
    }

    /// Iterates from `start` until the largest per-topic change drops below
    /// the delta threshold or `max_iterations` passes have run.
    ///
    /// A topic pruned along the way stays pruned until this call returns.
    pub fn refine(
        &self,
        doc: usize,
        words: &[u32],
        start: TopicEstimate,
    ) -> Result<InferenceOutcome> {
        let step = Expectation::new(self.model.word_topics(), INFER_TOPIC_THRESHOLD);
        let mut estimate = start;
        let mut outcome = InferenceOutcome {
            estimate: TopicEstimate::uniform(0),
            iterations: 0,
            converged: words.is_empty(),
            neg_log_likelihood: 0.0,
        };

        while !outcome.converged && outcome.iterations < self.max_iterations {
            outcome.iterations += 1;
            let stats = step.pass(doc, words, &mut estimate.h, &mut estimate.active, false)?;
            outcome.neg_log_likelihood -= stats.log_likelihood;
            outcome.converged = stats.max_delta < DELTA_THRESHOLD;
        }
        debug!(doc, iterations = outcome.iterations, converged = outcome.converged, "stopped");

        outcome.estimate = estimate;
        Ok(outcome)
    }

    /// Runs every document of `corpus` in order, writing the requested
    /// feature files. Returns the outcome of each document.
    pub fn run<C: DocumentCorpus>(
        &self,
        corpus: &C,
        sinks: &FeatureSinks,
    ) -> Result<Vec<InferenceOutcome>> {
        let docs = corpus.document_count();
        let mut topic_sink = match &sinks.topic_features {
            Some(path) => Some(TopicFeatureWriter::open(path)?),
            None => None,
        };
        if sinks.word_features.is_some() && docs > WORD_FEATURE_DOCUMENT_LIMIT {
            warn!(
                documents = docs,
                limit = WORD_FEATURE_DOCUMENT_LIMIT,
                "word features are saved for the first documents only"
            );
        }

        info!(documents = docs, "start inference");
        let mut outcomes = Vec::with_capacity(docs);
        for doc in 0..docs {
            let outcome = self.estimate(doc, corpus.words(doc))?;
            if let Some(sink) = topic_sink.as_mut() {
                sink.write(outcome.estimate.topics())?;
            }
            if let Some(base) = &sinks.word_features {
                if doc < WORD_FEATURE_DOCUMENT_LIMIT {
                    save_word_features(self.model, outcome.estimate.topics(), base, doc)?;
                }
            }
            outcomes.push(outcome);
        }
        if let Some(sink) = topic_sink.as_mut() {
            sink.flush()?;
        }
        Ok(outcomes)
    }
}

/// Loads the model at `model_path` and infers topics for `documents`.
pub fn infer<D, T>(
    documents: &[D],
    model_path: &Path,
    config: &InferConfig,
    sinks: &FeatureSinks,
) -> Result<Vec<InferenceOutcome>>
where
    D: AsRef<[T]>,
    T: AsRef<str>,
{
    config.validate()?;
    let model = serde::load(model_path, config.topics)?;
    let corpus = Corpus::encode(documents, model.vocabulary());
    Inference::new(&model, config.max_iterations).run(&corpus, sinks)
}
