use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::{PlsaError, Result};
use crate::plsa::vocab::Vocabulary;
use crate::plsa::within_tolerance;
use crate::utils::datastruct::table::Table;

/// Word-topic model: a vocabulary and its `[vocabulary x topics]` table `W`.
///
/// Column `t` of `W` is `P(word | topic t)`.
#[derive(Debug)]
pub struct PlsaModel {
    vocabulary: Vocabulary,
    word_topics: Table<f32>,
}

impl PlsaModel {
    pub fn new(vocabulary: Vocabulary, word_topics: Table<f32>) -> Result<Self> {
        if word_topics.rows() != vocabulary.size() {
            return Err(PlsaError::MalformedModel(format!(
                "{} word-topic rows for {} vocabulary entries",
                word_topics.rows(),
                vocabulary.size()
            )));
        }
        if word_topics.cols() == 0 {
            return Err(PlsaError::invalid_config("topic count must be positive"));
        }
        Ok(Self {
            vocabulary,
            word_topics,
        })
    }

    /// Fresh model with noise-perturbed uniform columns.
    ///
    /// With `special_words > 0`, topic 0 covers only the `special_words` first
    /// (most frequent) entries, weighted by corpus frequency, and the other
    /// topics cover the rest. The vocabulary must already be sorted by
    /// descending frequency; this is not checked.
    pub fn random(
        vocabulary: Vocabulary,
        topics: usize,
        noise: f32,
        special_words: usize,
        seed: u64,
    ) -> Result<Self> {
        if topics == 0 {
            return Err(PlsaError::invalid_config("topic count must be positive"));
        }
        let size = vocabulary.size();
        info!(words = size, topics, "initializing word-topic table");
        let mut w = Table::<f32>::new(size, topics)?;
        let mut rng = StdRng::seed_from_u64(seed);

        let special = special_words.min(size);
        if special > 0 {
            let total: f64 = (0..special).map(|i| vocabulary.freq(i as u32) as f64).sum();
            for i in 0..special {
                let mass = if total > 0.0 {
                    vocabulary.freq(i as u32) as f64 / total
                } else {
                    1.0 / special as f64
                };
                w.set(i, 0, mass as f32);
            }
        }

        let first_common = if special_words > 0 { 1 } else { 0 };
        for t in first_common..topics {
            let mut total = 0.0f64;
            for i in special..size {
                let v = 1.0 + noise * rng.gen_range(-1.0f32..=1.0);
                w.set(i, t, v);
                total += v as f64;
            }
            if total > 0.0 {
                for i in special..size {
                    w.set(i, t, (w.get(i, t) as f64 / total) as f32);
                }
            } else {
                debug!(topic = t, "topic has no words outside the special set");
            }
        }

        Self::new(vocabulary, w)
    }

    #[inline]
    pub fn topics(&self) -> usize {
        self.word_topics.cols()
    }

    #[inline]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    #[inline]
    pub fn word_topics(&self) -> &Table<f32> {
        &self.word_topics
    }

    #[inline]
    pub fn word_topics_mut(&mut self) -> &mut Table<f32> {
        &mut self.word_topics
    }

    /// Fails unless every column of `W` in `topics` sums to 1 within tolerance.
    pub fn check_topic_mass(&self, topics: impl IntoIterator<Item = usize>) -> Result<()> {
        for t in topics {
            let mass = self.word_topics.column_sum(t);
            if !within_tolerance(mass) {
                return Err(PlsaError::integrity(format!("topic {t}"), mass));
            }
        }
        Ok(())
    }
}
