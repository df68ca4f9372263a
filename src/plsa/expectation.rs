use crate::error::{PlsaError, Result};
use crate::plsa::within_tolerance;
use crate::utils::datastruct::table::Table;

/// Outcome of one expectation pass over a document.
#[derive(Debug, Clone, Default)]
pub struct PassStats {
    /// `sum_i ln(WH[i])` over the document's positions
    pub log_likelihood: f64,
    /// Largest `|H_new[t] - H_old[t]|` over active topics
    pub max_delta: f32,
    /// Per-position pseudo-counts, `[length x topics]` row-major.
    /// Empty unless requested.
    pub counts: Vec<f64>,
}

/// Fixed-point update of one document's topic weights against a frozen `W`.
///
/// Training and inference share this step; they differ in the pruning
/// threshold and in whether pseudo-counts are collected.
#[derive(Debug, Clone, Copy)]
pub struct Expectation<'a> {
    word_topics: &'a Table<f32>,
    threshold: f32,
}

impl<'a> Expectation<'a> {
    pub fn new(word_topics: &'a Table<f32>, threshold: f32) -> Self {
        Self {
            word_topics,
            threshold,
        }
    }

    #[inline]
    pub fn topics(&self) -> usize {
        self.word_topics.cols()
    }

    /// Deactivates every active topic whose weight is below the threshold.
    /// Inactive topics are never revived.
    pub fn prune(&self, h: &mut [f32], active: &mut [bool]) {
        for (ht, on) in h.iter_mut().zip(active.iter_mut()) {
            if *on && *ht < self.threshold {
                *on = false;
                *ht = 0.0;
            }
        }
    }

    /// Prunes, then replaces `h` with its re-estimate from `words`.
    ///
    /// An empty document leaves `h` untouched. Fails with a model-integrity
    /// error if the new weights do not sum to 1.
    pub fn pass(
        &self,
        doc: usize,
        words: &[u32],
        h: &mut [f32],
        active: &mut [bool],
        collect_counts: bool,
    ) -> Result<PassStats> {
        let k = self.topics();
        debug_assert_eq!(h.len(), k);
        debug_assert_eq!(active.len(), k);
        let mut stats = PassStats::default();
        if words.is_empty() {
            return Ok(stats);
        }

        self.prune(h, active);

        let wh: Vec<f64> = words
            .iter()
            .map(|&w| {
                let row = self.word_topics.row(w as usize);
                (0..k)
                    .filter(|&t| active[t])
                    .map(|t| row[t] as f64 * h[t] as f64)
                    .sum()
            })
            .collect();
        stats.log_likelihood = wh.iter().map(|v| v.ln()).sum();

        if collect_counts {
            stats.counts = vec![0.0; words.len() * k];
        }
        let n = words.len() as f64;
        let mut total = 0.0f64;
        for t in (0..k).filter(|&t| active[t]) {
            let ht = h[t] as f64;
            let mut mass = 0.0f64;
            for (i, &w) in words.iter().enumerate() {
                let share = self.word_topics.get(w as usize, t) as f64 * ht / wh[i];
                if collect_counts {
                    stats.counts[i * k + t] = share;
                }
                mass += share;
            }
            let updated = (mass / n) as f32;
            stats.max_delta = stats.max_delta.max((h[t] - updated).abs());
            h[t] = updated;
            total += updated as f64;
        }

        if !within_tolerance(total) {
            return Err(PlsaError::integrity(format!("document {doc}"), total));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // two topics, three words; topic 0 prefers word 0, topic 1 word 2
    fn table() -> Table<f32> {
        Table::from_vec(3, 2, vec![0.7, 0.1, 0.2, 0.2, 0.1, 0.7]).unwrap()
    }

    #[test]
    fn update_keeps_weights_normalized() {
        let w = table();
        let step = Expectation::new(&w, 1e-4);
        let mut h = vec![0.5, 0.5];
        let mut active = vec![true, true];
        let stats = step.pass(0, &[0, 0, 1, 2], &mut h, &mut active, true).unwrap();
        assert!((h[0] + h[1] - 1.0).abs() < 1e-6);
        assert!(h[0] > 0.5);
        assert!(stats.max_delta > 0.0);
        assert!(stats.log_likelihood < 0.0);
        // pseudo-counts of each position sum to one across topics
        for i in 0..4 {
            let s: f64 = stats.counts[i * 2..i * 2 + 2].iter().sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn known_values_for_single_word() {
        let w = table();
        let step = Expectation::new(&w, 1e-4);
        let mut h = vec![0.5, 0.5];
        let mut active = vec![true, true];
        let stats = step.pass(0, &[0], &mut h, &mut active, false).unwrap();
        // WH = 0.35 + 0.05 = 0.4
        assert!((stats.log_likelihood - 0.4f64.ln()).abs() < 1e-6);
        assert!((h[0] - 0.875).abs() < 1e-6);
        assert!((h[1] - 0.125).abs() < 1e-6);
        assert!(stats.counts.is_empty());
    }

    #[test]
    fn pruned_topic_is_excluded_and_stays_zero() {
        let w = table();
        let step = Expectation::new(&w, 1e-2);
        let mut h = vec![0.005, 0.995];
        let mut active = vec![true, true];
        step.pass(0, &[0, 0, 0], &mut h, &mut active, false).unwrap();
        assert!(!active[0]);
        assert_eq!(h, vec![0.0, 1.0]);
    }

    #[test]
    fn broken_mass_is_an_integrity_error() {
        // a word with no mass under any topic gives WH = 0
        let w = Table::from_vec(2, 2, vec![1.0, 1.0, 0.0, 0.0]).unwrap();
        let step = Expectation::new(&w, 1e-4);
        let mut h = vec![0.5, 0.5];
        let mut active = vec![true, true];
        let err = step.pass(9, &[0, 1], &mut h, &mut active, false).unwrap_err();
        match err {
            PlsaError::ModelIntegrity { what, .. } => assert_eq!(what, "document 9"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_document_is_a_no_op() {
        let w = table();
        let step = Expectation::new(&w, 1e-4);
        let mut h = vec![0.5, 0.5];
        let mut active = vec![true, true];
        let stats = step.pass(0, &[], &mut h, &mut active, true).unwrap();
        assert_eq!(h, vec![0.5, 0.5]);
        assert_eq!(stats.log_likelihood, 0.0);
    }
}
