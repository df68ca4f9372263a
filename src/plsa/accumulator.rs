use crate::error::Result;
use crate::utils::datastruct::table::Table;

/// What one document's expectation task hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct DocumentContribution {
    pub doc: usize,
    pub log_likelihood: f64,
    /// `[document length x topics]` pseudo-counts, one row per position
    pub counts: Vec<f64>,
}

/// Iteration-wide pseudo-count table `T` plus the log-likelihood total.
///
/// Owned by the orchestrating thread; workers never touch it. Contributions
/// arrive one at a time through the dispatcher's result channel, so folding
/// needs no lock.
#[derive(Debug)]
pub struct Accumulator {
    counts: Table<f64>,
    log_likelihood: f64,
}

impl Accumulator {
    pub fn new(words: usize, topics: usize) -> Result<Self> {
        Ok(Self {
            counts: Table::new(words, topics)?,
            log_likelihood: 0.0,
        })
    }

    pub fn reset(&mut self) {
        self.counts.fill(0.0);
        self.log_likelihood = 0.0;
    }

    /// Adds a document's pseudo-counts; `words` are that document's word ids.
    pub fn absorb(&mut self, words: &[u32], contribution: &DocumentContribution) {
        let k = self.counts.cols();
        debug_assert_eq!(contribution.counts.len(), words.len() * k);
        for (&w, local) in words.iter().zip(contribution.counts.chunks_exact(k)) {
            for (acc, &c) in self.counts.row_mut(w as usize).iter_mut().zip(local) {
                *acc += c;
            }
        }
        self.log_likelihood += contribution.log_likelihood;
    }

    #[inline]
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    #[inline]
    pub fn counts(&self) -> &Table<f64> {
        &self.counts
    }

    /// M-step: `W[i][t] = T[i][t] / sum_i T[i][t]`.
    ///
    /// A topic with no accumulated mass keeps its old column. Returns the
    /// topics left frozen that way.
    pub fn normalize_into(&self, word_topics: &mut Table<f32>) -> Vec<usize> {
        let k = self.counts.cols();
        debug_assert_eq!(word_topics.cols(), k);
        let mut sums = vec![0.0f64; k];
        for row in self.counts.iter_rows() {
            for (s, &c) in sums.iter_mut().zip(row) {
                *s += c;
            }
        }
        let frozen: Vec<usize> = (0..k)
            .filter(|&t| !(sums[t] > 0.0 && sums[t].is_finite()))
            .collect();

        for (i, row) in word_topics.as_mut_slice().chunks_exact_mut(k).enumerate() {
            let acc = self.counts.row(i);
            for t in 0..k {
                if sums[t] > 0.0 && sums[t].is_finite() {
                    row[t] = (acc[t] / sums[t]) as f32;
                }
            }
        }
        frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributions_land_on_their_words() {
        let mut acc = Accumulator::new(3, 2).unwrap();
        acc.absorb(
            &[2, 0, 2],
            &DocumentContribution {
                doc: 0,
                log_likelihood: -1.5,
                counts: vec![0.25, 0.75, 1.0, 0.0, 0.5, 0.5],
            },
        );
        acc.absorb(
            &[1],
            &DocumentContribution {
                doc: 1,
                log_likelihood: -0.5,
                counts: vec![0.1, 0.9],
            },
        );
        assert_eq!(acc.counts().row(0), &[1.0, 0.0]);
        assert_eq!(acc.counts().row(1), &[0.1, 0.9]);
        assert_eq!(acc.counts().row(2), &[0.75, 1.25]);
        assert_eq!(acc.log_likelihood(), -2.0);

        acc.reset();
        assert!(acc.counts().as_slice().iter().all(|&c| c == 0.0));
        assert_eq!(acc.log_likelihood(), 0.0);
    }

    #[test]
    fn m_step_normalizes_columns() {
        let mut acc = Accumulator::new(2, 2).unwrap();
        acc.absorb(
            &[0, 1],
            &DocumentContribution {
                doc: 0,
                log_likelihood: 0.0,
                counts: vec![3.0, 1.0, 1.0, 3.0],
            },
        );
        let mut w = Table::<f32>::new(2, 2).unwrap();
        let frozen = acc.normalize_into(&mut w);
        assert!(frozen.is_empty());
        assert_eq!(w.row(0), &[0.75, 0.25]);
        assert_eq!(w.row(1), &[0.25, 0.75]);
    }

    #[test]
    fn empty_topic_keeps_its_column() {
        let mut acc = Accumulator::new(2, 2).unwrap();
        acc.absorb(
            &[0],
            &DocumentContribution {
                doc: 0,
                log_likelihood: 0.0,
                counts: vec![2.0, 0.0],
            },
        );
        let mut w = Table::from_vec(2, 2, vec![0.5, 0.4, 0.5, 0.6]).unwrap();
        let frozen = acc.normalize_into(&mut w);
        assert_eq!(frozen, vec![1]);
        assert_eq!(w.row(0), &[1.0, 0.4]);
        assert_eq!(w.row(1), &[0.0, 0.6]);
        assert!(w.as_slice().iter().all(|v| v.is_finite()));
    }
}
