use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IoContext, Result};
use crate::plsa::model::PlsaModel;

/// Only this many leading documents get a word-feature file.
pub const WORD_FEATURE_DOCUMENT_LIMIT: usize = 100;

/// Word scores are scaled to integers in `[0, WORD_FEATURE_SCALE]`.
pub const WORD_FEATURE_SCALE: f64 = 1_000_000.0;

/// Relevance of every vocabulary entry to a document with topic weights `h`.
///
/// `WH[i] = sum_t W[i][t] * h[t]`, scaled so the best word scores
/// `WORD_FEATURE_SCALE`. Entries that round to zero are left out; the rest come
/// back in vocabulary order.
pub fn word_scores<'m>(model: &'m PlsaModel, h: &[f32]) -> Vec<(&'m str, u32)> {
    let wh: Vec<f64> = model
        .word_topics()
        .iter_rows()
        .map(|row| row.iter().zip(h).map(|(&w, &ht)| w as f64 * ht as f64).sum())
        .collect();
    let max = wh.iter().copied().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }
    model
        .vocabulary()
        .iter()
        .zip(wh)
        .filter_map(|((token, _), v)| {
            let scaled = (v / max * WORD_FEATURE_SCALE).round() as u32;
            (scaled != 0).then_some((token, scaled))
        })
        .collect()
}

/// `<base>.<NNN>` with the 1-based document number.
pub fn word_feature_path(base: &Path, doc: usize) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{:03}", doc + 1));
    PathBuf::from(name)
}

/// Writes `<token>\t<score>` lines for one document; returns the line count.
pub fn write_word_features<W: Write>(
    model: &PlsaModel,
    h: &[f32],
    out: &mut W,
) -> std::io::Result<usize> {
    let scores = word_scores(model, h);
    for (token, score) in &scores {
        writeln!(out, "{token}\t{score}")?;
    }
    Ok(scores.len())
}

pub fn save_word_features(
    model: &PlsaModel,
    h: &[f32],
    base: &Path,
    doc: usize,
) -> Result<PathBuf> {
    let path = word_feature_path(base, doc);
    let file = File::create(&path).with_path(&path)?;
    let mut out = BufWriter::new(file);
    let lines = write_word_features(model, h, &mut out).with_path(&path)?;
    out.flush().with_path(&path)?;
    debug!(path = %path.display(), lines, "saved word features");
    Ok(path)
}

/// Append-only sink of per-document topic weights, one line per document.
pub struct TopicFeatureWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl TopicFeatureWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).with_path(&path)?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, h: &[f32]) -> Result<()> {
        let line = h.iter().map(f32::to_string).collect::<Vec<_>>().join(" ");
        writeln!(self.out, "{line}").with_path(&self.path)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().with_path(&self.path)
    }
}
