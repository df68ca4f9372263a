//! Model file codec.
//!
//! Binary layout:
//! ```text
//! PLSA <topics>\n                      ASCII header
//! <u64 length><CBOR vocabulary>        see `Vocabulary::save`
//! <topics x f32> per vocabulary entry  row-major, native byte order
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::mem;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{IoContext, PlsaError, Result};
use crate::plsa::model::PlsaModel;
use crate::plsa::vocab::Vocabulary;
use crate::utils::datastruct::table::Table;

const MAGIC: &str = "PLSA";
const MAX_HEADER_LEN: u64 = 100;

/// Writes `model` to `out` in the binary layout.
pub fn write_model<W: Write>(model: &PlsaModel, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{} {}", MAGIC, model.topics())?;
    model.vocabulary().save(out)?;
    for row in model.word_topics().iter_rows() {
        for v in row {
            out.write_all(&v.to_ne_bytes())?;
        }
    }
    Ok(())
}

/// Reads a model from `inp`.
///
/// `requested_topics == 0` adopts whatever the header says; any other value
/// must match it.
pub fn read_model<R: BufRead>(inp: &mut R, requested_topics: usize) -> Result<PlsaModel> {
    let topics = read_header(inp)?;
    if requested_topics > 0 && requested_topics != topics {
        return Err(PlsaError::TopicMismatch {
            requested: requested_topics,
            found: topics,
        });
    }

    let vocabulary = Vocabulary::load(inp)?;
    let mut w = Table::<f32>::new(vocabulary.size(), topics)?;
    let mut buf = vec![0u8; topics * mem::size_of::<f32>()];
    for i in 0..vocabulary.size() {
        inp.read_exact(&mut buf)
            .map_err(|e| PlsaError::MalformedModel(format!("word-topic row {i}: {e}")))?;
        for (dst, src) in w.row_mut(i).iter_mut().zip(buf.chunks_exact(mem::size_of::<f32>())) {
            *dst = f32::from_ne_bytes([src[0], src[1], src[2], src[3]]);
        }
    }
    PlsaModel::new(vocabulary, w)
}

fn read_header<R: BufRead>(inp: &mut R) -> Result<usize> {
    let mut line = String::new();
    inp.by_ref()
        .take(MAX_HEADER_LEN)
        .read_line(&mut line)
        .map_err(|e| PlsaError::MalformedModel(format!("unreadable header: {e}")))?;
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next().map(str::parse::<usize>), fields.next()) {
        (Some(MAGIC), Some(Ok(topics)), None) if topics > 0 => Ok(topics),
        _ => Err(PlsaError::MalformedModel(format!("bad header {:?}", line.trim_end()))),
    }
}

/// Saves `model` at `path`, replacing any previous file atomically.
///
/// The model is written to a temp file next to `path`, synced, then renamed,
/// so a crash leaves either the old checkpoint or the new one.
pub fn save(model: &PlsaModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!(path = %path.display(), "saving model");
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).with_path(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file());
        write_model(model, &mut out).with_path(tmp.path())?;
        out.flush().with_path(tmp.path())?;
    }
    tmp.as_file().sync_all().with_path(tmp.path())?;
    tmp.persist(path).map_err(|e| PlsaError::io(path, e.error))?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>, requested_topics: usize) -> Result<PlsaModel> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading model");
    let file = File::open(path).with_path(path)?;
    let model = read_model(&mut BufReader::new(file), requested_topics)?;
    info!(words = model.vocabulary().size(), topics = model.topics(), "model loaded");
    Ok(model)
}

/// Plain-text dump for inspection: `<token> <w_0> ... <w_K-1>` per line.
pub fn write_text<W: Write>(model: &PlsaModel, out: &mut W) -> std::io::Result<()> {
    for ((token, _), row) in model.vocabulary().iter().zip(model.word_topics().iter_rows()) {
        write!(out, "{token}")?;
        for v in row {
            write!(out, " {v}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn save_text(model: &PlsaModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!(path = %path.display(), "writing text word-topic table");
    let file = File::create(path).with_path(path)?;
    let mut out = BufWriter::new(file);
    write_text(model, &mut out).with_path(path)?;
    out.flush().with_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> PlsaModel {
        let vocab = Vocabulary::from_documents([vec!["red", "green", "blue", "red"]]);
        PlsaModel::random(vocab, 4, 0.9, 1, 11).unwrap()
    }

    #[test]
    fn save_load_reproduces_table_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.plsa");
        let model = sample_model();
        save(&model, &path).unwrap();

        let back = load(&path, 4).unwrap();
        assert_eq!(back.vocabulary(), model.vocabulary());
        let a: Vec<u32> = model.word_topics().as_slice().iter().map(|v| v.to_bits()).collect();
        let b: Vec<u32> = back.word_topics().as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a, b);

        // zero adopts the header
        assert_eq!(load(&path, 0).unwrap().topics(), 4);
    }

    #[test]
    fn topic_count_must_match_header() {
        let mut buf = Vec::new();
        write_model(&sample_model(), &mut buf).unwrap();
        let err = read_model(&mut buf.as_slice(), 3).unwrap_err();
        assert!(matches!(err, PlsaError::TopicMismatch { requested: 3, found: 4 }));
    }

    #[test]
    fn header_is_ascii_and_first() {
        let mut buf = Vec::new();
        write_model(&sample_model(), &mut buf).unwrap();
        assert!(buf.starts_with(b"PLSA 4\n"));
    }

    #[test]
    fn garbage_and_truncation_are_malformed() {
        let err = read_model(&mut &b"LDA 3\n"[..], 0).unwrap_err();
        assert!(matches!(err, PlsaError::MalformedModel(_)));

        let mut buf = Vec::new();
        write_model(&sample_model(), &mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        let err = read_model(&mut buf.as_slice(), 0).unwrap_err();
        assert!(matches!(err, PlsaError::MalformedModel(_)));
    }

    #[test]
    fn checkpoint_overwrite_leaves_no_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.plsa");
        let model = sample_model();
        save(&model, &path).unwrap();
        save(&model, &path).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn text_dump_has_one_line_per_word() {
        let model = sample_model();
        let mut buf = Vec::new();
        write_text(&model, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("red "));
        assert_eq!(lines[0].split(' ').count(), 5);
    }
}
