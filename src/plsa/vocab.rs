use std::io::{self, Read, Write};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{PlsaError, Result};

/// Token <-> id mapping with corpus frequencies.
///
/// Ids are insertion positions, so iteration order is id order.
/// `from_documents` sorts by descending frequency, which the special topic
/// initialization relies on.
///
/// # Examples
/// ```
/// use plsa_topics::Vocabulary;
/// let vocab = Vocabulary::from_documents([["b", "a", "b"].as_slice(), ["b", "c"].as_slice()]);
/// assert_eq!(vocab.decode(0), Some("b"));
/// assert_eq!(vocab.freq(0), 3);
/// assert_eq!(vocab.encode("c"), Some(2));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    #[serde(with = "indexmap::map::serde_seq")]
    entries: IndexMap<Box<str>, u64>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Builds a frequency-sorted vocabulary from tokenized documents.
    /// Ties keep first-occurrence order.
    pub fn from_documents<D, T>(documents: impl IntoIterator<Item = D>) -> Self
    where
        D: AsRef<[T]>,
        T: AsRef<str>,
    {
        let mut vocab = Self::new();
        for doc in documents {
            for token in doc.as_ref() {
                vocab.add(token.as_ref());
            }
        }
        vocab.sort_by_frequency();
        vocab
    }

    /// Counts one occurrence of `token`, inserting it if new. Returns its id.
    #[inline]
    pub fn add(&mut self, token: &str) -> u32 {
        let entry = self.entries.entry(token.into());
        let id = entry.index();
        *entry.or_insert(0) += 1;
        id as u32
    }

    /// Inserts `token` with an explicit frequency, replacing any previous count.
    pub fn insert(&mut self, token: &str, freq: u64) -> u32 {
        let (id, _) = self.entries.insert_full(token.into(), freq);
        id as u32
    }

    /// Stable sort by descending frequency; ids change.
    pub fn sort_by_frequency(&mut self) {
        self.entries.sort_by(|_, a, _, b| b.cmp(a));
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn encode(&self, token: &str) -> Option<u32> {
        self.entries.get_index_of(token).map(|i| i as u32)
    }

    #[inline]
    pub fn decode(&self, id: u32) -> Option<&str> {
        self.entries.get_index(id as usize).map(|(t, _)| &**t)
    }

    #[inline]
    pub fn freq(&self, id: u32) -> u64 {
        self.entries.get_index(id as usize).map_or(0, |(_, &f)| f)
    }

    /// `(token, frequency)` in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(t, &f)| (&**t, f))
    }

    /// Writes a length-prefixed CBOR dump.
    ///
    /// The prefix (u64, native byte order) lets the dump sit in the middle of
    /// a larger binary stream.
    pub fn save<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let bytes = serde_cbor::to_vec(self).map_err(io::Error::other)?;
        out.write_all(&(bytes.len() as u64).to_ne_bytes())?;
        out.write_all(&bytes)
    }

    /// Reads exactly what `save` wrote, leaving the stream just past it.
    pub fn load<R: Read>(inp: &mut R) -> Result<Self> {
        let mut len = [0u8; 8];
        inp.read_exact(&mut len)
            .map_err(|e| PlsaError::MalformedModel(format!("missing vocabulary length: {e}")))?;
        let len = u64::from_ne_bytes(len) as usize;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| PlsaError::Allocation {
            what: "vocabulary",
            requested: len,
        })?;
        inp.by_ref()
            .take(len as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| PlsaError::MalformedModel(format!("cannot read vocabulary: {e}")))?;
        if bytes.len() != len {
            return Err(PlsaError::MalformedModel(format!(
                "truncated vocabulary: expected {len} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(serde_cbor::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_sort_keeps_first_occurrence_on_ties() {
        let vocab = Vocabulary::from_documents([vec!["x", "y", "z", "y"], vec!["z", "w"]]);
        let order: Vec<_> = vocab.iter().collect();
        assert_eq!(order, vec![("y", 2), ("z", 2), ("x", 1), ("w", 1)]);
    }

    #[test]
    fn encode_decode_agree() {
        let mut vocab = Vocabulary::new();
        assert_eq!(vocab.add("alpha"), 0);
        assert_eq!(vocab.add("beta"), 1);
        assert_eq!(vocab.add("alpha"), 0);
        assert_eq!(vocab.insert("gamma", 9), 2);
        assert_eq!(vocab.freq(0), 2);
        assert_eq!(vocab.freq(2), 9);
        assert_eq!(vocab.encode("beta"), Some(1));
        assert_eq!(vocab.decode(1), Some("beta"));
        assert_eq!(vocab.encode("delta"), None);
        assert_eq!(vocab.decode(7), None);
        assert_eq!(vocab.freq(7), 0);
    }

    #[test]
    fn dump_is_self_delimiting() {
        let vocab = Vocabulary::from_documents([vec!["a", "b", "a"]]);
        let mut buf = Vec::new();
        vocab.save(&mut buf).unwrap();
        buf.extend_from_slice(b"trailing");

        let mut cursor = std::io::Cursor::new(buf);
        let back = Vocabulary::load(&mut cursor).unwrap();
        assert_eq!(back, vocab);
        let mut rest = String::new();
        cursor.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "trailing");
    }

    #[test]
    fn truncated_dump_is_rejected() {
        let vocab = Vocabulary::from_documents([vec!["a", "b"]]);
        let mut buf = Vec::new();
        vocab.save(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        let err = Vocabulary::load(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, PlsaError::MalformedModel(_)));
    }
}
