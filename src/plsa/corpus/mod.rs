use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{IoContext, Result};
use crate::plsa::vocab::Vocabulary;

/// Read-only view over a tokenized corpus.
///
/// Implementors are shared by reference across worker threads.
pub trait DocumentCorpus: Sync {
    fn document_count(&self) -> usize;

    /// Word ids of document `doc`, in position order
    fn words(&self, doc: usize) -> &[u32];

    #[inline]
    fn document_length(&self, doc: usize) -> usize {
        self.words(doc).len()
    }

    #[inline]
    fn word_at(&self, doc: usize, pos: usize) -> u32 {
        self.words(doc)[pos]
    }
}

/// Documents packed back to back as word ids
///
/// `offsets[d]..offsets[d + 1]` is document `d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    words: Vec<u32>,
    offsets: Vec<usize>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            offsets: vec![0],
        }
    }

    pub fn push_document(&mut self, words: &[u32]) {
        self.words.extend_from_slice(words);
        self.offsets.push(self.words.len());
    }

    pub fn from_documents<D: AsRef<[u32]>>(documents: impl IntoIterator<Item = D>) -> Self {
        let mut corpus = Self::new();
        for doc in documents {
            corpus.push_document(doc.as_ref());
        }
        corpus
    }

    /// Encodes tokenized documents against `vocab`.
    ///
    /// Tokens missing from the vocabulary have no word-topic row and are
    /// dropped; the number dropped is logged once.
    pub fn encode<D, T>(documents: impl IntoIterator<Item = D>, vocab: &Vocabulary) -> Self
    where
        D: AsRef<[T]>,
        T: AsRef<str>,
    {
        let mut corpus = Self::new();
        let mut dropped = 0usize;
        let mut ids = Vec::new();
        for doc in documents {
            ids.clear();
            for token in doc.as_ref() {
                match vocab.encode(token.as_ref()) {
                    Some(id) => ids.push(id),
                    None => dropped += 1,
                }
            }
            corpus.push_document(&ids);
        }
        if dropped > 0 {
            warn!(dropped, "tokens outside the vocabulary were skipped");
        }
        corpus
    }

    /// Total number of word positions
    pub fn token_count(&self) -> usize {
        self.words.len()
    }
}

impl DocumentCorpus for Corpus {
    #[inline]
    fn document_count(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    fn words(&self, doc: usize) -> &[u32] {
        &self.words[self.offsets[doc]..self.offsets[doc + 1]]
    }
}

/// Reads one document per line, tokens separated by whitespace.
/// Blank lines are kept as empty documents so line numbers stay document ids.
pub fn read_documents<R: BufRead>(reader: R) -> std::io::Result<Vec<Vec<String>>> {
    reader
        .lines()
        .map(|line| line.map(|l| l.split_whitespace().map(str::to_string).collect()))
        .collect()
}

pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let file = File::open(path).with_path(path)?;
    let docs = read_documents(BufReader::new(file)).with_path(path)?;
    info!(path = %path.display(), documents = docs.len(), "loaded tokenized documents");
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_documents_keep_boundaries() {
        let corpus = Corpus::from_documents([vec![1u32, 2, 3], vec![], vec![4]]);
        assert_eq!(corpus.document_count(), 3);
        assert_eq!(corpus.words(0), &[1, 2, 3]);
        assert_eq!(corpus.document_length(1), 0);
        assert_eq!(corpus.word_at(2, 0), 4);
        assert_eq!(corpus.token_count(), 4);
    }

    #[test]
    fn unknown_tokens_are_dropped() {
        let vocab = Vocabulary::from_documents([vec!["a", "b"]]);
        let corpus = Corpus::encode([vec!["a", "zzz", "b", "a"]], &vocab);
        let a = vocab.encode("a").unwrap();
        let b = vocab.encode("b").unwrap();
        assert_eq!(corpus.words(0), &[a, b, a]);
    }

    #[test]
    fn reader_splits_lines_and_whitespace() {
        let text = "the cat  sat\n\n\tdog barks \n";
        let docs = read_documents(text.as_bytes()).unwrap();
        assert_eq!(docs, vec![vec!["the", "cat", "sat"], vec![], vec!["dog", "barks"]]);
    }

    #[test]
    fn empty_corpus_has_no_documents() {
        assert_eq!(Corpus::new().document_count(), 0);
    }
}
