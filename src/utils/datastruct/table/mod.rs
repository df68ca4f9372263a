pub mod mapped;

use std::fmt::{self, Debug};
use std::path::Path;

use num::Num;
use rayon::prelude::*;
use rayon::slice::ChunksMut as ParChunksMut;
use serde::{Deserialize, Serialize};

use crate::error::{PlsaError, Result};
use self::mapped::MappedBuffer;

/// Plain numeric element storable in a `Table`.
///
/// # Safety
/// Every bit pattern, including all zero bytes, must be a valid value.
/// The mapped backend reinterprets raw file pages as `[Self]`.
pub unsafe trait Element: Num + Copy + Send + Sync + Into<f64> + 'static {}

unsafe impl Element for f32 {}
unsafe impl Element for f64 {}

/// Where a table keeps its buffer.
/// Chosen once at construction, never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePolicy {
    #[default]
    Heap,
    /// Private read/write mapping of a unique temp file, deleted on release.
    Mapped,
}

enum Storage<N: Element> {
    Heap(Vec<N>),
    Mapped(MappedBuffer<N>),
}

/// Dense row-major `rows x cols` table
///
/// Callers address rows and elements the same way whatever the backend is.
pub struct Table<N: Element> {
    rows: usize,
    cols: usize,
    storage: Storage<N>,
}

impl<N: Element> Table<N> {
    /// Zeroed heap table
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::with_policy(rows, cols, StoragePolicy::Heap, None)
    }

    /// Zeroed table on the requested backend.
    ///
    /// `dir` is the directory for the mapped backend's temp file and defaults to
    /// the system temp directory. An empty table always lives on the heap since
    /// a zero length mapping is not portable.
    pub fn with_policy(
        rows: usize,
        cols: usize,
        policy: StoragePolicy,
        dir: Option<&Path>,
    ) -> Result<Self> {
        let len = rows.checked_mul(cols).ok_or(PlsaError::Allocation {
            what: "table",
            requested: usize::MAX,
        })?;
        let storage = match policy {
            StoragePolicy::Mapped if len > 0 => {
                let dir = dir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
                Storage::Mapped(MappedBuffer::create(len, &dir)?)
            }
            _ => Storage::Heap(heap_zeroed(len)?),
        };
        Ok(Self { rows, cols, storage })
    }

    /// Heap table from a row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<N>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(PlsaError::Allocation {
                what: "table from mis-sized buffer",
                requested: data.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            storage: Storage::Heap(data),
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }

    #[inline]
    pub fn as_slice(&self) -> &[N] {
        match &self.storage {
            Storage::Heap(v) => v,
            Storage::Mapped(m) => m.as_slice(),
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [N] {
        match &mut self.storage {
            Storage::Heap(v) => v,
            Storage::Mapped(m) => m.as_mut_slice(),
        }
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[N] {
        let c = self.cols;
        &self.as_slice()[r * c..(r + 1) * c]
    }

    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [N] {
        let c = self.cols;
        &mut self.as_mut_slice()[r * c..(r + 1) * c]
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> N {
        self.as_slice()[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: N) {
        let cols = self.cols;
        self.as_mut_slice()[r * cols + c] = value;
    }

    pub fn fill(&mut self, value: N) {
        self.as_mut_slice().fill(value);
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[N]> + '_ {
        // chunks_exact(0) panics; a zero-column table is empty anyway
        self.as_slice().chunks_exact(self.cols.max(1))
    }

    /// Disjoint mutable rows for parallel owners.
    pub fn par_rows_mut(&mut self) -> ParChunksMut<'_, N> {
        let cols = self.cols.max(1);
        self.as_mut_slice().par_chunks_mut(cols)
    }

    /// Sum of column `c`, accumulated in f64
    pub fn column_sum(&self, c: usize) -> f64 {
        self.iter_rows().map(|row| row[c].into()).sum()
    }
}

impl<N: Element> Debug for Table<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

fn heap_zeroed<N: Element>(len: usize) -> Result<Vec<N>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| PlsaError::Allocation {
        what: "heap table",
        requested: len,
    })?;
    buf.resize(len, N::zero());
    Ok(buf)
}
