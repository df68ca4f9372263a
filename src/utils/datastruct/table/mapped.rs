use std::marker::PhantomData;
use std::mem;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{IoContext, PlsaError, Result};
use super::Element;

/// Table buffer living in a private mapping of a temp file.
///
/// The file exists only to give the kernel somewhere to page the buffer out;
/// it is never read back. Field order matters: the map is dropped (unmapped)
/// before the file is closed and deleted.
pub(crate) struct MappedBuffer<N: Element> {
    map: MmapMut,
    len: usize,
    file: NamedTempFile,
    _marker: PhantomData<N>,
}

impl<N: Element> MappedBuffer<N> {
    /// `len` must be non zero.
    pub(crate) fn create(len: usize, dir: &Path) -> Result<Self> {
        let bytes = len.checked_mul(mem::size_of::<N>()).ok_or(PlsaError::Allocation {
            what: "mapped table",
            requested: len,
        })?;
        let file = tempfile::Builder::new()
            .prefix("plsa-table-")
            .tempfile_in(dir)
            .with_path(dir)?;
        file.as_file().set_len(bytes as u64).with_path(file.path())?;
        // SAFETY: the file is private to this process and deleted on drop, and
        // the mapping is copy-on-write so nobody else observes our pages.
        let map = unsafe { MmapOptions::new().len(bytes).map_copy(file.as_file()) }
            .with_path(file.path())?;
        info!(path = %file.path().display(), bytes, "created memory mapped table");
        Ok(Self {
            map,
            len,
            file,
            _marker: PhantomData,
        })
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[N] {
        // SAFETY: the mapping is page aligned, `len * size_of::<N>()` bytes long,
        // and every bit pattern is a valid `N` (see `Element`).
        unsafe { std::slice::from_raw_parts(self.map.as_ptr() as *const N, self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [N] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.map.as_mut_ptr() as *mut N, self.len) }
    }
}

impl<N: Element> Drop for MappedBuffer<N> {
    fn drop(&mut self) {
        debug!(path = %self.file.path().display(), "releasing memory mapped table");
    }
}
