use std::io::Write;

use memmap2::Mmap;
use ndarray::Array2;
use tempfile::NamedTempFile;

use crate::error::{CombineError, Result};

/// Whether a frame's backing array lives in RAM or is mapped from a
/// disk temporary. Opaque to the reducer beyond `read_rows`: callers
/// never see whether a given slab came from memory or from a page
/// fault on a mapped file.
pub enum Backing {
    InMemory(Array2<f64>),
    Mapped(MappedArray),
}

pub struct MappedArray {
    // Keeping the NamedTempFile alive ties its lifetime (and deletion
    // on drop) to the mapping; dropping a `Backing::Mapped` is how a
    // cached temporary gets removed.
    _tempfile: NamedTempFile,
    mmap: Mmap,
    shape: (usize, usize),
}

impl Backing {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Backing::InMemory(a) => a.dim(),
            Backing::Mapped(m) => m.shape,
        }
    }

    /// Materializes one disk cache temporary for `data`, named
    /// deterministically from `tag` (so repeated combines of the same
    /// inputs produce a recognizable, collision-free file name).
    pub fn cache_to_disk(data: &Array2<f64>, tag: &str) -> Result<Backing> {
        let (rows, cols) = data.dim();
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("astropop-imcombine-{tag}-"))
            .suffix(".f64")
            .tempfile()
            .map_err(CombineError::Io)?;

        for &v in data.iter() {
            tmp.write_all(&v.to_le_bytes()).map_err(CombineError::Io)?;
        }
        tmp.flush().map_err(CombineError::Io)?;

        let file = tmp.reopen().map_err(CombineError::Io)?;
        let mmap = unsafe { Mmap::map(&file).map_err(CombineError::Io)? };
        #[cfg(unix)]
        {
            let _ = mmap.advise(memmap2::Advice::Sequential);
        }

        Ok(Backing::Mapped(MappedArray {
            _tempfile: tmp,
            mmap,
            shape: (rows, cols),
        }))
    }

    /// Reads rows `[row_start, row_end)` as an owned, contiguous
    /// `(K, W)` slab. Always owned (never a borrowed view) so that a
    /// mapped backing's read does not have to outlive the mapping
    /// across a chunk boundary.
    pub fn read_rows(&self, row_start: usize, row_end: usize) -> Array2<f64> {
        match self {
            Backing::InMemory(arr) => arr.slice(ndarray::s![row_start..row_end, ..]).to_owned(),
            Backing::Mapped(m) => {
                let cols = m.shape.1;
                let byte_start = row_start * cols * 8;
                let byte_end = row_end * cols * 8;
                let raw = &m.mmap[byte_start..byte_end];
                let values: Vec<f64> = raw
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                    .collect();
                Array2::from_shape_vec((row_end - row_start, cols), values)
                    .expect("mapped slab reshape cannot fail: byte range matches shape")
            }
        }
    }
}
