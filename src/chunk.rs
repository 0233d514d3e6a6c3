//! C3 — chunk planner / yielder. Given a memory budget, combine
//! method, element size and stack shape, produces a finite,
//! non-restartable lazy sequence of row-slabs.

use std::ops::Range;

use ndarray::Array3;

use crate::combiner::Method;
use crate::model::Backing;

/// Per-pixel reduction cost factor `f(method)`. Median needs
/// simultaneous storage for sorting/selection; mean/sum need only
/// accumulators.
pub fn method_factor(method: Method) -> f64 {
    match method {
        Method::Median => 4.5,
        Method::Mean => 3.0,
        Method::Sum => 3.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub step: usize,
    pub n_chunks: usize,
}

/// Computes the row step and chunk count law from spec §4.3 / §8
/// invariant 7: `step = max(1, floor(M / (f·N·W·(B+1))))`,
/// `n_chunks = ceil(H / step)`. Uncertainty presence does not affect
/// this computation — only data + mask bytes factor in.
pub fn plan_chunks(
    max_memory: f64,
    method: Method,
    n_frames: usize,
    rows: usize,
    cols: usize,
    elem_bytes: usize,
) -> ChunkPlan {
    let f = method_factor(method);
    let denom = f * n_frames as f64 * cols as f64 * (elem_bytes as f64 + 1.0);
    let step = ((max_memory / denom).floor() as usize).max(1);
    let n_chunks = ((rows + step - 1) / step).max(1);
    if n_chunks > 1 {
        log::debug!("Splitting the images into {n_chunks} chunks.");
    }
    ChunkPlan { step, n_chunks }
}

/// Whether uncertainty propagation is available for the stack: only
/// when every frame carries it. Emits the degradation warning once
/// when some but not all frames do.
pub fn resolve_uncertainty(per_frame_present: &[bool]) -> bool {
    let all = per_frame_present.iter().all(|&p| p);
    let any = per_frame_present.iter().any(|&p| p);
    if !all && any {
        log::debug!("One or more frames have empty uncertainty. Some features are disabled.");
    }
    all
}

/// One row-slab: per-frame data, per-frame input mask (not yet
/// combined with non-finite detection — that's C4's job), and
/// per-frame uncertainty if the stack is not uncertainty-degraded.
pub struct Chunk {
    pub rows: Range<usize>,
    /// (K, R, W): K frames, R = rows.len(), W = image width.
    pub data: Array3<f64>,
    pub input_mask: Array3<bool>,
    pub uncertainty: Option<Array3<f64>>,
}

pub struct ChunkYielder<'a> {
    data_backing: &'a [Backing],
    mask_backing: &'a [ndarray::Array2<bool>],
    uncertainty_backing: Option<&'a [Backing]>,
    cols: usize,
    total_rows: usize,
    step: usize,
    next_row: usize,
}

impl<'a> ChunkYielder<'a> {
    pub fn new(
        data_backing: &'a [Backing],
        mask_backing: &'a [ndarray::Array2<bool>],
        uncertainty_backing: Option<&'a [Backing]>,
        rows: usize,
        cols: usize,
        step: usize,
    ) -> Self {
        ChunkYielder {
            data_backing,
            mask_backing,
            uncertainty_backing,
            cols,
            total_rows: rows,
            step,
            next_row: 0,
        }
    }
}

impl<'a> Iterator for ChunkYielder<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.next_row >= self.total_rows {
            return None;
        }
        let row_start = self.next_row;
        let row_end = (row_start + self.step).min(self.total_rows);
        self.next_row = row_end;
        let r = row_end - row_start;
        let k = self.data_backing.len();
        let w = self.cols;

        let mut data = Array3::<f64>::zeros((k, r, w));
        let mut input_mask = Array3::<bool>::from_elem((k, r, w), false);

        for (i, backing) in self.data_backing.iter().enumerate() {
            let slab = backing.read_rows(row_start, row_end);
            data.index_axis_mut(ndarray::Axis(0), i).assign(&slab);

            let mask_slab = self.mask_backing[i].slice(ndarray::s![row_start..row_end, ..]);
            input_mask
                .index_axis_mut(ndarray::Axis(0), i)
                .assign(&mask_slab);
        }

        let uncertainty = self.uncertainty_backing.map(|backings| {
            let mut u = Array3::<f64>::zeros((k, r, w));
            for (i, backing) in backings.iter().enumerate() {
                let slab = backing.read_rows(row_start, row_end);
                u.index_axis_mut(ndarray::Axis(0), i).assign(&slab);
            }
            u
        });

        Some(Chunk {
            rows: row_start..row_end,
            data,
            input_mask,
            uncertainty,
        })
    }
}
