//! C4 — rejection stage. Applies configured clips to a slab's mask in
//! place order, preserving pre-existing bits.

use std::ops::Range;

use ndarray::Array3;

use crate::chunk::Chunk;
use crate::clip::{minmax_clip, sigma_clip_frame_axis, Thresholds};
use crate::estimator::{CenterFn, DevFn};

/// The working-memory unit consumed by C5, once rejection has run.
pub struct MaskedSlab {
    pub rows: Range<usize>,
    pub data: Array3<f64>,
    pub mask: Array3<bool>,
    pub uncertainty: Option<Array3<f64>>,
}

#[derive(Clone, Copy)]
pub struct MinMaxConfig {
    pub lo: Option<f64>,
    pub hi: Option<f64>,
}

#[derive(Clone)]
pub struct SigmaConfig {
    pub thresholds: Thresholds,
    pub cen_fn: CenterFn,
    pub dev_fn: DevFn,
}

/// Runs C4 over one chunk: ingest (input mask OR non-finite), then
/// minmax (if configured), then sigma (if configured) — in that
/// deterministic order, each step only ever adding mask bits.
pub fn reject(
    chunk: Chunk,
    minmax: Option<MinMaxConfig>,
    sigma: Option<&SigmaConfig>,
) -> MaskedSlab {
    let Chunk {
        rows,
        data,
        input_mask,
        uncertainty,
    } = chunk;

    let mut mask = input_mask;
    for (m, &v) in mask.iter_mut().zip(data.iter()) {
        *m |= !v.is_finite();
    }

    if let Some(cfg) = minmax {
        let clipped = minmax_clip(&data, cfg.lo, cfg.hi);
        for (m, c) in mask.iter_mut().zip(clipped.iter()) {
            *m |= *c;
        }
    }

    if let Some(cfg) = sigma {
        let clipped = sigma_clip_frame_axis(data.view(), cfg.thresholds, &cfg.cen_fn, &cfg.dev_fn);
        for (m, c) in mask.iter_mut().zip(clipped.iter()) {
            *m |= *c;
        }
    }

    MaskedSlab {
        rows,
        data,
        mask,
        uncertainty,
    }
}
