//! C1 — clip primitives. Pure functions producing boolean rejection
//! masks; no state, no I/O, no logging.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Dimension};

use crate::error::{CombineError, Result};
use crate::estimator::{CenterFn, DevFn};

/// Sigma-clip thresholds: a symmetric scalar or an explicit
/// `(low, high)` pair where either endpoint may be disabled.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Thresholds {
    pub fn symmetric(sigma: f64) -> Self {
        Thresholds {
            low: Some(sigma),
            high: Some(sigma),
        }
    }

    pub fn pair(low: Option<f64>, high: Option<f64>) -> Self {
        Thresholds { low, high }
    }
}

impl From<f64> for Thresholds {
    fn from(sigma: f64) -> Self {
        Thresholds::symmetric(sigma)
    }
}

impl From<(Option<f64>, Option<f64>)> for Thresholds {
    fn from((low, high): (Option<f64>, Option<f64>)) -> Self {
        Thresholds::pair(low, high)
    }
}

/// Parses a raw slice of up to two threshold values, as a caller-facing
/// entry point would receive them (e.g. from a config setter taking a
/// `&[f64]`). More than two elements is a `ConfigError`.
pub fn parse_thresholds(values: &[f64]) -> Result<Thresholds> {
    match values.len() {
        0 => Ok(Thresholds::pair(None, None)),
        1 => Ok(Thresholds::symmetric(values[0])),
        2 => Ok(Thresholds::pair(Some(values[0]), Some(values[1]))),
        n => Err(CombineError::config(format!(
            "sigma_clip thresholds must have 1 or 2 elements, got {n}"
        ))),
    }
}

/// `minmax_clip(arr, lo, hi) -> mask`
///
/// `mask[i]` is `true` iff `arr[i] < lo` (when set), OR `arr[i] > hi`
/// (when set), OR `arr[i]` is non-finite. Generic over rank: callers
/// pass a 1-D array for a flat stack, 2-D for an image-shaped one, etc.
pub fn minmax_clip<D: Dimension>(
    arr: &ndarray::Array<f64, D>,
    lo: Option<f64>,
    hi: Option<f64>,
) -> ndarray::Array<bool, D> {
    arr.mapv(|v| {
        if !v.is_finite() {
            return true;
        }
        if let Some(lo) = lo {
            if v < lo {
                return true;
            }
        }
        if let Some(hi) = hi {
            if v > hi {
                return true;
            }
        }
        false
    })
}

fn finite_values<D: Dimension>(arr: &ndarray::Array<f64, D>) -> Vec<f64> {
    arr.iter().copied().filter(|v| v.is_finite()).collect()
}

/// `sigma_clip(arr, thresholds, cen_fn, dev_fn) -> mask`, scalar over
/// the whole array (the `axis=None` case). Non-finite entries are
/// excluded from the centre/deviation statistics, then independently
/// marked in the output mask.
pub fn sigma_clip<D: Dimension>(
    arr: &ndarray::Array<f64, D>,
    thresholds: Thresholds,
    cen_fn: &CenterFn,
    dev_fn: &DevFn,
) -> ndarray::Array<bool, D> {
    let mut finite = finite_values(arr);
    if finite.is_empty() {
        return arr.mapv(|v| !v.is_finite());
    }
    let centre = cen_fn.apply(&mut finite);
    let dev = dev_fn.apply(&finite);

    arr.mapv(|x| {
        if !x.is_finite() {
            return true;
        }
        if let Some(low) = thresholds.low {
            if x < centre - low * dev {
                return true;
            }
        }
        if let Some(high) = thresholds.high {
            if x > centre + high * dev {
                return true;
            }
        }
        false
    })
}

/// `sigma_clip` specialized to reduce along axis 0 of a 2-D array
/// (the slab's frame axis) and broadcast the per-column centre/
/// deviation back across all `K` rows. Used by the rejection stage,
/// which must reject per-pixel across the stack rather than globally.
pub fn sigma_clip_axis0(
    arr: ArrayView2<f64>,
    thresholds: Thresholds,
    cen_fn: &CenterFn,
    dev_fn: &DevFn,
) -> Array2<bool> {
    let (k, w) = arr.dim();
    let mut mask = Array2::from_elem((k, w), false);

    for col in 0..w {
        let column = arr.index_axis(Axis(1), col);
        let mut finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();

        if finite.is_empty() {
            for row in 0..k {
                mask[[row, col]] = !column[row].is_finite();
            }
            continue;
        }

        let centre = cen_fn.apply(&mut finite);
        let dev = dev_fn.apply(&finite);

        for row in 0..k {
            let x = column[row];
            let mut rejected = !x.is_finite();
            if !rejected {
                if let Some(low) = thresholds.low {
                    rejected |= x < centre - low * dev;
                }
            }
            if !rejected {
                if let Some(high) = thresholds.high {
                    rejected |= x > centre + high * dev;
                }
            }
            mask[[row, col]] = rejected;
        }
    }

    mask
}

/// `sigma_clip` reducing along axis 0 of a `(K, R, W)` slab (the
/// rejection stage's working shape) and broadcasting the per-pixel
/// centre/deviation back across all `K` frames.
pub fn sigma_clip_frame_axis(
    arr: ArrayView3<f64>,
    thresholds: Thresholds,
    cen_fn: &CenterFn,
    dev_fn: &DevFn,
) -> Array3<bool> {
    let (k, r, w) = arr.dim();
    let mut mask = Array3::from_elem((k, r, w), false);

    for row in 0..r {
        for col in 0..w {
            let column = arr.slice(ndarray::s![.., row, col]);
            let mut finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();

            if finite.is_empty() {
                for frame in 0..k {
                    mask[[frame, row, col]] = !column[frame].is_finite();
                }
                continue;
            }

            let centre = cen_fn.apply(&mut finite);
            let dev = dev_fn.apply(&finite);

            for frame in 0..k {
                let x = column[frame];
                let mut rejected = !x.is_finite();
                if !rejected {
                    if let Some(low) = thresholds.low {
                        rejected |= x < centre - low * dev;
                    }
                }
                if !rejected {
                    if let Some(high) = thresholds.high {
                        rejected |= x > centre + high * dev;
                    }
                }
                mask[[frame, row, col]] = rejected;
            }
        }
    }

    mask
}
