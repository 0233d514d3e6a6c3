//! C5 — reduction stage. Computes the per-pixel combined statistic,
//! propagates uncertainty and mask, and writes into the output buffer.

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::combiner::Method;
use crate::estimator::{mean as mean_fn, median as median_fn};
use crate::reject::MaskedSlab;

/// Output of reducing one slab: ready to be written verbatim into the
/// driver's pre-allocated output buffer at `slab.rows`.
pub struct ReducedSlab {
    pub data: Array2<f64>,
    pub mask: Array2<bool>,
    pub uncertainty: Option<Array2<f64>>,
}

/// Population standard deviation (ddof = 0) of a slice.
fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean_fn(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Reduces a rejected slab to `(data, mask, uncertainty)` for the
/// configured method. Rows within the slab may be reduced in
/// parallel: each pixel's reduction depends only on that pixel's own
/// column across the frame axis, so order doesn't affect the result.
pub fn reduce(slab: &MaskedSlab, method: Method) -> ReducedSlab {
    let (k, r, w) = slab.data.dim();
    let propagate_uncertainty = slab.uncertainty.is_some();

    let rows: Vec<(Vec<f64>, Vec<bool>, Vec<f64>)> = (0..r)
        .into_par_iter()
        .map(|row| {
            let mut data_row = vec![0.0f64; w];
            let mut mask_row = vec![false; w];
            let mut unct_row = vec![0.0f64; w];

            for col in 0..w {
                let mut values = Vec::with_capacity(k);
                let mut sigmas = Vec::with_capacity(k);
                for frame in 0..k {
                    if !slab.mask[[frame, row, col]] {
                        values.push(slab.data[[frame, row, col]]);
                        if let Some(ref u) = slab.uncertainty {
                            sigmas.push(u[[frame, row, col]]);
                        }
                    }
                }

                if values.is_empty() {
                    mask_row[col] = true;
                    continue;
                }

                let n = values.len();
                let value = match method {
                    Method::Sum => values.iter().sum::<f64>(),
                    Method::Mean => values.iter().sum::<f64>() / n as f64,
                    Method::Median => {
                        let mut buf = values.clone();
                        median_fn(&mut buf)
                    }
                };

                let sigma = if propagate_uncertainty {
                    match method {
                        Method::Sum => sigmas.iter().map(|s| s * s).sum::<f64>().sqrt(),
                        Method::Mean => sigmas.iter().map(|s| s * s).sum::<f64>().sqrt() / n as f64,
                        // Resolved per the spec's own testable identity (S6):
                        // the sample std of the *data* values, not the
                        // per-frame sigmas, scaled by 1/sqrt(n).
                        Method::Median => population_std(&values) / (n as f64).sqrt(),
                    }
                } else {
                    0.0
                };

                data_row[col] = value;
                unct_row[col] = sigma;
            }

            (data_row, mask_row, unct_row)
        })
        .collect();

    let mut data = Array2::<f64>::zeros((r, w));
    let mut mask = Array2::<bool>::from_elem((r, w), false);
    let mut uncertainty = propagate_uncertainty.then(|| Array2::<f64>::zeros((r, w)));

    for (row, (data_row, mask_row, unct_row)) in rows.into_iter().enumerate() {
        data.index_axis_mut(Axis(0), row)
            .assign(&ndarray::Array1::from_vec(data_row));
        mask.index_axis_mut(Axis(0), row)
            .assign(&ndarray::Array1::from_vec(mask_row));
        if let Some(ref mut u) = uncertainty {
            u.index_axis_mut(Axis(0), row)
                .assign(&ndarray::Array1::from_vec(unct_row));
        }
    }

    ReducedSlab {
        data,
        mask,
        uncertainty,
    }
}
