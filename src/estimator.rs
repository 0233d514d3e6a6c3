use std::sync::Arc;

use crate::error::{CombineError, Result};

const MAD_TO_SIGMA: f64 = 1.4826;

/// Exact median of a mutable slice, selecting in place. Even-length
/// slices average the two central order statistics.
pub fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    values.select_nth_unstable_by(mid, |a, b| a.partial_cmp(b).unwrap());
    if n % 2 == 0 {
        let right = values[mid];
        let left = values[..mid]
            .iter()
            .copied()
            .fold(f64::MIN, f64::max);
        (left + right) / 2.0
    } else {
        values[mid]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (ddof = 0), matching numpy's default
/// `np.std`.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Median absolute deviation scaled by 1.4826 to approximate the
/// standard deviation of a Gaussian sample.
pub fn mad_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut buf = values.to_vec();
    let med = median(&mut buf);
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&mut deviations);
    mad * MAD_TO_SIGMA
}

type CustomFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Central-tendency estimator: a named built-in or a caller-supplied
/// callable sharing the same `(values) -> scalar` shape.
#[derive(Clone)]
pub enum CenterFn {
    Median,
    Mean,
    Custom(CustomFn),
}

impl CenterFn {
    pub fn resolve(name: &str) -> Result<Self> {
        match name {
            "median" => Ok(CenterFn::Median),
            "mean" => Ok(CenterFn::Mean),
            other => Err(CombineError::config(format!(
                "unknown central-tendency estimator: {other}"
            ))),
        }
    }

    pub fn apply(&self, values: &mut [f64]) -> f64 {
        match self {
            CenterFn::Median => median(values),
            CenterFn::Mean => mean(values),
            CenterFn::Custom(f) => f(values),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CenterFn::Median => "median",
            CenterFn::Mean => "mean",
            CenterFn::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for CenterFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CenterFn::{}", self.name())
    }
}

/// Deviation estimator: a named built-in or a caller-supplied callable.
#[derive(Clone)]
pub enum DevFn {
    Std,
    MadStd,
    Custom(CustomFn),
}

impl DevFn {
    pub fn resolve(name: &str) -> Result<Self> {
        match name {
            "std" => Ok(DevFn::Std),
            "mad_std" => Ok(DevFn::MadStd),
            other => Err(CombineError::config(format!(
                "unknown deviation estimator: {other}"
            ))),
        }
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            DevFn::Std => std_dev(values),
            DevFn::MadStd => mad_std(values),
            DevFn::Custom(f) => f(values),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DevFn::Std => "std",
            DevFn::MadStd => "mad_std",
            DevFn::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for DevFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DevFn::{}", self.name())
    }
}
