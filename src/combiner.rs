//! Driver. Orchestrates C2 (adapt/load) through C6 (header merge) behind
//! the single public entry point, `Combiner::combine`.

use ndarray::Array2;

use crate::chunk::{plan_chunks, resolve_uncertainty, ChunkYielder};
use crate::clip::Thresholds;
use crate::error::{CombineError, Result};
use crate::estimator::{CenterFn, DevFn};
use crate::header_merge::{self, MergeHeader};
use crate::model::{adapt_all, Backing, Frame, FrameInput, Meta};
use crate::reduce::reduce;
use crate::reject::{reject, MinMaxConfig, SigmaConfig};

/// The three accepted combine methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Median,
    Mean,
    Sum,
}

impl Method {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "median" => Ok(Method::Median),
            "mean" => Ok(Method::Mean),
            "sum" => Ok(Method::Sum),
            other => Err(CombineError::InvalidMethod(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::Median => "median",
            Method::Mean => "mean",
            Method::Sum => "sum",
        }
    }
}

/// Floating working precision. Only float kinds are valid; the enum
/// itself rules out selecting an integer/complex kind at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Float32,
    Float64,
}

impl Dtype {
    /// Bytes per element of the working buffers the chunk planner
    /// budgets memory against. Every working buffer (`Chunk`,
    /// `MaskedSlab`, `ReducedSlab`, the driver's output arrays) is
    /// stored as `f64` regardless of which `Dtype` is configured —
    /// narrowing storage to an actual `f32` buffer for `Float32` is
    /// not implemented — so this always reports 8. Reporting 4 for
    /// `Float32` without narrowing the real allocation would have the
    /// planner under-count the true working set by up to 2x, which
    /// would violate the memory-bound invariant in spec §8.
    pub fn elem_bytes(&self) -> usize {
        8
    }
}

impl Default for Dtype {
    fn default() -> Self {
        Dtype::Float64
    }
}

/// Configuration snapshot fixed at combine time.
///
/// `merge_header`/`merge_header_keys` mirror `set_merge_header`'s own
/// arguments exactly, so a caller can pick the header-merge policy up
/// front at construction instead of always needing a post-construction
/// setter call — matching the ground-truth construction shape
/// (`ImCombiner(merge_header='first')`, `ImCombiner(merge_header=
/// 'selected_keys', merge_header_keys=keys)`).
#[derive(Debug, Clone)]
pub struct CombinerConfig {
    pub max_memory: f64,
    pub dtype: Dtype,
    pub use_disk_cache: bool,
    pub merge_header: String,
    pub merge_header_keys: Option<Vec<String>>,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        CombinerConfig {
            max_memory: 1e9,
            dtype: Dtype::Float64,
            use_disk_cache: false,
            merge_header: "no_merge".to_string(),
            merge_header_keys: None,
        }
    }
}

/// The pipeline driver. Holds configuration and any cached temporaries
/// created while servicing the last `combine` call; `clear()` releases
/// them and is called on every exit path.
pub struct Combiner {
    config: CombinerConfig,
    sigma_clip: Option<Thresholds>,
    sigma_cen_fn: Option<CenterFn>,
    sigma_dev_fn: Option<DevFn>,
    minmax: Option<MinMaxConfig>,
    merge_header: MergeHeader,
    cached_data: Vec<Backing>,
    cached_uncertainty: Vec<Backing>,
}

impl Default for Combiner {
    fn default() -> Self {
        Combiner {
            config: CombinerConfig::default(),
            sigma_clip: None,
            sigma_cen_fn: None,
            sigma_dev_fn: None,
            minmax: None,
            merge_header: MergeHeader::NoMerge,
            cached_data: Vec::new(),
            cached_uncertainty: Vec::new(),
        }
    }
}

impl Combiner {
    /// Validates `config.merge_header`/`merge_header_keys` eagerly,
    /// the same as `set_merge_header` does post-construction, so a
    /// bad construction-time merge policy (e.g. `selected_keys` with
    /// no keys) fails immediately instead of surfacing later inside
    /// `combine`.
    pub fn new(config: CombinerConfig) -> Result<Self> {
        let merge_header =
            MergeHeader::parse(&config.merge_header, config.merge_header_keys.clone())?;
        Ok(Combiner {
            merge_header,
            config,
            ..Default::default()
        })
    }

    /// `threshold = None` disables clipping and resets both estimator
    /// choices to unset. A threshold with no estimator names defaults
    /// `cen_fn` to `"median"` and `dev_fn` to `"mad_std"`.
    pub fn set_sigma_clip(
        &mut self,
        threshold: Option<&[f64]>,
        cen_fn: Option<&str>,
        dev_fn: Option<&str>,
    ) -> Result<()> {
        let Some(threshold) = threshold else {
            self.sigma_clip = None;
            self.sigma_cen_fn = None;
            self.sigma_dev_fn = None;
            return Ok(());
        };

        let thresholds = crate::clip::parse_thresholds(threshold)?;
        let cen = CenterFn::resolve(cen_fn.unwrap_or("median"))?;
        let dev = DevFn::resolve(dev_fn.unwrap_or("mad_std"))?;

        self.sigma_clip = Some(thresholds);
        self.sigma_cen_fn = Some(cen);
        self.sigma_dev_fn = Some(dev);
        Ok(())
    }

    /// A bare call (`lo = hi = None`) disables minmax clipping. If both
    /// bounds are given and `lo > hi`, they are swapped.
    pub fn set_minmax_clip(&mut self, lo: Option<f64>, hi: Option<f64>) -> Result<()> {
        if lo.is_none() && hi.is_none() {
            self.minmax = None;
            return Ok(());
        }
        let (lo, hi) = match (lo, hi) {
            (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
            other => other,
        };
        self.minmax = Some(MinMaxConfig { lo, hi });
        Ok(())
    }

    pub fn set_merge_header(&mut self, mode: &str, keys: Option<Vec<String>>) -> Result<()> {
        self.merge_header = MergeHeader::parse(mode, keys)?;
        Ok(())
    }

    /// Standalone consistency check, reachable independent of
    /// `combine`. Validates the stack is non-empty and that every
    /// frame shares the first frame's shape and a compatible unit.
    pub fn check_consistency(frames: &[Frame]) -> Result<(usize, usize)> {
        let first = frames.first().ok_or(CombineError::EmptyStack)?;
        let expected = first.shape();
        for (index, frame) in frames.iter().enumerate().skip(1) {
            let got = frame.shape();
            if got != expected {
                return Err(CombineError::ShapeMismatch {
                    index,
                    expected,
                    got,
                });
            }
            if frame.unit != first.unit {
                return Err(CombineError::UnitMismatch {
                    index,
                    expected: first.unit.clone(),
                    got: frame.unit.clone(),
                });
            }
        }
        Ok(expected)
    }

    /// Drops every disk-cache temporary created by the last `combine`
    /// call. Idempotent.
    pub fn clear(&mut self) {
        self.cached_data.clear();
        self.cached_uncertainty.clear();
    }

    pub fn combine(&mut self, inputs: Vec<FrameInput>, method: &str) -> Result<Frame> {
        let result = self.combine_inner(inputs, method);
        self.clear();
        result
    }

    fn combine_inner(&mut self, inputs: Vec<FrameInput>, method: &str) -> Result<Frame> {
        let method = Method::parse(method)?;

        if inputs.is_empty() {
            return Err(CombineError::EmptyStack);
        }

        let frames = adapt_all(inputs);

        let (rows, cols) = Self::check_consistency(&frames)?;
        let n_frames = frames.len();

        let mut data_backing = Vec::with_capacity(n_frames);
        for (i, f) in frames.iter().enumerate() {
            data_backing.push(self.back(&f.data, &format!("data-{i}"))?);
        }
        self.cached_data = data_backing;

        let presence: Vec<bool> = frames.iter().map(|f| f.uncertainty.is_some()).collect();
        let has_uncertainty = resolve_uncertainty(&presence);
        if has_uncertainty {
            let mut uncertainty_backing = Vec::with_capacity(n_frames);
            for (i, f) in frames.iter().enumerate() {
                uncertainty_backing
                    .push(self.back(f.uncertainty.as_ref().unwrap(), &format!("unc-{i}"))?);
            }
            self.cached_uncertainty = uncertainty_backing;
        }

        let data_backing = &self.cached_data;
        let uncertainty_backing = has_uncertainty.then(|| self.cached_uncertainty.as_slice());

        let mask_backing: Vec<Array2<bool>> = frames.iter().map(|f| f.mask.clone()).collect();

        let plan = plan_chunks(
            self.config.max_memory,
            method,
            n_frames,
            rows,
            cols,
            self.config.dtype.elem_bytes(),
        );
        let yielder = ChunkYielder::new(
            data_backing,
            &mask_backing,
            uncertainty_backing,
            rows,
            cols,
            plan.step,
        );

        let mut out_data = Array2::<f64>::zeros((rows, cols));
        let mut out_mask = Array2::<bool>::from_elem((rows, cols), false);
        let mut out_uncertainty = has_uncertainty.then(|| Array2::<f64>::zeros((rows, cols)));

        let sigma_cfg = match (self.sigma_clip, &self.sigma_cen_fn, &self.sigma_dev_fn) {
            (Some(thresholds), Some(cen_fn), Some(dev_fn)) => Some(SigmaConfig {
                thresholds,
                cen_fn: cen_fn.clone(),
                dev_fn: dev_fn.clone(),
            }),
            _ => None,
        };

        for chunk in yielder {
            let row_range = chunk.rows.clone();
            let slab = reject(chunk, self.minmax, sigma_cfg.as_ref());
            let reduced = reduce(&slab, method);

            out_data
                .slice_mut(ndarray::s![row_range.clone(), ..])
                .assign(&reduced.data);
            out_mask
                .slice_mut(ndarray::s![row_range.clone(), ..])
                .assign(&reduced.mask);
            if let (Some(out_u), Some(reduced_u)) = (out_uncertainty.as_mut(), reduced.uncertainty)
            {
                out_u
                    .slice_mut(ndarray::s![row_range, ..])
                    .assign(&reduced_u);
            }
        }

        let metas: Vec<&Meta> = frames.iter().map(|f| &f.meta).collect();
        let meta = header_merge::merge(&metas, &self.merge_header, n_frames, method.name());

        Ok(Frame {
            data: out_data,
            uncertainty: out_uncertainty,
            mask: out_mask,
            unit: frames[0].unit.clone(),
            meta,
        })
    }

    fn back(&self, data: &Array2<f64>, tag: &str) -> Result<Backing> {
        if self.config.use_disk_cache {
            let backing = Backing::cache_to_disk(data, tag)?;
            Ok(backing)
        } else {
            Ok(Backing::InMemory(data.clone()))
        }
    }
}
