use indexmap::IndexMap;
use ndarray::Array2;

/// A single metadata value. Mirrors the `string | number | bool` union
/// in the data model: keys are always strings, values are one of these
/// three kinds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Num(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Num(v as f64)
    }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self {
        MetaValue::Num(v as f64)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

/// Ordered mapping from metadata key to value. `IndexMap` preserves
/// insertion order, which `first`'s "copy of the first input's meta"
/// and any downstream serialization both depend on.
pub type Meta = IndexMap<String, MetaValue>;

/// The input/output atom of the combiner.
///
/// Invariants: `mask`, `data`, and `uncertainty` (if present) share
/// shape within a frame. The combiner never mutates a `Frame` it is
/// handed; it only ever reads from it or clones values out of it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Array2<f64>,
    pub uncertainty: Option<Array2<f64>>,
    pub mask: Array2<bool>,
    pub unit: String,
    pub meta: Meta,
}

impl Frame {
    pub fn new(data: Array2<f64>, unit: impl Into<String>) -> Self {
        let shape = data.dim();
        Frame {
            data,
            uncertainty: None,
            mask: Array2::from_elem(shape, false),
            unit: unit.into(),
            meta: Meta::new(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// Heterogeneous combine input, normalized to `Frame` by `adapt`.
///
/// Replaces runtime type dispatch (duck typing on "does this look like
/// a frame") with an explicit, exhaustive tagged variant.
pub enum FrameInput {
    Native(Frame),
    Array(Array2<f64>),
    FitsLike { data: Array2<f64>, header: Meta },
}

impl From<Frame> for FrameInput {
    fn from(f: Frame) -> Self {
        FrameInput::Native(f)
    }
}

impl From<Array2<f64>> for FrameInput {
    fn from(a: Array2<f64>) -> Self {
        FrameInput::Array(a)
    }
}

/// Warning emitted exactly once per `combine` call the first time a
/// non-`Frame` input is normalized.
pub const NON_FRAME_WARNING: &str =
    "The images to combine are not Frame. Some features may be disabled.";

/// Normalizes one heterogeneous input into a `Frame`. Returns whether a
/// non-native input was seen, so the caller can emit the one-time
/// warning exactly once per `combine` call rather than once per frame.
pub fn adapt(input: FrameInput) -> (Frame, bool) {
    match input {
        FrameInput::Native(frame) => (frame, false),
        FrameInput::Array(data) => (Frame::new(data, ""), true),
        FrameInput::FitsLike { data, header } => {
            let mut frame = Frame::new(data, "");
            frame.meta = header;
            (frame, true)
        }
    }
}

/// Normalizes a whole input list, emitting `NON_FRAME_WARNING` once
/// the first time a non-native input is seen, never again for the
/// rest of the call.
pub fn adapt_all(inputs: Vec<FrameInput>) -> Vec<Frame> {
    let mut warned = false;
    inputs
        .into_iter()
        .map(|input| {
            let (frame, warn) = adapt(input);
            if warn && !warned {
                log::warn!("{NON_FRAME_WARNING}");
                warned = true;
            }
            frame
        })
        .collect()
}
