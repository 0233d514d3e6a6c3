//! C6 — header merger. Merges per-frame metadata into the output
//! according to the configured policy. Independent of chunking;
//! invoked once at the end of `combine`.

use crate::error::{CombineError, Result};
use crate::model::{Meta, MetaValue};

pub const NIMAGES_KEY: &str = "astropop imcombine nimages";
pub const METHOD_KEY: &str = "astropop imcombine method";

#[derive(Debug, Clone)]
pub enum MergeHeader {
    NoMerge,
    First,
    OnlyEqual,
    SelectedKeys(Vec<String>),
}

impl MergeHeader {
    pub fn parse(mode: &str, keys: Option<Vec<String>>) -> Result<Self> {
        match mode {
            "no_merge" => Ok(MergeHeader::NoMerge),
            "first" => Ok(MergeHeader::First),
            "only_equal" => Ok(MergeHeader::OnlyEqual),
            "selected_keys" => match keys {
                Some(k) if !k.is_empty() => Ok(MergeHeader::SelectedKeys(k)),
                _ => Err(CombineError::config("No key assigned")),
            },
            other => Err(CombineError::config(format!("merge header mode {other} not known."))),
        }
    }
}

/// Runs C6 and appends the two provenance keys, always added last
/// regardless of policy.
pub fn merge(metas: &[&Meta], policy: &MergeHeader, n_images: usize, method: &str) -> Meta {
    let mut out = match policy {
        MergeHeader::NoMerge => Meta::new(),
        MergeHeader::First => metas.first().map(|m| (*m).clone()).unwrap_or_default(),
        MergeHeader::OnlyEqual => only_equal(metas),
        MergeHeader::SelectedKeys(keys) => selected_keys(metas, keys),
    };

    out.insert(NIMAGES_KEY.to_string(), MetaValue::Num(n_images as f64));
    out.insert(METHOD_KEY.to_string(), MetaValue::Str(method.to_string()));
    out
}

fn only_equal(metas: &[&Meta]) -> Meta {
    let mut result = Meta::new();
    let Some(first) = metas.first() else {
        return result;
    };

    for key in first.keys() {
        let mut values = metas.iter().map(|m| m.get(key));
        let Some(Some(first_value)) = values.next() else {
            continue;
        };
        let all_present_and_equal = values.all(|v| v == Some(first_value));
        if all_present_and_equal {
            result.insert(key.clone(), first_value.clone());
        }
    }

    result
}

fn selected_keys(metas: &[&Meta], keys: &[String]) -> Meta {
    let mut result = Meta::new();
    for key in keys {
        if let Some(value) = metas.iter().find_map(|m| m.get(key)) {
            result.insert(key.clone(), value.clone());
        }
    }
    result
}
