//! Black-box scenario tests (S1-S7) and the cross-module invariants
//! from spec §8, driven entirely through the public `Combiner` API and
//! the standalone clip primitives. Per-module unit tests already cover
//! the same ground at finer grain; these exercise the public surface
//! end to end the way a caller would.

use ndarray::{array, Array2};

use imcombine::{Combiner, CombinerConfig, Frame, FrameInput};

fn frame(data: Array2<f64>) -> Frame {
    Frame::new(data, "adu")
}

#[test]
fn s1_minmax_1d() {
    let arr: ndarray::Array1<f64> = (0..10).map(|v| v as f64).collect();
    let mask = imcombine::clip::minmax_clip(&arr, Some(2.0), Some(6.0));
    assert_eq!(
        mask,
        array![true, true, false, false, false, false, false, true, true, true]
    );
}

#[test]
fn s2_minmax_with_invalids() {
    let arr = array![0.0, 1.0, 2.0, f64::INFINITY, f64::NAN, 5.0, 1.0];
    let mask = imcombine::clip::minmax_clip(&arr, Some(1.0), Some(3.0));
    assert_eq!(mask, array![true, false, false, true, true, true, false]);
}

#[test]
fn s3_sigma_clip_constants_with_outlier() {
    let mut data = vec![1.0f64; 25];
    data[1 * 5 + 1] = 1000.0;
    let arr = Array2::from_shape_vec((5, 5), data).unwrap();
    let mask = imcombine::clip::sigma_clip(
        &arr,
        3.0.into(),
        &imcombine::estimator::CenterFn::Median,
        &imcombine::estimator::DevFn::MadStd,
    );
    for r in 0..5 {
        for c in 0..5 {
            assert_eq!(mask[[r, c]], (r, c) == (1, 1), "mismatch at ({r},{c})");
        }
    }
}

#[test]
fn s4_chunk_plan_f64() {
    let median = imcombine::chunk::plan_chunks(
        1e6,
        imcombine::Method::Median,
        100,
        100,
        100,
        8,
    );
    assert_eq!((median.step, median.n_chunks), (2, 50));

    let mean = imcombine::chunk::plan_chunks(1e6, imcombine::Method::Mean, 100, 100, 100, 8);
    assert_eq!((mean.step, mean.n_chunks), (3, 34));
}

#[test]
fn s5_chunk_plan_f32() {
    let median = imcombine::chunk::plan_chunks(
        1e6,
        imcombine::Method::Median,
        100,
        100,
        100,
        4,
    );
    assert_eq!((median.step, median.n_chunks), (4, 25));

    let mean = imcombine::chunk::plan_chunks(1e6, imcombine::Method::Mean, 100, 100, 100, 4);
    assert_eq!((mean.step, mean.n_chunks), (6, 17));
}

#[test]
fn s6_median_combine_with_uncertainty_propagation() {
    let base = 100.0f64;
    let ks = [0.8, 1.0, 1.2, 1.0, 1.2];

    let frames: Vec<FrameInput> = ks
        .iter()
        .map(|k| {
            let data = Array2::from_elem((1, 1), base * k);
            let mut f = Frame::new(data.clone(), "adu");
            f.uncertainty = Some(data.mapv(|v| 0.1 * v * k));
            f.into()
        })
        .collect();

    let mut combiner = Combiner::default();
    let out = combiner.combine(frames, "median").unwrap();

    assert!((out.data[[0, 0]] - base).abs() < 1e-9);
    let expected_sigma = 0.06693280212272602 * base;
    assert!(
        (out.uncertainty.unwrap()[[0, 0]] - expected_sigma).abs() < 1e-6,
        "median uncertainty identity mismatch"
    );
    assert_eq!(
        out.meta.get("astropop imcombine nimages"),
        Some(&imcombine::model::MetaValue::Num(5.0))
    );
    assert_eq!(
        out.meta.get("astropop imcombine method"),
        Some(&imcombine::model::MetaValue::Str("median".into()))
    );
}

fn fixture_30() -> Vec<FrameInput> {
    (0..30i64)
        .map(|i| {
            let mut f = frame(Array2::from_elem((1, 1), i as f64));
            f.meta.insert("first_equal".into(), 1.0.into());
            f.meta.insert("second_equal".into(), 2.0.into());
            f.meta.insert("first_differ".into(), (i as f64).into());
            f.meta.insert("second_differ".into(), ((i / 2) as f64).into());
            f.meta.insert("third_differ".into(), ((i % 3) as f64).into());
            f.into()
        })
        .collect()
}

#[test]
fn s7_no_merge_is_provenance_only() {
    let mut combiner = Combiner::default();
    combiner.set_merge_header("no_merge", None).unwrap();
    let out = combiner.combine(fixture_30(), "mean").unwrap();
    assert_eq!(out.meta.len(), 2);
}

#[test]
fn s7_first_copies_frame_zero() {
    let mut combiner = Combiner::default();
    combiner.set_merge_header("first", None).unwrap();
    let out = combiner.combine(fixture_30(), "mean").unwrap();
    assert_eq!(
        out.meta.get("first_differ"),
        Some(&imcombine::model::MetaValue::Num(0.0))
    );
}

#[test]
fn s7_only_equal_keeps_constant_keys() {
    let mut combiner = Combiner::default();
    combiner.set_merge_header("only_equal", None).unwrap();
    let out = combiner.combine(fixture_30(), "mean").unwrap();
    assert_eq!(out.meta.len(), 4); // first_equal, second_equal + 2 provenance
    assert!(out.meta.get("first_differ").is_none());
}

#[test]
fn s7_selected_keys_pulls_from_first_defining_frame() {
    let mut combiner = Combiner::default();
    combiner
        .set_merge_header(
            "selected_keys",
            Some(vec![
                "first_equal".to_string(),
                "third_differ".to_string(),
                "first_differ".to_string(),
            ]),
        )
        .unwrap();
    let out = combiner.combine(fixture_30(), "mean").unwrap();
    assert_eq!(out.meta.len(), 5);
    assert_eq!(
        out.meta.get("first_differ"),
        Some(&imcombine::model::MetaValue::Num(0.0))
    );
}

#[test]
fn s7_selected_keys_without_list_is_config_error() {
    let mut combiner = Combiner::default();
    let err = combiner.set_merge_header("selected_keys", None).unwrap_err();
    assert!(matches!(err, imcombine::CombineError::Config(_)));
}

#[test]
fn s7_merge_header_set_up_front_at_construction() {
    // Mirrors the ground-truth construction shape directly, with no
    // post-construction `set_merge_header` call: `ImCombiner(merge_header='first')`.
    let config = CombinerConfig {
        merge_header: "first".to_string(),
        ..CombinerConfig::default()
    };
    let mut combiner = Combiner::new(config).unwrap();
    let out = combiner.combine(fixture_30(), "mean").unwrap();
    assert_eq!(
        out.meta.get("first_differ"),
        Some(&imcombine::model::MetaValue::Num(0.0))
    );
}

#[test]
fn s7_selected_keys_set_up_front_at_construction() {
    // `ImCombiner(merge_header='selected_keys', merge_header_keys=keys)`.
    let config = CombinerConfig {
        merge_header: "selected_keys".to_string(),
        merge_header_keys: Some(vec!["first_equal".to_string(), "third_differ".to_string()]),
        ..CombinerConfig::default()
    };
    let mut combiner = Combiner::new(config).unwrap();
    let out = combiner.combine(fixture_30(), "mean").unwrap();
    assert_eq!(out.meta.len(), 4);
    assert_eq!(
        out.meta.get("third_differ"),
        Some(&imcombine::model::MetaValue::Num(0.0))
    );
}

#[test]
fn construction_rejects_selected_keys_without_keys() {
    let config = CombinerConfig {
        merge_header: "selected_keys".to_string(),
        ..CombinerConfig::default()
    };
    let err = Combiner::new(config).unwrap_err();
    assert!(matches!(err, imcombine::CombineError::Config(_)));
}

#[test]
fn invariant_shape_matches_first_frame() {
    let mut combiner = Combiner::default();
    let a = frame(Array2::from_elem((3, 4), 1.0));
    let b = frame(Array2::from_elem((3, 4), 2.0));
    let out = combiner.combine(vec![a.into(), b.into()], "mean").unwrap();
    assert_eq!(out.data.dim(), (3, 4));
}

#[test]
fn invariant_mask_monotone_when_masked_everywhere() {
    let mut a = frame(Array2::from_elem((1, 1), 1.0));
    a.mask[[0, 0]] = true;
    let mut b = frame(Array2::from_elem((1, 1), 2.0));
    b.mask[[0, 0]] = true;

    for method in ["median", "mean", "sum"] {
        let mut combiner = Combiner::default();
        let out = combiner
            .combine(vec![a.clone().into(), b.clone().into()], method)
            .unwrap();
        assert!(out.mask[[0, 0]], "method {method} should mask an all-masked pixel");
    }
}

#[test]
fn invariant_mask_not_forced_when_partially_masked() {
    let mut a = frame(Array2::from_elem((1, 1), 1.0));
    a.mask[[0, 0]] = true;
    let b = frame(Array2::from_elem((1, 1), 2.0));

    let mut combiner = Combiner::default();
    let out = combiner.combine(vec![a.into(), b.into()], "mean").unwrap();
    assert!(!out.mask[[0, 0]]);
    assert_eq!(out.data[[0, 0]], 2.0);
}

#[test]
fn invariant_inputs_unchanged_after_combine() {
    let a = frame(array![[1.0, 2.0], [3.0, 4.0]]);
    let b = frame(array![[5.0, 6.0], [7.0, 8.0]]);
    let a_before = a.clone();
    let b_before = b.clone();

    let mut combiner = Combiner::default();
    combiner.combine(vec![a.clone().into(), b.clone().into()], "sum").unwrap();

    assert_eq!(a.data, a_before.data);
    assert_eq!(b.data, b_before.data);
    assert_eq!(a.mask, a_before.mask);
    assert_eq!(b.mask, b_before.mask);
}

#[test]
fn invariant_determinism_same_inputs_same_output() {
    let a = frame(array![[1.0, 2.0], [3.0, 10.0]]);
    let b = frame(array![[5.0, 6.0], [7.0, 1000.0]]);

    let mut c1 = Combiner::default();
    c1.set_sigma_clip(Some(&[3.0]), None, None).unwrap();
    let out1 = c1.combine(vec![a.clone().into(), b.clone().into()], "median").unwrap();

    let mut c2 = Combiner::default();
    c2.set_sigma_clip(Some(&[3.0]), None, None).unwrap();
    let out2 = c2.combine(vec![a.into(), b.into()], "median").unwrap();

    assert_eq!(out1.data, out2.data);
    assert_eq!(out1.mask, out2.mask);
}

#[test]
fn empty_stack_fails_before_any_allocation() {
    let mut combiner = Combiner::new(CombinerConfig::default()).unwrap();
    let err = combiner.combine(vec![], "sum").unwrap_err();
    assert!(matches!(err, imcombine::CombineError::EmptyStack));
}

#[test]
fn single_frame_roundtrips_through_every_method() {
    let data = array![[1.0, 2.0], [f64::NAN, 4.0]];
    for method in ["median", "mean", "sum"] {
        let f = frame(data.clone());
        let mut combiner = Combiner::default();
        let out = combiner.combine(vec![f.into()], method).unwrap();
        assert_eq!(out.data[[0, 0]], 1.0);
        assert_eq!(out.data[[0, 1]], 2.0);
        assert!(out.mask[[1, 0]], "non-finite source pixel must be masked");
        assert_eq!(out.data[[1, 1]], 4.0);
    }
}
