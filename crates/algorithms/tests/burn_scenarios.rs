//! End-to-end burn detection scenarios
//!
//! Synthetic SWIR series with known burn dates, run through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use burnscan_acquisition::{
    AcquisitionError, AcquisitionRequest, GridSpec, MemorySource, ObservationSource, PixelWindow,
};
use burnscan_algorithms::fire::{
    burn_date, derive_year, detect_window, scan_stacks, scan_windows, scan_year_tiled,
    scan_year_whole, scan_years, BurnDateParams, EventRaster, EventTag, EventTagPolicy, ScanParams,
    TilingParams, YearRange,
};
use burnscan_algorithms::imagery::{burn_change, BurnChangeParams, MASK_CHANGED, MASK_NODATA};
use burnscan_algorithms::landscape::PatchParams;
use burnscan_algorithms::statistics::{
    burned_area, season_frequency, years_since_fire, PixelArea, DEFAULT_SEASON_CUTOFF,
};
use burnscan_core::{GeoTransform, Observation, Raster, SpectralBand};
use burnscan_parallel::ProcessingMode;

const UNBURNED: (f64, f64) = (2000.0, 1500.0);
const BURNED: (f64, f64) = (1800.0, 2600.0);

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ordinal(year: i32, doy0: u32) -> NaiveDate {
    NaiveDate::from_yo_opt(year, doy0 + 1).unwrap()
}

fn transform() -> GeoTransform {
    GeoTransform::new(300_000.0, 8_340_000.0, 30.0, -30.0)
}

/// Observation whose pixels are burned where `burned(row, col)`, NaN where
/// `cloudy(row, col)`.
fn scene(
    acquired: NaiveDate,
    rows: usize,
    cols: usize,
    burned: impl Fn(usize, usize) -> bool,
    cloudy: impl Fn(usize, usize) -> bool,
) -> Observation {
    let mut s1 = Raster::new(rows, cols);
    let mut s2 = Raster::new(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            let (a, b) = if cloudy(r, c) {
                (f64::NAN, f64::NAN)
            } else if burned(r, c) {
                BURNED
            } else {
                UNBURNED
            };
            s1.set(r, c, a).unwrap();
            s2.set(r, c, b).unwrap();
        }
    }
    s1.set_transform(transform());
    s2.set_transform(transform());
    Observation::new(acquired)
        .with_band(SpectralBand::Swir1, s1)
        .unwrap()
        .with_band(SpectralBand::Swir2, s2)
        .unwrap()
}

fn uniform(acquired: NaiveDate, burned: bool) -> Observation {
    scene(acquired, 1, 1, |_, _| burned, |_, _| false)
}

fn template(rows: usize, cols: usize) -> Raster<f64> {
    let mut t = Raster::filled(rows, cols, f64::NAN);
    t.set_nodata(Some(f64::NAN));
    t.set_transform(transform());
    t
}

#[test]
fn sparse_pair_reports_scar_image_date() {
    let range = YearRange::calendar(2021).unwrap();
    let series = vec![uniform(ordinal(2021, 100), false), uniform(ordinal(2021, 130), true)];
    let params = BurnDateParams {
        scan: ScanParams {
            half_window_days: 30,
            ..Default::default()
        },
        tag_policy: EventTagPolicy::AfterObservation,
        ..Default::default()
    };

    let events = burn_date(&template(1, 1), &series, &range, &params).unwrap();
    assert_eq!(events.get(0, 0).unwrap(), Some(EventTag::new(2021, 130)));
}

#[test]
fn sparse_pair_reports_first_anchor_by_default() {
    let range = YearRange::calendar(2021).unwrap();
    let series = vec![uniform(ordinal(2021, 100), false), uniform(ordinal(2021, 130), true)];
    let params = BurnDateParams {
        scan: ScanParams {
            half_window_days: 30,
            ..Default::default()
        },
        ..Default::default()
    };

    // Anchors sit on every third day offset from 2020-12-02; the first with
    // day 100 before it and day 130 after it is day 102.
    let events = burn_date(&template(1, 1), &series, &range, &params).unwrap();
    assert_eq!(events.get(0, 0).unwrap(), Some(EventTag::new(2021, 102)));
}

#[test]
fn season_frequency_counts_each_year_once() {
    let single = |tag: Option<EventTag>, year: i32| {
        let mut ev = EventRaster::unset(year, &template(1, 1));
        if let Some(t) = tag {
            ev.offer(0, 0, t).unwrap();
        }
        ev
    };
    let stack = vec![
        single(Some(EventTag::new(2019, 100)), 2019),
        single(Some(EventTag::new(2020, 250)), 2020),
        single(None, 2021),
    ];

    let freq = season_frequency(&stack, DEFAULT_SEASON_CUTOFF).unwrap();
    assert_eq!(freq.early.get(0, 0).unwrap(), 1);
    assert_eq!(freq.late.get(0, 0).unwrap(), 1);
    assert_eq!(freq.unburned.get(0, 0).unwrap(), 1);

    let area = burned_area(&stack[1], DEFAULT_SEASON_CUTOFF, PixelArea::FromGrid).unwrap();
    assert_eq!(area.total_m2, 900.0);
    assert_eq!(area.late_m2, 900.0);
}

#[test]
fn cloudy_pixels_never_fire() {
    let range = YearRange::calendar(2021).unwrap();
    let mut series = Vec::new();
    let mut d = ymd(2021, 5, 1);
    while d <= ymd(2021, 8, 1) {
        let burned = d >= ymd(2021, 6, 20);
        // (0, 0) is always cloudy; (0, 1) only on 2021-06-20.
        let cloud_day = d == ymd(2021, 6, 20);
        series.push(scene(d, 1, 3, |_, _| burned, move |_, c| c == 0 || (c == 1 && cloud_day)));
        d += Duration::days(5);
    }

    let events = burn_date(&template(1, 3), &series, &range, &BurnDateParams::default()).unwrap();
    assert!(!events.is_set(0, 0));
    let late = events.get(0, 1).unwrap().unwrap();
    let clear = events.get(0, 2).unwrap().unwrap();
    assert!(late >= clear);

    // A no-data composite on either side gives a no-data mask cell.
    let nan = Raster::filled(1, 1, f64::NAN);
    let one = Raster::filled(1, 1, 100.0);
    let change = burn_change(&one, &one, &nan, &one, &BurnChangeParams::default()).unwrap();
    assert_eq!(change.mask.get(0, 0).unwrap(), MASK_NODATA);
}

#[test]
fn repeated_runs_are_identical() {
    let range = YearRange::calendar(2021).unwrap();
    let series: Vec<Observation> = (0..20)
        .map(|i| {
            let d = ymd(2021, 3, 1) + Duration::days(i * 6);
            scene(d, 4, 4, move |r, c| i >= 8 + (r + c) as i64, |_, _| false)
        })
        .collect();

    let params = BurnDateParams::default();
    let a = burn_date(&template(4, 4), &series, &range, &params).unwrap();
    let b = burn_date(&template(4, 4), &series, &range, &params).unwrap();
    assert!(a.same_events(&b));

    let mut merged = a.clone();
    assert_eq!(merged.merge(&a).unwrap(), 0);
    assert!(merged.same_events(&a));
}

#[test]
fn stricter_threshold_never_adds_burns() {
    let range = YearRange::calendar(2021).unwrap();
    let series: Vec<Observation> = (0..20)
        .map(|i| {
            let d = ymd(2021, 3, 1) + Duration::days(i * 6);
            scene(d, 3, 3, move |r, c| r * 3 + c < 6 && i >= 10, |_, _| false)
        })
        .collect();

    let loose = burn_date(&template(3, 3), &series, &range, &BurnDateParams::default()).unwrap();
    let strict_params = BurnDateParams {
        change: BurnChangeParams {
            brightness_threshold: 13_000.0,
        },
        ..Default::default()
    };
    let strict = burn_date(&template(3, 3), &series, &range, &strict_params).unwrap();

    assert_eq!(loose.set_count(), 6);
    assert_eq!(strict.set_count(), 0);
}

#[test]
fn tags_only_move_earlier_as_windows_accumulate() {
    let range = YearRange::calendar(2021).unwrap();
    let series: Vec<Observation> = (0..30)
        .map(|i| {
            let d = ymd(2021, 2, 1) + Duration::days(i * 8);
            // Burn, recover, burn again: later windows see a second jump.
            let burned = (8..12).contains(&i) || i >= 20;
            scene(d, 2, 2, move |r, _| (burned && r == 0) || i >= 20, |_, _| false)
        })
        .collect();
    let params = BurnDateParams::default();
    let stacks = derive_year(&series, &range, &params).unwrap();
    let tpl = template(2, 2);

    let mut acc = EventRaster::unset(2021, &tpl);
    let mut previous = acc.clone();
    for window in scan_windows(&range, &params.scan).unwrap() {
        let detection = detect_window(&tpl, &stacks, &window, &range, &params).unwrap();
        acc.merge(&detection.candidates).unwrap();
        for r in 0..2 {
            for c in 0..2 {
                if let Some(before) = previous.get(r, c).unwrap() {
                    assert!(acc.get(r, c).unwrap().unwrap() <= before);
                }
            }
        }
        previous = acc.clone();
    }

    assert!(acc.same_events(&scan_stacks(&tpl, &stacks, &range, &params).unwrap()));
    let first = acc.get(0, 0).unwrap().unwrap();
    let second = acc.get(1, 0).unwrap().unwrap();
    assert!(first < second);
}

#[test]
fn december_burn_is_not_reported_in_the_next_year() {
    // Burned on 2020-12-26, recovered by March, burned again from 2021-08-15.
    let mut series = Vec::new();
    let mut d = ymd(2020, 11, 16);
    while d <= ymd(2021, 12, 31) {
        let burned = (d >= ymd(2020, 12, 26) && d < ymd(2021, 3, 1)) || d >= ymd(2021, 8, 15);
        series.push(uniform(d, burned));
        d += Duration::days(5);
    }
    let params = BurnDateParams {
        tag_policy: EventTagPolicy::AfterObservation,
        ..Default::default()
    };

    let stack: Vec<EventRaster> = [2020, 2021]
        .iter()
        .map(|&y| {
            let range = YearRange::calendar(y).unwrap();
            burn_date(&template(1, 1), &series, &range, &params).unwrap()
        })
        .collect();
    assert_eq!(stack[0].get(0, 0).unwrap(), Some(EventTag::from_date(ymd(2020, 12, 26))));
    assert_eq!(stack[1].get(0, 0).unwrap(), Some(EventTag::from_date(ymd(2021, 8, 18))));

    let ysf = years_since_fire(&stack, 2021).unwrap();
    assert_eq!(ysf.get(0, 0).unwrap(), 0);
    let freq = season_frequency(&stack, DEFAULT_SEASON_CUTOFF).unwrap();
    assert_eq!(freq.late.get(0, 0).unwrap(), 2);
    assert_eq!(freq.unburned.get(0, 0).unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Tiled driver
// ---------------------------------------------------------------------------

/// 7x5 grid; each pixel burns on its own date, a few never burn.
fn mosaic_source() -> MemorySource {
    let burn_step = |r: usize, c: usize| -> Option<i64> {
        if (r + c) % 4 == 0 {
            None
        } else {
            Some(4 + ((r * 5 + c) % 6) as i64)
        }
    };
    let observations = (0..18)
        .map(|i| {
            let d = ymd(2021, 4, 1) + Duration::days(i * 7);
            scene(
                d,
                7,
                5,
                move |r, c| burn_step(r, c).map_or(false, |s| i >= s),
                move |r, c| i == 6 && r == 3 && c == 2,
            )
        })
        .collect();
    MemorySource::new(observations).unwrap()
}

#[test]
fn tiled_scan_matches_whole_scan() {
    let source = mosaic_source();
    let aoi = PixelWindow::new(0, 0, 7, 5);
    let range = YearRange::calendar(2021).unwrap();

    for patch in [PatchParams::default(), PatchParams { min_size_pixels: Some(3), ..Default::default() }] {
        let params = BurnDateParams {
            patch,
            ..Default::default()
        };
        let whole = scan_year_whole(&source, &aoi, &range, &params, &Default::default()).unwrap();
        assert!(whole.set_count() > 0);

        for mode in [ProcessingMode::Sequential, ProcessingMode::ParallelWith(3)] {
            let tiling = TilingParams {
                tile_size: 3,
                mode,
                ..Default::default()
            };
            let tiled = scan_year_tiled(&source, &aoi, &range, &params, &tiling).unwrap();
            assert!(tiled.same_events(&whole), "tiled scan differs with {:?}", mode);
        }
    }
}

#[test]
fn tiled_scan_of_sub_window_keeps_georeference() {
    let source = mosaic_source();
    let aoi = PixelWindow::new(2, 1, 4, 3);
    let range = YearRange::calendar(2021).unwrap();
    let tiling = TilingParams {
        tile_size: 2,
        ..Default::default()
    };

    let events = scan_year_tiled(&source, &aoi, &range, &BurnDateParams::default(), &tiling).unwrap();
    assert_eq!(events.shape(), (4, 3));
    assert_eq!(events.doy().transform().origin_x, 300_030.0);
    assert_eq!(events.doy().transform().origin_y, 8_339_940.0);

    let outside = PixelWindow::new(5, 0, 4, 5);
    assert!(scan_year_tiled(&source, &outside, &range, &BurnDateParams::default(), &tiling).is_err());
}

/// Fails every request touching 2020-07-01 and counts fetches.
struct PartiallyBroken {
    inner: MemorySource,
    fetches: AtomicUsize,
}

impl ObservationSource for PartiallyBroken {
    fn grid(&self) -> burnscan_acquisition::Result<GridSpec> {
        self.inner.grid()
    }

    fn fetch(&self, request: &AcquisitionRequest) -> burnscan_acquisition::Result<Vec<Observation>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if request.covers(ymd(2020, 7, 1)) {
            return Err(AcquisitionError::Manifest("archive for 2020 is unreadable".into()));
        }
        self.inner.fetch(request)
    }
}

#[test]
fn failed_year_does_not_affect_others() {
    let source = PartiallyBroken {
        inner: mosaic_source(),
        fetches: AtomicUsize::new(0),
    };
    let aoi = PixelWindow::new(0, 0, 7, 5);
    let ranges = [YearRange::calendar(2020).unwrap(), YearRange::calendar(2021).unwrap()];
    let tiling = TilingParams {
        tile_size: 4,
        ..Default::default()
    };

    let outcomes = scan_years(&source, &aoi, &ranges, &BurnDateParams::default(), &tiling).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].year(), 2020);
    assert!(outcomes[0].result.is_err());

    let expected = scan_year_whole(&source.inner, &aoi, &ranges[1], &BurnDateParams::default(), &Default::default())
        .unwrap();
    let got = outcomes[1].result.as_ref().unwrap();
    assert!(got.same_events(&expected));
}

#[test]
fn configuration_errors_stop_before_any_fetch() {
    let source = PartiallyBroken {
        inner: mosaic_source(),
        fetches: AtomicUsize::new(0),
    };
    let aoi = PixelWindow::new(0, 0, 7, 5);
    let inverted = YearRange {
        start: ymd(2021, 6, 1),
        end: ymd(2021, 5, 1),
    };
    let ranges = [YearRange::calendar(2020).unwrap(), inverted];

    assert!(scan_years(&source, &aoi, &ranges, &BurnDateParams::default(), &TilingParams::default()).is_err());

    let mut bad_threshold = BurnDateParams::default();
    bad_threshold.change.brightness_threshold = f64::NAN;
    let ok_ranges = [YearRange::calendar(2021).unwrap()];
    assert!(scan_years(&source, &aoi, &ok_ranges, &bad_threshold, &TilingParams::default()).is_err());

    let zero_tiles = TilingParams {
        tile_size: 0,
        ..Default::default()
    };
    assert!(scan_years(&source, &aoi, &ok_ranges, &BurnDateParams::default(), &zero_tiles).is_err());

    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn raster_of(values: &[f64]) -> Raster<f64> {
    Raster::from_vec(values.to_vec(), 1, values.len()).unwrap()
}

fn candidate_strategy() -> impl Strategy<Value = Vec<Vec<Option<(i32, i32)>>>> {
    proptest::collection::vec(
        proptest::collection::vec(proptest::option::of((2020i32..2022, 0i32..365)), 9),
        1..6,
    )
}

fn candidate_raster(tags: &[Option<(i32, i32)>]) -> EventRaster {
    let mut ev = EventRaster::unset(2021, &Raster::<f64>::new(3, 3));
    for (i, tag) in tags.iter().enumerate() {
        if let Some((y, d)) = tag {
            ev.offer(i / 3, i % 3, EventTag::new(*y, *d)).unwrap();
        }
    }
    ev
}

fn fold(candidates: &[Vec<Option<(i32, i32)>>]) -> EventRaster {
    let mut acc = EventRaster::unset(2021, &Raster::<f64>::new(3, 3));
    for c in candidates {
        acc.merge(&candidate_raster(c)).unwrap();
    }
    acc
}

proptest! {
    #[test]
    fn merge_order_does_not_matter(
        (original, shuffled) in candidate_strategy()
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        prop_assert!(fold(&original).same_events(&fold(&shuffled)));
    }

    #[test]
    fn raising_threshold_only_removes_pixels(
        pairs in proptest::collection::vec((-15_000.0f64..30_000.0, -15_000.0f64..30_000.0), 1..24),
        low in 0.0f64..20_000.0,
        extra in 0.0f64..20_000.0,
    ) {
        let before: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let after: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let zeros = raster_of(&vec![0.0; pairs.len()]);
        let (b, a) = (raster_of(&before), raster_of(&after));

        let loose = burn_change(&zeros, &zeros, &b, &a, &BurnChangeParams { brightness_threshold: low }).unwrap();
        let strict = burn_change(&zeros, &zeros, &b, &a, &BurnChangeParams { brightness_threshold: low + extra }).unwrap();

        for (s, l) in strict.mask.data().iter().zip(loose.mask.data().iter()) {
            if *s == MASK_CHANGED {
                prop_assert_eq!(*l, MASK_CHANGED);
            }
        }
    }

    #[test]
    fn swapping_sides_with_negated_threshold_is_symmetric(
        pairs in proptest::collection::vec((-15_000.0f64..30_000.0, -15_000.0f64..30_000.0), 1..24),
        threshold in -20_000.0f64..20_000.0,
    ) {
        let before: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let after: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let zeros = raster_of(&vec![0.0; pairs.len()]);
        let (b, a) = (raster_of(&before), raster_of(&after));

        let forward = burn_change(&zeros, &zeros, &b, &a, &BurnChangeParams { brightness_threshold: threshold }).unwrap();
        let backward = burn_change(&zeros, &zeros, &a, &b, &BurnChangeParams { brightness_threshold: -threshold }).unwrap();
        prop_assert_eq!(forward.mask.data(), backward.mask.data());
    }
}

/// 2x2 series where pixel `i` burns from observation `steps[i]` on.
fn stepped_series(steps: &[Option<i64>]) -> Vec<Observation> {
    (0..20)
        .map(|i| {
            let d = ymd(2021, 3, 1) + Duration::days(i * 8);
            let steps = steps.to_vec();
            scene(d, 2, 2, move |r, c| steps[r * 2 + c].map_or(false, |s| i >= s), |_, _| false)
        })
        .collect()
}

fn detection_order() -> impl Strategy<Value = Vec<usize>> {
    let range = YearRange::calendar(2021).unwrap();
    let count = scan_windows(&range, &ScanParams::default()).unwrap().len();
    Just((0..count).collect::<Vec<_>>()).prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn shuffled_window_detections_reduce_to_the_same_raster(
        steps in proptest::collection::vec(proptest::option::of(2i64..18), 4),
        order in detection_order(),
    ) {
        let range = YearRange::calendar(2021).unwrap();
        let params = BurnDateParams::default();
        let stacks = derive_year(&stepped_series(&steps), &range, &params).unwrap();
        let tpl = template(2, 2);
        let windows = scan_windows(&range, &params.scan).unwrap();
        let detections: Vec<EventRaster> = windows
            .iter()
            .map(|w| detect_window(&tpl, &stacks, w, &range, &params).unwrap().candidates)
            .collect();

        let mut shuffled = EventRaster::unset(2021, &tpl);
        for &i in &order {
            shuffled.merge(&detections[i]).unwrap();
        }
        let in_order = scan_stacks(&tpl, &stacks, &range, &params).unwrap();
        prop_assert!(shuffled.same_events(&in_order));
        for (i, step) in steps.iter().enumerate() {
            prop_assert_eq!(in_order.is_set(i / 2, i % 2), step.is_some());
        }
    }
}

#[test]
fn zero_threshold_symmetry_uses_signed_zero() {
    let b = raster_of(&[100.0, 200.0, 150.0]);
    let a = raster_of(&[200.0, 100.0, 150.0]);
    let zeros = raster_of(&[0.0; 3]);

    let forward = burn_change(&zeros, &zeros, &b, &a, &BurnChangeParams { brightness_threshold: 0.0 }).unwrap();
    let backward = burn_change(&zeros, &zeros, &a, &b, &BurnChangeParams { brightness_threshold: -0.0 }).unwrap();
    assert_eq!(forward.mask.data(), backward.mask.data());
    assert_eq!(forward.changed_count(), 2);
}
