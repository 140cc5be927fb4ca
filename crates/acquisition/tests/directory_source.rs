//! Directory source against real GeoTIFF files on disk.

use std::path::Path;

use burnscan_acquisition::{
    fetch_with_retry, AcquisitionRequest, BBox, DirectoryOptions, DirectorySource,
    ObservationSource, PixelWindow, RetryPolicy,
};
use burnscan_core::io::write_geotiff;
use burnscan_core::{GeoTransform, Raster, SpectralBand};
use chrono::NaiveDate;

fn write_band(dir: &Path, name: &str, value: f64) {
    let mut r = Raster::filled(8, 10, value);
    r.set_transform(GeoTransform::new(300_000.0, 8_340_000.0, 30.0, -30.0));
    write_geotiff(&r, dir.join(name), None).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();

    write_band(p, "a_b11.tif", 2000.0);
    write_band(p, "a_b12.tif", 1500.0);
    write_band(p, "b_b11.tif", 1800.0);
    write_band(p, "b_b12.tif", 2600.0);

    // Second scene is cloudy in its top-left corner.
    let mut q = Raster::filled(8, 10, 0.95);
    q.set_transform(GeoTransform::new(300_000.0, 8_340_000.0, 30.0, -30.0));
    q.set(0, 0, 0.2).unwrap();
    write_geotiff(&q, p.join("b_q.tif"), None).unwrap();

    let manifest = r#"{
        "crs_epsg": 32735,
        "scenes": [
            {"id": "b", "acquired": "2021-07-05",
             "bands": {"B11": "b_b11.tif", "B12": "b_b12.tif"}, "quality": "b_q.tif"},
            {"id": "a", "acquired": "2021-07-02",
             "bands": {"B11": "a_b11.tif", "B12": "a_b12.tif"}}
        ]
    }"#;
    std::fs::write(p.join("manifest.json"), manifest).unwrap();
    dir
}

fn open(dir: &Path) -> DirectorySource {
    DirectorySource::open(dir.join("manifest.json"), DirectoryOptions::default()).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_grid_probed_from_first_band() {
    let dir = fixture();
    let source = open(dir.path());
    let grid = source.grid().unwrap();

    assert_eq!((grid.rows, grid.cols), (8, 10));
    assert_eq!(grid.crs.as_ref().and_then(|c| c.epsg()), Some(32735));
    assert_eq!(grid.transform.pixel_width, 30.0);
}

#[test]
fn test_fetch_orders_by_date_and_masks_clouds() {
    let dir = fixture();
    let source = open(dir.path());

    let request = AcquisitionRequest::new(
        "t0_0",
        PixelWindow::new(0, 0, 4, 5),
        date(2021, 7, 1),
        date(2021, 7, 31),
    );
    let obs = fetch_with_retry(&source, &request, &RetryPolicy::default()).unwrap();

    assert_eq!(obs.len(), 2);
    assert_eq!(obs[0].acquired(), date(2021, 7, 2));
    assert_eq!(obs[1].acquired(), date(2021, 7, 5));
    assert_eq!(obs[0].shape().unwrap(), (4, 5));

    assert!(!obs[1].is_valid_at(0, 0));
    assert!(obs[1].is_valid_at(0, 1));
    let swir2 = obs[1].band(SpectralBand::Swir2).unwrap();
    assert_eq!(swir2.get(1, 1).unwrap(), 2600.0);
}

#[test]
fn test_date_filter_is_inclusive() {
    let dir = fixture();
    let source = open(dir.path());

    let request = AcquisitionRequest::new(
        "t0_0",
        PixelWindow::new(2, 2, 2, 2),
        date(2021, 7, 5),
        date(2021, 7, 5),
    );
    let obs = source.fetch(&request).unwrap();
    assert_eq!(obs.len(), 1);
    assert_eq!(obs[0].acquired(), date(2021, 7, 5));
}

#[test]
fn test_unmasked_when_threshold_disabled() {
    let dir = fixture();
    let options = DirectoryOptions {
        clear_threshold: None,
        ..Default::default()
    };
    let source = DirectorySource::open(dir.path().join("manifest.json"), options).unwrap();

    let request = AcquisitionRequest::new(
        "t0_0",
        PixelWindow::new(0, 0, 1, 1),
        date(2021, 7, 5),
        date(2021, 7, 5),
    );
    let obs = source.fetch(&request).unwrap();
    assert!(obs[0].is_valid_at(0, 0));
}

#[test]
fn test_missing_band_file_is_not_transient() {
    let dir = fixture();
    std::fs::remove_file(dir.path().join("b_b12.tif")).unwrap();
    let source = open(dir.path());

    let request = AcquisitionRequest::new(
        "t3_1",
        PixelWindow::new(0, 0, 2, 2),
        date(2021, 7, 1),
        date(2021, 7, 31),
    );
    let err = fetch_with_retry(&source, &request, &RetryPolicy::default()).unwrap_err();
    let core: burnscan_core::Error = err.into();
    assert!(matches!(
        core,
        burnscan_core::Error::Acquisition { ref tile, attempts: 1, .. } if tile == "t3_1"
    ));
}

#[test]
fn test_aoi_window_on_probed_grid() {
    let dir = fixture();
    let source = open(dir.path());
    let grid = source.grid().unwrap();

    let window = BBox::new(300_060.0, 8_339_850.0, 300_150.0, 8_339_940.0)
        .to_window(&grid)
        .unwrap();
    assert_eq!(window, PixelWindow::new(2, 2, 3, 3));
}
