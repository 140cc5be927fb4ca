//! TOML run file for `burnscan scan`

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use burnscan_acquisition::{BBox, DirectoryOptions, GridSpec, PixelWindow, RetryPolicy};
use burnscan_algorithms::fire::{
    AnchorSpan, BurnDateParams, DeriveParams, EventTagPolicy, ScanParams, TilingParams, YearRange,
};
use burnscan_algorithms::imagery::{BurnChangeParams, MirbiParams};
use burnscan_algorithms::landscape::PatchParams;
use burnscan_algorithms::statistics::{PixelArea, DEFAULT_SEASON_CUTOFF};
use burnscan_parallel::ProcessingMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub aoi: AoiConfig,
    pub years: Vec<YearConfig>,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub season: SeasonConfig,
    #[serde(default)]
    pub patch: PatchParams,
    #[serde(default)]
    pub tiling: TilingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[source]`: a scene manifest on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub manifest: PathBuf,
    #[serde(default = "default_clear_threshold")]
    pub clear_threshold: f64,
    #[serde(default = "default_true")]
    pub mask_clouds: bool,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_clear_threshold() -> f64 {
    0.70
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    64
}

impl SourceConfig {
    pub fn options(&self) -> DirectoryOptions {
        DirectoryOptions {
            clear_threshold: self.mask_clouds.then_some(self.clear_threshold),
            cache_capacity: self.cache_capacity,
        }
    }
}

/// `[aoi]`: either a bounding box in grid CRS units or a pixel window.
/// Empty means the whole grid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AoiConfig {
    pub bbox: Option<BBox>,
    pub window: Option<WindowConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl AoiConfig {
    pub fn resolve(&self, grid: &GridSpec) -> Result<PixelWindow> {
        match (&self.bbox, &self.window) {
            (Some(_), Some(_)) => bail!("aoi: set either bbox or window, not both"),
            (Some(bbox), None) => Ok(bbox.to_window(grid)?),
            (None, Some(w)) => {
                let window = PixelWindow::new(w.row_off, w.col_off, w.rows, w.cols);
                if window.is_empty() || !window.fits(grid.rows, grid.cols) {
                    bail!(
                        "aoi: window {:?} is empty or outside the {}x{} grid",
                        window,
                        grid.rows,
                        grid.cols
                    );
                }
                Ok(window)
            }
            (None, None) => Ok(grid.full_window()),
        }
    }
}

/// One `[[years]]` entry: a calendar year or an explicit range.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearConfig {
    pub year: Option<i32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl YearConfig {
    pub fn range(&self) -> Result<YearRange> {
        let range = match (self.year, self.start, self.end) {
            (Some(y), None, None) => YearRange::calendar(y)?,
            (None, Some(start), Some(end)) => YearRange::new(start, end)?,
            _ => bail!("years: give either `year` or both `start` and `end`"),
        };
        Ok(range)
    }
}

/// `[scan]`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub cadence_days: u32,
    pub half_window_days: u32,
    pub anchor_span: AnchorSpan,
    pub brightness_threshold: f64,
    pub mirbi_floor: f64,
    pub tag_policy: EventTagPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let scan = ScanParams::default();
        Self {
            cadence_days: scan.cadence_days,
            half_window_days: scan.half_window_days,
            anchor_span: scan.anchor_span,
            brightness_threshold: BurnChangeParams::default().brightness_threshold,
            mirbi_floor: MirbiParams::default().floor,
            tag_policy: EventTagPolicy::default(),
        }
    }
}

/// `[season]`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeasonConfig {
    pub cutoff: i32,
    /// Reference year for years-since-fire; the present year if unset.
    pub current_year: Option<i32>,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_SEASON_CUTOFF,
            current_year: None,
        }
    }
}

/// `[tiling]`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilingConfig {
    pub tile_size: usize,
    /// Worker threads; unset or 0 uses every core.
    pub threads: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for TilingConfig {
    fn default() -> Self {
        let tiling = TilingParams::default();
        Self {
            tile_size: tiling.tile_size,
            threads: None,
            retry: tiling.retry,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Fixed pixel area in m²; taken from the grid when unset.
    pub pixel_area_m2: Option<f64>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("burnscan_out"),
            pixel_area_m2: None,
        }
    }
}

impl RunConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse run configuration")
    }

    /// Load and resolve relative paths against the file's directory.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config = Self::from_toml(&text)?;
        if let Some(base) = path.parent() {
            if config.source.manifest.is_relative() {
                config.source.manifest = base.join(&config.source.manifest);
            }
        }
        Ok(config)
    }

    pub fn params(&self) -> BurnDateParams {
        BurnDateParams {
            scan: ScanParams {
                cadence_days: self.scan.cadence_days,
                half_window_days: self.scan.half_window_days,
                anchor_span: self.scan.anchor_span,
            },
            derive: DeriveParams {
                mirbi: MirbiParams {
                    floor: self.scan.mirbi_floor,
                },
            },
            change: BurnChangeParams {
                brightness_threshold: self.scan.brightness_threshold,
            },
            tag_policy: self.scan.tag_policy,
            patch: self.patch,
        }
    }

    pub fn tiling(&self) -> TilingParams {
        TilingParams {
            tile_size: self.tiling.tile_size,
            mode: ProcessingMode::from_threads(self.tiling.threads),
            retry: self.tiling.retry,
        }
    }

    pub fn ranges(&self) -> Result<Vec<YearRange>> {
        self.years.iter().map(YearConfig::range).collect()
    }

    pub fn pixel_area(&self) -> PixelArea {
        match self.output.pixel_area_m2 {
            Some(a) => PixelArea::Fixed(a),
            None => PixelArea::FromGrid,
        }
    }

    /// Year the history rasters are measured from.
    pub fn current_year(&self) -> i32 {
        self.season.current_year.unwrap_or_else(|| Local::now().year())
    }

    /// Check every setting; nothing is read or written before this passes.
    pub fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            bail!("years: at least one year is required");
        }
        let ranges = self.ranges()?;
        let mut seen = BTreeSet::new();
        for range in &ranges {
            if !seen.insert(range.year()) {
                bail!("years: {} is listed more than once", range.year());
            }
        }

        self.params().validate()?;
        self.tiling().validate()?;
        self.source.options().validate()?;

        if !(1..=366).contains(&self.season.cutoff) {
            bail!("season.cutoff: {} must be in 1..=366", self.season.cutoff);
        }
        if let Some(a) = self.output.pixel_area_m2 {
            if !a.is_finite() || a <= 0.0 {
                bail!("output.pixel_area_m2: {} must be a positive number", a);
            }
        }
        if self.aoi.bbox.is_some() && self.aoi.window.is_some() {
            bail!("aoi: set either bbox or window, not both");
        }
        Ok(())
    }
}
