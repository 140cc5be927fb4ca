//! burnscan CLI - earliest burn-date detection over satellite time series

mod config;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use burnscan_acquisition::{DirectorySource, ObservationSource};
use burnscan_algorithms::fire::{scan_windows, scan_years, AnchorSpan, EventRaster, ScanParams, YearRange};
use burnscan_algorithms::statistics::{BurnHistory, PixelArea, DEFAULT_SEASON_CUTOFF};
use burnscan_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use burnscan_core::Raster;

use config::RunConfig;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "burnscan")]
#[command(author, version, about = "Per-pixel burn-date detection from optical time series", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every configured year and write event and history rasters
    Scan {
        /// TOML run file
        #[arg(short, long)]
        config: PathBuf,
        /// Output directory (overrides [output] dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Recompute history outputs from previously written year rasters
    History {
        /// Directory holding burn_<year>_doy.tif / burn_<year>_year.tif
        #[arg(short, long)]
        dir: PathBuf,
        /// Years to include, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        years: Vec<i32>,
        /// Reference year for years-since-fire (default: the present year)
        #[arg(long)]
        current_year: Option<i32>,
        /// First day of year counted as late season
        #[arg(long, default_value_t = DEFAULT_SEASON_CUTOFF)]
        cutoff: i32,
        /// Fixed pixel area in m² (default: from the raster grid)
        #[arg(long)]
        pixel_area: Option<f64>,
    },
    /// Print the scan windows for a date range
    Windows {
        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// Days between anchors
        #[arg(long, default_value = "3")]
        cadence: u32,
        /// Days on each side of an anchor
        #[arg(long, default_value = "15")]
        half_window: u32,
        /// Anchor span: extended or nominal
        #[arg(long, default_value = "extended")]
        span: AnchorSpan,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn doy_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("burn_{}_doy.tif", year))
}

fn year_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("burn_{}_year.tif", year))
}

fn write_i32(raster: &Raster<i32>, path: &Path) -> Result<()> {
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn write_events(events: &EventRaster, dir: &Path) -> Result<()> {
    let year = events.scan_year();
    write_i32(events.doy(), &doy_path(dir, year))?;
    write_i32(events.year(), &year_path(dir, year))?;
    info!("{}: wrote {}", year, doy_path(dir, year).display());
    Ok(())
}

fn read_events(dir: &Path, year: i32) -> Result<EventRaster> {
    let doy: Raster<i32> = read_geotiff(doy_path(dir, year))
        .with_context(|| format!("Failed to read {}", doy_path(dir, year).display()))?;
    let years: Raster<i32> = read_geotiff(year_path(dir, year))
        .with_context(|| format!("Failed to read {}", year_path(dir, year).display()))?;
    Ok(EventRaster::from_bands(year, doy, years)?)
}

/// Years-since-fire, season frequencies and burned area over `history`.
fn write_history(
    history: &BurnHistory,
    dir: &Path,
    current_year: i32,
    cutoff: i32,
    pixel_area: PixelArea,
) -> Result<()> {
    let pb = spinner("Writing burn history...");

    let ysf = history.years_since_fire(current_year)?;
    write_i32(&ysf, &dir.join("years_since_fire.tif"))?;

    let freq = history.season_frequency(cutoff)?;
    write_i32(&freq.early, &dir.join("early_season_frequency.tif"))?;
    write_i32(&freq.late, &dir.join("late_season_frequency.tif"))?;

    let areas = history.burned_area(cutoff, pixel_area)?;
    let json = serde_json::to_string_pretty(&areas)?;
    let area_path = dir.join("burned_area.json");
    std::fs::write(&area_path, json).with_context(|| format!("Failed to write {}", area_path.display()))?;
    pb.finish_and_clear();

    for a in &areas {
        println!(
            "  {}: {:.2} ha burned ({:.2} ha early, {:.2} ha late)",
            a.year,
            a.total_ha(),
            a.early_ha(),
            a.late_ha()
        );
    }
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_scan(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let mut config = RunConfig::from_path(config_path)?;
    if let Some(dir) = output {
        config.output.dir = dir;
    }
    config.validate()?;

    let ranges = config.ranges()?;
    let params = config.params();
    let tiling = config.tiling();
    let out_dir = config.output.dir.clone();

    let pb = spinner("Opening scene manifest...");
    let source = DirectorySource::open(&config.source.manifest, config.source.options())
        .context("Failed to open scene manifest")?;
    let grid = source.grid()?;
    let aoi = config.aoi.resolve(&grid)?;
    pb.finish_and_clear();
    info!(
        "Grid {}x{}, AOI {}x{} at ({}, {}), {} scene(s)",
        grid.rows,
        grid.cols,
        aoi.rows,
        aoi.cols,
        aoi.row_off,
        aoi.col_off,
        source.manifest().scenes.len()
    );

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let start = Instant::now();
    let pb = spinner(&format!("Scanning {} year(s)...", ranges.len()));
    let outcomes = scan_years(&source, &aoi, &ranges, &params, &tiling)?;
    pb.finish_and_clear();

    let mut finished = Vec::new();
    let mut failed = Vec::new();
    for outcome in outcomes {
        let year = outcome.year();
        match outcome.result {
            Ok(events) => {
                write_events(&events, &out_dir)?;
                finished.push(events);
            }
            Err(e) => {
                error!("{}: {}", year, e);
                failed.push(year);
            }
        }
    }

    if !finished.is_empty() {
        let history = BurnHistory::new(finished)?;
        write_history(
            &history,
            &out_dir,
            config.current_year(),
            config.season.cutoff,
            config.pixel_area(),
        )?;
    }
    done("Burn scan", &out_dir, start.elapsed());

    if !failed.is_empty() {
        bail!(
            "{} of {} year(s) failed: {:?}",
            failed.len(),
            ranges.len(),
            failed
        );
    }
    Ok(())
}

fn run_history(
    dir: &Path,
    years: &[i32],
    current_year: Option<i32>,
    cutoff: i32,
    pixel_area: Option<f64>,
) -> Result<()> {
    if !(1..=366).contains(&cutoff) {
        bail!("cutoff {} must be in 1..=366", cutoff);
    }
    let pixel_area = match pixel_area {
        Some(a) if a.is_finite() && a > 0.0 => PixelArea::Fixed(a),
        Some(a) => bail!("pixel area {} must be a positive number", a),
        None => PixelArea::FromGrid,
    };

    let pb = spinner("Reading year rasters...");
    let stack = years
        .iter()
        .map(|&y| read_events(dir, y))
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();

    let history = BurnHistory::new(stack)?;
    let current = current_year.unwrap_or_else(|| Local::now().year());

    let start = Instant::now();
    write_history(&history, dir, current, cutoff, pixel_area)?;
    done("Burn history", dir, start.elapsed());
    Ok(())
}

fn run_windows(start: NaiveDate, end: NaiveDate, params: &ScanParams) -> Result<()> {
    let range = YearRange::new(start, end)?;
    let windows = scan_windows(&range, params)?;
    println!("Range: {} (reported as {})", range, range.year());
    println!("Windows: {}", windows.len());
    for w in &windows {
        println!("  {}  tag {}", w, w.tag());
    }
    Ok(())
}

fn run_info(input: &Path) -> Result<()> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(input).context("Failed to read raster")?;
    pb.finish_and_clear();

    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    let total = raster.len().max(1);
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / total as f64
    );
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Scan { config, output } => run_scan(&config, output),
        Commands::History {
            dir,
            years,
            current_year,
            cutoff,
            pixel_area,
        } => run_history(&dir, &years, current_year, cutoff, pixel_area),
        Commands::Windows {
            start,
            end,
            cadence,
            half_window,
            span,
        } => {
            let params = ScanParams {
                cadence_days: cadence,
                half_window_days: half_window,
                anchor_span: span,
            };
            run_windows(start, end, &params)
        }
        Commands::Info { input } => run_info(&input),
    }
}
