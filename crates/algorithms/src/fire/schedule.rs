//! Scan schedule: year ranges, scan windows and anchor enumeration.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use burnscan_core::{Error, Result};

use super::event::EventTag;

/// Which anchors a year scan visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorSpan {
    /// `start - half_window ..= end + half_window`, so observations near
    /// the year edges are reached from partial windows. Candidates dated
    /// outside `start ..= end` are still dropped.
    #[default]
    Extended,
    /// `start ..= end` only.
    Nominal,
}

impl std::str::FromStr for AnchorSpan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extended" => Ok(AnchorSpan::Extended),
            "nominal" => Ok(AnchorSpan::Nominal),
            other => Err(Error::invalid("scan.anchor_span", other, "expected 'extended' or 'nominal'")),
        }
    }
}

/// Scan cadence and window width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Days between consecutive anchors. Default: 3
    pub cadence_days: u32,
    /// Width of each side of the window. Default: 15
    pub half_window_days: u32,
    pub anchor_span: AnchorSpan,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            cadence_days: 3,
            half_window_days: 15,
            anchor_span: AnchorSpan::Extended,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<()> {
        if self.cadence_days == 0 || self.cadence_days > 366 {
            return Err(Error::invalid("scan.cadence_days", self.cadence_days, "must be in 1..=366"));
        }
        if self.half_window_days == 0 || self.half_window_days > 183 {
            return Err(Error::invalid(
                "scan.half_window_days",
                self.half_window_days,
                "must be in 1..=183",
            ));
        }
        Ok(())
    }

    fn half(&self) -> Duration {
        Duration::days(i64::from(self.half_window_days))
    }
}

/// Inclusive date range scanned as one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl YearRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// 1 January to 31 December of `year`.
    pub fn calendar(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::invalid("years", year, "year out of range"))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| Error::invalid("years", year, "year out of range"))?;
        Self::new(start, end)
    }

    /// Year the range is reported under; also the reference year for day
    /// offsets.
    pub fn year(&self) -> i32 {
        self.start.year()
    }

    /// Whether `date` falls inside `start ..= end`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(Error::invalid(
                "years",
                self,
                "end date precedes start date",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Before/after interval pair around one anchor.
///
/// Before covers `[before_start, anchor)`, after covers `[anchor, after_end]`.
/// The two are disjoint and meet at the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanWindow {
    pub before_start: NaiveDate,
    pub anchor: NaiveDate,
    pub after_end: NaiveDate,
}

impl ScanWindow {
    pub fn around(anchor: NaiveDate, params: &ScanParams) -> Self {
        Self {
            before_start: anchor - params.half(),
            anchor,
            after_end: anchor + params.half(),
        }
    }

    /// Exclusive end of the before side.
    pub fn before_end(&self) -> NaiveDate {
        self.anchor
    }

    /// Inclusive start of the after side.
    pub fn after_start(&self) -> NaiveDate {
        self.anchor
    }

    pub fn in_before(&self, date: NaiveDate) -> bool {
        date >= self.before_start && date < self.anchor
    }

    pub fn in_after(&self, date: NaiveDate) -> bool {
        date >= self.anchor && date <= self.after_end
    }

    /// Calendar tag of the anchor date.
    pub fn tag(&self) -> EventTag {
        EventTag::from_date(self.anchor)
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} | {} | {}]", self.before_start, self.anchor, self.after_end)
    }
}

/// Scan windows for one year, in increasing anchor order.
pub fn scan_windows(range: &YearRange, params: &ScanParams) -> Result<Vec<ScanWindow>> {
    range.validate()?;
    params.validate()?;

    let (first, last) = match params.anchor_span {
        AnchorSpan::Extended => (range.start - params.half(), range.end + params.half()),
        AnchorSpan::Nominal => (range.start, range.end),
    };

    let step = Duration::days(i64::from(params.cadence_days));
    let mut windows = Vec::new();
    let mut anchor = first;
    while anchor <= last {
        windows.push(ScanWindow::around(anchor, params));
        anchor += step;
    }
    Ok(windows)
}

/// Inclusive date range of observations any window of the year can use.
pub fn acquisition_span(range: &YearRange, params: &ScanParams) -> Result<(NaiveDate, NaiveDate)> {
    let windows = scan_windows(range, params)?;
    match (windows.first(), windows.last()) {
        (Some(first), Some(last)) => Ok((first.before_start, last.after_end)),
        _ => Err(Error::invalid("years", range, "no scan anchors in range")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extended_anchors() {
        let range = YearRange::calendar(2021).unwrap();
        let windows = scan_windows(&range, &ScanParams::default()).unwrap();

        assert_eq!(windows[0].anchor, date(2020, 12, 17));
        assert_eq!(windows[1].anchor, date(2020, 12, 20));
        let last = windows.last().unwrap();
        assert!(last.anchor <= date(2022, 1, 15));
        assert!(last.anchor + Duration::days(3) > date(2022, 1, 15));
        // 365 + 30 days of anchor span, every third day
        assert_eq!(windows.len(), 132);
    }

    #[test]
    fn test_nominal_anchors() {
        let range = YearRange::new(date(2021, 6, 1), date(2021, 6, 10)).unwrap();
        let params = ScanParams {
            anchor_span: AnchorSpan::Nominal,
            ..Default::default()
        };
        let anchors: Vec<NaiveDate> = scan_windows(&range, &params).unwrap().iter().map(|w| w.anchor).collect();
        assert_eq!(anchors, vec![date(2021, 6, 1), date(2021, 6, 4), date(2021, 6, 7), date(2021, 6, 10)]);
    }

    #[test]
    fn test_window_sides_are_disjoint() {
        let w = ScanWindow::around(date(2021, 6, 15), &ScanParams::default());
        assert_eq!(w.before_start, date(2021, 5, 31));
        assert_eq!(w.after_end, date(2021, 6, 30));
        assert!(w.in_before(date(2021, 6, 14)));
        assert!(!w.in_before(date(2021, 6, 15)));
        assert!(w.in_after(date(2021, 6, 15)));
        assert!(w.in_after(date(2021, 6, 30)));
        assert!(!w.in_after(date(2021, 7, 1)));
        assert_eq!(w.before_end(), w.after_start());
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = YearRange::calendar(2021).unwrap();
        assert!(range.contains(date(2021, 1, 1)));
        assert!(range.contains(date(2021, 12, 31)));
        assert!(!range.contains(date(2020, 12, 31)));
        assert!(!range.contains(date(2022, 1, 1)));
    }

    #[test]
    fn test_acquisition_span() {
        let range = YearRange::calendar(2021).unwrap();
        let (from, to) = acquisition_span(&range, &ScanParams::default()).unwrap();
        assert_eq!(from, date(2020, 12, 2));
        assert!(to >= date(2022, 1, 15));
    }

    #[test]
    fn test_configuration_errors() {
        assert!(YearRange::new(date(2021, 6, 1), date(2021, 5, 1)).is_err());
        let range = YearRange::calendar(2021).unwrap();
        for params in [
            ScanParams { cadence_days: 0, ..Default::default() },
            ScanParams { half_window_days: 0, ..Default::default() },
        ] {
            assert!(scan_windows(&range, &params).is_err());
        }
        assert!("sideways".parse::<AnchorSpan>().is_err());
        assert_eq!("Nominal".parse::<AnchorSpan>().unwrap(), AnchorSpan::Nominal);
    }
}
