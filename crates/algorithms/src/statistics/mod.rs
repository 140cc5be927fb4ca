//! Cross-year statistics over finished event rasters
//!
//! - **burn_history**: years since fire, season frequency, burned area

mod burn_history;

pub use burn_history::{
    burned_area, hectares, season_frequency, years_since_fire, BurnHistory, BurnedArea,
    PixelArea, SeasonFrequency, DEFAULT_SEASON_CUTOFF,
};
