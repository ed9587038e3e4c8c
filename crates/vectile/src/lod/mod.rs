//! Level estimation for spherical tile cells.
//!
//! # Level Convention
//!
//! Level 0 = the whole planet in one tile, higher level = finer detail.
//! An estimate is a [`LodRange`]: the rounded minimum and maximum ideal
//! levels over the cell's visible footprint plus their unrounded mean.
//!
//! # Module Structure
//!
//! - [`range`]: `LodRange` and the `LevelEstimator` seam used by the walker
//! - [`calculator`]: `LodCalculator` - camera-driven adaptive estimator

pub mod calculator;
pub mod range;

pub use calculator::LodCalculator;
pub use range::{LevelEstimator, LodRange};
