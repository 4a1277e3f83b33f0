//! Types and helpers shared by every crate in the loyalty workspace.
mod points;

pub mod helpers;

pub use points::{Points, PointsConversionError};
