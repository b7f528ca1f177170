//! # sk-core
//!
//! Core types and traits for StochKit.
//!
//! This crate provides:
//! - the workspace [`Error`] type and [`Result`] alias,
//! - shared data types ([`Sample`], [`Interval`], [`FitResult`]),
//! - the [`LogDensityModel`] trait that estimation code is written against.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result, check_dimension, check_probability};
pub use traits::LogDensityModel;
pub use types::{FitResult, Interval, Point, Sample};
