//! Core types for holographic field processing
//!
//! This module defines the scalar types shared by every stage of the
//! pipeline and the error type returned by all fallible operations.
//!
//! ## Complex fields
//!
//! An optical field at a plane is a complex amplitude per pixel:
//!
//! ```text
//!            Im
//!            ^
//!            |     * u = A·e^(iφ)
//!            |    /
//!            |   /  A = |u|   (amplitude)
//!            |  /   φ = arg u (phase, rad)
//!            | /
//!   ---------+---------> Re
//!            |
//! ```
//!
//! Detectors only record intensity `|u|²`; holography recovers `φ` by
//! interfering `u` with a known tilted reference wave.

use num_complex::Complex64;
use std::collections::BTreeSet;
use std::f64::consts::PI;

use crate::reconstruction::ReconstructionMode;
use crate::synthesis::Prerequisite;

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// Result type for holography operations
pub type HoloResult<T> = Result<T, HoloError>;

/// Errors that can occur while synthesizing or reconstructing holograms
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HoloError {
    #[error("Invalid wavelength: {0} um. Must be positive and finite")]
    InvalidWavelength(f64),

    #[error("Invalid magnification: {0}. Must be positive and finite")]
    InvalidMagnification(f64),

    #[error("Invalid numerical aperture: {0}. Must be in (0, 1]")]
    InvalidNumericalAperture(f64),

    #[error("Invalid focal length: {0} um. Must be positive and finite")]
    InvalidFocalLength(f64),

    #[error("Invalid pixel pitch: {0} um. Must be positive and finite")]
    InvalidPixelPitch(f64),

    #[error("Invalid sample size: {0} um. Must be positive and finite")]
    InvalidSampleSize(f64),

    #[error("Invalid angle: {0} rad. Must be within [-2pi, 2pi]")]
    InvalidAngle(f64),

    #[error("Invalid {name}: {value}")]
    InvalidValue { name: &'static str, value: f64 },

    #[error("Empty field: width and height must be non-zero")]
    EmptyField,

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Buffer length {actual} does not match {width}x{height}")]
    BufferLength {
        width: usize,
        height: usize,
        actual: usize,
    },

    #[error("Filter rectangle {rect:?} lies outside a {width}x{height} field")]
    RectOutOfBounds {
        rect: (usize, usize, usize, usize),
        width: usize,
        height: usize,
    },

    #[error("Missing synthesis prerequisites: {}", format_missing(.0))]
    MissingPrerequisites(BTreeSet<Prerequisite>),

    #[error("No filter selected")]
    NoFilterSelected,

    #[error("{0} reconstruction is disabled until a filter is set")]
    ModeDisabled(ReconstructionMode),

    #[error("Ill-conditioned tilt on {axis} axis: |f*lambda/(L*pitch)| = {ratio} > 1")]
    IllConditionedTilt { axis: char, ratio: f64 },

    #[error("No input images were supplied")]
    NoInputImages,

    #[error("Worker error: {0}")]
    Worker(String),
}

fn format_missing(missing: &BTreeSet<Prerequisite>) -> String {
    missing
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate that `value` is a positive, finite number.
pub(crate) fn ensure_positive(value: f64, err: fn(f64) -> HoloError) -> HoloResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(err(value))
    }
}

/// Validate an interference angle against the accepted [-2pi, 2pi] window.
pub(crate) fn ensure_angle(value: f64) -> HoloResult<f64> {
    if value.is_finite() && (-2.0 * PI..=2.0 * PI).contains(&value) {
        Ok(value)
    } else {
        Err(HoloError::InvalidAngle(value))
    }
}

/// Helper functions for working with complex samples
pub mod complex_ops {
    use super::*;

    /// Create a complex number from magnitude and phase
    #[inline]
    pub fn from_polar(magnitude: f64, phase: f64) -> Complex {
        Complex::new(magnitude * phase.cos(), magnitude * phase.sin())
    }

    /// Wrap a phase value into (-pi, pi]
    #[inline]
    pub fn wrap_phase(phase: f64) -> f64 {
        let wrapped = (phase + PI).rem_euclid(2.0 * PI) - PI;
        if wrapped <= -PI {
            wrapped + 2.0 * PI
        } else {
            wrapped
        }
    }

    /// Smallest signed difference between two phases, in (-pi, pi]
    #[inline]
    pub fn phase_distance(a: f64, b: f64) -> f64 {
        wrap_phase(a - b)
    }
}
