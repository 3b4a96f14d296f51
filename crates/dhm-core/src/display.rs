//! 8-bit presentation of reconstructed images
//!
//! Rendering is a one-way remap for the display sink. The numerical
//! [`ReconstructionOutput`] is never modified.
//!
//! Each image carries a straight-line calibration so a viewer can map a
//! displayed grey level back to the physical value:
//!
//! ```text
//! value = b + m·pixel,   b = min,   m = (max - min) / 255
//! ```
//!
//! `min` and `max` are taken after the optional `ln(1 + x)` remap.
//!
//! A spectrum shown without the log remap is histogram-equalised instead,
//! using square-root weighted bins. Its grey levels are then no longer
//! linear in the value and `equalized` is set.

use crate::field::RealField;
use crate::reconstruction::{Calibration, ReconstructionMode, ReconstructionOutput};

/// Grey level to value mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueCalibration {
    pub offset: f64,
    pub slope: f64,
    pub unit: &'static str,
}

impl ValueCalibration {
    #[inline]
    pub fn value(&self, pixel: u8) -> f64 {
        self.offset + self.slope * f64::from(pixel)
    }
}

/// Rendered 8-bit image
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayImage {
    pub width: usize,
    pub height: usize,
    /// Row-major grey levels
    pub pixels: Vec<u8>,
    pub value_calibration: ValueCalibration,
    pub spatial_calibration: Option<Calibration>,
    /// Whether the log remap was applied
    pub log_scaled: bool,
    /// Whether the grey levels were histogram-equalised after the rescale
    pub equalized: bool,
}

impl DisplayImage {
    /// Render an output, applying `ln(1 + x)` when requested and meaningful
    pub fn render(output: &ReconstructionOutput, log_scale: bool) -> Self {
        let log_scaled = log_scale && output.mode.supports_log_scale();
        let mut image = Self::from_field(&output.data, log_scaled, output.value_unit);
        image.spatial_calibration = output.calibration;
        if output.mode == ReconstructionMode::Spectrum && !log_scaled {
            image.equalize();
        }
        image
    }

    /// Linear 0..=255 rescale of an arbitrary real field
    pub fn from_field(field: &RealField, log_scaled: bool, unit: &'static str) -> Self {
        let values = if log_scaled {
            field.map(|v| v.max(0.0).ln_1p())
        } else {
            field.clone()
        };

        let (min, max) = (values.min(), values.max());
        let span = max - min;
        let pixels = values
            .data()
            .iter()
            .map(|&v| {
                if span > 0.0 && span.is_finite() {
                    ((v - min) / span * 255.0).round().clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect();

        Self {
            width: field.width(),
            height: field.height(),
            pixels,
            value_calibration: ValueCalibration {
                offset: min,
                slope: span / 255.0,
                unit,
            },
            spatial_calibration: None,
            log_scaled,
            equalized: false,
        }
    }

    /// Spread grey levels by the square-root weighted histogram
    pub fn equalize(&mut self) {
        let mut histogram = [0u32; 256];
        for &p in &self.pixels {
            histogram[usize::from(p)] += 1;
        }
        let weight = |i: usize| f64::from(histogram[i]).sqrt();

        let mut sum = weight(0) + weight(255);
        for i in 1..255 {
            sum += 2.0 * weight(i);
        }
        if sum <= 0.0 {
            return;
        }
        let scale = 255.0 / sum;

        let mut lut = [0u8; 256];
        lut[255] = 255;
        let mut acc = weight(0);
        for i in 1..255 {
            let delta = weight(i);
            acc += delta;
            lut[i] = (acc * scale).round().clamp(0.0, 255.0) as u8;
            acc += delta;
        }

        for p in &mut self.pixels {
            *p = lut[usize::from(*p)];
        }
        self.equalized = true;
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * self.width + x]
    }
}

/// Mode-aware title, e.g. "Phase of camera0"
pub fn title(mode: ReconstructionMode, source: &str) -> String {
    format!("{mode} of {source}")
}
