//! Optical and tuning parameters
//!
//! All lengths are stored internally in micrometres. User-facing values in
//! other units pass through [`LengthUnit::to_um`] at the boundary.
//!
//! ## Parameter sets
//!
//! | Struct | Contents | Lifetime |
//! |--------|----------|----------|
//! | [`OpticalParameters`] | λ, sensor pitch, magnification, NA, tube-lens focal | replaced wholesale on commit |
//! | [`TuningParameters`]  | refocus z, tilt (fx, fy) in px, constant phase | replaced wholesale on commit |
//!
//! Both are validated on construction and immutable afterwards, so a
//! rejected update leaves the previously committed value in place.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ensure_positive, HoloError, HoloResult};

/// Length unit accepted at the configuration boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LengthUnit {
    #[serde(rename = "nm")]
    Nanometer,
    #[default]
    #[serde(rename = "um")]
    Micrometer,
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "cm")]
    Centimeter,
    #[serde(rename = "m")]
    Meter,
}

impl LengthUnit {
    /// Micrometres per unit
    pub fn um_per_unit(&self) -> f64 {
        match self {
            Self::Nanometer => 1e-3,
            Self::Micrometer => 1.0,
            Self::Millimeter => 1e3,
            Self::Centimeter => 1e4,
            Self::Meter => 1e6,
        }
    }

    /// Convert `value` in this unit to micrometres
    pub fn to_um(&self, value: f64) -> f64 {
        value * self.um_per_unit()
    }

    /// Convert `value_um` micrometres to this unit
    pub fn from_um(&self, value_um: f64) -> f64 {
        value_um / self.um_per_unit()
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Nanometer => "nm",
            Self::Micrometer => "um",
            Self::Millimeter => "mm",
            Self::Centimeter => "cm",
            Self::Meter => "m",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Illumination, sampling and microscope parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpticalParameters {
    wavelength_um: f64,
    pitch_x_um: f64,
    pitch_y_um: f64,
    magnification: f64,
    numerical_aperture: f64,
    tube_lens_focal_um: f64,
}

impl OpticalParameters {
    /// Start a builder with typical 40x / 0.65 NA / 633 nm values
    pub fn builder() -> OpticalParametersBuilder {
        OpticalParametersBuilder::default()
    }

    /// Validate and assemble a parameter set (lengths in µm)
    pub fn new(
        wavelength_um: f64,
        pitch_x_um: f64,
        pitch_y_um: f64,
        magnification: f64,
        numerical_aperture: f64,
        tube_lens_focal_um: f64,
    ) -> HoloResult<Self> {
        ensure_positive(wavelength_um, HoloError::InvalidWavelength)?;
        ensure_positive(pitch_x_um, HoloError::InvalidPixelPitch)?;
        ensure_positive(pitch_y_um, HoloError::InvalidPixelPitch)?;
        ensure_positive(magnification, HoloError::InvalidMagnification)?;
        ensure_numerical_aperture(numerical_aperture)?;
        ensure_positive(tube_lens_focal_um, HoloError::InvalidFocalLength)?;

        Ok(Self {
            wavelength_um,
            pitch_x_um,
            pitch_y_um,
            magnification,
            numerical_aperture,
            tube_lens_focal_um,
        })
    }

    pub fn wavelength_um(&self) -> f64 {
        self.wavelength_um
    }

    pub fn pitch_x_um(&self) -> f64 {
        self.pitch_x_um
    }

    pub fn pitch_y_um(&self) -> f64 {
        self.pitch_y_um
    }

    pub fn magnification(&self) -> f64 {
        self.magnification
    }

    pub fn numerical_aperture(&self) -> f64 {
        self.numerical_aperture
    }

    pub fn tube_lens_focal_um(&self) -> f64 {
        self.tube_lens_focal_um
    }

    /// Objective focal length, f_TL / M
    pub fn objective_focal_um(&self) -> f64 {
        self.tube_lens_focal_um / self.magnification
    }

    /// Object-space pixel size (sensor pitch / magnification)
    pub fn sample_pitch_um(&self) -> (f64, f64) {
        (
            self.pitch_x_um / self.magnification,
            self.pitch_y_um / self.magnification,
        )
    }

    /// Copy with a new wavelength; `self` is untouched on error
    pub fn with_wavelength(&self, wavelength_um: f64) -> HoloResult<Self> {
        Self::new(
            wavelength_um,
            self.pitch_x_um,
            self.pitch_y_um,
            self.magnification,
            self.numerical_aperture,
            self.tube_lens_focal_um,
        )
    }

    /// Copy with new objective settings; `self` is untouched on error
    pub fn with_microscope(
        &self,
        magnification: f64,
        numerical_aperture: f64,
        tube_lens_focal_um: f64,
    ) -> HoloResult<Self> {
        Self::new(
            self.wavelength_um,
            self.pitch_x_um,
            self.pitch_y_um,
            magnification,
            numerical_aperture,
            tube_lens_focal_um,
        )
    }

    /// Copy with a new sensor pitch; `self` is untouched on error
    pub fn with_pitch(&self, pitch_x_um: f64, pitch_y_um: f64) -> HoloResult<Self> {
        Self::new(
            self.wavelength_um,
            pitch_x_um,
            pitch_y_um,
            self.magnification,
            self.numerical_aperture,
            self.tube_lens_focal_um,
        )
    }
}

impl Default for OpticalParameters {
    fn default() -> Self {
        Self {
            wavelength_um: 0.633,
            pitch_x_um: 3.45,
            pitch_y_um: 3.45,
            magnification: 40.0,
            numerical_aperture: 0.65,
            tube_lens_focal_um: 200_000.0,
        }
    }
}

/// Builder for OpticalParameters
#[derive(Debug, Clone, Default)]
pub struct OpticalParametersBuilder {
    params: OpticalParameters,
}

impl OpticalParametersBuilder {
    pub fn wavelength(mut self, value: f64, unit: LengthUnit) -> Self {
        self.params.wavelength_um = unit.to_um(value);
        self
    }

    pub fn pitch(mut self, dx: f64, dy: f64, unit: LengthUnit) -> Self {
        self.params.pitch_x_um = unit.to_um(dx);
        self.params.pitch_y_um = unit.to_um(dy);
        self
    }

    pub fn magnification(mut self, magnification: f64) -> Self {
        self.params.magnification = magnification;
        self
    }

    pub fn numerical_aperture(mut self, na: f64) -> Self {
        self.params.numerical_aperture = na;
        self
    }

    pub fn tube_lens_focal(mut self, value: f64, unit: LengthUnit) -> Self {
        self.params.tube_lens_focal_um = unit.to_um(value);
        self
    }

    /// Validate every field and build
    pub fn build(self) -> HoloResult<OpticalParameters> {
        let p = self.params;
        OpticalParameters::new(
            p.wavelength_um,
            p.pitch_x_um,
            p.pitch_y_um,
            p.magnification,
            p.numerical_aperture,
            p.tube_lens_focal_um,
        )
    }
}

/// Refocus and phase-tilt tuning
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TuningParameters {
    /// Axial refocus distance in µm; positive propagates forward
    pub z_um: f64,
    /// Spectral tilt along x, in pixels of the aperture spectrum
    pub fx: f64,
    /// Spectral tilt along y, in pixels of the aperture spectrum
    pub fy: f64,
    /// Constant phase offset in radians
    pub linear_phase: f64,
}

impl TuningParameters {
    /// Step applied by a single refocus increment
    pub const Z_STEP_UM: f64 = 10.0;

    pub fn new(z_um: f64, fx: f64, fy: f64, linear_phase: f64) -> HoloResult<Self> {
        for (name, value) in [("z", z_um), ("fx", fx), ("fy", fy), ("linear phase", linear_phase)] {
            if !value.is_finite() {
                return Err(HoloError::InvalidValue { name, value });
            }
        }
        Ok(Self {
            z_um,
            fx,
            fy,
            linear_phase,
        })
    }

    /// True when any of fx, fy or the constant phase is non-zero
    pub fn has_phase_correction(&self) -> bool {
        self.fx != 0.0 || self.fy != 0.0 || self.linear_phase != 0.0
    }

    /// Copy shifted by `delta_um` along z
    pub fn refocused(&self, delta_um: f64) -> Self {
        Self {
            z_um: self.z_um + delta_um,
            ..*self
        }
    }
}

fn ensure_numerical_aperture(na: f64) -> HoloResult<f64> {
    if na.is_finite() && na > 0.0 && na <= 1.0 {
        Ok(na)
    } else {
        Err(HoloError::InvalidNumericalAperture(na))
    }
}
