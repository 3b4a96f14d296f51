//! Free-space propagation
//!
//! The [`Propagator`] trait is the seam for diffraction engines. The
//! bundled [`AngularSpectrum`] implementation propagates in the Fourier
//! domain with the exact transfer function
//!
//! ```text
//! H(fx, fy) = exp( i·k·z·sqrt(1 - (λ·fx)² - (λ·fy)²) ),   k = 2π/λ
//! ```
//!
//! Components with `(λ·fx)² + (λ·fy)² > 1` are evanescent and decay as
//! `exp(-k·|z|·sqrt((λ·fx)² + (λ·fy)² - 1))` regardless of the sign of z.
//!
//! All lengths are micrometres; positive z propagates away from the source.

use std::f64::consts::PI;

use crate::field::ComplexField;
use crate::spectral::SpectralTransform;
use crate::types::{ensure_positive, Complex, HoloError, HoloResult};

/// Propagates a complex field by a signed axial distance
pub trait Propagator: Send {
    /// Propagate `field` by `z_um`, sampled at `dx_um`×`dy_um`.
    ///
    /// `z_um == 0` must return the field unchanged.
    fn propagate(
        &mut self,
        field: &ComplexField,
        wavelength_um: f64,
        z_um: f64,
        dx_um: f64,
        dy_um: f64,
    ) -> HoloResult<ComplexField>;
}

/// Angular-spectrum propagator
#[derive(Debug, Default)]
pub struct AngularSpectrum {
    /// Plans for the most recent field size
    transform: Option<SpectralTransform>,
}

impl AngularSpectrum {
    pub fn new() -> Self {
        Self::default()
    }

    fn transform_for(&mut self, field: &ComplexField) -> &mut SpectralTransform {
        if self.transform.as_ref().map_or(true, |t| t.shape() != field.shape()) {
            self.transform = Some(SpectralTransform::for_field(field));
        }
        self.transform.get_or_insert_with(|| SpectralTransform::for_field(field))
    }
}

impl Propagator for AngularSpectrum {
    fn propagate(
        &mut self,
        field: &ComplexField,
        wavelength_um: f64,
        z_um: f64,
        dx_um: f64,
        dy_um: f64,
    ) -> HoloResult<ComplexField> {
        ensure_positive(wavelength_um, HoloError::InvalidWavelength)?;
        ensure_positive(dx_um, HoloError::InvalidPixelPitch)?;
        ensure_positive(dy_um, HoloError::InvalidPixelPitch)?;
        if !z_um.is_finite() {
            return Err(HoloError::InvalidValue {
                name: "propagation distance",
                value: z_um,
            });
        }
        if z_um == 0.0 {
            return Ok(field.clone());
        }

        let (m, n) = field.shape();
        let mut spectrum = field.clone();
        let transform = self.transform_for(field);
        transform.forward(&mut spectrum)?;

        let k = 2.0 * PI / wavelength_um;
        let fx: Vec<f64> = (0..m).map(|u| frequency(u, m, dx_um) * wavelength_um).collect();
        let fy: Vec<f64> = (0..n).map(|v| frequency(v, n, dy_um) * wavelength_um).collect();

        let data = spectrum.data_mut();
        for (v, &ly) in fy.iter().enumerate() {
            for (u, &lx) in fx.iter().enumerate() {
                let arg = 1.0 - lx * lx - ly * ly;
                let h = if arg >= 0.0 {
                    let phase = k * z_um * arg.sqrt();
                    Complex::new(phase.cos(), phase.sin())
                } else {
                    Complex::new((-k * z_um.abs() * (-arg).sqrt()).exp(), 0.0)
                };
                data[v * m + u] *= h;
            }
        }

        transform.inverse(&mut spectrum, true)?;
        Ok(spectrum)
    }
}

/// Spatial frequency (cycles/µm) of unshifted FFT bin `index`
fn frequency(index: usize, len: usize, pitch_um: f64) -> f64 {
    let signed = if index < (len + 1) / 2 {
        index as f64
    } else {
        index as f64 - len as f64
    };
    signed / (len as f64 * pitch_um)
}
