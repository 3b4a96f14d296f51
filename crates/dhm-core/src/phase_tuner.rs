//! Linear phase compensation
//!
//! Off-axis holograms leave a residual carrier on the reconstructed phase
//! when the filtered order is not perfectly centred. The user dials in a
//! spectral offset (fx, fy) in pixels; it is converted to tilt angles
//!
//! ```text
//! θx = asin( fx·λ / (M·dx) )      θy = asin( fy·λ / (N·dy) )
//! ```
//!
//! and a unit-amplitude compensation wave with phase
//! `k·(sin θx·(i - M/2)·dx + sin θy·(j - N/2)·dy) + φ₀` is multiplied into
//! the field.

use tracing::trace;

use crate::field::ComplexField;
use crate::params::{OpticalParameters, TuningParameters};
use crate::types::{complex_ops, ensure_positive, HoloError, HoloResult};

/// Tilt angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltAngles {
    pub theta_x: f64,
    pub theta_y: f64,
}

impl TiltAngles {
    /// Derive the tilt angles for a `width`×`height` field.
    ///
    /// Fails with [`HoloError::IllConditionedTilt`] when `|f·λ/(L·pitch)| > 1`.
    pub fn compute(
        fx: f64,
        fy: f64,
        wavelength_um: f64,
        width: usize,
        height: usize,
        dx_um: f64,
        dy_um: f64,
    ) -> HoloResult<Self> {
        ensure_positive(wavelength_um, HoloError::InvalidWavelength)?;
        ensure_positive(dx_um, HoloError::InvalidPixelPitch)?;
        ensure_positive(dy_um, HoloError::InvalidPixelPitch)?;
        if width == 0 || height == 0 {
            return Err(HoloError::EmptyField);
        }

        let theta_x = tilt('x', fx * wavelength_um / (width as f64 * dx_um))?;
        let theta_y = tilt('y', fy * wavelength_um / (height as f64 * dy_um))?;
        Ok(Self { theta_x, theta_y })
    }
}

fn tilt(axis: char, ratio: f64) -> HoloResult<f64> {
    if !ratio.is_finite() || ratio.abs() > 1.0 {
        return Err(HoloError::IllConditionedTilt { axis, ratio });
    }
    Ok(ratio.asin())
}

/// Unit-amplitude linear-plus-constant phase wave
pub fn compensation_field(
    width: usize,
    height: usize,
    wavelength_um: f64,
    dx_um: f64,
    dy_um: f64,
    angles: TiltAngles,
    linear_phase: f64,
) -> ComplexField {
    let k = 2.0 * std::f64::consts::PI / wavelength_um;
    let (i0, j0) = ((width / 2) as f64, (height / 2) as f64);
    let (sx, sy) = (angles.theta_x.sin(), angles.theta_y.sin());

    ComplexField::from_fn(width, height, |i, j| {
        let phase = k * (sx * (i as f64 - i0) * dx_um + sy * (j as f64 - j0) * dy_um) + linear_phase;
        complex_ops::from_polar(1.0, phase)
    })
}

/// Pointwise multiply `comp` into `field`
pub fn apply_compensation(field: &mut ComplexField, comp: &ComplexField) -> HoloResult<()> {
    field.multiply_assign(comp)
}

/// Caches the compensation wave between frames
#[derive(Debug, Default)]
pub struct PhaseTuner {
    cached: Option<(CacheKey, ComplexField)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    shape: (usize, usize),
    wavelength_um: f64,
    dx_um: f64,
    dy_um: f64,
    fx: f64,
    fy: f64,
    linear_phase: f64,
}

impl PhaseTuner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiply the compensation for `tuning` into `field`.
    ///
    /// Angles are recomputed from the current optics and field size on every
    /// call; the wave itself is rebuilt only when one of its inputs changed.
    pub fn compensate(
        &mut self,
        field: &mut ComplexField,
        optics: &OpticalParameters,
        tuning: &TuningParameters,
    ) -> HoloResult<()> {
        let (width, height) = field.shape();
        let key = CacheKey {
            shape: (width, height),
            wavelength_um: optics.wavelength_um(),
            dx_um: optics.pitch_x_um(),
            dy_um: optics.pitch_y_um(),
            fx: tuning.fx,
            fy: tuning.fy,
            linear_phase: tuning.linear_phase,
        };

        let angles = TiltAngles::compute(
            tuning.fx,
            tuning.fy,
            key.wavelength_um,
            width,
            height,
            key.dx_um,
            key.dy_um,
        )?;

        let fresh = matches!(&self.cached, Some((cached, _)) if *cached == key);
        if !fresh {
            trace!(
                theta_x = angles.theta_x,
                theta_y = angles.theta_y,
                "Rebuilding compensation wave"
            );
            let comp = compensation_field(
                width,
                height,
                key.wavelength_um,
                key.dx_um,
                key.dy_um,
                angles,
                tuning.linear_phase,
            );
            self.cached = Some((key, comp));
        }

        match &self.cached {
            Some((_, comp)) => apply_compensation(field, comp),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complex;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_angles_from_offsets() {
        let angles = TiltAngles::compute(2.0, -1.0, 0.5, 8, 4, 1.0, 1.0).unwrap();
        assert_relative_eq!(angles.theta_x, (2.0f64 * 0.5 / 8.0).asin(), epsilon = 1e-12);
        assert_relative_eq!(angles.theta_y, (-0.5f64 / 4.0).asin(), epsilon = 1e-12);

        let zero = TiltAngles::compute(0.0, 0.0, 0.633, 16, 16, 3.45, 3.45).unwrap();
        assert_eq!(zero, TiltAngles { theta_x: 0.0, theta_y: 0.0 });
    }

    #[test]
    fn test_ill_conditioned_tilt_reported() {
        let err = TiltAngles::compute(10.0, 0.0, 1.0, 4, 4, 1.0, 1.0).unwrap_err();
        assert_eq!(err, HoloError::IllConditionedTilt { axis: 'x', ratio: 2.5 });
        assert!(matches!(
            TiltAngles::compute(0.0, -5.0, 1.0, 4, 4, 1.0, 1.0),
            Err(HoloError::IllConditionedTilt { axis: 'y', .. })
        ));
    }

    #[test]
    fn test_compensation_is_linear_ramp() {
        let angles = TiltAngles::compute(1.0, 0.0, 0.5, 4, 4, 2.0, 2.0).unwrap();
        let comp = compensation_field(4, 4, 0.5, 2.0, 2.0, angles, 0.0);

        // One pixel of fx = 1 advances the phase by 2π/M
        for x in 0..3 {
            let step = complex_ops::phase_distance(comp.get(x + 1, 1).arg(), comp.get(x, 1).arg());
            assert_relative_eq!(step, PI / 2.0, epsilon = 1e-12);
        }
        // Zero at the centre pixel
        assert_relative_eq!(comp.get(2, 2).arg(), 0.0, epsilon = 1e-12);
        assert!(comp.amplitude().data().iter().all(|&a| (a - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_constant_phase_only() {
        let angles = TiltAngles { theta_x: 0.0, theta_y: 0.0 };
        let comp = compensation_field(3, 3, 0.6, 1.0, 1.0, angles, 0.75);
        for c in comp.data() {
            assert_relative_eq!(c.arg(), 0.75, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_compensation_removes_carrier() {
        let (m, n) = (8, 8);
        let carrier = ComplexField::from_fn(m, n, |x, y| {
            complex_ops::from_polar(1.0, -2.0 * PI * (2.0 * x as f64 / m as f64 + y as f64 / n as f64))
        });
        let optics = OpticalParameters::new(0.5, 1.0, 1.0, 1.0, 0.5, 1_000.0).unwrap();
        let tuning = TuningParameters::new(0.0, 2.0, 1.0, 0.0).unwrap();

        let mut field = carrier.clone();
        PhaseTuner::new().compensate(&mut field, &optics, &tuning).unwrap();

        let reference = field.get(0, 0).arg();
        for c in field.data() {
            assert_relative_eq!(complex_ops::phase_distance(c.arg(), reference), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_tuner_rebuilds_on_change() {
        let optics = OpticalParameters::new(0.5, 1.0, 1.0, 1.0, 0.5, 1_000.0).unwrap();
        let mut tuner = PhaseTuner::new();

        let mut a = ComplexField::from_fn(4, 4, |_, _| Complex::new(1.0, 0.0));
        tuner
            .compensate(&mut a, &optics, &TuningParameters::new(0.0, 0.0, 0.0, 0.5).unwrap())
            .unwrap();
        assert_relative_eq!(a.get(0, 0).arg(), 0.5, epsilon = 1e-12);

        let mut b = ComplexField::from_fn(4, 4, |_, _| Complex::new(1.0, 0.0));
        tuner
            .compensate(&mut b, &optics, &TuningParameters::new(0.0, 0.0, 0.0, -1.0).unwrap())
            .unwrap();
        assert_relative_eq!(b.get(3, 3).arg(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tuner_follows_field_size() {
        let optics = OpticalParameters::new(0.5, 1.0, 1.0, 1.0, 0.5, 1_000.0).unwrap();
        let tuning = TuningParameters::new(0.0, 1.0, 0.0, 0.0).unwrap();
        let mut tuner = PhaseTuner::new();

        for m in [8usize, 16] {
            let mut field = ComplexField::from_fn(m, m, |_, _| Complex::new(1.0, 0.0));
            tuner.compensate(&mut field, &optics, &tuning).unwrap();
            let step = complex_ops::phase_distance(field.get(1, 0).arg(), field.get(0, 0).arg());
            assert_relative_eq!(step, 2.0 * PI / m as f64, epsilon = 1e-12);
        }
    }
}
