//! 2-D spectral transforms
//!
//! This module wraps `rustfft` into a separable 2-D transform over
//! [`ComplexField`]s, plus the quadrant shift that moves the zero spatial
//! frequency to the geometric centre of the array.
//!
//! ## Conventions
//!
//! - `forward` is unnormalized: the energy of the spectrum scales by M·N.
//! - `inverse(.., true)` divides by M·N, so `inverse ∘ forward` is the
//!   identity up to rounding.
//! - `center_shift` rolls by (⌊M/2⌋, ⌊N/2⌋) and is its own inverse for even
//!   dimensions.
//!
//! ```text
//!  unshifted spectrum        centred spectrum
//!  ┌─────┬─────┐             ┌─────┬─────┐
//!  │ DC  │  B  │             │  D  │  C  │
//!  ├─────┼─────┤   shift →   ├─────┼─────┤
//!  │  C  │  D  │             │  B  │ DC  │  (DC lands at M/2, N/2)
//!  └─────┴─────┘             └─────┴─────┘
//! ```

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

use crate::field::ComplexField;
use crate::types::HoloResult;

/// Separable 2-D FFT processor for a fixed field size
pub struct SpectralTransform {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
    /// Scratch buffer shared by all plans
    scratch: Vec<Complex64>,
    /// Column gather buffer (transposed field)
    transposed: Vec<Complex64>,
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl SpectralTransform {
    /// Plan forward and inverse transforms for a `width`×`height` field
    pub fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::new();
        let row_forward = planner.plan_fft_forward(width);
        let row_inverse = planner.plan_fft_inverse(width);
        let col_forward = planner.plan_fft_forward(height);
        let col_inverse = planner.plan_fft_inverse(height);

        let scratch_len = [
            row_forward.get_inplace_scratch_len(),
            row_inverse.get_inplace_scratch_len(),
            col_forward.get_inplace_scratch_len(),
            col_inverse.get_inplace_scratch_len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        Self {
            width,
            height,
            row_forward,
            row_inverse,
            col_forward,
            col_inverse,
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            transposed: vec![Complex64::new(0.0, 0.0); width * height],
        }
    }

    /// Plan a transform matching the shape of `field`
    pub fn for_field(field: &ComplexField) -> Self {
        Self::new(field.width(), field.height())
    }

    /// (width, height) this transform was planned for
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Unnormalized forward 2-D FFT, in place
    pub fn forward(&mut self, field: &mut ComplexField) -> HoloResult<()> {
        self.check(field)?;
        let row = Arc::clone(&self.row_forward);
        let col = Arc::clone(&self.col_forward);
        self.process(field, row.as_ref(), col.as_ref());
        Ok(())
    }

    /// Inverse 2-D FFT, in place; divides by M·N when `normalize` is set
    pub fn inverse(&mut self, field: &mut ComplexField, normalize: bool) -> HoloResult<()> {
        self.check(field)?;
        let row = Arc::clone(&self.row_inverse);
        let col = Arc::clone(&self.col_inverse);
        self.process(field, row.as_ref(), col.as_ref());

        if normalize {
            field.scale(1.0 / (self.width * self.height) as f64);
        }
        Ok(())
    }

    fn check(&self, field: &ComplexField) -> HoloResult<()> {
        if field.shape() != self.shape() {
            return Err(crate::types::HoloError::DimensionMismatch {
                expected: self.shape(),
                actual: field.shape(),
            });
        }
        Ok(())
    }

    fn process(&mut self, field: &mut ComplexField, row: &dyn Fft<f64>, col: &dyn Fft<f64>) {
        let (w, h) = (self.width, self.height);
        let data = field.data_mut();

        // Rows are contiguous: one call walks every chunk of `w` samples
        row.process_with_scratch(data, &mut self.scratch);

        // Columns: transpose, transform, transpose back
        for y in 0..h {
            for x in 0..w {
                self.transposed[x * h + y] = data[y * w + x];
            }
        }
        col.process_with_scratch(&mut self.transposed, &mut self.scratch);
        for x in 0..w {
            for y in 0..h {
                data[y * w + x] = self.transposed[x * h + y];
            }
        }
    }
}

/// Quadrant swap placing the zero frequency at (⌊M/2⌋, ⌊N/2⌋)
pub fn center_shift(field: &mut ComplexField) {
    let (w, h) = field.shape();
    roll(field, w / 2, h / 2);
}

/// Undo [`center_shift`], returning the zero frequency to (0, 0)
///
/// Identical to `center_shift` for even sizes; odd sizes roll by ⌈M/2⌉.
pub fn inverse_center_shift(field: &mut ComplexField) {
    let (w, h) = field.shape();
    roll(field, w - w / 2, h - h / 2);
}

fn roll(field: &mut ComplexField, sx: usize, sy: usize) {
    let (w, h) = field.shape();
    let src = field.data().to_vec();
    let dst = field.data_mut();
    for y in 0..h {
        let ny = (y + sy) % h;
        for x in 0..w {
            let nx = (x + sx) % w;
            dst[ny * w + nx] = src[y * w + x];
        }
    }
}

/// Forward transform followed by a centre shift, on a copy of `field`
pub fn centered_spectrum(
    transform: &mut SpectralTransform,
    field: &ComplexField,
) -> HoloResult<ComplexField> {
    let mut spectrum = field.clone();
    transform.forward(&mut spectrum)?;
    center_shift(&mut spectrum);
    Ok(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complex, HoloError};
    use approx::assert_relative_eq;

    fn test_field(w: usize, h: usize) -> ComplexField {
        ComplexField::from_fn(w, h, |x, y| {
            Complex::new((x as f64 * 0.7).sin() + y as f64, (y as f64 * 1.3).cos() - x as f64 * 0.1)
        })
    }

    #[test]
    fn test_roundtrip_identity() {
        for &(w, h) in &[(4, 4), (8, 6), (5, 7), (1, 3)] {
            let original = test_field(w, h);
            let mut field = original.clone();
            let mut fft = SpectralTransform::new(w, h);
            fft.forward(&mut field).unwrap();
            fft.inverse(&mut field, true).unwrap();
            for (a, b) in field.data().iter().zip(original.data()) {
                assert_relative_eq!(a.re, b.re, epsilon = 1e-10);
                assert_relative_eq!(a.im, b.im, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_forward_is_unnormalized() {
        let mut field = ComplexField::from_fn(4, 2, |_, _| Complex::new(1.0, 0.0));
        let mut fft = SpectralTransform::new(4, 2);
        fft.forward(&mut field).unwrap();
        assert_relative_eq!(field.get(0, 0).re, 8.0, epsilon = 1e-12);
        assert_relative_eq!(field.energy(), 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_without_normalization_scales() {
        let original = test_field(4, 4);
        let mut field = original.clone();
        let mut fft = SpectralTransform::new(4, 4);
        fft.forward(&mut field).unwrap();
        fft.inverse(&mut field, false).unwrap();
        assert_relative_eq!(field.get(2, 3).re, 16.0 * original.get(2, 3).re, epsilon = 1e-9);
    }

    #[test]
    fn test_separable_matches_direct_dft() {
        let (w, h) = (3, 2);
        let input = test_field(w, h);
        let mut field = input.clone();
        SpectralTransform::new(w, h).forward(&mut field).unwrap();

        let (u, v) = (1, 1);
        let mut expected = Complex::new(0.0, 0.0);
        for y in 0..h {
            for x in 0..w {
                let angle = -2.0 * std::f64::consts::PI
                    * (u as f64 * x as f64 / w as f64 + v as f64 * y as f64 / h as f64);
                expected += input.get(x, y) * Complex::new(angle.cos(), angle.sin());
            }
        }
        assert_relative_eq!(field.get(u, v).re, expected.re, epsilon = 1e-10);
        assert_relative_eq!(field.get(u, v).im, expected.im, epsilon = 1e-10);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut fft = SpectralTransform::new(4, 4);
        let mut field = ComplexField::zeros(4, 8);
        assert!(matches!(
            fft.forward(&mut field),
            Err(HoloError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_center_shift_involution_even() {
        let original = test_field(6, 4);
        let mut field = original.clone();
        center_shift(&mut field);
        assert_ne!(field, original);
        center_shift(&mut field);
        assert_eq!(field, original);
    }

    #[test]
    fn test_inverse_center_shift_odd_sizes() {
        for &(w, h) in &[(5, 5), (5, 4), (3, 7)] {
            let original = test_field(w, h);
            let mut field = original.clone();
            center_shift(&mut field);
            inverse_center_shift(&mut field);
            assert_eq!(field, original);
        }
    }

    #[test]
    fn test_center_shift_moves_dc_to_center() {
        let mut field = ComplexField::zeros(4, 6);
        field.set(0, 0, Complex::new(1.0, 0.0));
        center_shift(&mut field);
        assert_eq!(field.get(2, 3), Complex::new(1.0, 0.0));
    }

    #[test]
    fn test_spectrum_modulus_multiset_invariant_under_shift() {
        let field = test_field(4, 4);
        let mut fft = SpectralTransform::new(4, 4);
        let mut spectrum = field.clone();
        fft.forward(&mut spectrum).unwrap();
        let centred = centered_spectrum(&mut fft, &field).unwrap();

        let mut a: Vec<f64> = spectrum.amplitude().into_vec();
        let mut b: Vec<f64> = centred.amplitude().into_vec();
        a.sort_by(|p, q| p.partial_cmp(q).unwrap());
        b.sort_by(|p, q| p.partial_cmp(q).unwrap());
        for (p, q) in a.iter().zip(b.iter()) {
            assert_relative_eq!(p, q, epsilon = 1e-12);
        }
    }
}
