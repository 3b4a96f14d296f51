//! Dense 2-D fields
//!
//! [`ComplexField`] is the common currency of every pipeline stage: an
//! M×N array of complex samples stored row-major, `index = y * width + x`.
//! [`RealField`] is the real-valued counterpart used for input images,
//! masks and every displayable view.
//!
//! Dimensions are fixed at construction. Binary operations check that both
//! operands share the same shape and report [`HoloError::DimensionMismatch`]
//! otherwise.
//!
//! ```rust
//! use dhm_core::field::{ComplexField, RealField};
//!
//! let amplitude = RealField::filled(4, 4, 2.0);
//! let phase = RealField::filled(4, 4, 0.5);
//! let u = ComplexField::from_polar(&amplitude, &phase).unwrap();
//! let intensity = u.intensity();
//! assert!((intensity.get(1, 2) - 4.0).abs() < 1e-12);
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::types::{complex_ops, Complex, HoloError, HoloResult};

/// Real-valued M×N array.
#[derive(Debug, Clone, PartialEq)]
pub struct RealField {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl RealField {
    /// Create a zero-filled field.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Create a field with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(width: usize, height: usize, data: Vec<f64>) -> HoloResult<Self> {
        check_shape(width, height, data.len())?;
        Ok(Self { width, height, data })
    }

    /// Take ownership of a buffer whose length the caller already checked
    pub(crate) fn from_checked_vec(width: usize, height: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    /// Build a field by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// (width, height)
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[y * self.width + x] = value;
    }

    /// Minimum sample value (`+inf` for an empty field)
    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Maximum sample value (`-inf` for an empty field)
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Number of non-zero samples.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// Apply `f` to every sample, returning a new field.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> RealField {
        RealField {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Fail unless `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &RealField) -> HoloResult<()> {
        ensure_shape(self.shape(), other.shape())
    }
}

/// Complex-valued M×N array.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexField {
    width: usize,
    height: usize,
    data: Vec<Complex>,
}

impl ComplexField {
    /// Create a zero-filled field.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![Complex::new(0.0, 0.0); width * height],
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(width: usize, height: usize, data: Vec<Complex>) -> HoloResult<Self> {
        check_shape(width, height, data.len())?;
        Ok(Self { width, height, data })
    }

    /// Build a field by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Complex) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    /// Real samples with a zero imaginary part.
    pub fn from_real(real: &RealField) -> Self {
        Self {
            width: real.width,
            height: real.height,
            data: real.data.iter().map(|&re| Complex::new(re, 0.0)).collect(),
        }
    }

    /// Combine real and imaginary planes of equal shape.
    pub fn from_parts(real: &RealField, imag: &RealField) -> HoloResult<Self> {
        real.ensure_same_shape(imag)?;
        Ok(Self {
            width: real.width,
            height: real.height,
            data: real
                .data
                .iter()
                .zip(imag.data.iter())
                .map(|(&re, &im)| Complex::new(re, im))
                .collect(),
        })
    }

    /// Combine amplitude and phase planes of equal shape.
    pub fn from_polar(amplitude: &RealField, phase: &RealField) -> HoloResult<Self> {
        amplitude.ensure_same_shape(phase)?;
        Ok(Self {
            width: amplitude.width,
            height: amplitude.height,
            data: amplitude
                .data
                .iter()
                .zip(phase.data.iter())
                .map(|(&a, &p)| complex_ops::from_polar(a, p))
                .collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// (width, height)
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[Complex] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Complex] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Complex {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: Complex) {
        self.data[y * self.width + x] = value;
    }

    /// Fail unless `other` has the same shape.
    pub fn ensure_same_shape(&self, other: &ComplexField) -> HoloResult<()> {
        ensure_shape(self.shape(), other.shape())
    }

    /// Pointwise `self *= other`.
    pub fn multiply_assign(&mut self, other: &ComplexField) -> HoloResult<()> {
        self.ensure_same_shape(other)?;
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a *= b;
        }
        Ok(())
    }

    /// Pointwise `self *= mask`, with a real-valued mask.
    pub fn multiply_real_assign(&mut self, mask: &RealField) -> HoloResult<()> {
        ensure_shape(self.shape(), mask.shape())?;
        for (a, &m) in self.data.iter_mut().zip(mask.data.iter()) {
            *a *= m;
        }
        Ok(())
    }

    /// Pointwise `self += other`.
    pub fn add_assign(&mut self, other: &ComplexField) -> HoloResult<()> {
        self.ensure_same_shape(other)?;
        for (a, &b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
        Ok(())
    }

    /// Multiply every sample by a real scalar.
    pub fn scale(&mut self, factor: f64) {
        for s in self.data.iter_mut() {
            *s *= factor;
        }
    }

    /// |u|
    pub fn amplitude(&self) -> RealField {
        self.map_real(|c| c.norm())
    }

    /// |u|²
    pub fn intensity(&self) -> RealField {
        self.map_real(|c| c.norm_sqr())
    }

    /// arg u, in (-pi, pi]
    pub fn phase(&self) -> RealField {
        self.map_real(|c| c.arg())
    }

    pub fn real(&self) -> RealField {
        self.map_real(|c| c.re)
    }

    pub fn imaginary(&self) -> RealField {
        self.map_real(|c| c.im)
    }

    /// Mean of |u| over the whole field.
    pub fn mean_amplitude(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|c| c.norm()).sum::<f64>() / self.data.len() as f64
    }

    /// Total energy, Σ|u|².
    pub fn energy(&self) -> f64 {
        self.data.iter().map(|c| c.norm_sqr()).sum()
    }

    #[cfg(not(feature = "parallel"))]
    fn map_real(&self, f: impl Fn(&Complex) -> f64 + Sync + Send) -> RealField {
        RealField {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    #[cfg(feature = "parallel")]
    fn map_real(&self, f: impl Fn(&Complex) -> f64 + Sync + Send) -> RealField {
        RealField {
            width: self.width,
            height: self.height,
            data: self.data.par_iter().map(f).collect(),
        }
    }
}

fn check_shape(width: usize, height: usize, len: usize) -> HoloResult<()> {
    if width == 0 || height == 0 {
        return Err(HoloError::EmptyField);
    }
    if width * height != len {
        return Err(HoloError::BufferLength {
            width,
            height,
            actual: len,
        });
    }
    Ok(())
}

fn ensure_shape(expected: (usize, usize), actual: (usize, usize)) -> HoloResult<()> {
    if expected != actual {
        return Err(HoloError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_row_major_layout() {
        let f = RealField::from_fn(3, 2, |x, y| (y * 10 + x) as f64);
        assert_eq!(f.data(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(f.get(2, 1), 12.0);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let err = ComplexField::from_vec(4, 4, vec![Complex::new(0.0, 0.0); 15]).unwrap_err();
        assert!(matches!(err, HoloError::BufferLength { actual: 15, .. }));
        assert_eq!(RealField::from_vec(0, 4, vec![]), Err(HoloError::EmptyField));
    }

    #[test]
    fn test_binary_ops_require_same_shape() {
        let mut a = ComplexField::zeros(4, 4);
        let b = ComplexField::zeros(4, 2);
        assert_eq!(
            a.multiply_assign(&b),
            Err(HoloError::DimensionMismatch {
                expected: (4, 4),
                actual: (4, 2)
            })
        );
        assert!(a.add_assign(&b).is_err());
    }

    #[test]
    fn test_intensity_is_amplitude_squared() {
        let u = ComplexField::from_fn(5, 3, |x, y| Complex::new(x as f64 - 2.0, 0.3 * y as f64));
        let amp = u.amplitude();
        let int = u.intensity();
        for (a, i) in amp.data().iter().zip(int.data()) {
            assert_relative_eq!(a * a, *i, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_polar_roundtrip() {
        let amp = RealField::filled(2, 2, 3.0);
        let pha = RealField::from_fn(2, 2, |x, y| 0.25 * PI * (x + 2 * y) as f64);
        let u = ComplexField::from_polar(&amp, &pha).unwrap();
        for (p, q) in u.phase().data().iter().zip(pha.data()) {
            assert_relative_eq!(p, q, epsilon = 1e-12);
        }
        assert_relative_eq!(u.mean_amplitude(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_from_parts_mismatch() {
        let re = RealField::zeros(4, 4);
        let im = RealField::zeros(3, 4);
        assert!(ComplexField::from_parts(&re, &im).is_err());
    }

    #[test]
    fn test_min_max_mean() {
        let f = RealField::from_vec(2, 2, vec![1.0, -2.0, 5.0, 0.0]).unwrap();
        assert_eq!(f.min(), -2.0);
        assert_eq!(f.max(), 5.0);
        assert_relative_eq!(f.mean(), 1.0);
        assert_eq!(f.count_nonzero(), 3);
    }
}
