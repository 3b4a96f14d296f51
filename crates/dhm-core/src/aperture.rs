//! Spectral apertures
//!
//! An [`ApertureMask`] is the window a user draws on the centred spectrum to
//! isolate one interference order. Applying it copies the selected samples
//! into an otherwise zero field and moves the window to the centre, so the
//! selected order ends up around DC after the next centre shift.
//!
//! ```text
//!   centred spectrum              after apply_and_recenter
//!   ┌──────────────────┐          ┌──────────────────┐
//!   │            ┌──┐  │          │                  │
//!   │            │+1│  │    →     │       ┌──┐       │
//!   │     DC     └──┘  │          │       │+1│       │
//!   │  ┌──┐            │          │       └──┘       │
//!   │  │-1│            │          │                  │
//!   └──────────────────┘          └──────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::field::{ComplexField, RealField};
use crate::types::{Complex, HoloError, HoloResult};

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width`×`height` field
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    /// True when the rectangle is non-empty and lies inside the field
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|end| end <= width)
            && self.y.checked_add(self.height).is_some_and(|end| end <= height)
    }

    fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (self.x, self.y, self.width, self.height)
    }
}

/// Rectangle plus optional graded weights
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMask {
    rect: Rect,
    /// Rectangle-sized weights; 0 blocks a sample
    mask: Option<RealField>,
}

impl ApertureMask {
    /// Record a user selection. The mask, if any, must match the rectangle.
    pub fn from_selection(rect: Rect, mask: Option<RealField>) -> HoloResult<Self> {
        if rect.width == 0 || rect.height == 0 {
            return Err(HoloError::EmptyField);
        }
        if let Some(m) = &mask {
            if m.shape() != (rect.width, rect.height) {
                return Err(HoloError::DimensionMismatch {
                    expected: (rect.width, rect.height),
                    actual: m.shape(),
                });
            }
        }
        Ok(Self { rect, mask })
    }

    /// Plain rectangular window
    pub fn rectangle(rect: Rect) -> HoloResult<Self> {
        Self::from_selection(rect, None)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn mask(&self) -> Option<&RealField> {
        self.mask.as_ref()
    }

    /// Weight applied at (x, y) relative to the rectangle origin
    #[inline]
    fn weight(&self, x: usize, y: usize) -> f64 {
        match &self.mask {
            Some(m) => m.get(x, y),
            None => 1.0,
        }
    }
}

/// Binary circular pupil centred at ((M-1)/2, (N-1)/2)
pub fn circular_pupil(width: usize, height: usize, radius_px: f64) -> RealField {
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;
    RealField::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        if (dx * dx + dy * dy).sqrt() <= radius_px {
            1.0
        } else {
            0.0
        }
    })
}

/// Copy the masked window into a zero field, shifted toward the centre.
///
/// Each sample at (x, y) inside the rectangle moves to (x + a, y + b) with
/// `a = (M - w - 2·rx) / 2` and `b = (N - h - 2·ry) / 2`.
pub fn apply_and_recenter(field: &ComplexField, aperture: &ApertureMask) -> HoloResult<ComplexField> {
    let (m, n) = field.shape();
    let rect = aperture.rect;
    if !rect.fits_within(m, n) {
        return Err(HoloError::RectOutOfBounds {
            rect: rect.as_tuple(),
            width: m,
            height: n,
        });
    }

    let a = (m as i64 - rect.width as i64 - 2 * rect.x as i64) / 2;
    let b = (n as i64 - rect.height as i64 - 2 * rect.y as i64) / 2;

    let mut out = ComplexField::zeros(m, n);
    for ry in 0..rect.height {
        let y = rect.y + ry;
        let ty = y as i64 + b;
        for rx in 0..rect.width {
            let weight = aperture.weight(rx, ry);
            if weight == 0.0 {
                continue;
            }
            let x = rect.x + rx;
            let tx = x as i64 + a;
            if let (Ok(tx), Ok(ty)) = (usize::try_from(tx), usize::try_from(ty)) {
                if tx < m && ty < n {
                    out.set(tx, ty, field.get(x, y) * Complex::new(weight, 0.0));
                }
            }
        }
    }
    Ok(out)
}
