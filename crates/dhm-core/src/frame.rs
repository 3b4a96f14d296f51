//! Host frames
//!
//! [`RawFrame`] is what a camera or file loader hands over: integer or
//! float samples at the sensor's bit depth. [`HologramFrame`] is a real
//! image produced by the synthesizer, calibrated in µm per pixel.

use crate::field::RealField;
use crate::types::{HoloError, HoloResult};

/// Sample storage at the acquisition bit depth
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bit_depth(&self) -> u8 {
        match self {
            Self::U8(_) => 8,
            Self::U16(_) => 16,
            Self::F32(_) => 32,
        }
    }
}

/// Frame as delivered by the acquisition side
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    width: usize,
    height: usize,
    samples: Samples,
}

impl RawFrame {
    pub fn new(width: usize, height: usize, samples: Samples) -> HoloResult<Self> {
        if width == 0 || height == 0 {
            return Err(HoloError::EmptyField);
        }
        if samples.len() != width * height {
            return Err(HoloError::BufferLength {
                width,
                height,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn from_u8(width: usize, height: usize, data: Vec<u8>) -> HoloResult<Self> {
        Self::new(width, height, Samples::U8(data))
    }

    pub fn from_u16(width: usize, height: usize, data: Vec<u16>) -> HoloResult<Self> {
        Self::new(width, height, Samples::U16(data))
    }

    pub fn from_f32(width: usize, height: usize, data: Vec<f32>) -> HoloResult<Self> {
        Self::new(width, height, Samples::F32(data))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Elevate samples to f64
    pub fn to_real_field(&self) -> RealField {
        let data: Vec<f64> = match &self.samples {
            Samples::U8(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Samples::U16(v) => v.iter().map(|&s| f64::from(s)).collect(),
            Samples::F32(v) => v.iter().map(|&s| f64::from(s)).collect(),
        };
        RealField::from_checked_vec(self.width, self.height, data)
    }
}

/// Real image with a spatial calibration
#[derive(Debug, Clone, PartialEq)]
pub struct HologramFrame {
    /// View name, e.g. "Hologram" or "Phase"
    pub label: String,
    pub data: RealField,
    /// Pixel size in µm
    pub pitch_um: f64,
}

impl HologramFrame {
    /// Calibration unit of `pitch_um`
    pub const UNIT: &'static str = "um";

    pub fn new(label: impl Into<String>, data: RealField, pitch_um: f64) -> Self {
        Self {
            label: label.into(),
            data,
            pitch_um,
        }
    }

    /// Single-precision copy suitable for feeding the reconstruction side
    pub fn to_raw_frame(&self) -> RawFrame {
        let (w, h) = self.data.shape();
        RawFrame {
            width: w,
            height: h,
            samples: Samples::F32(self.data.data().iter().map(|&v| v as f32).collect()),
        }
    }
}
