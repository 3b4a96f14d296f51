//! # Digital Holographic Microscopy Core
//!
//! Numerical core for off-axis digital holographic microscopy (DHM):
//!
//! - **Synthesis**: simulate the hologram a microscope would record for a
//!   given complex object, including pupil filtering and a tilted reference
//! - **Reconstruction**: recover spectrum, intensity, amplitude or phase
//!   from a live hologram stream by Fourier filtering and refocusing
//!
//! ## Signal Flow
//!
//! ```text
//! Synthesis:      object → FFT → pupil → FFT → + reference → |·|² → hologram
//! Reconstruction: hologram → FFT → filter/recenter → IFFT → propagate(z) → compensate → view
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use dhm_core::prelude::*;
//!
//! let optics = OpticalParameters::builder()
//!     .wavelength(633.0, LengthUnit::Nanometer)
//!     .pitch(3.45, 3.45, LengthUnit::Micrometer)
//!     .magnification(40.0)
//!     .numerical_aperture(0.65)
//!     .tube_lens_focal(200.0, LengthUnit::Millimeter)
//!     .build()?;
//!
//! let mut pipeline = LiveReconstructionPipeline::new(optics);
//! let frame = RawFrame::from_u8(256, 256, vec![0; 256 * 256])?;
//!
//! // First frames show the spectrum; draw a filter around the +1 order
//! pipeline.process_frame(&frame)?;
//! pipeline.apply(Command::SetFilter(ApertureMask::rectangle(Rect::new(150, 40, 64, 64))?))?;
//! pipeline.apply(Command::SetMode(ReconstructionMode::Phase))?;
//! let phase = pipeline.process_frame(&frame)?;
//! # Ok::<(), dhm_core::HoloError>(())
//! ```

pub mod aperture;
pub mod config;
pub mod display;
pub mod field;
pub mod frame;
pub mod live;
pub mod observe;
pub mod params;
pub mod phase_tuner;
pub mod propagation;
pub mod reconstruction;
pub mod spectral;
pub mod synthesis;
pub mod types;

pub use aperture::{ApertureMask, Rect};
pub use config::{ConfigError, DhmConfig};
pub use field::{ComplexField, RealField};
pub use frame::{HologramFrame, RawFrame};
pub use live::{LiveFrame, LiveSession};
pub use params::{LengthUnit, OpticalParameters, TuningParameters};
pub use reconstruction::{Command, LiveReconstructionPipeline, ReconstructionMode, ReconstructionOutput};
pub use synthesis::{HologramSynthesizer, SynthesisSetup, SynthesisView};
pub use types::{Complex, HoloError, HoloResult};

/// Commonly used types
pub mod prelude {
    pub use crate::aperture::{ApertureMask, Rect};
    pub use crate::field::{ComplexField, RealField};
    pub use crate::frame::{HologramFrame, RawFrame};
    pub use crate::live::{DisplaySink, FrameSource, LiveConfig, LiveFrame, LiveSession};
    pub use crate::params::{LengthUnit, OpticalParameters, TuningParameters};
    pub use crate::propagation::{AngularSpectrum, Propagator};
    pub use crate::reconstruction::{Command, LiveReconstructionPipeline, ReconstructionMode, ZStep};
    pub use crate::synthesis::{
        HologramSynthesizer, Illumination, Imaging, InputGeometry, InputImages, ReferenceAngles, SynthesisSetup,
        SynthesisView,
    };
    pub use crate::types::{Complex, HoloError, HoloResult};
}
