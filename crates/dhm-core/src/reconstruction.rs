//! Live hologram reconstruction
//!
//! [`LiveReconstructionPipeline`] turns each incoming hologram frame into one
//! displayable quantity. It owns every piece of state that persists between
//! frames: the committed spectral filter, tuning, optics and output mode.
//!
//! ## Per-frame stages
//!
//! ```text
//!  RawFrame ─► f64 ─► FFT ─► shift ─┬──────────────────────────────► |S|      (Spectrum)
//!                                   │
//!                                   └► filter+recenter ─► shift ─► IFFT ─► propagate(z)
//!                                                                          │
//!                         ┌────────────────────────────────────────────────┘
//!                         ├─► |u|²                                (Intensity)
//!                         ├─► |u|                                 (Amplitude)
//!                         └─► compensate(fx, fy, φ₀) ─► arg u      (Phase)
//! ```
//!
//! ## Mode state machine
//!
//! Only Spectrum is available until a filter has been committed with
//! [`Command::SetFilter`]; afterwards every mode is reachable.
//!
//! ```text
//!            SetFilter
//!  NoFilter ──────────► Filtered { Spectrum | Intensity | Amplitude | Phase }
//!  (Spectrum)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace, warn};

use crate::aperture::{apply_and_recenter, ApertureMask};
use crate::field::{ComplexField, RealField};
use crate::frame::RawFrame;
use crate::params::{OpticalParameters, TuningParameters};
use crate::phase_tuner::PhaseTuner;
use crate::propagation::{AngularSpectrum, Propagator};
use crate::spectral::{center_shift, inverse_center_shift, SpectralTransform};
use crate::types::{HoloError, HoloResult};

/// Quantity extracted from each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionMode {
    #[default]
    Spectrum,
    Intensity,
    Amplitude,
    Phase,
}

impl ReconstructionMode {
    /// Modes that need a committed spectral filter
    pub fn requires_filter(&self) -> bool {
        !matches!(self, Self::Spectrum)
    }

    /// Unit of the output values
    pub fn value_unit(&self) -> &'static str {
        match self {
            Self::Phase => "rad",
            _ => "adim",
        }
    }

    /// Whether the presentation log remap applies
    pub fn supports_log_scale(&self) -> bool {
        !matches!(self, Self::Phase)
    }
}

impl fmt::Display for ReconstructionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spectrum => "Spectrum",
            Self::Intensity => "Intensity",
            Self::Amplitude => "Amplitude",
            Self::Phase => "Phase",
        };
        f.write_str(name)
    }
}

/// Refocus direction for [`Command::StepZ`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZStep {
    Increase,
    Decrease,
}

/// State changes applied between frames
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFilter(ApertureMask),
    SetTuning(TuningParameters),
    SetOptics(OpticalParameters),
    SetMode(ReconstructionMode),
    SetLogScale(bool),
    StepZ(ZStep),
}

/// Spatial calibration of a reconstructed image, in µm per pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub pixel_width_um: f64,
    pub pixel_height_um: f64,
}

/// One reconstructed frame
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionOutput {
    pub mode: ReconstructionMode,
    pub data: RealField,
    /// None for the spectrum, which has no spatial scale
    pub calibration: Option<Calibration>,
    pub value_unit: &'static str,
}

/// Per-frame reconstruction with persisted filter, tuning and mode
pub struct LiveReconstructionPipeline {
    optics: OpticalParameters,
    tuning: TuningParameters,
    mode: ReconstructionMode,
    filter: Option<ApertureMask>,
    log_scale: bool,
    transform: Option<SpectralTransform>,
    propagator: Box<dyn Propagator>,
    tuner: PhaseTuner,
    last_spectrum: Option<ComplexField>,
}

impl fmt::Debug for LiveReconstructionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveReconstructionPipeline")
            .field("optics", &self.optics)
            .field("tuning", &self.tuning)
            .field("mode", &self.mode)
            .field("filter", &self.filter.as_ref().map(|f| f.rect()))
            .field("log_scale", &self.log_scale)
            .finish()
    }
}

impl LiveReconstructionPipeline {
    /// Pipeline with the angular-spectrum propagator
    pub fn new(optics: OpticalParameters) -> Self {
        Self::with_propagator(optics, Box::new(AngularSpectrum::new()))
    }

    pub fn with_propagator(optics: OpticalParameters, propagator: Box<dyn Propagator>) -> Self {
        Self {
            optics,
            tuning: TuningParameters::default(),
            mode: ReconstructionMode::Spectrum,
            filter: None,
            log_scale: true,
            transform: None,
            propagator,
            tuner: PhaseTuner::new(),
            last_spectrum: None,
        }
    }

    pub fn optics(&self) -> &OpticalParameters {
        &self.optics
    }

    pub fn tuning(&self) -> &TuningParameters {
        &self.tuning
    }

    pub fn mode(&self) -> ReconstructionMode {
        self.mode
    }

    pub fn filter(&self) -> Option<&ApertureMask> {
        self.filter.as_ref()
    }

    pub fn log_scale(&self) -> bool {
        self.log_scale
    }

    /// Whether Intensity, Amplitude and Phase can be selected
    pub fn filtered_modes_enabled(&self) -> bool {
        self.filter.is_some()
    }

    /// Apply one command; on error the pipeline state is unchanged
    pub fn apply(&mut self, command: Command) -> HoloResult<()> {
        match command {
            Command::SetFilter(mask) => {
                if let Some(spectrum) = &self.last_spectrum {
                    let (w, h) = spectrum.shape();
                    let rect = mask.rect();
                    if !rect.fits_within(w, h) {
                        return Err(HoloError::RectOutOfBounds {
                            rect: (rect.x, rect.y, rect.width, rect.height),
                            width: w,
                            height: h,
                        });
                    }
                }
                debug!(rect = ?mask.rect(), graded = mask.mask().is_some(), "New filter committed");
                self.filter = Some(mask);
            }
            Command::SetTuning(tuning) => {
                debug!(z_um = tuning.z_um, fx = tuning.fx, fy = tuning.fy, "Tuning updated");
                self.tuning = tuning;
            }
            Command::SetOptics(optics) => {
                debug!(wavelength_um = optics.wavelength_um(), "Optics updated");
                self.optics = optics;
            }
            Command::SetMode(mode) => {
                if mode.requires_filter() && self.filter.is_none() {
                    warn!(%mode, "No filter selected; staying in spectrum mode");
                    return Err(HoloError::ModeDisabled(mode));
                }
                self.mode = mode;
            }
            Command::SetLogScale(enabled) => self.log_scale = enabled,
            Command::StepZ(step) => {
                let delta = match step {
                    ZStep::Increase => TuningParameters::Z_STEP_UM,
                    ZStep::Decrease => -TuningParameters::Z_STEP_UM,
                };
                self.tuning = self.tuning.refocused(delta);
                debug!(z_um = self.tuning.z_um, "Refocus step");
            }
        }
        Ok(())
    }

    /// Reconstruct one host frame in the current mode
    pub fn process_frame(&mut self, frame: &RawFrame) -> HoloResult<ReconstructionOutput> {
        let field = ComplexField::from_real(&frame.to_real_field());
        self.reconstruct(&field)
    }

    /// Reconstruct an arbitrary complex field in the current mode
    pub fn reconstruct(&mut self, field: &ComplexField) -> HoloResult<ReconstructionOutput> {
        let (m, n) = field.shape();
        if self.transform.as_ref().map_or(true, |t| t.shape() != (m, n)) {
            debug!(width = m, height = n, "Planning transforms for new frame size");
            self.transform = Some(SpectralTransform::new(m, n));
        }
        let transform = self.transform.get_or_insert_with(|| SpectralTransform::new(m, n));

        let mut spectrum = field.clone();
        transform.forward(&mut spectrum)?;
        center_shift(&mut spectrum);

        let mode = self.mode;
        let data = if mode == ReconstructionMode::Spectrum {
            spectrum.amplitude()
        } else {
            let filter = self.filter.as_ref().ok_or(HoloError::NoFilterSelected)?;
            let mut u = apply_and_recenter(&spectrum, filter)?;
            inverse_center_shift(&mut u);
            transform.inverse(&mut u, true)?;

            let (dx, dy) = (self.optics.pitch_x_um(), self.optics.pitch_y_um());
            let mut u = self
                .propagator
                .propagate(&u, self.optics.wavelength_um(), self.tuning.z_um, dx, dy)?;

            match mode {
                ReconstructionMode::Intensity => u.intensity(),
                ReconstructionMode::Amplitude => u.amplitude(),
                _ => {
                    if self.tuning.has_phase_correction() {
                        self.tuner.compensate(&mut u, &self.optics, &self.tuning)?;
                    }
                    u.phase()
                }
            }
        };
        self.last_spectrum = Some(spectrum);
        trace!(%mode, width = m, height = n, "Frame reconstructed");

        let calibration = mode.requires_filter().then(|| {
            let (pw, ph) = self.optics.sample_pitch_um();
            Calibration {
                pixel_width_um: pw,
                pixel_height_um: ph,
            }
        });

        Ok(ReconstructionOutput {
            mode,
            data,
            calibration,
            value_unit: mode.value_unit(),
        })
    }

    /// Centred full-frame spectrum of the most recent frame
    pub fn last_spectrum(&self) -> Option<&ComplexField> {
        self.last_spectrum.as_ref()
    }

    /// ln(1 + |S|) of the last spectrum, the image a filter is drawn on
    pub fn filter_preview(&self) -> Option<RealField> {
        self.last_spectrum
            .as_ref()
            .map(|s| s.amplitude().map(f64::ln_1p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::Rect;
    use crate::synthesis::*;
    use crate::types::{complex_ops, Complex};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f64::consts::PI;

    fn optics() -> OpticalParameters {
        OpticalParameters::new(0.633, 10.0, 10.0, 1.0, 1.0, 100_000.0).unwrap()
    }

    fn test_frame(m: usize, n: usize) -> RawFrame {
        let data = (0..m * n)
            .map(|i| {
                let (x, y) = ((i % m) as f64, (i / m) as f64);
                (100.0 + 50.0 * (2.0 * PI * (x / 4.0 + y / 8.0)).cos()) as u8
            })
            .collect();
        RawFrame::from_u8(m, n, data).unwrap()
    }

    #[test]
    fn test_filtered_modes_disabled_until_filter() {
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        assert!(!pipeline.filtered_modes_enabled());

        for mode in [
            ReconstructionMode::Intensity,
            ReconstructionMode::Amplitude,
            ReconstructionMode::Phase,
        ] {
            assert_eq!(
                pipeline.apply(Command::SetMode(mode)),
                Err(HoloError::ModeDisabled(mode))
            );
            assert_eq!(pipeline.mode(), ReconstructionMode::Spectrum);
        }

        let filter = ApertureMask::rectangle(Rect::new(0, 0, 4, 4)).unwrap();
        pipeline.apply(Command::SetFilter(filter)).unwrap();
        assert!(pipeline.filtered_modes_enabled());
        pipeline.apply(Command::SetMode(ReconstructionMode::Phase)).unwrap();
        assert_eq!(pipeline.mode(), ReconstructionMode::Phase);
        pipeline.apply(Command::SetMode(ReconstructionMode::Spectrum)).unwrap();
        assert_eq!(pipeline.mode(), ReconstructionMode::Spectrum);
    }

    #[test]
    fn test_spectrum_output() {
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        let frame = test_frame(8, 8);
        let out = pipeline.process_frame(&frame).unwrap();

        assert_eq!(out.mode, ReconstructionMode::Spectrum);
        assert_eq!(out.calibration, None);
        assert_eq!(out.value_unit, "adim");
        // DC term lands at the centre
        let dc: f64 = frame.to_real_field().data().iter().sum();
        assert_relative_eq!(out.data.get(4, 4), dc, max_relative = 1e-12);
        assert!(pipeline.filter_preview().is_some());
    }

    #[test]
    fn test_filter_preview_is_log_magnitude() {
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        assert!(pipeline.filter_preview().is_none());
        let out = pipeline.process_frame(&test_frame(8, 4)).unwrap();
        let preview = pipeline.filter_preview().unwrap();
        for (p, s) in preview.data().iter().zip(out.data.data()) {
            assert_relative_eq!(*p, s.ln_1p(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_intensity_is_amplitude_squared() {
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        let frame = test_frame(8, 8);
        let filter = ApertureMask::rectangle(Rect::new(4, 2, 4, 4)).unwrap();
        pipeline.apply(Command::SetFilter(filter)).unwrap();
        pipeline.apply(Command::SetTuning(TuningParameters::new(25.0, 0.0, 0.0, 0.0).unwrap())).unwrap();

        pipeline.apply(Command::SetMode(ReconstructionMode::Amplitude)).unwrap();
        let amp = pipeline.process_frame(&frame).unwrap();
        pipeline.apply(Command::SetMode(ReconstructionMode::Intensity)).unwrap();
        let int = pipeline.process_frame(&frame).unwrap();

        for (a, i) in amp.data.data().iter().zip(int.data.data()) {
            assert_relative_eq!(a * a, *i, epsilon = 1e-9);
        }
        assert_eq!(
            int.calibration,
            Some(Calibration {
                pixel_width_um: 10.0,
                pixel_height_um: 10.0
            })
        );
    }

    #[test]
    fn test_phase_ramp_end_to_end() {
        let (m, n) = (4, 4);
        let ramp = RealField::from_fn(m, n, |x, y| 0.3 * x as f64 + 0.2 * y as f64);

        let mut setup = SynthesisSetup::new();
        setup.set_input_geometry(InputGeometry::new(40.0, 40.0, (0.0, 1.0), (0.0, 1.5)).unwrap());
        setup.set_illumination(Illumination::new(0.633, 0.0).unwrap());
        setup.set_imaging(Imaging::new(1.0, 1.0, 100_000.0).unwrap());
        setup.set_angles(ReferenceAngles::DiffractionLimited);
        setup
            .set_input_images(InputImages::AmplitudePhase {
                amplitude: None,
                phase: Some(ramp.clone()),
            })
            .unwrap();
        let outcome = HologramSynthesizer::new()
            .create_image(&setup, &[], &mut StdRng::seed_from_u64(0))
            .unwrap();

        let mut pipeline = LiveReconstructionPipeline::new(optics());
        pipeline
            .apply(Command::SetFilter(ApertureMask::rectangle(Rect::full(m, n)).unwrap()))
            .unwrap();
        pipeline.apply(Command::SetMode(ReconstructionMode::Phase)).unwrap();
        let out = pipeline.reconstruct(&outcome.object_field).unwrap();
        assert_eq!(out.value_unit, "rad");

        // Two forward-transform lenses invert the image
        for y in 0..n {
            for x in 0..m {
                let expected = ramp.get((m - x) % m, (n - y) % n);
                let d = complex_ops::phase_distance(out.data.get(x, y), expected);
                assert_relative_eq!(d, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_phase_compensation_applied_only_when_tuned() {
        let field = ComplexField::from_fn(4, 4, |_, _| Complex::new(2.0, 0.0));
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        pipeline
            .apply(Command::SetFilter(ApertureMask::rectangle(Rect::full(4, 4)).unwrap()))
            .unwrap();
        pipeline.apply(Command::SetMode(ReconstructionMode::Phase)).unwrap();

        let flat = pipeline.reconstruct(&field).unwrap();
        assert!(flat.data.data().iter().all(|p| p.abs() < 1e-12));

        pipeline
            .apply(Command::SetTuning(TuningParameters::new(0.0, 0.0, 0.0, 0.4).unwrap()))
            .unwrap();
        let shifted = pipeline.reconstruct(&field).unwrap();
        assert!(shifted.data.data().iter().all(|p| (p - 0.4).abs() < 1e-12));
    }

    #[test]
    fn test_ill_conditioned_tilt_surfaces() {
        let field = ComplexField::from_fn(4, 4, |_, _| Complex::new(1.0, 0.0));
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        pipeline
            .apply(Command::SetFilter(ApertureMask::rectangle(Rect::full(4, 4)).unwrap()))
            .unwrap();
        pipeline.apply(Command::SetMode(ReconstructionMode::Phase)).unwrap();
        pipeline
            .apply(Command::SetTuning(TuningParameters::new(0.0, 1_000.0, 0.0, 0.0).unwrap()))
            .unwrap();
        assert!(matches!(
            pipeline.reconstruct(&field),
            Err(HoloError::IllConditionedTilt { axis: 'x', .. })
        ));
    }

    #[test]
    fn test_filter_checked_against_last_frame() {
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        pipeline.process_frame(&test_frame(8, 8)).unwrap();
        let too_big = ApertureMask::rectangle(Rect::new(6, 6, 4, 4)).unwrap();
        assert!(matches!(
            pipeline.apply(Command::SetFilter(too_big)),
            Err(HoloError::RectOutOfBounds { .. })
        ));
        assert!(pipeline.filter().is_none());
    }

    #[test]
    fn test_step_z_and_log_scale() {
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        assert!(pipeline.log_scale());
        pipeline.apply(Command::StepZ(ZStep::Increase)).unwrap();
        pipeline.apply(Command::StepZ(ZStep::Increase)).unwrap();
        pipeline.apply(Command::StepZ(ZStep::Decrease)).unwrap();
        assert_eq!(pipeline.tuning().z_um, 10.0);
        pipeline.apply(Command::SetLogScale(false)).unwrap();
        assert!(!pipeline.log_scale());
    }

    #[test]
    fn test_closes_loop_with_synthesized_hologram() {
        let mut setup = SynthesisSetup::new();
        setup.set_input_geometry(InputGeometry::new(64.0, 64.0, (0.5, 1.0), (0.0, 1.0)).unwrap());
        setup.set_illumination(Illumination::new(0.633, 0.1).unwrap());
        setup.set_imaging(Imaging::new(20.0, 0.4, 200_000.0).unwrap());
        setup.set_angles(ReferenceAngles::DiffractionLimited);
        setup
            .set_input_images(InputImages::AmplitudePhase {
                amplitude: Some(RealField::from_fn(16, 16, |x, y| ((x ^ y) & 3) as f64)),
                phase: None,
            })
            .unwrap();
        let outcome = HologramSynthesizer::new()
            .create_image(&setup, &[SynthesisView::Hologram], &mut StdRng::seed_from_u64(9))
            .unwrap();

        let frame = outcome.hologram.to_raw_frame();
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        pipeline
            .apply(Command::SetFilter(ApertureMask::rectangle(Rect::new(8, 8, 6, 6)).unwrap()))
            .unwrap();
        pipeline.apply(Command::SetMode(ReconstructionMode::Amplitude)).unwrap();
        let out = pipeline.process_frame(&frame).unwrap();
        assert_eq!(out.data.shape(), (16, 16));
        assert!(out.data.data().iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_full_filter_is_identity_for_odd_sizes() {
        for &(m, n) in &[(4, 4), (5, 5), (5, 4)] {
            let ramp = RealField::from_fn(m, n, |x, y| 0.1 * (x + y) as f64);
            let field = ComplexField::from_polar(&RealField::filled(m, n, 1.0), &ramp).unwrap();
            let mut pipeline = LiveReconstructionPipeline::new(optics());
            pipeline
                .apply(Command::SetFilter(ApertureMask::rectangle(Rect::full(m, n)).unwrap()))
                .unwrap();
            pipeline.apply(Command::SetMode(ReconstructionMode::Phase)).unwrap();

            let out = pipeline.reconstruct(&field).unwrap();
            for y in 0..n {
                for x in 0..m {
                    let d = complex_ops::phase_distance(out.data.get(x, y), ramp.get(x, y));
                    assert_relative_eq!(d, 0.0, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_tilt_recomputed_after_optics_change() {
        let field = ComplexField::from_fn(4, 4, |_, _| Complex::new(1.0, 0.0));
        let mut pipeline = LiveReconstructionPipeline::new(optics());
        pipeline
            .apply(Command::SetFilter(ApertureMask::rectangle(Rect::full(4, 4)).unwrap()))
            .unwrap();
        pipeline.apply(Command::SetMode(ReconstructionMode::Phase)).unwrap();
        // 50 * 0.633 / (4 * 10) is below one; at 1 um it is 1.25
        pipeline
            .apply(Command::SetTuning(TuningParameters::new(0.0, 50.0, 0.0, 0.0).unwrap()))
            .unwrap();
        assert!(pipeline.reconstruct(&field).is_ok());

        let longer = pipeline.optics().with_wavelength(1.0).unwrap();
        pipeline.apply(Command::SetOptics(longer)).unwrap();
        assert!(matches!(
            pipeline.reconstruct(&field),
            Err(HoloError::IllConditionedTilt { axis: 'x', .. })
        ));
    }
}
