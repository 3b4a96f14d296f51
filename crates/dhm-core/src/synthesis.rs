//! Hologram synthesis
//!
//! Simulates an off-axis DHM: an object field passes a 4f imaging system
//! (objective, pupil, tube lens) and interferes with a tilted plane
//! reference on the sensor.
//!
//! ## Optical train
//!
//! ```text
//!  object ──FFT──► shift ──► × pupil ──► shift ──FFT──► image field ──┐
//!  (pitch p)       focal plane (pitch pf)               (pitch po)    │
//!                                                                     ▼
//!                            reference R(x, y) ──────────────► |U + R|²
//! ```
//!
//! | Quantity | Expression |
//! |----------|------------|
//! | input pitch p | sample width / M |
//! | objective focal fo | f_TL / magnification |
//! | focal pitch pf | λ·fo / (M·p) |
//! | pupil radius | (NA·f_TL / magnification) / pf px |
//! | output pitch po | λ·f_TL / (pf·M) |
//!
//! ## Usage
//!
//! ```rust
//! use dhm_core::field::RealField;
//! use dhm_core::synthesis::*;
//! use rand::SeedableRng;
//!
//! let mut setup = SynthesisSetup::new();
//! setup.set_input_geometry(InputGeometry::new(40.0, 40.0, (0.0, 1.0), (0.0, 1.0)).unwrap());
//! setup.set_illumination(Illumination::new(0.633, 0.0).unwrap());
//! setup.set_imaging(Imaging::new(1.0, 0.5, 200_000.0).unwrap());
//! setup.set_angles(ReferenceAngles::DiffractionLimited);
//! setup
//!     .set_input_images(InputImages::AmplitudePhase {
//!         amplitude: None,
//!         phase: Some(RealField::from_fn(8, 8, |x, _| x as f64)),
//!     })
//!     .unwrap();
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let outcome = HologramSynthesizer::new()
//!     .create_image(&setup, &[SynthesisView::Hologram], &mut rng)
//!     .unwrap();
//! assert_eq!(outcome.hologram.data.shape(), (8, 8));
//! ```

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;
use std::fmt;
use tracing::{debug, info, warn};

use crate::aperture::circular_pupil;
use crate::field::{ComplexField, RealField};
use crate::frame::HologramFrame;
use crate::spectral::{center_shift, inverse_center_shift, SpectralTransform};
use crate::types::{complex_ops, ensure_angle, ensure_positive, HoloError, HoloResult};

/// Piece of setup required before an image can be synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Prerequisite {
    Input,
    Illumination,
    Imaging,
    Angles,
    Field,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "input geometry",
            Self::Illumination => "illumination",
            Self::Imaging => "imaging optics",
            Self::Angles => "angles",
            Self::Field => "object field",
        };
        f.write_str(name)
    }
}

/// Physical size of the simulated object and its value ranges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputGeometry {
    pub width_um: f64,
    pub height_um: f64,
    /// Amplitude range the amplitude image is rescaled into
    pub amplitude_range: (f64, f64),
    /// Phase range (rad) the phase image is rescaled into
    pub phase_range: (f64, f64),
}

impl InputGeometry {
    pub fn new(
        width_um: f64,
        height_um: f64,
        amplitude_range: (f64, f64),
        phase_range: (f64, f64),
    ) -> HoloResult<Self> {
        ensure_positive(width_um, HoloError::InvalidSampleSize)?;
        ensure_positive(height_um, HoloError::InvalidSampleSize)?;
        for (name, value) in [
            ("amplitude minimum", amplitude_range.0),
            ("amplitude maximum", amplitude_range.1),
            ("phase minimum", phase_range.0),
            ("phase maximum", phase_range.1),
        ] {
            if !value.is_finite() {
                return Err(HoloError::InvalidValue { name, value });
            }
        }
        Ok(Self {
            width_um,
            height_um,
            amplitude_range,
            phase_range,
        })
    }
}

/// Source wavelength and surface roughness
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Illumination {
    pub wavelength_um: f64,
    /// Roughness as a fraction of λ; the peak (3σ) height deviation is half of it
    pub roughness: f64,
}

impl Illumination {
    pub fn new(wavelength_um: f64, roughness: f64) -> HoloResult<Self> {
        ensure_positive(wavelength_um, HoloError::InvalidWavelength)?;
        if !roughness.is_finite() || roughness < 0.0 {
            return Err(HoloError::InvalidValue {
                name: "roughness",
                value: roughness,
            });
        }
        Ok(Self {
            wavelength_um,
            roughness,
        })
    }

    /// Standard deviation of the height noise in µm
    pub fn roughness_sigma_um(&self) -> f64 {
        (self.roughness / 2.0) * self.wavelength_um / 3.0
    }
}

/// Microscope objective and tube lens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Imaging {
    pub magnification: f64,
    pub numerical_aperture: f64,
    pub tube_lens_focal_um: f64,
}

impl Imaging {
    pub fn new(magnification: f64, numerical_aperture: f64, tube_lens_focal_um: f64) -> HoloResult<Self> {
        ensure_positive(magnification, HoloError::InvalidMagnification)?;
        if !(numerical_aperture.is_finite() && numerical_aperture > 0.0 && numerical_aperture <= 1.0) {
            return Err(HoloError::InvalidNumericalAperture(numerical_aperture));
        }
        ensure_positive(tube_lens_focal_um, HoloError::InvalidFocalLength)?;
        Ok(Self {
            magnification,
            numerical_aperture,
            tube_lens_focal_um,
        })
    }

    pub fn objective_focal_um(&self) -> f64 {
        self.tube_lens_focal_um / self.magnification
    }
}

/// Reference wave direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReferenceAngles {
    /// Smallest tilt that still separates the orders at the output pitch
    DiffractionLimited,
    /// Explicit polar and azimuthal angles in radians
    Manual { polar: f64, azimuth: f64 },
}

impl ReferenceAngles {
    pub fn manual(polar: f64, azimuth: f64) -> HoloResult<Self> {
        Ok(Self::Manual {
            polar: ensure_angle(polar)?,
            azimuth: ensure_angle(azimuth)?,
        })
    }
}

/// Object images in one of the two supported representations
#[derive(Debug, Clone, PartialEq)]
pub enum InputImages {
    RealImaginary {
        real: Option<RealField>,
        imaginary: Option<RealField>,
    },
    AmplitudePhase {
        amplitude: Option<RealField>,
        phase: Option<RealField>,
    },
}

impl InputImages {
    fn planes(&self) -> (Option<&RealField>, Option<&RealField>) {
        match self {
            Self::RealImaginary { real, imaginary } => (real.as_ref(), imaginary.as_ref()),
            Self::AmplitudePhase { amplitude, phase } => (amplitude.as_ref(), phase.as_ref()),
        }
    }

    /// Shared (width, height) of the supplied planes
    pub fn shape(&self) -> HoloResult<(usize, usize)> {
        match self.planes() {
            (Some(a), Some(b)) => {
                a.ensure_same_shape(b)?;
                Ok(a.shape())
            }
            (Some(a), None) | (None, Some(a)) => Ok(a.shape()),
            (None, None) => Err(HoloError::NoInputImages),
        }
    }
}

/// Images that can be requested from a synthesis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisView {
    Amplitude,
    Hologram,
    Imaginary,
    Intensity,
    Phase,
    Real,
}

impl SynthesisView {
    pub const ALL: [SynthesisView; 6] = [
        Self::Amplitude,
        Self::Hologram,
        Self::Imaginary,
        Self::Intensity,
        Self::Phase,
        Self::Real,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Amplitude => "Amplitude",
            Self::Hologram => "Hologram",
            Self::Imaginary => "Imaginary",
            Self::Intensity => "Intensity",
            Self::Phase => "Phase",
            Self::Real => "Real",
        }
    }
}

/// Collects the synthesis prerequisites in any order
#[derive(Debug, Clone, Default)]
pub struct SynthesisSetup {
    input: Option<InputGeometry>,
    illumination: Option<Illumination>,
    imaging: Option<Imaging>,
    angles: Option<ReferenceAngles>,
    images: Option<InputImages>,
}

impl SynthesisSetup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input_geometry(&mut self, input: InputGeometry) {
        self.input = Some(input);
    }

    pub fn set_illumination(&mut self, illumination: Illumination) {
        self.illumination = Some(illumination);
    }

    pub fn set_imaging(&mut self, imaging: Imaging) {
        self.imaging = Some(imaging);
    }

    pub fn set_angles(&mut self, angles: ReferenceAngles) {
        self.angles = Some(angles);
    }

    /// Store the object images after checking their shapes.
    ///
    /// On error the previously stored images are kept.
    pub fn set_input_images(&mut self, images: InputImages) -> HoloResult<()> {
        let (w, h) = images.shape()?;
        debug!(width = w, height = h, "Object images accepted");
        self.images = Some(images);
        Ok(())
    }

    /// Bundle every prerequisite, or report the missing ones
    pub fn validate(&self) -> Readiness {
        match (
            self.input,
            self.illumination,
            self.imaging,
            self.angles,
            self.images.as_ref(),
        ) {
            (Some(input), Some(illumination), Some(imaging), Some(angles), Some(images)) => {
                Readiness::Ready(SynthesisPlan {
                    input,
                    illumination,
                    imaging,
                    angles,
                    images: images.clone(),
                })
            }
            _ => {
                let mut missing = BTreeSet::new();
                if self.input.is_none() {
                    missing.insert(Prerequisite::Input);
                }
                if self.illumination.is_none() {
                    missing.insert(Prerequisite::Illumination);
                }
                if self.imaging.is_none() {
                    missing.insert(Prerequisite::Imaging);
                }
                if self.angles.is_none() {
                    missing.insert(Prerequisite::Angles);
                }
                if self.images.is_none() {
                    missing.insert(Prerequisite::Field);
                }
                Readiness::NotReady(missing)
            }
        }
    }
}

/// Outcome of [`SynthesisSetup::validate`]
#[derive(Debug, Clone)]
pub enum Readiness {
    Ready(SynthesisPlan),
    NotReady(BTreeSet<Prerequisite>),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn into_plan(self) -> HoloResult<SynthesisPlan> {
        match self {
            Self::Ready(plan) => Ok(plan),
            Self::NotReady(missing) => Err(HoloError::MissingPrerequisites(missing)),
        }
    }
}

/// Complete, validated synthesis inputs
#[derive(Debug, Clone)]
pub struct SynthesisPlan {
    pub input: InputGeometry,
    pub illumination: Illumination,
    pub imaging: Imaging,
    pub angles: ReferenceAngles,
    pub images: InputImages,
}

impl SynthesisPlan {
    /// Build the object-plane field, drawing roughness noise from `rng`
    pub fn input_field<R: Rng + ?Sized>(&self, rng: &mut R) -> HoloResult<ComplexField> {
        let (w, h) = self.images.shape()?;
        match &self.images {
            InputImages::RealImaginary { real, imaginary } => {
                let re = real.clone().unwrap_or_else(|| RealField::zeros(w, h));
                let im = imaginary.clone().unwrap_or_else(|| RealField::zeros(w, h));
                ComplexField::from_parts(&re, &im)
            }
            InputImages::AmplitudePhase { amplitude, phase } => {
                let (amp_min, amp_max) = self.input.amplitude_range;
                let (pha_min, pha_max) = self.input.phase_range;
                let amp = match amplitude {
                    Some(a) => rescale(a, amp_min, amp_max),
                    None => RealField::filled(w, h, amp_max),
                };
                let mut pha = match phase {
                    Some(p) => rescale(p, pha_min, pha_max),
                    None => RealField::zeros(w, h),
                };

                let lambda = self.illumination.wavelength_um;
                let normal = Normal::new(0.0, self.illumination.roughness_sigma_um()).map_err(|_| {
                    HoloError::InvalidValue {
                        name: "roughness",
                        value: self.illumination.roughness,
                    }
                })?;
                for v in pha.data_mut() {
                    *v += normal.sample(rng) * 2.0 * PI / lambda;
                }
                ComplexField::from_polar(&amp, &pha)
            }
        }
    }
}

/// Min-max rescale into [lo, hi]; constant images map to `lo`
fn rescale(image: &RealField, lo: f64, hi: f64) -> RealField {
    let (min, max) = (image.min(), image.max());
    let delta = max - min;
    image.map(|v| {
        let mut t = v - min;
        if delta != 0.0 {
            t /= delta;
        }
        t * (hi - lo) + lo
    })
}

/// Reference angles actually used
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnglesUsed {
    pub polar: f64,
    pub azimuth: f64,
}

/// Advisory check of objective choice against the output sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibilityReport {
    /// Largest NA the system can sample, rounded to 3 decimals
    pub max_numerical_aperture: f64,
    pub feasible: bool,
}

impl FeasibilityReport {
    /// NA/magnification must not exceed λ/(po·(2 + 3√2))
    pub fn evaluate(imaging: &Imaging, wavelength_um: f64, output_pitch_um: f64) -> Self {
        let required = imaging.numerical_aperture / imaging.magnification;
        let limit = wavelength_um / (2.0 + 3.0 * 2f64.sqrt()) / output_pitch_um;
        let max_na = (limit * imaging.magnification * 1000.0).round() / 1000.0;
        Self {
            max_numerical_aperture: max_na,
            feasible: limit >= required,
        }
    }
}

/// Everything a synthesis run produces
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    /// Complex field on the sensor, before interference
    pub object_field: ComplexField,
    /// |object + reference|², always produced
    pub hologram: HologramFrame,
    /// Requested views, calibrated with the output pitch
    pub views: BTreeMap<SynthesisView, HologramFrame>,
    pub input_pitch_um: f64,
    pub focal_pitch_um: f64,
    pub output_pitch_um: f64,
    pub angles: AnglesUsed,
    pub feasibility: FeasibilityReport,
}

/// Runs the optical train; keeps FFT plans between runs of the same size
#[derive(Debug, Default)]
pub struct HologramSynthesizer {
    transform: Option<SpectralTransform>,
}

impl HologramSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `setup` and synthesize; does nothing when prerequisites are missing
    pub fn create_image<R: Rng + ?Sized>(
        &mut self,
        setup: &SynthesisSetup,
        views: &[SynthesisView],
        rng: &mut R,
    ) -> HoloResult<SynthesisOutcome> {
        let plan = setup.validate().into_plan().map_err(|e| {
            warn!(error = %e, "Hologram synthesis not ready");
            e
        })?;
        self.synthesize(&plan, views, rng)
    }

    /// Run every stage for a validated plan
    pub fn synthesize<R: Rng + ?Sized>(
        &mut self,
        plan: &SynthesisPlan,
        views: &[SynthesisView],
        rng: &mut R,
    ) -> HoloResult<SynthesisOutcome> {
        let mut field = plan.input_field(rng)?;
        let (m, n) = field.shape();
        let lambda = plan.illumination.wavelength_um;
        let imaging = plan.imaging;

        if self.transform.as_ref().map_or(true, |t| t.shape() != (m, n)) {
            self.transform = Some(SpectralTransform::new(m, n));
        }
        let transform = self.transform.get_or_insert_with(|| SpectralTransform::new(m, n));

        // First lens
        let input_pitch = plan.input.width_um / m as f64;
        transform.forward(&mut field)?;
        center_shift(&mut field);
        let focal_pitch = lambda * imaging.objective_focal_um() / (m as f64 * input_pitch);

        // Pupil
        let radius_px = (imaging.numerical_aperture * imaging.tube_lens_focal_um / imaging.magnification) / focal_pitch;
        field.multiply_real_assign(&circular_pupil(m, n, radius_px))?;

        // Second lens
        inverse_center_shift(&mut field);
        transform.forward(&mut field)?;
        let output_pitch = lambda * imaging.tube_lens_focal_um / (focal_pitch * m as f64);

        debug!(
            input_pitch,
            focal_pitch,
            output_pitch,
            pupil_radius_px = radius_px,
            "Optical train complete"
        );

        let angles = match plan.angles {
            ReferenceAngles::DiffractionLimited => AnglesUsed {
                polar: lambda / (2.0 * output_pitch),
                azimuth: PI / 4.0,
            },
            ReferenceAngles::Manual { polar, azimuth } => AnglesUsed { polar, azimuth },
        };
        let reference = reference_wave(m, n, lambda, output_pitch, angles, field.mean_amplitude() / 4.0);
        let mut superposed = field.clone();
        superposed.add_assign(&reference)?;
        let hologram = superposed.intensity();

        let feasibility = FeasibilityReport::evaluate(&imaging, lambda, output_pitch);
        if !feasibility.feasible {
            warn!(
                max_na = feasibility.max_numerical_aperture,
                na = imaging.numerical_aperture,
                "Objective selection is inadequate for the system"
            );
        }
        info!(
            diffraction_limited = matches!(plan.angles, ReferenceAngles::DiffractionLimited),
            polar = angles.polar,
            azimuth = angles.azimuth,
            "Hologram synthesized"
        );

        let views = views
            .iter()
            .map(|&view| {
                let data = match view {
                    SynthesisView::Amplitude => field.amplitude(),
                    SynthesisView::Hologram => hologram.clone(),
                    SynthesisView::Imaginary => field.imaginary(),
                    SynthesisView::Intensity => field.intensity(),
                    SynthesisView::Phase => field.phase(),
                    SynthesisView::Real => field.real(),
                };
                (view, HologramFrame::new(view.label(), data, output_pitch))
            })
            .collect();

        Ok(SynthesisOutcome {
            object_field: field,
            hologram: HologramFrame::new(SynthesisView::Hologram.label(), hologram, output_pitch),
            views,
            input_pitch_um: input_pitch,
            focal_pitch_um: focal_pitch,
            output_pitch_um: output_pitch,
            angles,
            feasibility,
        })
    }
}

/// Tilted plane wave with a fixed axial offset of 100 µm
fn reference_wave(
    m: usize,
    n: usize,
    wavelength_um: f64,
    pitch_um: f64,
    angles: AnglesUsed,
    amplitude: f64,
) -> ComplexField {
    let kx = angles.polar.sin() * angles.azimuth.cos();
    let ky = angles.polar.sin() * angles.azimuth.sin();
    let kz = angles.polar.cos();
    let k = 2.0 * PI / wavelength_um;
    let (cx, cy) = ((m as f64 - 1.0) / 2.0, (n as f64 - 1.0) / 2.0);

    ComplexField::from_fn(m, n, |x, y| {
        let path = kx * (x as f64 - cx) * pitch_um + ky * (y as f64 - cy) * pitch_um + kz * 100.0;
        complex_ops::from_polar(amplitude, k * path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ready_setup(angles: ReferenceAngles) -> SynthesisSetup {
        let mut setup = SynthesisSetup::new();
        setup.set_input_geometry(InputGeometry::new(80.0, 80.0, (0.2, 1.0), (0.0, PI)).unwrap());
        setup.set_illumination(Illumination::new(0.633, 0.0).unwrap());
        setup.set_imaging(Imaging::new(10.0, 0.25, 200_000.0).unwrap());
        setup.set_angles(angles);
        setup
            .set_input_images(InputImages::AmplitudePhase {
                amplitude: Some(RealField::from_fn(16, 16, |x, y| ((x + y) % 5) as f64)),
                phase: Some(RealField::from_fn(16, 16, |x, y| (x * y) as f64)),
            })
            .unwrap();
        setup
    }

    #[test]
    fn test_not_ready_lists_missing() {
        let mut setup = SynthesisSetup::new();
        setup.set_illumination(Illumination::new(0.5, 0.1).unwrap());
        match setup.validate() {
            Readiness::NotReady(missing) => {
                let expected: BTreeSet<_> = [
                    Prerequisite::Input,
                    Prerequisite::Imaging,
                    Prerequisite::Angles,
                    Prerequisite::Field,
                ]
                .into_iter()
                .collect();
                assert_eq!(missing, expected);
            }
            Readiness::Ready(_) => panic!("setup should not be ready"),
        }

        let mut rng = StdRng::seed_from_u64(1);
        let err = HologramSynthesizer::new()
            .create_image(&setup, &SynthesisView::ALL, &mut rng)
            .unwrap_err();
        assert!(matches!(err, HoloError::MissingPrerequisites(ref m) if m.len() == 4));
    }

    #[test]
    fn test_mismatched_images_rejected() {
        let mut setup = ready_setup(ReferenceAngles::DiffractionLimited);
        let before = setup.validate().into_plan().unwrap().images;

        let err = setup
            .set_input_images(InputImages::RealImaginary {
                real: Some(RealField::zeros(8, 8)),
                imaginary: Some(RealField::zeros(8, 4)),
            })
            .unwrap_err();
        assert!(matches!(err, HoloError::DimensionMismatch { .. }));
        assert_eq!(
            setup.set_input_images(InputImages::RealImaginary {
                real: None,
                imaginary: None
            }),
            Err(HoloError::NoInputImages)
        );
        assert_eq!(setup.validate().into_plan().unwrap().images, before);
    }

    #[test]
    fn test_invalid_setup_values() {
        assert!(Imaging::new(10.0, 1.2, 200_000.0).is_err());
        assert!(Imaging::new(0.0, 0.5, 200_000.0).is_err());
        assert!(Illumination::new(-0.5, 0.0).is_err());
        assert!(Illumination::new(0.5, -1.0).is_err());
        assert!(InputGeometry::new(0.0, 10.0, (0.0, 1.0), (0.0, 1.0)).is_err());
        assert_eq!(ReferenceAngles::manual(7.0, 0.0), Err(HoloError::InvalidAngle(7.0)));
        assert!(ReferenceAngles::manual(0.1, -PI).is_ok());
    }

    #[test]
    fn test_diffraction_limited_angles_reported() {
        let setup = ready_setup(ReferenceAngles::DiffractionLimited);
        let mut rng = StdRng::seed_from_u64(3);
        let out = HologramSynthesizer::new()
            .create_image(&setup, &[SynthesisView::Hologram], &mut rng)
            .unwrap();

        assert_relative_eq!(out.angles.polar, 0.633 / (2.0 * out.output_pitch_um), epsilon = 1e-12);
        assert_relative_eq!(out.angles.azimuth, PI / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_manual_angles_pass_through() {
        let angles = ReferenceAngles::manual(0.05, 0.3).unwrap();
        let setup = ready_setup(angles);
        let mut rng = StdRng::seed_from_u64(3);
        let out = HologramSynthesizer::new().create_image(&setup, &[], &mut rng).unwrap();
        assert_eq!(out.angles, AnglesUsed { polar: 0.05, azimuth: 0.3 });
        assert!(out.views.is_empty());
    }

    #[test]
    fn test_pitches() {
        let setup = ready_setup(ReferenceAngles::DiffractionLimited);
        let mut rng = StdRng::seed_from_u64(3);
        let out = HologramSynthesizer::new().create_image(&setup, &[], &mut rng).unwrap();

        assert_relative_eq!(out.input_pitch_um, 5.0);
        let focal = 0.633 * 20_000.0 / (16.0 * 5.0);
        assert_relative_eq!(out.focal_pitch_um, focal, max_relative = 1e-12);
        // The 4f train magnifies the input pitch
        assert_relative_eq!(out.output_pitch_um, 50.0, max_relative = 1e-12);
    }

    #[test]
    fn test_hologram_is_superposition_intensity() {
        let setup = ready_setup(ReferenceAngles::manual(0.02, 0.0).unwrap());
        let mut rng = StdRng::seed_from_u64(5);
        let out = HologramSynthesizer::new()
            .create_image(&setup, &SynthesisView::ALL, &mut rng)
            .unwrap();

        let angles = out.angles;
        let reference = reference_wave(16, 16, 0.633, out.output_pitch_um, angles, out.object_field.mean_amplitude() / 4.0);
        for (y, x) in [(0, 0), (3, 7), (15, 2)] {
            let expected = (out.object_field.get(x, y) + reference.get(x, y)).norm_sqr();
            assert_relative_eq!(out.hologram.data.get(x, y), expected, max_relative = 1e-12);
        }
        assert!(out.hologram.data.min() >= 0.0);
        assert_eq!(out.views.len(), 6);
        assert_eq!(out.views[&SynthesisView::Phase].label, "Phase");
        assert_eq!(out.views[&SynthesisView::Real].pitch_um, out.output_pitch_um);
    }

    #[test]
    fn test_feasibility_report() {
        let imaging = Imaging::new(10.0, 0.25, 200_000.0).unwrap();
        let report = FeasibilityReport::evaluate(&imaging, 0.633, 50.0);
        let limit = 0.633 / (2.0 + 3.0 * 2f64.sqrt()) / 50.0;
        assert!(!report.feasible);
        assert_relative_eq!(report.max_numerical_aperture, (limit * 10_000.0).round() / 1000.0);

        let report = FeasibilityReport::evaluate(&imaging, 0.633, 0.1);
        assert!(report.feasible);
    }

    #[test]
    fn test_rescale_ranges() {
        let image = RealField::from_vec(2, 2, vec![2.0, 4.0, 6.0, 10.0]).unwrap();
        let scaled = rescale(&image, 0.5, 1.0);
        assert_eq!(scaled.min(), 0.5);
        assert_eq!(scaled.max(), 1.0);
        assert_relative_eq!(scaled.get(1, 0), 0.5 + 0.25 * 0.5);

        let constant = RealField::filled(2, 2, 3.0);
        assert!(rescale(&constant, 0.2, 0.9).data().iter().all(|&v| v == 0.2));
    }

    #[test]
    fn test_missing_planes_default() {
        let mut setup = ready_setup(ReferenceAngles::DiffractionLimited);
        setup
            .set_input_images(InputImages::AmplitudePhase {
                amplitude: None,
                phase: Some(RealField::filled(4, 4, 1.0)),
            })
            .unwrap();
        let plan = setup.validate().into_plan().unwrap();
        let field = plan.input_field(&mut StdRng::seed_from_u64(0)).unwrap();
        // Amplitude defaults to the range maximum, constant phase to the minimum
        for c in field.data() {
            assert_relative_eq!(c.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(c.arg(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_roughness_is_seeded_phase_noise() {
        let mut setup = ready_setup(ReferenceAngles::DiffractionLimited);
        setup.set_illumination(Illumination::new(0.633, 0.5).unwrap());
        let plan = setup.validate().into_plan().unwrap();

        let a = plan.input_field(&mut StdRng::seed_from_u64(42)).unwrap();
        let b = plan.input_field(&mut StdRng::seed_from_u64(42)).unwrap();
        let c = plan.input_field(&mut StdRng::seed_from_u64(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Noise only touches the phase
        for (p, q) in a.amplitude().data().iter().zip(c.amplitude().data()) {
            assert_relative_eq!(p, q, epsilon = 1e-12);
        }
    }
}
