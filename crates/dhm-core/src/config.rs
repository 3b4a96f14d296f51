//! # Configuration System
//!
//! YAML-persisted preferences for hologram synthesis and live
//! reconstruction. Values are read once at startup to seed parameter
//! structs and written back at shutdown; they never drive control flow.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `DHM_CONFIG` environment variable
//! 2. `./dhm.yaml` (current directory)
//! 3. `~/.config/dhm/config.yaml` (user config)
//! 4. `/etc/dhm/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! synthesis:
//!   wavelength: 633.0
//!   wavelength_unit: nm
//!   magnification: 40.0
//!   numerical_aperture: 0.65
//!   tube_lens_focal: 200.0
//!   tube_lens_focal_unit: mm
//!   diffraction_limited: true
//!   outputs: [hologram, phase]
//!   seed: 42
//!
//! reconstruction:
//!   wavelength: 0.633
//!   pitch_x: 3.45
//!   pitch_y: 3.45
//!   tuning:
//!     z: 25.0
//!
//! live:
//!   frame_interval_ms: 10
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::live::LiveConfig;
use crate::observe::LogConfig;
use crate::params::{LengthUnit, OpticalParameters, TuningParameters};
use crate::reconstruction::{Command, LiveReconstructionPipeline};
use crate::synthesis::{Illumination, Imaging, InputGeometry, ReferenceAngles, SynthesisSetup, SynthesisView};
use crate::types::HoloError;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "DHM_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write configuration file
    ReadError(String),
    /// Failed to parse or serialize configuration
    ParseError(String),
    /// Value rejected by parameter validation
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(section: &str) -> impl Fn(HoloError) -> ConfigError + '_ {
    move |e| ConfigError::ValidationError(format!("{}: {}", section, e))
}

/// Representation of the synthesis input images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRepresentation {
    RealImaginary,
    #[default]
    AmplitudePhase,
}

/// Hologram synthesis preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub wavelength: f64,
    pub wavelength_unit: LengthUnit,
    /// Fraction of λ
    pub roughness: f64,
    pub magnification: f64,
    pub numerical_aperture: f64,
    pub tube_lens_focal: f64,
    pub tube_lens_focal_unit: LengthUnit,
    /// Physical size of the simulated object
    pub input_width: f64,
    pub input_height: f64,
    pub input_unit: LengthUnit,
    pub input_type: InputRepresentation,
    pub amplitude_min: f64,
    pub amplitude_max: f64,
    /// Radians
    pub phase_min: f64,
    pub phase_max: f64,
    pub diffraction_limited: bool,
    /// Radians; ignored when diffraction limited
    pub polar: f64,
    pub azimuth: f64,
    pub outputs: Vec<SynthesisView>,
    /// Fixed seed for the roughness noise
    pub seed: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            wavelength: 633.0,
            wavelength_unit: LengthUnit::Nanometer,
            roughness: 0.5,
            magnification: 40.0,
            numerical_aperture: 0.65,
            tube_lens_focal: 200.0,
            tube_lens_focal_unit: LengthUnit::Millimeter,
            input_width: 100.0,
            input_height: 100.0,
            input_unit: LengthUnit::Micrometer,
            input_type: InputRepresentation::AmplitudePhase,
            amplitude_min: 0.0,
            amplitude_max: 1.0,
            phase_min: 0.0,
            phase_max: PI,
            diffraction_limited: true,
            polar: 0.0,
            azimuth: 0.0,
            outputs: vec![SynthesisView::Hologram],
            seed: None,
        }
    }
}

impl SynthesisConfig {
    pub fn input_geometry(&self) -> Result<InputGeometry, ConfigError> {
        InputGeometry::new(
            self.input_unit.to_um(self.input_width),
            self.input_unit.to_um(self.input_height),
            (self.amplitude_min, self.amplitude_max),
            (self.phase_min, self.phase_max),
        )
        .map_err(invalid("synthesis"))
    }

    pub fn illumination(&self) -> Result<Illumination, ConfigError> {
        Illumination::new(self.wavelength_unit.to_um(self.wavelength), self.roughness)
            .map_err(invalid("synthesis"))
    }

    pub fn imaging(&self) -> Result<Imaging, ConfigError> {
        Imaging::new(
            self.magnification,
            self.numerical_aperture,
            self.tube_lens_focal_unit.to_um(self.tube_lens_focal),
        )
        .map_err(invalid("synthesis"))
    }

    pub fn angles(&self) -> Result<ReferenceAngles, ConfigError> {
        if self.diffraction_limited {
            Ok(ReferenceAngles::DiffractionLimited)
        } else {
            ReferenceAngles::manual(self.polar, self.azimuth).map_err(invalid("synthesis"))
        }
    }

    /// Populate every prerequisite except the object images
    pub fn apply_to(&self, setup: &mut SynthesisSetup) -> Result<(), ConfigError> {
        let input = self.input_geometry()?;
        let illumination = self.illumination()?;
        let imaging = self.imaging()?;
        let angles = self.angles()?;
        setup.set_input_geometry(input);
        setup.set_illumination(illumination);
        setup.set_imaging(imaging);
        setup.set_angles(angles);
        Ok(())
    }

    /// Noise source: seeded when `seed` is set
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Refocus and tilt tuning preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub z: f64,
    pub z_unit: LengthUnit,
    pub fx: f64,
    pub fy: f64,
    /// Radians
    pub linear_phase: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            z: 0.0,
            z_unit: LengthUnit::Micrometer,
            fx: 0.0,
            fy: 0.0,
            linear_phase: 0.0,
        }
    }
}

/// Live reconstruction preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub wavelength: f64,
    pub wavelength_unit: LengthUnit,
    /// Sensor pixel pitch
    pub pitch_x: f64,
    pub pitch_y: f64,
    pub pitch_unit: LengthUnit,
    pub magnification: f64,
    pub numerical_aperture: f64,
    pub tube_lens_focal: f64,
    pub tube_lens_focal_unit: LengthUnit,
    pub log_scale: bool,
    pub tuning: TuningConfig,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            wavelength: 0.633,
            wavelength_unit: LengthUnit::Micrometer,
            pitch_x: 3.45,
            pitch_y: 3.45,
            pitch_unit: LengthUnit::Micrometer,
            magnification: 40.0,
            numerical_aperture: 0.65,
            tube_lens_focal: 200.0,
            tube_lens_focal_unit: LengthUnit::Millimeter,
            log_scale: true,
            tuning: TuningConfig::default(),
        }
    }
}

impl ReconstructionConfig {
    pub fn optics(&self) -> Result<OpticalParameters, ConfigError> {
        OpticalParameters::builder()
            .wavelength(self.wavelength, self.wavelength_unit)
            .pitch(self.pitch_x, self.pitch_y, self.pitch_unit)
            .magnification(self.magnification)
            .numerical_aperture(self.numerical_aperture)
            .tube_lens_focal(self.tube_lens_focal, self.tube_lens_focal_unit)
            .build()
            .map_err(invalid("reconstruction"))
    }

    pub fn tuning(&self) -> Result<TuningParameters, ConfigError> {
        let t = &self.tuning;
        TuningParameters::new(t.z_unit.to_um(t.z), t.fx, t.fy, t.linear_phase).map_err(invalid("reconstruction.tuning"))
    }

    /// Pipeline seeded with the persisted optics, tuning and log scale
    pub fn pipeline(&self) -> Result<LiveReconstructionPipeline, ConfigError> {
        let mut pipeline = LiveReconstructionPipeline::new(self.optics()?);
        let commands = [
            Command::SetTuning(self.tuning()?),
            Command::SetLogScale(self.log_scale),
        ];
        for command in commands {
            pipeline.apply(command).map_err(invalid("reconstruction"))?;
        }
        Ok(pipeline)
    }

    /// Record the pipeline's committed state for the next session
    pub fn update_from(&mut self, pipeline: &LiveReconstructionPipeline) {
        let optics = pipeline.optics();
        self.wavelength = self.wavelength_unit.from_um(optics.wavelength_um());
        self.pitch_x = self.pitch_unit.from_um(optics.pitch_x_um());
        self.pitch_y = self.pitch_unit.from_um(optics.pitch_y_um());
        self.magnification = optics.magnification();
        self.numerical_aperture = optics.numerical_aperture();
        self.tube_lens_focal = self.tube_lens_focal_unit.from_um(optics.tube_lens_focal_um());

        let tuning = pipeline.tuning();
        self.tuning.z = self.tuning.z_unit.from_um(tuning.z_um);
        self.tuning.fx = tuning.fx;
        self.tuning.fy = tuning.fy;
        self.tuning.linear_phase = tuning.linear_phase;
        self.log_scale = pipeline.log_scale();
    }
}

/// Live worker timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub frame_interval_ms: u64,
    pub fps_batch: u32,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 10,
            fps_batch: 5,
        }
    }
}

impl LiveSettings {
    pub fn live_config(&self) -> LiveConfig {
        LiveConfig::default()
            .with_frame_interval(Duration::from_millis(self.frame_interval_ms))
            .with_fps_batch(self.fps_batch)
    }
}

/// Complete DHM configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhmConfig {
    /// Configuration version
    pub version: String,
    pub synthesis: SynthesisConfig,
    pub reconstruction: ReconstructionConfig,
    pub live: LiveSettings,
    pub logging: LogConfig,
}

impl Default for DhmConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            synthesis: SynthesisConfig::default(),
            reconstruction: ReconstructionConfig::default(),
            live: LiveSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl DhmConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!("{}={}", CONFIG_ENV, path.display())));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./dhm.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "dhm") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/dhm/config.yaml"));
        paths
    }

    /// Validate every section through the parameter constructors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.synthesis.input_geometry()?;
        self.synthesis.illumination()?;
        self.synthesis.imaging()?;
        self.synthesis.angles()?;
        self.reconstruction.optics()?;
        self.reconstruction.tuning()?;

        if self.live.fps_batch == 0 {
            return Err(ConfigError::ValidationError("live.fps_batch must be > 0".to_string()));
        }
        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            synthesis: SynthesisConfig {
                outputs: vec![SynthesisView::Hologram, SynthesisView::Phase],
                seed: Some(42),
                ..Default::default()
            },
            reconstruction: ReconstructionConfig {
                tuning: TuningConfig {
                    z: 25.0,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
