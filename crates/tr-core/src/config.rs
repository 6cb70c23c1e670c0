//! Dithering configuration, loaded from TOML or built in code.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::format::{ColorFamily, PlaneRole, SampleFormat};

/// Largest threshold pattern side. Pattern sizes must divide it.
pub const MAX_PATTERN_SIZE: usize = 32;

/// Upper bound for `ampo` and `ampn`, in destination LSB units.
pub const MAX_AMPLITUDE: f64 = 256.0;

/// Quantisation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherMode {
    /// Truncating shift or affine floor. No rounding bias, no noise.
    Fast,
    /// Round to nearest over a flat pattern; only `ampn` noise dithers.
    Round,
    /// Recursive Bayer ordered dither.
    #[default]
    Bayer,
    /// Void-and-cluster ordered dither.
    VoidAndCluster,
    /// Plastic-number low-discrepancy sequence.
    Quasirandom,
    FloydSteinberg,
    /// Sierra Filter Lite.
    FilterLite,
    Stucki,
    /// Atkinson, dropping 2/8 of the error.
    Atkinson,
    /// Variable-coefficient diffusion after Ostromoukhov (2001).
    Ostromoukhov,
}

impl DitherMode {
    pub const ALL: [Self; 10] = [
        Self::Fast,
        Self::Round,
        Self::Bayer,
        Self::VoidAndCluster,
        Self::Quasirandom,
        Self::FloydSteinberg,
        Self::FilterLite,
        Self::Stucki,
        Self::Atkinson,
        Self::Ostromoukhov,
    ];

    /// Name used in config files and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Round => "round",
            Self::Bayer => "bayer",
            Self::VoidAndCluster => "void_and_cluster",
            Self::Quasirandom => "quasirandom",
            Self::FloydSteinberg => "floyd_steinberg",
            Self::FilterLite => "filter_lite",
            Self::Stucki => "stucki",
            Self::Atkinson => "atkinson",
            Self::Ostromoukhov => "ostromoukhov",
        }
    }

    /// Modes that spread quantisation error to neighbours.
    #[must_use]
    pub const fn is_error_diffusion(self) -> bool {
        matches!(
            self,
            Self::FloydSteinberg
                | Self::FilterLite
                | Self::Stucki
                | Self::Atkinson
                | Self::Ostromoukhov
        )
    }

    /// Modes whose threshold pattern carries an ordering. Round reads a flat
    /// pattern, which rotation leaves unchanged.
    #[must_use]
    pub const fn uses_pattern(self) -> bool {
        matches!(self, Self::Bayer | Self::VoidAndCluster)
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DitherMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|m| m.name()).collect();
                format!("unknown dither mode `{s}` (expected one of: {})", names.join(", "))
            })
    }
}

/// Everything the engine needs to know, fixed at construction.
///
/// # Example
/// ```
/// use tr_core::config::{DitherConfig, DitherMode};
/// let cfg = DitherConfig::from_toml_str(r#"
///     mode = "stucki"
///     ampn = 0.5
///     [dst]
///     bits = 10
/// "#).unwrap();
/// assert_eq!(cfg.mode, DitherMode::Stucki);
/// assert_eq!(cfg.dst.bits, 10);
/// assert_eq!(cfg.src.bits, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DitherConfig {
    pub src: SampleFormat,
    pub dst: SampleFormat,
    pub color_family: ColorFamily,
    pub plane_count: usize,
    pub mode: DitherMode,
    /// Side of the ordered-dither pattern (power of two, at most 32).
    pub pattern_size: usize,
    /// Ordered/quasirandom bias amplitude, 1.0 = one destination LSB peak to peak.
    pub ampo: f64,
    /// Noise amplitude, same unit as `ampo`.
    pub ampn: f64,
    /// Rotate the pattern and shift the quasirandom phase on every frame.
    pub dynamic: bool,
    /// Same noise on every frame.
    pub static_noise: bool,
    /// All planes share one noise and phase sequence.
    pub correlated_planes: bool,
    /// Reshape ordered/quasirandom thresholds to a triangular distribution.
    pub tpdf_output: bool,
    /// Triangular noise (sum of two draws) instead of rectangular.
    pub tpdf_noise: bool,
}

impl Default for DitherConfig {
    fn default() -> Self {
        Self {
            src: SampleFormat::int(16, true),
            dst: SampleFormat::int(8, true),
            color_family: ColorFamily::Yuv,
            plane_count: 3,
            mode: DitherMode::Bayer,
            pattern_size: MAX_PATTERN_SIZE,
            ampo: 1.0,
            ampn: 0.0,
            dynamic: false,
            static_noise: false,
            correlated_planes: false,
            tpdf_output: false,
            tpdf_noise: false,
        }
    }
}

impl DitherConfig {
    /// Checks every field. Engine construction runs the same checks.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found: unsupported formats, a plane
    /// count outside 1..=4, a bad pattern size or an amplitude out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.src.validate()?;
        self.dst.validate()?;
        if !(1..=4).contains(&self.plane_count) {
            return Err(ConfigError::InvalidPlaneCount(self.plane_count));
        }
        if !self.pattern_size.is_power_of_two() || self.pattern_size > MAX_PATTERN_SIZE {
            return Err(ConfigError::InvalidPatternSize(self.pattern_size));
        }
        check_amplitude("ampo", self.ampo)?;
        check_amplitude("ampn", self.ampn)?;
        Ok(())
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML and any validation
    /// error from [`DitherConfig::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads a TOML file from disk.
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`DitherConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml_str(&text)?;
        log::info!("Configuration chargée depuis {}", path.display());
        Ok(cfg)
    }

    /// Role of the plane at `plane_index` under this colour family.
    #[must_use]
    #[inline(always)]
    pub fn role(&self, plane_index: usize) -> PlaneRole {
        self.color_family.role(plane_index)
    }
}

fn check_amplitude(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=MAX_AMPLITUDE).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidAmplitude {
            name,
            value,
            max: MAX_AMPLITUDE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DitherConfig::default().validate().is_ok());
    }

    #[test]
    fn pattern_size_must_be_power_of_two_up_to_32() {
        for size in [1, 2, 4, 8, 16, 32] {
            let cfg = DitherConfig {
                pattern_size: size,
                ..DitherConfig::default()
            };
            assert!(cfg.validate().is_ok(), "size {size}");
        }
        for size in [0, 3, 12, 64] {
            let cfg = DitherConfig {
                pattern_size: size,
                ..DitherConfig::default()
            };
            assert!(
                matches!(cfg.validate(), Err(ConfigError::InvalidPatternSize(s)) if s == size),
                "size {size}"
            );
        }
    }

    #[test]
    fn negative_or_nan_amplitudes_are_rejected() {
        let neg = DitherConfig {
            ampo: -0.1,
            ..DitherConfig::default()
        };
        assert!(matches!(
            neg.validate(),
            Err(ConfigError::InvalidAmplitude { name: "ampo", .. })
        ));
        let nan = DitherConfig {
            ampn: f64::NAN,
            ..DitherConfig::default()
        };
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::InvalidAmplitude { name: "ampn", .. })
        ));
    }

    #[test]
    fn plane_count_is_bounded() {
        let cfg = DitherConfig {
            plane_count: 0,
            ..DitherConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPlaneCount(0))));
    }

    #[test]
    fn toml_round_trip_keeps_fields() {
        let cfg = DitherConfig {
            mode: DitherMode::Ostromoukhov,
            dst: SampleFormat::int(10, false),
            tpdf_noise: true,
            ampn: 0.75,
            ..DitherConfig::default()
        };
        let text = toml::to_string(&cfg).unwrap();
        let back = DitherConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn bad_toml_reports_parse_error() {
        let err = DitherConfig::from_toml_str("mode = \"sparkles\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unsupported_bit_depth_in_toml_is_rejected() {
        let err = DitherConfig::from_toml_str("[dst]\nbits = 13").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { bits: 13, .. }));
    }

    #[test]
    fn mode_names_parse_back() {
        for mode in DitherMode::ALL {
            assert_eq!(mode.name().parse::<DitherMode>(), Ok(mode));
        }
        assert_eq!("Floyd-Steinberg".parse::<DitherMode>(), Ok(DitherMode::FloydSteinberg));
        assert!("sparkles".parse::<DitherMode>().is_err());
    }
}
