use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tr_core::config::{DitherConfig, DitherMode};
use tr_core::format::SampleFormat;

/// Range convention of the output samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Range {
    /// [0, 2^bits - 1]
    Full,
    /// Studio range: black at 16, white at 235 (scaled to the depth)
    Limited,
}

/// Convertit la profondeur d'une image avec tramage.
#[derive(Parser, Debug)]
#[command(name = "tramage", version, about)]
pub struct Cli {
    /// Input image (any format the decoder knows)
    pub input: PathBuf,

    /// Output image, 8- or 16-bit depending on the target depth
    pub output: PathBuf,

    /// TOML configuration file; the options below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dithering mode (fast, round, bayer, void_and_cluster, quasirandom,
    /// floyd_steinberg, filter_lite, stucki, atkinson, ostromoukhov)
    #[arg(short, long)]
    pub mode: Option<DitherMode>,

    /// Output bit depth (8, 9, 10, 11, 12, 14 or 16)
    #[arg(short, long)]
    pub bits: Option<u8>,

    /// Output range convention
    #[arg(long, value_enum)]
    pub range: Option<Range>,

    /// Ordered pattern side (1, 2, 4, 8, 16 or 32)
    #[arg(long)]
    pub pattern_size: Option<usize>,

    /// Pattern / quasirandom amplitude, 1 = one LSB
    #[arg(long)]
    pub ampo: Option<f64>,

    /// Noise amplitude, 1 = one LSB
    #[arg(long)]
    pub ampn: Option<f64>,

    /// Rotate patterns and shift sequences with the frame index
    #[arg(long)]
    pub dynamic: bool,

    /// Same noise on every frame
    #[arg(long)]
    pub static_noise: bool,

    /// Share noise and sequences between planes
    #[arg(long)]
    pub correlated: bool,

    /// Triangular reshaping of pattern thresholds
    #[arg(long)]
    pub tpdf_output: bool,

    /// Triangular noise
    #[arg(long)]
    pub tpdf_noise: bool,

    /// Frame index, seeds noise and pattern rotation
    #[arg(long, default_value_t = 0)]
    pub frame: u32,
}

impl Cli {
    /// Applique les options de ligne de commande par-dessus la configuration.
    ///
    /// Flags only ever switch features on; a flag left out keeps the value
    /// from the file.
    pub fn apply_overrides(&self, cfg: &mut DitherConfig) {
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if self.bits.is_some() || self.range.is_some() {
            let full_range = self
                .range
                .map_or(cfg.dst.is_float() || cfg.dst.full_range, |r| r == Range::Full);
            let bits = match self.bits {
                Some(bits) => bits,
                None if cfg.dst.is_float() => 16,
                None => cfg.dst.bits,
            };
            cfg.dst = SampleFormat::int(bits, full_range);
        }
        if let Some(size) = self.pattern_size {
            cfg.pattern_size = size;
        }
        if let Some(ampo) = self.ampo {
            cfg.ampo = ampo;
        }
        if let Some(ampn) = self.ampn {
            cfg.ampn = ampn;
        }
        cfg.dynamic |= self.dynamic;
        cfg.static_noise |= self.static_noise;
        cfg.correlated_planes |= self.correlated;
        cfg.tpdf_output |= self.tpdf_output;
        cfg.tpdf_noise |= self.tpdf_noise;
    }
}
