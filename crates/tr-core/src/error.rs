//! Error taxonomy.
//!
//! Configuration problems surface once, when a config is validated or an
//! engine is built. Processing calls only fail on scratch allocation or when
//! the host hands over buffers that do not match the declared geometry.

use std::path::PathBuf;

use thiserror::Error;

use crate::format::SampleType;

/// Rejected configuration. Raised at construction time only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported sample format: {sample_type:?} with {bits} bits")]
    UnsupportedFormat { sample_type: SampleType, bits: u8 },

    #[error("pattern size {0} must be a power of two no larger than 32")]
    InvalidPatternSize(usize),

    #[error("amplitude `{name}` = {value} must be finite and within [0, {max}]")]
    InvalidAmplitude {
        name: &'static str,
        value: f64,
        max: f64,
    },

    #[error("plane count {0} must be between 1 and 4")]
    InvalidPlaneCount(usize),

    #[error("invalid TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Scratch memory could not be obtained. Not retried.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cannot allocate {cells} error accumulator cells")]
    ScratchAllocation { cells: usize },
}

/// Failure of a single `process_plane` call, detected before any output is
/// written (except for allocation, which aborts the call).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("plane index {index} is out of range for {count} planes")]
    PlaneIndex { index: usize, count: usize },

    #[error("{which} stride {stride} is smaller than one row of {row_bytes} bytes")]
    StrideTooSmall {
        which: &'static str,
        stride: usize,
        row_bytes: usize,
    },

    #[error("{which} buffer holds {len} bytes, {needed} needed")]
    BufferTooSmall {
        which: &'static str,
        len: usize,
        needed: usize,
    },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}
