//! Shared types for tramage: sample formats, dithering configuration and errors.

pub mod config;
pub mod error;
pub mod format;

pub use config::{DitherConfig, DitherMode};
pub use error::{ConfigError, ProcessError, ResourceError};
pub use format::{ColorFamily, PlaneRole, SampleFormat, SampleType, Storage};
