//! Dithering engine for tramage: threshold patterns, noise, quasirandom
//! sequences, error-diffusion kernels and the per-plane driver.

pub mod accumulator;
pub mod engine;
pub mod kernels;
pub mod noise;
pub mod ostromoukhov;
pub mod pattern;
pub mod quasirandom;
pub mod sample;
pub mod scale;
mod scanline;
pub mod void_cluster;

pub use engine::DitherEngine;
pub use sample::{PlaneMut, PlaneRef};
