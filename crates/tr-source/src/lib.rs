//! Image files in and out of planar sample buffers for tramage.

pub mod image;

pub use image::{PlaneSet, load_planes, save_planes};
