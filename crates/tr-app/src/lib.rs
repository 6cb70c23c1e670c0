//! Command-line front end of tramage: image in, dithered image out.

pub mod cli;
pub mod pipeline;
