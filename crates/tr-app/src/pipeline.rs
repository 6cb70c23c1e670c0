use std::time::Instant;

use anyhow::Context;
use rayon::prelude::*;
use tr_core::config::DitherConfig;
use tr_dither::{DitherEngine, PlaneMut, PlaneRef};
use tr_source::PlaneSet;

use crate::cli::Cli;

/// Builds the engine configuration for `source`.
///
/// The file (or the defaults) gives the dithering parameters, the command
/// line overrides them, and the decoded image fixes the source format,
/// colour family and plane count.
///
/// # Errors
/// Returns an error if the configuration file cannot be read or the result
/// does not validate.
pub fn build_config(cli: &Cli, source: &PlaneSet) -> anyhow::Result<DitherConfig> {
    let mut cfg = match &cli.config {
        Some(path) => DitherConfig::load(path)?,
        None => DitherConfig::default(),
    };
    cli.apply_overrides(&mut cfg);
    cfg.src = source.format;
    cfg.color_family = source.family;
    cfg.plane_count = source.plane_count();
    cfg.validate().context("Configuration invalide")?;
    Ok(cfg)
}

/// Converts every plane of `source`, one rayon task per plane.
///
/// # Errors
/// Returns an error if a plane does not match the engine geometry or the
/// scratch memory cannot be allocated.
///
/// # Example
/// ```
/// use tr_core::config::{DitherConfig, DitherMode};
/// use tr_core::format::{ColorFamily, SampleFormat};
/// use tr_dither::DitherEngine;
/// use tr_source::PlaneSet;
/// use tr_app::pipeline::convert;
///
/// let source = PlaneSet::blank(ColorFamily::Gray, SampleFormat::int(16, true), 1, 8, 8);
/// let engine = DitherEngine::new(DitherConfig {
///     color_family: ColorFamily::Gray,
///     plane_count: 1,
///     mode: DitherMode::Stucki,
///     ..DitherConfig::default()
/// })
/// .unwrap();
/// let out = convert(&engine, &source, 0).unwrap();
/// assert_eq!(out.format, SampleFormat::int(8, true));
/// ```
pub fn convert(engine: &DitherEngine, source: &PlaneSet, frame_index: u32) -> anyhow::Result<PlaneSet> {
    let (width, height) = (source.width, source.height);
    let mut out = PlaneSet::blank(
        source.family,
        engine.config().dst,
        source.plane_count(),
        width,
        height,
    );
    let (src_stride, dst_stride) = (source.stride(), out.stride());
    out.planes
        .par_iter_mut()
        .zip(source.planes.par_iter())
        .enumerate()
        .try_for_each(|(plane_index, (dst, src))| {
            engine
                .process_plane(
                    PlaneMut::new(dst, dst_stride),
                    PlaneRef::new(src, src_stride),
                    width,
                    height,
                    frame_index,
                    plane_index,
                )
                .with_context(|| format!("Échec du plan {plane_index}"))
        })?;
    Ok(out)
}

/// Load, convert, save.
///
/// # Errors
/// Returns the first failure of any stage, with its context.
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let source = tr_source::load_planes(&cli.input)?;
    let cfg = build_config(cli, &source)?;
    let engine = DitherEngine::new(cfg).context("Construction du moteur impossible")?;
    log::info!(
        "Moteur prêt: {} -> {} bits, mode {} (routine {})",
        source.format.bits,
        engine.config().dst.bits,
        engine.config().mode,
        engine.routine_name()
    );

    let start = Instant::now();
    let out = convert(&engine, &source, cli.frame)?;
    log::info!(
        "{} plan(s) convertis en {:.1} ms",
        out.plane_count(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    tr_source::save_planes(&cli.output, &out)
}
