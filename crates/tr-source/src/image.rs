/// Image files decoded into planes and dithered planes encoded back to PNG.
use std::path::Path;

use anyhow::{Context, Result, bail};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use tr_core::format::{ColorFamily, SampleFormat, Storage};

/// Planar frame: one packed buffer per plane, native-endian samples, no
/// padding between rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSet {
    pub family: ColorFamily,
    pub format: SampleFormat,
    pub width: usize,
    pub height: usize,
    pub planes: Vec<Vec<u8>>,
}

impl PlaneSet {
    /// Zero-filled planes, typically the destination of a conversion.
    ///
    /// # Example
    /// ```
    /// use tr_core::format::{ColorFamily, SampleFormat};
    /// use tr_source::PlaneSet;
    /// let set = PlaneSet::blank(ColorFamily::Rgb, SampleFormat::int(10, true), 3, 4, 2);
    /// assert_eq!(set.stride(), 8);
    /// assert_eq!(set.planes[2].len(), 16);
    /// ```
    #[must_use]
    pub fn blank(
        family: ColorFamily,
        format: SampleFormat,
        count: usize,
        width: usize,
        height: usize,
    ) -> Self {
        let bytes = width * height * format.storage().bytes();
        Self {
            family,
            format,
            width,
            height,
            planes: vec![vec![0; bytes]; count],
        }
    }

    /// Bytes per row.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width * self.format.storage().bytes()
    }

    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
}

/// Charge une image depuis le disque en plans 16 bits pleine échelle.
///
/// # Errors
/// Returns an error if the image cannot be opened or decoded.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use tr_source::load_planes;
/// let set = load_planes(Path::new("photo.png")).unwrap();
/// assert_eq!(set.format.bits, 16);
/// ```
pub fn load_planes(path: &Path) -> Result<PlaneSet> {
    let img = image::open(path)
        .with_context(|| format!("Impossible de charger {}", path.display()))?;
    let set = from_image(&img);
    log::info!(
        "Image chargée: {} ({}x{}, {:?}, {} plan(s))",
        path.display(),
        set.width,
        set.height,
        set.family,
        set.plane_count()
    );
    Ok(set)
}

/// Splits a decoded image into 16-bit full-range planes. Alpha is dropped.
#[must_use]
pub fn from_image(img: &DynamicImage) -> PlaneSet {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let format = SampleFormat::int(16, true);
    if img.color().has_alpha() {
        log::debug!("alpha channel ignored");
    }
    if img.color().has_color() {
        let rgb = img.to_rgb16();
        let mut planes: Vec<Vec<u8>> = (0..3).map(|_| Vec::with_capacity(width * height * 2)).collect();
        for px in rgb.pixels() {
            for (plane, value) in planes.iter_mut().zip(px.0) {
                plane.extend_from_slice(&value.to_ne_bytes());
            }
        }
        PlaneSet {
            family: ColorFamily::Rgb,
            format,
            width,
            height,
            planes,
        }
    } else {
        let plane = img
            .to_luma16()
            .into_raw()
            .into_iter()
            .flat_map(u16::to_ne_bytes)
            .collect();
        PlaneSet {
            family: ColorFamily::Gray,
            format,
            width,
            height,
            planes: vec![plane],
        }
    }
}

/// Écrit des plans entiers en PNG (ou tout format déduit de l'extension).
///
/// Depths up to 8 bits give an 8-bit image, deeper ones a 16-bit image.
/// Codes are MSB-aligned so that full scale stays full scale.
///
/// # Errors
/// Returns an error for float planes, planes that are neither one gray nor
/// three RGB planes, or if encoding fails.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use tr_core::format::{ColorFamily, SampleFormat};
/// use tr_source::{PlaneSet, save_planes};
/// let set = PlaneSet::blank(ColorFamily::Gray, SampleFormat::int(8, true), 1, 16, 16);
/// save_planes(Path::new("out.png"), &set).unwrap();
/// ```
pub fn save_planes(path: &Path, set: &PlaneSet) -> Result<()> {
    let img = to_image(set)?;
    img.save(path)
        .with_context(|| format!("Impossible d'écrire {}", path.display()))?;
    log::info!(
        "Image écrite: {} ({} bits utiles)",
        path.display(),
        set.format.bits
    );
    Ok(())
}

/// Interleaves planes into an 8- or 16-bit image.
///
/// # Errors
/// See [`save_planes`].
pub fn to_image(set: &PlaneSet) -> Result<DynamicImage> {
    let channels = match (set.family, set.plane_count()) {
        (ColorFamily::Gray, 1) => 1,
        (ColorFamily::Rgb, 3) => 3,
        (family, n) => bail!("{n} plan(s) {family:?} ne peuvent pas être encodés en image"),
    };
    let width = u32::try_from(set.width).context("largeur hors limites")?;
    let height = u32::try_from(set.height).context("hauteur hors limites")?;
    let samples = set.width * set.height;
    let needed = samples * set.format.storage().bytes();
    if let Some(short) = set.planes.iter().find(|p| p.len() < needed) {
        bail!("plan de {} octets, {needed} attendus", short.len());
    }

    let img = match set.format.storage() {
        Storage::F32 => bail!("les plans flottants ne peuvent pas être écrits en image"),
        Storage::U8 => {
            let shift = 8 - u32::from(set.format.bits);
            let data = interleave(samples, channels, |p, i| set.planes[p][i] << shift);
            if channels == 1 {
                GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
            } else {
                RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
            }
        }
        Storage::U16 => {
            let shift = 16 - u32::from(set.format.bits);
            let data = interleave(samples, channels, |p, i| {
                let b = &set.planes[p][i * 2..i * 2 + 2];
                u16::from_ne_bytes([b[0], b[1]]) << shift
            });
            if channels == 1 {
                ImageBuffer::<Luma<u16>, _>::from_raw(width, height, data)
                    .map(DynamicImage::ImageLuma16)
            } else {
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, data)
                    .map(DynamicImage::ImageRgb16)
            }
        }
    };
    img.context("dimensions incohérentes avec les plans")
}

fn interleave<T>(
    samples: usize,
    channels: usize,
    mut sample: impl FnMut(usize, usize) -> T,
) -> Vec<T> {
    let mut out = Vec::with_capacity(samples * channels);
    for i in 0..samples {
        for p in 0..channels {
            out.push(sample(p, i));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_plane(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn gray_images_give_one_plane() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_raw(2, 1, vec![0, 255]).unwrap());
        let set = from_image(&img);
        assert_eq!(set.family, ColorFamily::Gray);
        assert_eq!(set.planes, vec![u16_plane(&[0, 65_535])]);
    }

    #[test]
    fn rgb_images_are_split_per_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_raw(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap());
        let set = from_image(&img);
        assert_eq!(set.family, ColorFamily::Rgb);
        assert_eq!(set.planes[0], u16_plane(&[65_535, 0]));
        assert_eq!(set.planes[1], u16_plane(&[0, 0]));
        assert_eq!(set.planes[2], u16_plane(&[0, 65_535]));
    }

    #[test]
    fn low_depths_are_msb_aligned() {
        let mut set = PlaneSet::blank(ColorFamily::Gray, SampleFormat::int(10, true), 1, 2, 1);
        set.planes[0] = u16_plane(&[1023, 1]);
        let DynamicImage::ImageLuma16(img) = to_image(&set).unwrap() else {
            panic!("expected a 16-bit gray image");
        };
        assert_eq!(img.into_raw(), vec![65_472, 64]);

        let mut set = PlaneSet::blank(ColorFamily::Rgb, SampleFormat::int(8, true), 3, 1, 1);
        set.planes = vec![vec![1], vec![2], vec![3]];
        let DynamicImage::ImageRgb8(img) = to_image(&set).unwrap() else {
            panic!("expected an 8-bit rgb image");
        };
        assert_eq!(img.into_raw(), vec![1, 2, 3]);
    }

    #[test]
    fn unsupported_plane_sets_are_refused() {
        let float = PlaneSet::blank(ColorFamily::Gray, SampleFormat::float(), 1, 2, 2);
        assert!(to_image(&float).is_err());
        let yuv = PlaneSet::blank(ColorFamily::Yuv, SampleFormat::int(8, true), 3, 2, 2);
        assert!(to_image(&yuv).is_err());
        let mut short = PlaneSet::blank(ColorFamily::Gray, SampleFormat::int(8, true), 1, 2, 2);
        short.planes[0].pop();
        assert!(to_image(&short).is_err());
    }

    #[test]
    fn png_files_round_trip() {
        let path = std::env::temp_dir().join(format!("tramage-source-{}.png", std::process::id()));
        let mut set = PlaneSet::blank(ColorFamily::Gray, SampleFormat::int(16, true), 1, 3, 2);
        set.planes[0] = u16_plane(&[0, 1, 2, 60_000, 65_535, 12_345]);
        save_planes(&path, &set).unwrap();
        let back = load_planes(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn missing_files_report_the_path() {
        let err = load_planes(Path::new("/nonexistent/tramage.png")).unwrap_err();
        assert!(format!("{err:#}").contains("tramage.png"));
    }
}
