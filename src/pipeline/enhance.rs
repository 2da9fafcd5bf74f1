//! Page enhancement: deterministic contrast and sharpness adjustment.
//!
//! Scanned and rendered pages are often low-contrast and slightly soft at
//! the stroke edges, which measurably hurts both LaTeX and text recognition.
//! The two passes here mirror classic photo-editor "enhance" semantics:
//!
//! * **Contrast** — interpolate each channel away from the page's mean
//!   luminance: `out = mean + (in - mean) * factor`. Factor 1.0 is identity;
//!   the default 1.3 widens the dynamic range around the page's own
//!   mid-tone rather than a fixed 128, so dark scans and bright scans both
//!   benefit.
//! * **Sharpness** — interpolate away from a 3×3-smoothed copy:
//!   `out = smooth + (in - smooth) * factor`. The default 1.2 crispens
//!   stroke edges without the ringing a strong unsharp mask introduces.
//!
//! Both passes are pure per page: same input, same factors, same output.

use crate::error::ExtractError;
use image::{DynamicImage, RgbImage};
use std::path::Path;
use tracing::debug;

/// One page of the enhanced document.
///
/// Dimensions are the original page's, in PDF points; the image is the
/// enhanced rasterisation at the configured DPI.
pub struct EnhancedPage {
    /// 0-based page index.
    pub index: usize,
    pub width_pts: f32,
    pub height_pts: f32,
    pub image: DynamicImage,
}

/// Apply contrast then sharpness enhancement to one rendered page.
pub fn enhance_image(image: &DynamicImage, contrast: f32, sharpness: f32) -> DynamicImage {
    let rgb = image.to_rgb8();
    let contrasted = adjust_contrast(&rgb, contrast);
    let sharpened = adjust_sharpness(&contrasted, sharpness);
    DynamicImage::ImageRgb8(sharpened)
}

/// Interpolate each channel between the mean luminance and the original.
fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    let mut sum: u64 = 0;
    for px in image.pixels() {
        sum += luma(px.0) as u64;
    }
    let pixel_count = (image.width() as u64 * image.height() as u64).max(1);
    let mean = (sum / pixel_count) as f32;

    let mut out = image.clone();
    for px in out.pixels_mut() {
        for c in &mut px.0 {
            *c = blend(mean, *c, factor);
        }
    }
    out
}

/// Interpolate each channel between a 3×3-smoothed copy and the original.
fn adjust_sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    if (factor - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    // Normalised 3×3 smoothing kernel with a dominant centre tap.
    #[rustfmt::skip]
    let kernel = [
        1.0 / 13.0, 1.0 / 13.0, 1.0 / 13.0,
        1.0 / 13.0, 5.0 / 13.0, 1.0 / 13.0,
        1.0 / 13.0, 1.0 / 13.0, 1.0 / 13.0,
    ];
    let smooth = image::imageops::filter3x3(image, &kernel);

    let mut out = image.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let base = smooth.get_pixel(x, y);
        for c in 0..3 {
            px.0[c] = blend(base.0[c] as f32, px.0[c], factor);
        }
    }
    out
}

/// `base + (value - base) * factor`, clamped to the u8 range.
fn blend(base: f32, value: u8, factor: f32) -> u8 {
    (base + (value as f32 - base) * factor).round().clamp(0.0, 255.0) as u8
}

/// Rec. 601 luma, the conventional grayscale weighting.
fn luma(rgb: [u8; 3]) -> u8 {
    (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32).round() as u8
}

/// Persist one enhanced page as a PNG inside the run's `enhanced/` directory.
///
/// Write failure is fatal: a partially persisted enhanced document would be
/// misleading provenance.
pub fn persist_page(page: &EnhancedPage, dir: &Path) -> Result<std::path::PathBuf, ExtractError> {
    let path = dir.join(format!("page_{:04}.png", page.index));
    page.image
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| ExtractError::EnhancementFailed {
            page: page.index,
            detail: format!("failed to persist enhanced page: {e}"),
        })?;
    debug!(
        "Persisted enhanced page {} → {} ({}x{} px)",
        page.index,
        path.display(),
        page.image.width(),
        page.image.height()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, value]))
    }

    #[test]
    fn identity_factors_change_nothing() {
        let mut img = flat(8, 8, 100);
        img.put_pixel(3, 3, Rgb([200, 10, 60]));
        let out = enhance_image(&DynamicImage::ImageRgb8(img.clone()), 1.0, 1.0);
        assert_eq!(out.to_rgb8(), img);
    }

    #[test]
    fn contrast_pushes_values_away_from_mean() {
        // Half dark, half light: raising contrast must widen the gap.
        let mut img = flat(4, 2, 80);
        for x in 0..4 {
            img.put_pixel(x, 1, Rgb([180, 180, 180]));
        }
        let out = adjust_contrast(&img, 1.3);
        assert!(out.get_pixel(0, 0).0[0] < 80);
        assert!(out.get_pixel(0, 1).0[0] > 180);
    }

    #[test]
    fn contrast_is_clamped_to_u8_range() {
        let mut img = flat(2, 1, 0);
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        let out = adjust_contrast(&img, 3.0);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn sharpness_amplifies_an_edge() {
        // A bright stripe on a dark field gets brighter at the stripe after
        // sharpening, the surroundings darker.
        let mut img = flat(9, 9, 40);
        for y in 0..9 {
            img.put_pixel(4, y, Rgb([220, 220, 220]));
        }
        let out = adjust_sharpness(&img, 1.5);
        assert!(out.get_pixel(4, 4).0[0] >= 220);
        assert!(out.get_pixel(3, 4).0[0] <= 40);
    }

    #[test]
    fn enhancement_is_deterministic() {
        let mut img = flat(16, 16, 90);
        img.put_pixel(5, 5, Rgb([10, 200, 130]));
        let dynamic = DynamicImage::ImageRgb8(img);
        let a = enhance_image(&dynamic, 1.3, 1.2);
        let b = enhance_image(&dynamic, 1.3, 1.2);
        assert_eq!(a.to_rgb8(), b.to_rgb8());
    }

    #[test]
    fn persist_writes_png_named_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let page = EnhancedPage {
            index: 7,
            width_pts: 612.0,
            height_pts: 792.0,
            image: DynamicImage::ImageRgb8(flat(4, 4, 128)),
        };
        let path = persist_page(&page, dir.path()).unwrap();
        assert!(path.ends_with("page_0007.png"));
        assert!(path.exists());
    }
}
