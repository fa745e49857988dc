//! Local enhancement chains
//!
//! Two filter strategies composed from the [`imaging`] primitives. The
//! basic chain is the universal fallback: quick tonal lift, sharpen, done.
//! The advanced chain is the full restoration treatment used when no
//! hosted model is configured: denoise, contrast recovery, and either a
//! warm faux-colorization for black-and-white sources or a saturation
//! revival for faded color ones.
//!
//! Both take an already-decoded image and hand back encoded JPEG bytes,
//! so the caller decides where the result lives.

use image::DynamicImage;
use tracing::debug;

use super::imaging::{self, ImagingError};

/// Output quality of the fallback chain
const BASIC_QUALITY: u8 = 90;

/// Output quality of the advanced chain
const ADVANCED_QUALITY: u8 = 95;

/// Warm paper tint applied before faux-colorizing black-and-white sources
const SEPIA_TINT: (u8, u8, u8) = (255, 245, 220);

/// Quick enhancement: brightness and saturation lift, unsharp mask, and a
/// gentle midtone gamma.
pub fn basic_enhance(img: &DynamicImage) -> Result<Vec<u8>, ImagingError> {
    debug!("running basic enhancement chain");
    let out = imaging::modulate(img, 1.15, 1.30, 0.0);
    let out = out.unsharpen(1.0, 2);
    let out = imaging::gamma(&out, 1.1);
    imaging::encode_jpeg(&out, BASIC_QUALITY)
}

/// Full restoration treatment.
///
/// `grayscale` selects the branch: black-and-white sources get a sepia
/// base, a strong saturation push with a warm hue swing, and a contrast
/// lift; color sources get a milder revival of faded dyes. A final polish
/// pass runs on both.
pub fn advanced_enhance(img: &DynamicImage, grayscale: bool) -> Result<Vec<u8>, ImagingError> {
    debug!(grayscale, "running advanced enhancement chain");

    // Damage cleanup and contrast recovery shared by both branches
    let out = imaging::normalize(img, 2.0, 98.0);
    let out = imaging::median(&out, 1);
    let out = out.blur(0.3);
    let out = out.unsharpen(0.5, 1);

    let out = if grayscale {
        let (tr, tg, tb) = SEPIA_TINT;
        let out = imaging::tint(&out, tr, tg, tb);
        let out = imaging::modulate(&out, 1.15, 2.2, 12.0);
        imaging::linear(&out, 1.25, -(128.0 * 1.25) + 140.0)
    } else {
        let out = imaging::modulate(&out, 1.08, 1.6, 8.0);
        imaging::linear(&out, 1.15, -(128.0 * 1.15) + 130.0)
    };

    let out = imaging::modulate(&out, 1.03, 1.25, 2.0);
    let out = out.unsharpen(1.0, 2);
    imaging::encode_jpeg(&out, ADVANCED_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gray_photo() -> DynamicImage {
        // Gradient so normalize and gamma have something to work with
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            let v = ((x + y) * 2).min(255) as u8;
            Rgb([v, v, v])
        }))
    }

    fn faded_color_photo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, _| {
            if x % 2 == 0 {
                Rgb([140, 110, 100])
            } else {
                Rgb([100, 110, 140])
            }
        }))
    }

    #[test]
    fn basic_chain_produces_decodable_jpeg() {
        let bytes = basic_enhance(&gray_photo()).unwrap();
        let back = imaging::decode(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (64, 48));
    }

    #[test]
    fn advanced_chain_colorizes_grayscale_input() {
        let bytes = advanced_enhance(&gray_photo(), true).unwrap();
        let back = imaging::decode(&bytes).unwrap();
        // The warm tint plus saturation push must leave visible color
        assert!(imaging::mean_saturation(&back) > 0.05);
    }

    #[test]
    fn advanced_chain_boosts_faded_color() {
        let input = faded_color_photo();
        let before = imaging::mean_saturation(&input);
        let bytes = advanced_enhance(&input, false).unwrap();
        let back = imaging::decode(&bytes).unwrap();
        assert!(imaging::mean_saturation(&back) > before);
    }

    #[test]
    fn chains_preserve_dimensions() {
        let bytes = advanced_enhance(&faded_color_photo(), false).unwrap();
        let back = imaging::decode(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (64, 48));
    }
}
