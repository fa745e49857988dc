//! Raster primitives for the enhancement pipelines
//!
//! Everything here operates on decoded [`DynamicImage`] buffers. Resampling
//! and unsharp masking come from the `image` crate; the tonal operations
//! (modulate, normalize, linear, gamma, tint, median) work pixel-by-pixel
//! over RGB because the crate has no equivalents.
//!
//! | Operation | Backed by |
//! |-----------|-----------|
//! | Resize / proxy | `DynamicImage::resize` (Lanczos3 / Triangle) |
//! | Sharpen | `DynamicImage::unsharpen` |
//! | Denoise blur | `DynamicImage::blur` |
//! | JPEG output | `image::codecs::jpeg::JpegEncoder` |

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb};
use thiserror::Error;

/// Proxy edge used for the grayscale heuristic
const GRAYSCALE_PROXY_EDGE: u32 = 100;

/// Mean saturation below which an image counts as black-and-white
const GRAYSCALE_SATURATION_CEILING: f32 = 0.12;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("failed to probe image format: {0}")]
    Probe(#[from] std::io::Error),

    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// Decode an image of any supported format, sniffing the format from the
/// bytes rather than trusting a file extension.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImagingError> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    Ok(img)
}

/// Encode to JPEG at the given quality. Alpha is dropped; JPEG has no use
/// for it.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}

/// Fit the image inside a `max_edge` square, never enlarging.
pub fn bounded(img: &DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width() <= max_edge && img.height() <= max_edge {
        img.clone()
    } else {
        img.resize(max_edge, max_edge, FilterType::Lanczos3)
    }
}

/// Mean per-pixel channel saturation, `(max - min) / max` averaged over the
/// whole buffer. 0.0 for a pure grayscale image, approaching 1.0 for vivid
/// primaries.
pub fn mean_saturation(img: &DynamicImage) -> f32 {
    let rgb = img.to_rgb8();
    let total = rgb.pixels().len();
    if total == 0 {
        return 0.0;
    }

    let mut sum = 0.0f32;
    for p in rgb.pixels() {
        sum += channel_saturation(
            p[0] as f32 / 255.0,
            p[1] as f32 / 255.0,
            p[2] as f32 / 255.0,
        );
    }
    sum / total as f32
}

/// Black-and-white heuristic: sample saturation on a small proxy so the
/// answer does not depend on source resolution, then compare to a fixed
/// ceiling. Sepia-toned prints fall under it; ordinary color photos do not.
pub fn is_grayscale(img: &DynamicImage) -> bool {
    let proxy = if img.width() > GRAYSCALE_PROXY_EDGE || img.height() > GRAYSCALE_PROXY_EDGE {
        img.resize(GRAYSCALE_PROXY_EDGE, GRAYSCALE_PROXY_EDGE, FilterType::Triangle)
    } else {
        img.clone()
    };
    mean_saturation(&proxy) < GRAYSCALE_SATURATION_CEILING
}

/// Multiply lightness and saturation and rotate hue, per pixel in HSL
/// space. `brightness`/`saturation` are multipliers (1.0 = unchanged),
/// `hue_deg` rotates in degrees.
pub fn modulate(img: &DynamicImage, brightness: f64, saturation: f64, hue_deg: f64) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    for p in rgb.pixels_mut() {
        let (h, s, l) = rgb_to_hsl(
            p[0] as f64 / 255.0,
            p[1] as f64 / 255.0,
            p[2] as f64 / 255.0,
        );
        let h = (h + hue_deg).rem_euclid(360.0);
        let s = (s * saturation).clamp(0.0, 1.0);
        let l = (l * brightness).clamp(0.0, 1.0);
        let (r, g, b) = hsl_to_rgb(h, s, l);
        *p = Rgb([to_u8(r * 255.0), to_u8(g * 255.0), to_u8(b * 255.0)]);
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Contrast stretch: map the luminance percentile window
/// `[lower_pct, upper_pct]` onto the full 0–255 range, applying the same
/// linear map to all three channels.
pub fn normalize(img: &DynamicImage, lower_pct: f64, upper_pct: f64) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    let total = rgb.pixels().len() as u64;
    if total == 0 {
        return DynamicImage::ImageRgb8(rgb);
    }

    let mut hist = [0u64; 256];
    for p in rgb.pixels() {
        hist[luminance(p) as usize] += 1;
    }

    // At least one pixel, so a 0th percentile still lands on a populated bucket
    let lo_count = ((total as f64 * lower_pct / 100.0).ceil() as u64).max(1);
    let hi_count = (total as f64 * upper_pct / 100.0).ceil() as u64;
    let mut lo = 0u8;
    let mut hi = 255u8;
    let mut lo_found = false;
    let mut cum = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        cum += count;
        if !lo_found && cum >= lo_count {
            lo = i as u8;
            lo_found = true;
        }
        if cum >= hi_count {
            hi = i as u8;
            break;
        }
    }

    if hi <= lo {
        // Flat image; stretching would divide by zero
        return DynamicImage::ImageRgb8(rgb);
    }

    let scale = 255.0 / (hi - lo) as f64;
    for p in rgb.pixels_mut() {
        for c in 0..3 {
            p[c] = to_u8((p[c] as f64 - lo as f64) * scale);
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Per-channel affine map `a·v + b`, clamped to the byte range.
pub fn linear(img: &DynamicImage, a: f64, b: f64) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    for p in rgb.pixels_mut() {
        for c in 0..3 {
            p[c] = to_u8(a * p[c] as f64 + b);
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Midtone gamma curve `255·(v/255)^(1/g)`; `g > 1` lifts midtones.
pub fn gamma(img: &DynamicImage, g: f64) -> DynamicImage {
    if g <= 0.0 {
        return img.clone();
    }
    let inv = 1.0 / g;
    let mut lut = [0u8; 256];
    for (v, entry) in lut.iter_mut().enumerate() {
        *entry = to_u8(255.0 * (v as f64 / 255.0).powf(inv));
    }
    let mut rgb = img.to_rgb8();
    for p in rgb.pixels_mut() {
        for c in 0..3 {
            p[c] = lut[p[c] as usize];
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Recolor toward a tint while keeping per-pixel luminance: each channel
/// becomes `lum · tint_c / 255`. White input comes out exactly the tint
/// color, black stays black.
pub fn tint(img: &DynamicImage, r: u8, g: u8, b: u8) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    let t = [r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0];
    for p in rgb.pixels_mut() {
        let lum = luminance(p) as f64;
        for c in 0..3 {
            p[c] = to_u8(lum * t[c]);
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Square-window median denoise with edge clamping. `radius` 1 gives the
/// usual 3×3 window, enough to knock out dust specks and shot noise
/// without the smearing a larger window causes.
pub fn median(img: &DynamicImage, radius: u32) -> DynamicImage {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    if w == 0 || h == 0 || radius == 0 {
        return DynamicImage::ImageRgb8(rgb);
    }

    let mut out = rgb.clone();
    let r = radius as i64;
    let mut window: [Vec<u8>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            for chan in window.iter_mut() {
                chan.clear();
            }
            for dy in -r..=r {
                for dx in -r..=r {
                    let sx = (x + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y + dy).clamp(0, h as i64 - 1) as u32;
                    let p = rgb.get_pixel(sx, sy);
                    for c in 0..3 {
                        window[c].push(p[c]);
                    }
                }
            }
            let p = out.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                window[c].sort_unstable();
                p[c] = window[c][window[c].len() / 2];
            }
        }
    }
    DynamicImage::ImageRgb8(out)
}

fn channel_saturation(r: f32, g: f32, b: f32) -> f32 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max > 0.0 {
        (max - min) / max
    } else {
        0.0
    }
}

/// Rec. 709 luma, rounded to a byte
fn luminance(p: &Rgb<u8>) -> u8 {
    to_u8(0.2126 * p[0] as f64 + 0.7152 * p[1] as f64 + 0.0722 * p[2] as f64)
}

fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let r = r.clamp(0.0, 1.0);
    let g = g.clamp(0.0, 1.0);
    let b = b.clamp(0.0, 1.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if (max - min).abs() < 0.0001 {
        return (0.0, 0.0, l);
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if (max - r).abs() < 0.0001 {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) * 60.0
    } else if (max - g).abs() < 0.0001 {
        ((b - r) / d + 2.0) * 60.0
    } else {
        ((r - g) / d + 4.0) * 60.0
    };
    (h, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    if s < 0.0001 {
        return (l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hn = h / 360.0;
    (
        hue_to_rgb(p, q, hn + 1.0 / 3.0),
        hue_to_rgb(p, q, hn),
        hue_to_rgb(p, q, hn - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}
