//! Image quality assessment
//!
//! The first verification stage: is the submitted scan good enough to
//! analyze at all? The `ImageAnalyzer` trait is the capability contract;
//! `PixelStatsAnalyzer` is the built-in implementation, working from
//! decoded pixel statistics. Quality never aborts a verification: an
//! undecodable buffer yields the neutral degraded result and the pipeline
//! carries on.

use async_trait::async_trait;
use image::GenericImageView;
use serde::{Deserialize, Serialize};

use crate::VeridocResult;

/// Minimum page dimensions for a verification-grade scan.
pub const MIN_ACCEPTABLE_WIDTH: u32 = 800;
pub const MIN_ACCEPTABLE_HEIGHT: u32 = 600;

/// Score reported when the image cannot be assessed at all.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Mean absolute luma gradient treated as fully sharp.
const SHARPNESS_FULL_SCALE: f64 = 30.0;

/// Brightness band (mean luma fraction) considered well exposed.
const BRIGHTNESS_LOW: f64 = 0.35;
const BRIGHTNESS_HIGH: f64 = 0.90;

/// Maximum per-channel deviation from the mean before the image reads as
/// color-cast, as a fraction of full scale.
const BALANCE_TOLERANCE: f64 = 0.15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub acceptable: bool,
}

/// Quality metrics for one submitted image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageQualityResult {
    pub resolution: Resolution,
    pub sharpness: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub color_balance_ok: bool,
    pub byte_size: u64,
    pub format: String,
    /// Composite quality in [0, 1]; 0.5 when assessment was impossible
    pub score: f64,
    pub error: Option<String>,
}

impl ImageQualityResult {
    /// Neutral result for an image that could not be assessed.
    pub fn degraded(byte_size: u64, reason: impl Into<String>) -> Self {
        Self {
            resolution: Resolution {
                width: 0,
                height: 0,
                acceptable: false,
            },
            sharpness: 0.0,
            brightness: 0.0,
            contrast: 0.0,
            color_balance_ok: false,
            byte_size,
            format: "unknown".to_string(),
            score: NEUTRAL_SCORE,
            error: Some(reason.into()),
        }
    }
}

/// Capability contract for image quality assessment.
///
/// Implementations must be fail-soft: corrupt input is reported through
/// [`ImageQualityResult::degraded`], not an `Err`. The `Err` path exists
/// for analyzer infrastructure faults and is absorbed by the engine the
/// same way.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, content: &[u8]) -> VeridocResult<ImageQualityResult>;
}

/// Built-in analyzer over decoded pixel statistics.
#[derive(Debug, Default)]
pub struct PixelStatsAnalyzer;

#[async_trait]
impl ImageAnalyzer for PixelStatsAnalyzer {
    async fn analyze(&self, content: &[u8]) -> VeridocResult<ImageQualityResult> {
        Ok(assess(content))
    }
}

fn assess(content: &[u8]) -> ImageQualityResult {
    let byte_size = content.len() as u64;
    let format = image::guess_format(content)
        .map(format_name)
        .unwrap_or("unknown");

    let img = match image::load_from_memory(content) {
        Ok(img) => img,
        Err(e) => {
            tracing::debug!("Image decode failed: {}", e);
            return ImageQualityResult::degraded(byte_size, format!("decode failed: {}", e));
        }
    };

    let (width, height) = img.dimensions();
    let acceptable = width >= MIN_ACCEPTABLE_WIDTH && height >= MIN_ACCEPTABLE_HEIGHT;

    let gray = img.to_luma8();
    let (mean, stddev) = luma_stats(&gray);
    let brightness = mean / 255.0;
    let contrast = (stddev / 128.0).clamp(0.0, 1.0);
    let sharpness = (mean_gradient(&gray) / SHARPNESS_FULL_SCALE).clamp(0.0, 1.0);
    let color_balance_ok = channels_balanced(&img);

    let score = (0.25 * if acceptable { 1.0 } else { 0.0 }
        + 0.30 * sharpness
        + 0.20 * exposure_score(brightness)
        + 0.15 * contrast
        + 0.10 * if color_balance_ok { 1.0 } else { 0.0 })
        .clamp(0.0, 1.0);

    ImageQualityResult {
        resolution: Resolution {
            width,
            height,
            acceptable,
        },
        sharpness,
        brightness,
        contrast,
        color_balance_ok,
        byte_size,
        format: format.to_string(),
        score,
        error: None,
    }
}

fn format_name(format: image::ImageFormat) -> &'static str {
    use image::ImageFormat;
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        _ => "other",
    }
}

fn luma_stats(gray: &image::GrayImage) -> (f64, f64) {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return (0.0, 0.0);
    }
    let n = pixels.len() as f64;
    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / n;
    let variance = pixels
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Mean absolute horizontal+vertical neighbor difference. Blur flattens
/// gradients, so this is the sharpness proxy.
fn mean_gradient(gray: &image::GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 2 && h < 2 {
        return 0.0;
    }
    let mut total = 0.0f64;
    let mut count = 0u64;
    for y in 0..h {
        for x in 0..w {
            let p = gray.get_pixel(x, y).0[0] as f64;
            if x + 1 < w {
                total += (gray.get_pixel(x + 1, y).0[0] as f64 - p).abs();
                count += 1;
            }
            if y + 1 < h {
                total += (gray.get_pixel(x, y + 1).0[0] as f64 - p).abs();
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Full credit inside the well-exposed band, falling off linearly toward
/// all-black and all-white.
fn exposure_score(brightness: f64) -> f64 {
    if brightness < BRIGHTNESS_LOW {
        (brightness / BRIGHTNESS_LOW).clamp(0.0, 1.0)
    } else if brightness > BRIGHTNESS_HIGH {
        ((1.0 - brightness) / (1.0 - BRIGHTNESS_HIGH)).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn channels_balanced(img: &image::DynamicImage) -> bool {
    let rgb = img.to_rgb8();
    let n = (rgb.width() as u64).saturating_mul(rgb.height() as u64);
    if n == 0 {
        return false;
    }
    let mut sums = [0.0f64; 3];
    for p in rgb.pixels() {
        sums[0] += p.0[0] as f64;
        sums[1] += p.0[1] as f64;
        sums[2] += p.0[2] as f64;
    }
    let means = [
        sums[0] / n as f64,
        sums[1] / n as f64,
        sums[2] / n as f64,
    ];
    let avg = (means[0] + means[1] + means[2]) / 3.0;
    means
        .iter()
        .all(|m| (m - avg).abs() <= BALANCE_TOLERANCE * 255.0)
}
