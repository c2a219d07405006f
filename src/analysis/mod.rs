//! Analysis capabilities — image quality assessment and text extraction

pub mod image_quality;
pub mod text_extraction;

pub use image_quality::{ImageAnalyzer, ImageQualityResult, PixelStatsAnalyzer, Resolution};
pub use text_extraction::{OcrResult, PlainTextExtractor, TextExtractor};
