use std::fmt;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};

use crate::contract::{
    INITIAL_QUALITY, MAX_LONG_EDGE_PX, QUALITY_FLOOR, QUALITY_STEP, SIZE_BUDGET_BYTES,
};

/// One pass of the adaptive encode loop. In-memory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingAttempt {
    pub quality: u8,
    pub output_len: usize,
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    pub attempts: Vec<EncodingAttempt>,
}

/// Errors encountered while re-encoding a payload.
#[derive(Debug)]
pub enum EncodeError {
    Decode(String),
    Encode(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Decode(message) => write!(f, "failed to decode image: {message}"),
            EncodeError::Encode(message) => write!(f, "failed to encode JPEG: {message}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Re-encodes an image payload down to the size budget.
///
/// The source is decoded with format guessing, rotated upright per its
/// embedded orientation tag, fit-inside resized to the long-edge cap, then
/// JPEG-encoded at descending qualities until the output fits the budget or
/// the quality floor is reached. The floor-quality buffer is accepted even
/// when it still exceeds the budget.
pub fn optimize_image(payload: &[u8]) -> Result<EncodedImage, EncodeError> {
    let mut decoder = ImageReader::new(Cursor::new(payload))
        .with_guessed_format()
        .map_err(|error| EncodeError::Decode(error.to_string()))?
        .into_decoder()
        .map_err(|error| EncodeError::Decode(error.to_string()))?;

    // A missing or unreadable orientation tag means the pixels are already
    // stored upright.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let decoded = DynamicImage::from_decoder(decoder)
        .map_err(|error| EncodeError::Decode(error.to_string()))?;

    encode_within_budget(&normalize(decoded, orientation))
}

/// Applies the embedded rotation tag, then fit-inside resizes to the
/// long-edge cap. Images already within the cap are never upscaled.
pub fn normalize(mut image: DynamicImage, orientation: Orientation) -> DynamicImage {
    image.apply_orientation(orientation);
    if image.width().max(image.height()) > MAX_LONG_EDGE_PX {
        image = image.resize(MAX_LONG_EDGE_PX, MAX_LONG_EDGE_PX, FilterType::Lanczos3);
    }
    image
}

fn encode_within_budget(image: &DynamicImage) -> Result<EncodedImage, EncodeError> {
    // JPEG carries no alpha channel.
    let rgb = image.to_rgb8();
    let mut attempts = Vec::new();
    let mut quality = INITIAL_QUALITY;
    loop {
        let bytes = encode_jpeg(&rgb, quality)?;
        attempts.push(EncodingAttempt {
            quality,
            output_len: bytes.len(),
        });

        if bytes.len() <= SIZE_BUDGET_BYTES || quality <= QUALITY_FLOOR {
            return Ok(EncodedImage {
                bytes,
                quality,
                width: rgb.width(),
                height: rgb.height(),
                attempts,
            });
        }

        quality -= QUALITY_STEP;
    }
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|error| EncodeError::Encode(error.to_string()))?;
    Ok(buffer)
}
