//! Logo fetching and compositing
//!
//! Fetches a remote logo image and overlays it centered on a rendered QR
//! bitmap. Fetching is bounded by the HTTP client's timeout; whether a
//! failure here is fatal or merely degrades the output is the caller's
//! decision, not this module's.

use image::{imageops, DynamicImage, ImageBuffer, RgbaImage};
use thiserror::Error;

use crate::codec::parse_hex_color;
use crate::params::CanonicalParams;

#[derive(Error, Debug)]
pub enum LogoError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("remote returned HTTP {0}")]
    Status(u16),

    #[error("could not decode logo image: {0}")]
    Decode(String),
}

/// Downloads and decodes the logo image
///
/// Network errors and non-success statuses are distinguishable from decode
/// failures so callers can log them meaningfully.
pub async fn fetch_logo(client: &reqwest::Client, url: &str) -> Result<DynamicImage, LogoError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| LogoError::Fetch(err.to_string()))?;

    if !response.status().is_success() {
        return Err(LogoError::Status(response.status().as_u16()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| LogoError::Fetch(err.to_string()))?;

    image::load_from_memory(&bytes).map_err(|err| LogoError::Decode(err.to_string()))
}

/// Overlays an already-decoded logo onto the QR bitmap
///
/// The logo is resized to fit a `round(size * logoScale)` bounding box
/// without cropping, placed centered. When a logo background color is set,
/// an opaque plate of that color is painted over the box first, then the
/// logo is alpha-blended on top.
pub fn composite(base: &mut RgbaImage, logo: &DynamicImage, params: &CanonicalParams) {
    let box_size = (params.size as f32 * params.logo_scale).round() as u32;
    let box_size = box_size.clamp(1, params.size);

    let resized = logo
        .resize(box_size, box_size, imageops::FilterType::Lanczos3)
        .to_rgba8();

    let left = ((params.size - box_size) as f32 / 2.0).round() as i64;
    let top = left;

    if let Some(plate_color) = params
        .logo_background_color
        .as_deref()
        .and_then(parse_hex_color)
    {
        let plate: RgbaImage = ImageBuffer::from_pixel(box_size, box_size, plate_color);
        imageops::overlay(base, &plate, left, top);
    }

    // The aspect-preserving resize may leave one axis short of the box
    let offset_x = left + ((box_size - resized.width()) / 2) as i64;
    let offset_y = top + ((box_size - resized.height()) / 2) as i64;
    imageops::overlay(base, &resized, offset_x, offset_y);
}
