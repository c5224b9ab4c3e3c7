//! QR image codec
//!
//! Wraps the `qrcode` matrix encoder behind two narrow entry points: a
//! raster renderer producing an RGBA bitmap at the exact requested pixel
//! size, and an SVG renderer producing scalable markup. Payloads that
//! exceed the matrix capacity at the requested error correction level
//! surface as `ApiError::Encoding`.

use image::{imageops, ImageBuffer, Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};

use crate::error::ApiError;
use crate::params::{CanonicalParams, ErrorCorrection};

/// Parses `#RGB` or `#RRGGBB` into an opaque RGBA pixel
pub fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.strip_prefix('#')?;
    let (r, g, b) = match hex.len() {
        3 => {
            let mut it = hex.chars();
            let r = it.next()?.to_digit(16)? as u8;
            let g = it.next()?.to_digit(16)? as u8;
            let b = it.next()?.to_digit(16)? as u8;
            (r * 17, g * 17, b * 17)
        }
        6 => (
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        ),
        _ => return None,
    };
    Some(Rgba([r, g, b, 255]))
}

fn encode_matrix(payload: &str, level: ErrorCorrection) -> Result<QrCode, ApiError> {
    let ec = match level {
        ErrorCorrection::L => EcLevel::L,
        ErrorCorrection::M => EcLevel::M,
        ErrorCorrection::Q => EcLevel::Q,
        ErrorCorrection::H => EcLevel::H,
    };
    QrCode::with_error_correction_level(payload, ec)
        .map_err(|err| ApiError::Encoding(err.to_string()))
}

/// Renders the payload as an RGBA bitmap, `size` pixels square
///
/// Modules are drawn at an integer scale inside the quiet zone, then the
/// result is snapped to the exact requested size with a nearest-neighbor
/// resize so module edges stay crisp.
pub fn render_raster(payload: &str, params: &CanonicalParams) -> Result<RgbaImage, ApiError> {
    let code = encode_matrix(payload, params.error_correction_level)?;

    let fg = parse_hex_color(&params.foreground_color)
        .ok_or_else(|| ApiError::Validation(format!("invalid hex color: {}", params.foreground_color)))?;
    let bg = parse_hex_color(&params.background_color)
        .ok_or_else(|| ApiError::Validation(format!("invalid hex color: {}", params.background_color)))?;

    let width = code.width();
    let modules = width as u32 + 2 * params.quiet_zone;
    let scale = (params.size / modules).max(1);
    let native = modules * scale;

    let mut img: RgbaImage = ImageBuffer::from_pixel(native, native, bg);
    for y in 0..width {
        for x in 0..width {
            if code[(x, y)] == Color::Dark {
                let px = (x as u32 + params.quiet_zone) * scale;
                let py = (y as u32 + params.quiet_zone) * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        img.put_pixel(px + dx, py + dy, fg);
                    }
                }
            }
        }
    }

    if native != params.size {
        img = imageops::resize(&img, params.size, params.size, imageops::FilterType::Nearest);
    }
    Ok(img)
}

/// Renders the payload as standalone SVG markup
///
/// One `<path>` of unit squares per dark module, a background `<rect>`, and
/// a viewBox in module units so the image scales without artifacts. The
/// width/height attributes carry the requested pixel size.
pub fn render_svg(payload: &str, params: &CanonicalParams) -> Result<String, ApiError> {
    let code = encode_matrix(payload, params.error_correction_level)?;

    let width = code.width();
    let quiet = params.quiet_zone as usize;
    let dimension = width + 2 * quiet;

    let mut path = String::new();
    for y in 0..width {
        for x in 0..width {
            if code[(x, y)] == Color::Dark {
                if !path.is_empty() {
                    path.push(' ');
                }
                path += &format!("M{},{}h1v1h-1z", x + quiet, y + quiet);
            }
        }
    }

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{0}\" height=\"{0}\" viewBox=\"0 0 {1} {1}\" stroke=\"none\">\n",
        params.size, dimension
    );
    result += &format!(
        "\t<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>\n",
        params.background_color
    );
    result += &format!("\t<path d=\"{}\" fill=\"{}\"/>\n", path, params.foreground_color);
    result += "</svg>\n";
    Ok(result)
}

/// Encodes the bitmap as PNG bytes
pub fn encode_png(img: RgbaImage) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encodes the bitmap as JPEG bytes (alpha is flattened away)
pub fn encode_jpeg(img: RgbaImage) -> Result<Vec<u8>, ApiError> {
    let mut buf = Vec::new();
    let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{resolve, RawVisualParams};

    fn default_params() -> CanonicalParams {
        resolve(&RawVisualParams::default()).unwrap()
    }

    #[test]
    fn raster_output_matches_requested_size() {
        let params = default_params();
        let img = render_raster("hello world", &params).unwrap();
        assert_eq!(img.dimensions(), (256, 256));

        let mut odd = default_params();
        odd.size = 300;
        let img = render_raster("hello world", &odd).unwrap();
        assert_eq!(img.dimensions(), (300, 300));
    }

    #[test]
    fn raster_corner_is_background_colored() {
        // The quiet zone guarantees the corner pixel carries the background
        let mut params = default_params();
        params.background_color = "#00FF00".to_string();
        let img = render_raster("hello world", &params).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn oversized_payload_is_an_encoding_error() {
        let mut params = default_params();
        params.error_correction_level = ErrorCorrection::H;
        let payload = "x".repeat(3000);
        assert!(matches!(
            render_raster(&payload, &params),
            Err(ApiError::Encoding(_))
        ));
    }

    #[test]
    fn svg_carries_colors_and_size() {
        let mut params = default_params();
        params.foreground_color = "#112233".to_string();
        params.background_color = "#FFEEDD".to_string();
        params.size = 512;
        let svg = render_svg("https://example.com", &params).unwrap();
        assert!(svg.contains("fill=\"#112233\""));
        assert!(svg.contains("fill=\"#FFEEDD\""));
        assert!(svg.contains("width=\"512\""));
    }

    #[test]
    fn hex_color_parsing() {
        assert_eq!(parse_hex_color("#000000"), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(parse_hex_color("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_hex_color("#1A2b3C"), Some(Rgba([26, 43, 60, 255])));
        assert_eq!(parse_hex_color("123456"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#gggggg"), None);
    }

    #[test]
    fn png_bytes_round_trip() {
        let params = default_params();
        let img = render_raster("hello", &params).unwrap();
        let bytes = encode_png(img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 256);
    }
}
