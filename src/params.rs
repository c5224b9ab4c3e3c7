//! Customization resolver
//!
//! Turns the raw, possibly-partial visual parameters from a request into a
//! canonical parameter set with all defaults applied, and derives the
//! content hash that addresses static artifacts.

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::codec::parse_hex_color;
use crate::error::ApiError;

pub const DEFAULT_SIZE: u32 = 256;
pub const DEFAULT_FOREGROUND: &str = "#000000";
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";
pub const DEFAULT_LOGO_SCALE: f32 = 0.2;
pub const DEFAULT_LOGO_MARGIN: u32 = 4;
pub const DEFAULT_QUIET_ZONE: u32 = 4;

/// Visual customization options as they arrive on the wire
///
/// Every field is optional; `resolve` applies the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawVisualParams {
    pub size: Option<u32>,
    pub format: Option<String>,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub logo_url: Option<String>,
    pub logo_scale: Option<f32>,
    pub logo_margin: Option<u32>,
    pub logo_background_color: Option<String>,
    pub quiet_zone: Option<u32>,
    pub error_correction_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Svg => "svg",
        }
    }
}

/// The four standard QR error correction levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

/// Fully-resolved visual parameters
///
/// This is the value object the codec and compositor consume, the snapshot
/// persisted with dynamic codes, and the input to the content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalParams {
    pub size: u32,
    pub format: OutputFormat,
    pub foreground_color: String,
    pub background_color: String,
    pub logo_url: Option<String>,
    pub logo_scale: f32,
    pub logo_margin: u32,
    pub logo_background_color: Option<String>,
    pub quiet_zone: u32,
    pub error_correction_level: ErrorCorrection,
}

/// Applies defaults and validates the raw parameters
pub fn resolve(raw: &RawVisualParams) -> Result<CanonicalParams, ApiError> {
    let size = raw.size.unwrap_or(DEFAULT_SIZE);
    if !(16..=4096).contains(&size) {
        return Err(ApiError::Validation(
            "size must be between 16 and 4096 pixels".to_string(),
        ));
    }

    let format = match raw.format.as_deref() {
        None => OutputFormat::Png,
        Some(f) => match f.to_ascii_lowercase().as_str() {
            "png" => OutputFormat::Png,
            "jpeg" | "jpg" => OutputFormat::Jpeg,
            "svg" => OutputFormat::Svg,
            other => {
                return Err(ApiError::Validation(format!(
                    "unsupported output format: {}",
                    other
                )))
            }
        },
    };

    let foreground_color = resolve_color(raw.foreground_color.as_deref(), DEFAULT_FOREGROUND)?;
    let background_color = resolve_color(raw.background_color.as_deref(), DEFAULT_BACKGROUND)?;

    let logo_background_color = match raw.logo_background_color.as_deref() {
        None => None,
        Some(c) => Some(resolve_color(Some(c), "")?),
    };

    let logo_scale = raw.logo_scale.unwrap_or(DEFAULT_LOGO_SCALE);
    if !(logo_scale > 0.0 && logo_scale <= 1.0) {
        return Err(ApiError::Validation(
            "logoScale must be a fraction between 0 and 1".to_string(),
        ));
    }

    let error_correction_level = match raw.error_correction_level.as_deref() {
        None => ErrorCorrection::M,
        Some(l) => match l.to_ascii_uppercase().as_str() {
            "L" => ErrorCorrection::L,
            "M" => ErrorCorrection::M,
            "Q" => ErrorCorrection::Q,
            "H" => ErrorCorrection::H,
            other => {
                return Err(ApiError::Validation(format!(
                    "invalid error correction level: {}",
                    other
                )))
            }
        },
    };

    Ok(CanonicalParams {
        size,
        format,
        foreground_color,
        background_color,
        logo_url: raw.logo_url.clone().filter(|u| !u.is_empty()),
        logo_scale,
        logo_margin: raw.logo_margin.unwrap_or(DEFAULT_LOGO_MARGIN),
        logo_background_color,
        quiet_zone: raw.quiet_zone.unwrap_or(DEFAULT_QUIET_ZONE),
        error_correction_level,
    })
}

fn resolve_color(raw: Option<&str>, default: &str) -> Result<String, ApiError> {
    let value = raw.unwrap_or(default);
    if parse_hex_color(value).is_none() {
        return Err(ApiError::Validation(format!("invalid hex color: {}", value)));
    }
    Ok(value.to_string())
}

/// Validates the static/bulk payload discriminator
pub fn require_data(data: Option<&str>) -> Result<&str, ApiError> {
    match data {
        Some(d) if !d.is_empty() => Ok(d),
        _ => Err(ApiError::Validation("\"data\" is required".to_string())),
    }
}

/// Validates the dynamic-code discriminator: must be an absolute URL
pub fn require_target_url(target_url: Option<&str>) -> Result<&str, ApiError> {
    let url = match target_url {
        Some(u) if !u.is_empty() => u,
        _ => {
            return Err(ApiError::Validation(
                "targetUrl is required for dynamic QR codes".to_string(),
            ))
        }
    };
    Url::parse(url).map_err(|_| {
        ApiError::Validation("The provided targetUrl is not a valid URL".to_string())
    })?;
    Ok(url)
}

/// Content fingerprint for static artifacts
///
/// Serializes the payload plus canonical parameters through a
/// `serde_json::Value`, whose object keys are stored sorted, so the digest
/// cannot depend on the order the caller supplied fields in. The hex digest
/// doubles as the artifact filename stem.
pub fn content_hash(data: &str, params: &CanonicalParams) -> String {
    let fingerprint = json!({
        "data": data,
        "size": params.size,
        "format": params.format,
        "foregroundColor": params.foreground_color,
        "backgroundColor": params.background_color,
        "logoUrl": params.logo_url,
        "logoScale": params.logo_scale,
        "logoMargin": params.logo_margin,
        "logoBackgroundColor": params.logo_background_color,
        "quietZone": params.quiet_zone,
        "errorCorrectionLevel": params.error_correction_level,
    });
    format!("{:x}", md5::compute(fingerprint.to_string()))
}
