//! Generation pipeline
//!
//! Composes the codec and the logo compositor into one rendering pipeline
//! shared by the static, dynamic and bulk handlers. The effective output
//! format is decided exactly once, up front, and the logo step's failure
//! policy is declared by the caller instead of re-derived at each site.

use rand::{distr::Alphanumeric, Rng};

use crate::codec;
use crate::error::ApiError;
use crate::logo;
use crate::params::{CanonicalParams, OutputFormat};

/// What happened to the logo step of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoStep {
    NotRequested,
    Applied,
    /// Requested but skipped; the reason is logged and reported
    Skipped(String),
}

impl LogoStep {
    pub fn embedded(&self) -> bool {
        matches!(self, LogoStep::Applied)
    }
}

/// How a logo failure propagates for a given calling context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoPolicy {
    /// Single static generation: any compositor failure fails the request
    Fatal,
    /// Dynamic and bulk generation: log and continue without the logo
    BestEffort,
}

pub struct RenderedArtifact {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub effective_format: OutputFormat,
    /// True when svg was requested together with a logo and the output
    /// was downgraded to png
    pub format_substituted: bool,
    pub logo: LogoStep,
}

/// Resolves the requested format against the logo requirement
///
/// Logo compositing needs pixel blending, so a vector output cannot carry
/// one; svg-with-logo downgrades to png and the substitution is reported
/// to the caller rather than applied silently.
pub fn effective_format(params: &CanonicalParams) -> (OutputFormat, bool) {
    match (params.format, params.logo_url.is_some()) {
        (OutputFormat::Svg, true) => (OutputFormat::Png, true),
        (format, _) => (format, false),
    }
}

/// Renders one payload to final artifact bytes
pub async fn render_artifact(
    client: &reqwest::Client,
    payload: &str,
    params: &CanonicalParams,
    policy: LogoPolicy,
) -> Result<RenderedArtifact, ApiError> {
    let (format, format_substituted) = effective_format(params);

    if format == OutputFormat::Svg {
        let svg = codec::render_svg(payload, params)?;
        return Ok(RenderedArtifact {
            bytes: svg.into_bytes(),
            extension: "svg",
            effective_format: format,
            format_substituted,
            logo: LogoStep::NotRequested,
        });
    }

    let mut image = codec::render_raster(payload, params)?;

    let logo_step = match &params.logo_url {
        None => LogoStep::NotRequested,
        Some(url) => match logo::fetch_logo(client, url).await {
            Ok(logo_image) => {
                logo::composite(&mut image, &logo_image, params);
                LogoStep::Applied
            }
            Err(err) => match policy {
                LogoPolicy::Fatal => return Err(ApiError::LogoFetch(err.to_string())),
                LogoPolicy::BestEffort => {
                    tracing::warn!(error = %err, logo_url = %url, "continuing without logo");
                    LogoStep::Skipped(err.to_string())
                }
            },
        },
    };

    let (bytes, extension) = match format {
        OutputFormat::Jpeg => (codec::encode_jpeg(image)?, "jpeg"),
        _ => (codec::encode_png(image)?, "png"),
    };

    Ok(RenderedArtifact {
        bytes,
        extension,
        effective_format: format,
        format_substituted,
        logo: logo_step,
    })
}

/// The filename extension a stored artifact ends up with
///
/// Mirrors the pipeline's format policy without rendering anything; used
/// when reconstructing paths for already-generated artifacts.
pub fn artifact_extension(params: &CanonicalParams) -> &'static str {
    match effective_format(params) {
        (OutputFormat::Svg, _) => "svg",
        (OutputFormat::Jpeg, _) => "jpeg",
        _ => "png",
    }
}

pub fn random_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Cosmetic tracking query string appended to download URLs
pub fn tracking_params(kind: &str) -> String {
    format!(
        "?t={}&id={}&type={}",
        chrono::Utc::now().timestamp_millis(),
        random_id(8),
        kind
    )
}
