//! HTTP request handlers for the QR generation API
//!
//! This module implements the request/response layer for:
//! - Static QR generation with content-addressed artifacts
//! - Dynamic QR codes (create, update target, analytics)
//! - Bulk generation with per-job isolation
//! - The public redirect with best-effort scan logging

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::database::{self, AppState};
use crate::error::ApiError;
use crate::generator::{self, LogoPolicy, RenderedArtifact};
use crate::model::{
    ApiKeyRecord, BulkGenerateRequest, DynamicCodeRecord, DynamicCreateRequest,
    DynamicUpdateRequest, StaticGenerateRequest,
};
use crate::params::{self, CanonicalParams};
use crate::storage::ArtifactKind;
use crate::usage;

const MAX_SHORT_ID_ATTEMPTS: usize = 5;
const SHORT_ID_LEN: usize = 10;

/// Success envelope shared by every endpoint
fn success(data: Value, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
}

/// Metadata block describing one generated artifact
fn qr_metadata(
    data: &str,
    qr_params: &CanonicalParams,
    artifact: &RenderedArtifact,
    hash: Option<&str>,
    timestamp: DateTime<Utc>,
) -> Value {
    json!({
        "data": data,
        "size": qr_params.size,
        "format": artifact.effective_format,
        "formatSubstituted": artifact.format_substituted,
        "customization": {
            "foregroundColor": qr_params.foreground_color,
            "backgroundColor": qr_params.background_color,
            "logoUrl": qr_params.logo_url,
            "logoScale": qr_params.logo_scale,
            "logoMargin": qr_params.logo_margin,
            "logoBackgroundColor": qr_params.logo_background_color,
            "quietZone": qr_params.quiet_zone,
            "errorCorrectionLevel": qr_params.error_correction_level,
            "logoEmbedded": artifact.logo.embedded(),
        },
        "generatedHash": hash,
        "timestamp": timestamp.to_rfc3339(),
    })
}

fn usage_block(record: &ApiKeyRecord) -> Value {
    json!({
        "total": record.usage_count,
        "daily": record.daily_usage_count,
        "monthly": record.monthly_usage_count,
        "lastUsed": record.last_used_at.map(|t| t.to_rfc3339()),
    })
}

/// Generates a static QR code
///
/// The artifact filename is the md5 of the payload plus canonical
/// parameters, so identical requests land on the same path. A logo
/// failure here fails the whole request.
///
/// # Response
///
/// - **200 OK** - artifact written, counters updated
/// - **400 Bad Request** - missing data, invalid params, or payload too
///   long for the matrix
pub async fn generate_static(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKeyRecord>,
    Json(payload): Json<StaticGenerateRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(
        size = ?payload.params.size,
        format = ?payload.params.format,
        has_logo = payload.params.logo_url.is_some(),
        "generating static QR code"
    );

    let data = params::require_data(payload.data.as_deref())?;
    let qr_params = params::resolve(&payload.params)?;
    let hash = params::content_hash(data, &qr_params);

    let artifact =
        generator::render_artifact(&state.http, data, &qr_params, LogoPolicy::Fatal).await?;

    let now = Utc::now();
    usage::record_usage(&state.db, &api_key.key, 1, now)?;

    let file_name = format!("{}.{}", hash, artifact.extension);
    state
        .store
        .write(&api_key.id, &ArtifactKind::Static, &file_name, &artifact.bytes)
        .await?;

    let file_path = state
        .store
        .public_path(&api_key.id, &ArtifactKind::Static, &file_name);
    let download_url = format!(
        "{}{}{}",
        state.config.api_base_url,
        file_path,
        generator::tracking_params("static")
    );

    tracing::info!(%hash, %file_path, "static QR code generated successfully");

    Ok((
        StatusCode::OK,
        success(
            json!({
                "qrCode": {
                    "filePath": file_path,
                    "downloadUrl": download_url,
                    "metadata": qr_metadata(data, &qr_params, &artifact, Some(&hash), now),
                }
            }),
            "QR code generated successfully",
        ),
    )
        .into_response())
}

/// Creates a dynamic QR code
///
/// The image encodes `{base}/r/{shortId}` rather than the target, so the
/// target can be repointed later without touching the artifact. Logo
/// failures degrade to a logo-less image.
///
/// # Response
///
/// - **201 Created** - row and artifact persisted
/// - **400 Bad Request** - missing or non-absolute targetUrl
pub async fn create_dynamic(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKeyRecord>,
    Json(payload): Json<DynamicCreateRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(
        target_url = ?payload.target_url,
        has_logo = payload.params.logo_url.is_some(),
        "creating dynamic QR code"
    );

    let target_url = params::require_target_url(payload.target_url.as_deref())?.to_string();
    let qr_params = params::resolve(&payload.params)?;
    let now = Utc::now();

    // Collisions on the 10-char id space are vanishingly rare but the
    // uniqueness check lives inside the insert transaction, so a re-draw
    // is always safe
    let mut created: Option<DynamicCodeRecord> = None;
    for _ in 0..MAX_SHORT_ID_ATTEMPTS {
        let short_id = generator::random_id(SHORT_ID_LEN);
        let record = DynamicCodeRecord {
            short_id: short_id.clone(),
            api_key_id: api_key.id.clone(),
            target_url: target_url.clone(),
            original_data_encoded: format!("{}/r/{}", state.config.api_base_url, short_id),
            params: qr_params.clone(),
            created_at: now,
            updated_at: now,
        };
        if database::insert_dynamic_code(&state.db, &record)? {
            created = Some(record);
            break;
        }
        tracing::warn!(%short_id, "short id collision, regenerating");
    }
    let record = created.ok_or_else(|| {
        ApiError::Internal("could not allocate a unique short id".to_string())
    })?;

    let artifact = generator::render_artifact(
        &state.http,
        &record.original_data_encoded,
        &qr_params,
        LogoPolicy::BestEffort,
    )
    .await?;

    let updated_key = usage::record_usage(&state.db, &api_key.key, 1, now)?;

    let file_name = format!("{}.{}", record.short_id, artifact.extension);
    state
        .store
        .write(&api_key.id, &ArtifactKind::Dynamic, &file_name, &artifact.bytes)
        .await?;

    let file_path = state
        .store
        .public_path(&api_key.id, &ArtifactKind::Dynamic, &file_name);
    let download_url = format!(
        "{}{}{}",
        state.config.api_base_url,
        file_path,
        generator::tracking_params("dynamic")
    );

    tracing::info!(short_id = %record.short_id, %file_path, "dynamic QR code created successfully");

    Ok((
        StatusCode::CREATED,
        success(
            json!({
                "qrCode": {
                    "shortId": record.short_id,
                    "filePath": file_path,
                    "downloadUrl": download_url,
                    "targetUrl": record.target_url,
                    "originalDataEncoded": record.original_data_encoded,
                    "metadata": qr_metadata(
                        &record.original_data_encoded,
                        &qr_params,
                        &artifact,
                        Some(&record.short_id),
                        now,
                    ),
                    "analytics": {
                        "totalScans": 0,
                        "lastScanned": null,
                        "createdAt": record.created_at.to_rfc3339(),
                        "updatedAt": record.updated_at.to_rfc3339(),
                    },
                    "apiKey": {
                        "id": api_key.id,
                        "name": api_key.name,
                        "usage": usage_block(&updated_key),
                    },
                }
            }),
            "Dynamic QR code created successfully",
        ),
    )
        .into_response())
}

/// Repoints an owned dynamic code at a new target URL
///
/// Not-found and not-owned are indistinguishable 404s; the artifact is
/// never re-rendered.
pub async fn update_dynamic(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKeyRecord>,
    Path(short_id): Path<String>,
    Json(payload): Json<DynamicUpdateRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(%short_id, new_target_url = ?payload.new_target_url, "updating dynamic QR code");

    let new_target_url = params::require_target_url(payload.new_target_url.as_deref())?;
    let now = Utc::now();

    let updated =
        database::update_dynamic_target(&state.db, &short_id, &api_key.id, new_target_url, now)?;

    let Some(record) = updated else {
        tracing::warn!(%short_id, "dynamic QR code not found for update");
        return Err(ApiError::NotFound(
            "The requested dynamic QR code does not exist or does not belong to this API key"
                .to_string(),
        ));
    };

    Ok((
        StatusCode::OK,
        success(
            json!({
                "update": {
                    "shortId": record.short_id,
                    "newTargetUrl": record.target_url,
                    "updatedAt": record.updated_at.to_rfc3339(),
                }
            }),
            "Target URL updated successfully",
        ),
    )
        .into_response())
}

/// Scan analytics for an owned dynamic code
pub async fn dynamic_analytics(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKeyRecord>,
    Path(short_id): Path<String>,
) -> Result<Response, ApiError> {
    tracing::info!(%short_id, "fetching dynamic QR code analytics");

    let Some(record) = database::find_dynamic_code_scoped(&state.db, &short_id, &api_key.id)?
    else {
        tracing::warn!(%short_id, "dynamic QR code not found for analytics");
        return Err(ApiError::NotFound(
            "The requested dynamic QR code does not exist or does not belong to this API key"
                .to_string(),
        ));
    };

    let (total_scans, last_scanned) = database::scan_stats(&state.db, &short_id)?;

    Ok((
        StatusCode::OK,
        success(
            json!({
                "analytics": {
                    "shortId": record.short_id,
                    "totalScans": total_scans,
                    "lastScanned": last_scanned.map(|t| t.to_rfc3339()),
                    "createdAt": record.created_at.to_rfc3339(),
                    "lastUpdated": record.updated_at.to_rfc3339(),
                    "targetUrl": record.target_url,
                    "scanMetrics": {
                        "total": total_scans,
                    },
                }
            }),
            "Analytics retrieved successfully",
        ),
    )
        .into_response())
}

/// Generates a batch of QR codes under one shared directory
///
/// Usage is accounted once up front for the whole batch. Jobs are
/// independent: a malformed or failing job is logged and skipped, never
/// aborting its siblings, and the response reports whatever succeeded.
pub async fn bulk_generate(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKeyRecord>,
    Json(payload): Json<BulkGenerateRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(total_jobs = payload.jobs.len(), "starting bulk QR code generation");

    if payload.jobs.is_empty() {
        return Err(ApiError::Validation(
            "Request body must contain at least one job object".to_string(),
        ));
    }

    let now = Utc::now();
    usage::record_usage(&state.db, &api_key.key, payload.jobs.len() as u64, now)?;

    let bulk_request_id = generator::random_id(8);
    let kind = ArtifactKind::Bulk(&bulk_request_id);
    let mut generated: Vec<Value> = Vec::new();

    for job in &payload.jobs {
        let data = match params::require_data(job.data.as_deref()) {
            Ok(data) => data,
            Err(_) => {
                tracing::warn!("skipping bulk job due to missing data");
                continue;
            }
        };
        let qr_params = match params::resolve(&job.params) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "skipping bulk job with invalid params");
                continue;
            }
        };
        let artifact = match generator::render_artifact(
            &state.http,
            data,
            &qr_params,
            LogoPolicy::BestEffort,
        )
        .await
        {
            Ok(a) => a,
            Err(err) => {
                tracing::warn!(error = %err, "skipping bulk job that failed to render");
                continue;
            }
        };

        let file_name = format!("{}.{}", generator::random_id(8), artifact.extension);
        if let Err(err) = state
            .store
            .write(&api_key.id, &kind, &file_name, &artifact.bytes)
            .await
        {
            tracing::warn!(error = %err, "skipping bulk job that failed to write");
            continue;
        }

        let file_path = state.store.public_path(&api_key.id, &kind, &file_name);
        let download_url = format!(
            "{}{}{}",
            state.config.api_base_url,
            file_path,
            generator::tracking_params("bulk")
        );

        generated.push(json!({
            "filePath": file_path,
            "downloadUrl": download_url,
            "metadata": qr_metadata(data, &qr_params, &artifact, None, now),
        }));
    }

    tracing::info!(
        %bulk_request_id,
        total_generated = generated.len(),
        "bulk QR codes generated"
    );

    Ok((
        StatusCode::OK,
        success(
            json!({
                "bulkRequest": {
                    "bulkRequestId": bulk_request_id,
                    "totalGenerated": generated.len(),
                    "qrCodes": generated,
                }
            }),
            "Bulk QR codes generated successfully",
        ),
    )
        .into_response())
}

/// Fetches a single code by id: dynamic short id first, then a static
/// artifact probe by hash
pub async fn get_qr_code(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKeyRecord>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    tracing::info!(%id, "fetching QR code by id");

    if let Some(record) = database::find_dynamic_code_scoped(&state.db, &id, &api_key.id)? {
        let (total_scans, last_scanned) = database::scan_stats(&state.db, &id)?;
        let extension = generator::artifact_extension(&record.params);
        let file_name = format!("{}.{}", record.short_id, extension);
        let file_path = state
            .store
            .public_path(&api_key.id, &ArtifactKind::Dynamic, &file_name);

        return Ok((
            StatusCode::OK,
            success(
                json!({
                    "type": "dynamic",
                    "qrCode": {
                        "shortId": record.short_id,
                        "filePath": file_path,
                        "downloadUrl": format!("{}{}", state.config.api_base_url, file_path),
                        "targetUrl": record.target_url,
                        "originalDataEncoded": record.original_data_encoded,
                        "metadata": {
                            "customization": record.params,
                            "generatedHash": record.short_id,
                            "timestamp": record.created_at.to_rfc3339(),
                        },
                        "analytics": {
                            "totalScans": total_scans,
                            "lastScanned": last_scanned.map(|t| t.to_rfc3339()),
                            "createdAt": record.created_at.to_rfc3339(),
                            "updatedAt": record.updated_at.to_rfc3339(),
                        },
                    }
                }),
                "QR code retrieved successfully",
            ),
        )
            .into_response());
    }

    let file_name = format!("{}.png", id);
    if let Some(modified) = state
        .store
        .modified_at(&api_key.id, &ArtifactKind::Static, &file_name)
        .await
    {
        let file_path = state
            .store
            .public_path(&api_key.id, &ArtifactKind::Static, &file_name);
        return Ok((
            StatusCode::OK,
            success(
                json!({
                    "type": "static",
                    "qrCode": {
                        "filePath": file_path,
                        "downloadUrl": format!("{}{}", state.config.api_base_url, file_path),
                        "metadata": {
                            "generatedHash": id,
                            "timestamp": modified.to_rfc3339(),
                        },
                    }
                }),
                "QR code retrieved successfully",
            ),
        )
            .into_response());
    }

    tracing::warn!(%id, "QR code not found");
    Err(ApiError::NotFound(
        "The requested QR code does not exist or does not belong to this API key".to_string(),
    ))
}

/// Public redirect for dynamic codes
///
/// Lookup is deliberately unscoped: anyone scanning the printed code must
/// be redirected. The scan event append is fire-and-forget; a failure
/// there never blocks the redirect.
pub async fn redirect_scan(
    Path(short_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(record) = database::find_dynamic_code(&state.db, &short_id)? else {
        return Ok((StatusCode::NOT_FOUND, "QR Code not found").into_response());
    };

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if let Err(err) =
        database::record_scan_event(&state.db, &short_id, ip_address, user_agent, Utc::now())
    {
        tracing::warn!(error = %err, %short_id, "failed to record scan event");
    }

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, record.target_url)],
    )
        .into_response())
}
