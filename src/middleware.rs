use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::database::{self, AppState};
use crate::error::ApiError;
use crate::model::KeyStatus;

/// Authenticates the X-API-Key header against the principal store
///
/// On success the full `ApiKeyRecord` is attached to the request
/// extensions for the handlers. Missing, unknown, inactive and expired
/// keys all reject with 401 before any handler side effect runs.
pub async fn api_key_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let Some(token) = token else {
        tracing::warn!("API key missing in request header");
        return Err(ApiError::Auth("API key missing".to_string()));
    };

    let Some(record) = database::find_api_key(&state.db, &token)? else {
        tracing::warn!("invalid API key presented");
        return Err(ApiError::Auth("Invalid API key".to_string()));
    };

    if record.status != KeyStatus::Active {
        return Err(ApiError::Auth("API key is inactive".to_string()));
    }

    if let Some(expires_at) = record.expires_at {
        if expires_at < Utc::now() {
            return Err(ApiError::Auth("API key has expired".to_string()));
        }
    }

    request.extensions_mut().insert(record);
    Ok(next.run(request).await)
}
