use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Reject diagnostic routes when running in production
pub async fn require_non_production(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if state.environment.is_production() {
        warn!(path = %request.uri().path(), "Diagnostic route requested in production");
        return Err((StatusCode::FORBIDDEN, "Forbidden").into_response());
    }
    Ok(next.run(request).await)
}
