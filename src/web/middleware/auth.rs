use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::web::{AppState, error::AppError};

pub const SESSION_COOKIE: &str = "token";

/// Resolves the session token into `Session` and `UserIdentity` request
/// extensions.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    // Authorization header first, then the session cookie
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AppError::NotAuthenticated)?;

    let session = state.auth_service.authenticate(&token).await?;
    req.extensions_mut().insert(session.identity.clone());
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
