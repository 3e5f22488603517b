use crate::AppState;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tv_catalog::auth::validate_token;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub admin: bool,
}

/// Extractor for routes open to any signed-in user.
#[derive(Debug, Clone, Copy)]
pub struct RequireAuth(pub AuthUser);

/// Extractor for administrator-only routes.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .ok_or(AuthError::MissingToken)?;

        let claims = validate_token(token, &state.config.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "rejected token");
            AuthError::InvalidToken
        })?;

        Ok(RequireAuth(AuthUser {
            id: claims.sub,
            admin: claims.admin,
        }))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.admin {
            return Err(AuthError::Forbidden);
        }

        Ok(RequireAdmin(user))
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let (status, error) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Innskráningar krafist"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Ógilt eða útrunnið token"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Aðgerð krefst stjórnandaréttinda"),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
