//! Bearer-session authentication for `/api/v1`.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use centavo_core::insight::UserProfile;
use centavo_store::SessionCheck;
use tracing::debug;

use crate::error::ApiError;
use crate::state::SharedState;

/// The session's user, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserProfile);

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::unauthorized("token ausente"))?;

    let (scheme, token) = match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => (scheme, token),
        _ => return Err(ApiError::unauthorized("formato de token inválido")),
    };
    let token = token.trim();
    if token.is_empty() {
        debug!("Empty {} token", scheme);
        return Err(ApiError::unauthorized("token vazio"));
    }
    Ok(token.to_string())
}

pub async fn require_session(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;

    let user = match state.store.check_session(&token).await {
        Ok(SessionCheck::Valid(user)) => user,
        Ok(SessionCheck::NotFound) => return Err(ApiError::unauthorized("sessão não encontrada")),
        Ok(SessionCheck::Expired) => return Err(ApiError::unauthorized("sessão expirada")),
        Ok(SessionCheck::NoUser) => {
            return Err(ApiError::unauthorized("usuário não associado à sessão"))
        }
        Err(err) => return Err(ApiError::store("erro ao validar sessão", err)),
    };

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    fn rejection(headers: &HeaderMap) -> String {
        let err = bearer_token(headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        err.message
    }

    #[test]
    fn accepts_bearer_in_any_case() {
        assert_eq!(bearer_token(&headers("Bearer abc123")).unwrap(), "abc123");
        assert_eq!(bearer_token(&headers("bearer abc123")).unwrap(), "abc123");
        assert_eq!(bearer_token(&headers("BEARER  abc123 ")).unwrap(), "abc123");
    }

    #[test]
    fn missing_header() {
        assert_eq!(rejection(&HeaderMap::new()), "token ausente");
        assert_eq!(rejection(&headers("   ")), "token ausente");
    }

    #[test]
    fn wrong_scheme_or_shape() {
        assert_eq!(rejection(&headers("Basic dXNlcjpwYXNz")), "formato de token inválido");
        assert_eq!(rejection(&headers("abc123")), "formato de token inválido");
    }

    #[test]
    fn blank_token() {
        assert_eq!(rejection(&headers("Bearer ")), "token vazio");
        assert_eq!(rejection(&headers("Bearer    ")), "token vazio");
    }
}
