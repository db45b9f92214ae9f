//! Bearer-token sessions
//!
//! Tokens are HS256 JWTs with `sub`, `exp` and an optional
//! `provider_token` (the caller's code-host credential).

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use codequal_core::domain::{ExternalCredential, Session};
use codequal_core::port::{AuthError, SessionVerifier};

use crate::error::ApiError;
use crate::state::AppState;

/// Session token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
}

/// Verifies HS256 session tokens signed with a shared secret
pub struct JwtSessionVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl SessionVerifier for JwtSessionVerifier {
    fn verify(&self, bearer_token: &str) -> Result<Session, AuthError> {
        let claims = decode::<SessionClaims>(bearer_token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token validation failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })?;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }

        let credential = claims
            .provider_token
            .filter(|t| !t.is_empty())
            .map(ExternalCredential::new);
        Ok(Session::new(claims.sub, credential))
    }
}

/// Sign a session token (test fixtures and local tooling)
pub fn encode_session_token(secret: &[u8], claims: &SessionClaims) -> Result<String, AuthError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Extract the token from an `Authorization: Bearer <token>` header value
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Authenticated session extracted from the request headers
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken("non-ASCII authorization header".to_string()))?;

        let token = bearer_token(header).ok_or(AuthError::MissingToken)?;
        let session = state.verifier.verify(token)?;
        Ok(AuthSession(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::get_current_timestamp;
    use tokio_test::{assert_err, assert_ok};

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn claims(exp: u64, provider_token: Option<&str>) -> SessionClaims {
        SessionClaims {
            sub: "user-1".to_string(),
            exp,
            provider_token: provider_token.map(str::to_string),
        }
    }

    #[test]
    fn test_valid_token_yields_session() {
        let token =
            encode_session_token(SECRET, &claims(get_current_timestamp() + 3600, Some("gho_x")))
                .unwrap();
        let session = assert_ok!(JwtSessionVerifier::new(SECRET).verify(&token));

        assert_eq!(session.subject, "user-1");
        assert_eq!(
            session.external_credential.as_ref().map(|c| c.expose()),
            Some("gho_x")
        );
    }

    #[test]
    fn test_token_without_provider_token_has_no_credential() {
        let token =
            encode_session_token(SECRET, &claims(get_current_timestamp() + 3600, None)).unwrap();
        let session = JwtSessionVerifier::new(SECRET).verify(&token).unwrap();
        assert!(session.external_credential.is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token =
            encode_session_token(SECRET, &claims(get_current_timestamp() - 3600, None)).unwrap();
        assert_eq!(
            JwtSessionVerifier::new(SECRET).verify(&token).unwrap_err(),
            AuthError::ExpiredToken
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = encode_session_token(
            b"another-secret-key-at-least-32-characters",
            &claims(get_current_timestamp() + 3600, None),
        )
        .unwrap();
        assert!(matches!(
            JwtSessionVerifier::new(SECRET).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
        assert_err!(JwtSessionVerifier::new(SECRET).verify("garbage"));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer   abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
