use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::ApiError, state::AppState};

pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
}

/// Signs and verifies session tokens. No refresh or rotation mechanism;
/// a session lives until its expiry claim passes.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub cookie_expire_days: i64,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            cookie_expire_days,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            cookie_expire_days,
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "session token verified");
        Ok(data.claims)
    }

    /// HTTP-only session cookie carrying the signed token. Cookie expiry is
    /// independent of the token's own expiry claim.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::days(self.cookie_expire_days))
            .build()
    }
}

/// Null-valued, already-expired cookie used by logout.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

/// Resolves the authenticated account from the session cookie or a bearer
/// header, rejecting with `Unauthorized` when absent or invalid.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let jar = CookieJar::from_headers(&parts.headers);
        let from_cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

        let from_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.to_string());

        let token = from_cookie.or(from_header).ok_or_else(|| {
            ApiError::Unauthorized("Please login to access this resource".into())
        })?;

        match keys.verify(&token) {
            Ok(claims) => Ok(AuthUser(claims.sub)),
            Err(_) => {
                warn!("invalid or expired session token");
                Err(ApiError::Unauthorized("Invalid or expired token".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_session_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let keys = make_keys();
        assert!(keys.verify("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let mut other = make_keys();
        other.decoding = DecodingKey::from_secret(b"different-secret");
        let token = keys.sign(Uuid::new_v4()).expect("sign");
        assert!(other.verify(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_wrong_issuer_or_audience() {
        let keys = make_keys();
        let token = keys.sign(Uuid::new_v4()).expect("sign");

        // same secret, so only the issuer claim check can reject
        let mut other = make_keys();
        other.issuer = "other-issuer".into();
        assert!(other.verify(&token).is_err());

        let mut other = make_keys();
        other.audience = "other-aud".into();
        assert!(other.verify(&token).is_err());
    }

    #[tokio::test]
    async fn session_cookie_is_http_only_with_expiry() {
        let keys = make_keys();
        let cookie = keys.session_cookie("abc".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(TimeDuration::days(2)));
    }

    #[tokio::test]
    async fn removal_cookie_clears_value() {
        let cookie = removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
    }

    #[tokio::test]
    async fn extractor_accepts_cookie_and_bearer() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).unwrap();

        let req = axum::http::Request::builder()
            .header(axum::http::header::COOKIE, format!("token={}", token))
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let AuthUser(got) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("cookie auth");
        assert_eq!(got, user_id);

        let req = axum::http::Request::builder()
            .header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let AuthUser(got) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("bearer auth");
        assert_eq!(got, user_id);
    }

    #[tokio::test]
    async fn extractor_rejects_missing_and_garbage_tokens() {
        let state = AppState::fake();

        let req = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(AuthUser::from_request_parts(&mut parts, &state)
            .await
            .is_err());

        let req = axum::http::Request::builder()
            .header(axum::http::header::COOKIE, "token=not-a-jwt")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(AuthUser::from_request_parts(&mut parts, &state)
            .await
            .is_err());
    }
}
