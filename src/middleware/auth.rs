use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

/// Authenticated user identity, inserted into request extensions by
/// `auth_middleware` and consumed via `Extension<AuthUser>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Validate an HS256 token and extract claims. Expiration is enforced by
/// the `exp` claim; an expired assertion is indistinguishable from an
/// invalid one at this boundary.
pub fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

/// Pull the bearer credential from the `Authorization` header or the
/// `access-token` cookie (browser clients send the cookie).
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string());
    if bearer.is_some() {
        return bearer;
    }

    CookieJar::from_headers(headers)
        .get("access-token")
        .map(|c| c.value().to_string())
}

/// Verify a credential end to end: token -> claims -> user id.
pub fn authenticate(token: &str, secret: &[u8]) -> Result<AuthUser, AppError> {
    let claims = verify_token(token, secret)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(AuthUser(user_id))
}

/// Middleware guarding the request/response API: every call must present a
/// verified user identity before any handler runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_credential(req.headers()).ok_or(AppError::Unauthorized)?;
    let user = authenticate(&token, &state.config.jwt_secret)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
    }

    fn sign(sub: &str, exp: i64, secret: &[u8]) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.into(),
                exp,
            },
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_user_id() {
        let secret = b"test-secret-key";
        let user_id = Uuid::new_v4();
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = sign(&user_id.to_string(), exp, secret);

        let AuthUser(got) = authenticate(&token, secret).unwrap();
        assert_eq!(got, user_id);
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let secret = b"test-secret-key";
        let exp = chrono::Utc::now().timestamp() - 600;
        let token = sign(&Uuid::new_v4().to_string(), exp, secret);

        assert!(matches!(
            authenticate(&token, secret),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = sign(&Uuid::new_v4().to_string(), exp, b"secret-a");

        assert!(matches!(
            authenticate(&token, b"secret-b"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn non_uuid_subject_is_unauthorized() {
        let secret = b"test-secret-key";
        let exp = chrono::Utc::now().timestamp() + 600;
        let token = sign("not-a-uuid", exp, secret);

        assert!(matches!(
            authenticate(&token, secret),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn credential_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc.def.ghi".parse().unwrap(),
        );
        assert_eq!(extract_credential(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn credential_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "access-token=tok123; other=x".parse().unwrap(),
        );
        assert_eq!(extract_credential(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn missing_credential_is_none() {
        assert!(extract_credential(&HeaderMap::new()).is_none());
    }
}
