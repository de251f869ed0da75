use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// HS256 signing secret, decoded from base64 (the token issuer signs
    /// over the decoded bytes, not the base64 text).
    pub jwt_secret: Vec<u8>,
    /// Allowed browser origin for CORS; permissive when unset (dev).
    pub frontend_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);

        let jwt_secret_b64 = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        let jwt_secret = STANDARD
            .decode(jwt_secret_b64.trim())
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET invalid base64".into()))?;
        if jwt_secret.is_empty() {
            return Err(crate::error::AppError::Config(
                "JWT_SECRET must decode to a non-empty key".into(),
            ));
        }

        let frontend_origin = env::var("FRONTEND_ORIGIN")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            frontend_origin,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            port: 8000,
            jwt_secret: b"test-secret-key".to_vec(),
            frontend_origin: None,
        }
    }
}
