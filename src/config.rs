use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_expire_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// Where uploaded CSV files end up. Selected by `UPLOAD_BACKEND`.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    Local {
        dir: String,
    },
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        region: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_url = std::env::var("FRONTEND_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "intelhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "intelhub-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 2),
            cookie_expire_days: std::env::var("COOKIE_EXPIRE_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(2),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST")?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USER").unwrap_or_default(),
            password: std::env::var("SMTP_PASS").unwrap_or_default(),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@intelhub.local".into()),
        };
        let storage = match std::env::var("UPLOAD_BACKEND").as_deref() {
            Ok("s3") => StorageConfig::S3 {
                endpoint: std::env::var("S3_ENDPOINT")?,
                bucket: std::env::var("S3_BUCKET")?,
                access_key: std::env::var("S3_ACCESS_KEY")?,
                secret_key: std::env::var("S3_SECRET_KEY")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            },
            _ => StorageConfig::Local {
                dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "sheet_dump".into()),
            },
        };
        Ok(Self {
            database_url,
            frontend_url,
            jwt,
            smtp,
            storage,
        })
    }
}
