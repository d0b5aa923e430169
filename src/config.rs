use std::{env, path::PathBuf};
use thiserror::Error;

/// AppConfig
///
/// Holds the application's entire configuration state. Built once at startup by
/// [`AppConfig::load`] and shared read-only with every component through `FromRef`,
/// so no handler ever reads the process environment directly.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls which secrets are mandatory.
    pub env: Env,
    // TCP port the HTTP server binds to.
    pub port: u16,
    // Which Credential Store implementation backs the repository.
    pub store: StoreBackend,
    // Postgres connection string, required when `store` is Postgres.
    pub db_url: Option<String>,
    // Path of the JSON document file used by the file-backed store.
    pub data_file: PathBuf,
    // HMAC key used to sign and verify bearer tokens.
    pub jwt_secret: String,
    // Public base URL of this service, embedded in verification links.
    pub base_url: String,
    // Outbound email settings. `None` falls back to logging messages locally.
    pub mail: Option<MailConfig>,
    // Sender address for transactional email.
    pub mail_from: String,
    // Root of the publicly served file area (avatars live under `avatars/`).
    pub public_dir: PathBuf,
    // Scratch directory for uploads awaiting processing.
    pub tmp_dir: PathBuf,
    // Where processed avatars are written.
    pub storage: StorageBackend,
    // bcrypt work factor for password hashes.
    pub bcrypt_cost: u32,
}

/// Env
///
/// Defines the runtime context. Production refuses to start without its secrets.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Clone, PartialEq, Debug)]
pub enum StoreBackend {
    Postgres,
    Json,
}

#[derive(Clone, PartialEq, Debug)]
pub enum StorageBackend {
    Local,
    S3(S3Config),
}

#[derive(Clone, PartialEq, Debug)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
}

/// Mailgun credentials.
#[derive(Clone, PartialEq, Debug)]
pub struct MailConfig {
    pub api_key: String,
    pub domain: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingInProduction(&'static str),

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const LOCAL_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_MAIL_FROM: &str = "Easy Contacts <no-reply@easy-contacts.local>";
const DEFAULT_BCRYPT_COST: u32 = 10;

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for test setup: JSON store, local file
    /// area under the system temp directory, no outbound mail.
    fn default() -> Self {
        let scratch = env::temp_dir().join("contacts-api");
        Self {
            env: Env::Local,
            port: 3000,
            store: StoreBackend::Json,
            db_url: None,
            data_file: scratch.join("store.json"),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            base_url: LOCAL_BASE_URL.to_string(),
            mail: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            public_dir: scratch.join("public"),
            tmp_dir: scratch.join("tmp"),
            storage: StorageBackend::Local,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment. In production the signing key,
    /// base URL and mail credentials are mandatory and a missing one is reported
    /// as an error so `main` can refuse to start.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = required_in(&env, "JWT_SECRET", LOCAL_JWT_SECRET)?;
        let base_url = required_in(&env, "BASE_URL", LOCAL_BASE_URL)?;

        let mail = match (env::var("MAILGUN_API_KEY"), env::var("MAILGUN_DOMAIN")) {
            (Ok(api_key), Ok(domain)) => Some(MailConfig { api_key, domain }),
            (Err(_), _) if env == Env::Production => {
                return Err(ConfigError::MissingInProduction("MAILGUN_API_KEY"));
            }
            (_, Err(_)) if env == Env::Production => {
                return Err(ConfigError::MissingInProduction("MAILGUN_DOMAIN"));
            }
            _ => None,
        };

        let default_store = match env {
            Env::Production => "postgres",
            Env::Local => "json",
        };
        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| default_store.to_string())
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "json" => StoreBackend::Json,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let db_url = env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && db_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            Err(_) => 3000,
        };

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(raw) => match raw.parse::<u32>() {
                Ok(cost) if (4..=31).contains(&cost) => cost,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BCRYPT_COST",
                        value: raw,
                    });
                }
            },
            Err(_) => DEFAULT_BCRYPT_COST,
        };

        let storage = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageBackend::S3(S3Config {
                endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key: env::var("S3_ACCESS_KEY")
                    .map_err(|_| ConfigError::Missing("S3_ACCESS_KEY"))?,
                secret_key: env::var("S3_SECRET_KEY")
                    .map_err(|_| ConfigError::Missing("S3_SECRET_KEY"))?,
                bucket: env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "avatars".to_string()),
            }),
            _ => StorageBackend::Local,
        };

        Ok(Self {
            env,
            port,
            store,
            db_url,
            data_file: path_var("DATA_FILE", "data/store.json"),
            jwt_secret,
            base_url: base_url.trim_end_matches('/').to_string(),
            mail,
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string()),
            public_dir: path_var("PUBLIC_DIR", "public"),
            tmp_dir: path_var("TMP_DIR", "tmp"),
            storage,
            bcrypt_cost,
        })
    }

    /// Directory the local file store writes avatars into.
    pub fn avatars_dir(&self) -> PathBuf {
        self.public_dir.join("avatars")
    }
}

fn required_in(env: &Env, name: &'static str, local_fallback: &str) -> Result<String, ConfigError> {
    match (env::var(name), env) {
        (Ok(value), _) => Ok(value),
        (Err(_), Env::Production) => Err(ConfigError::MissingInProduction(name)),
        (Err(_), Env::Local) => Ok(local_fallback.to_string()),
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
