use serde::Deserialize;
use std::env;

/// Which `DocumentStore` implementation backs the service
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmSettings {
    pub endpoint: String,
    pub project_id: String,
    /// OAuth2 bearer token for the FCM HTTP v1 API
    pub access_token: String,
    /// Upper bound of in-flight per-token requests within one multicast
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub store_backend: StoreBackend,
    pub jwt_secret: String,
    /// bcrypt cost for account passwords
    pub password_hash_cost: u32,
    pub listen_addr: String,
    /// Shared secret expected in `x-trigger-secret` on trigger deliveries
    pub trigger_secret: Option<String>,
    pub fcm: FcmSettings,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "carelink".to_string());

        let store_backend = match settings
            .get_string("database.backend")
            .or_else(|_| env::var("APP_STORE"))
            .unwrap_or_else(|_| "mongo".to_string())
            .as_str()
        {
            "mongo" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(config::ConfigError::Message(format!(
                    "Unknown store backend: {}",
                    other
                )))
            }
        };

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let password_hash_cost = settings
            .get_int("auth.password_hash_cost")
            .ok()
            .and_then(|cost| u32::try_from(cost).ok())
            .unwrap_or(bcrypt::DEFAULT_COST);

        let listen_addr = settings
            .get_string("server.listen_addr")
            .or_else(|_| env::var("LISTEN_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let trigger_secret = settings
            .get_string("triggers.secret")
            .or_else(|_| env::var("TRIGGER_SECRET"))
            .ok()
            .filter(|secret| !secret.is_empty());

        let fcm = FcmSettings {
            endpoint: settings
                .get_string("fcm.endpoint")
                .or_else(|_| env::var("FCM_ENDPOINT"))
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            project_id: settings
                .get_string("fcm.project_id")
                .or_else(|_| env::var("FCM_PROJECT_ID"))
                .unwrap_or_default(),
            access_token: settings
                .get_string("fcm.access_token")
                .or_else(|_| env::var("FCM_ACCESS_TOKEN"))
                .unwrap_or_default(),
            max_concurrency: settings
                .get_int("fcm.max_concurrency")
                .ok()
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(16),
        };

        Ok(Config {
            mongo_uri,
            mongo_database,
            store_backend,
            jwt_secret,
            password_hash_cost,
            listen_addr,
            trigger_secret,
            fcm,
        })
    }
}
