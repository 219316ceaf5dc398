use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub tokens: TokenConfig,
    pub rpc: RpcConfig,
    /// Provider settings for OAuth logins. When absent, the OAuth routes
    /// answer 400.
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    /// HS256 signing secret. The default is only usable in debug runs.
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RpcConfig {
    /// Total attempts per call at the client edge, first try included.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub migration_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OAuthConfig {
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_uri: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/datagate".to_string(),
            max_connections: 16,
            min_connections: 4,
            acquire_timeout: 5,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allow_credentials: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: true,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "debug-only-secret-change-me".to_string(),
            access_ttl_minutes: 30,
            refresh_ttl_days: 7,
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 200,
            call_timeout_secs: 10,
            migration_timeout_secs: 120,
            health_timeout_secs: 2,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Datagate.toml (base configuration file)
    /// 2. Environment variables (prefixed with DATAGATE_)
    /// 3. DATABASE_URL / REDIS_URL environment variables (for backwards compatibility)
    pub fn load() -> Result<Self, figment::Error> {
        let defaults = toml::to_string(&Config::default()).map_err(|e| figment::Error::from(e.to_string()))?;
        let figment = Figment::new()
            .merge(Toml::string(&defaults).nested())
            .merge(Toml::file("Datagate.toml").nested())
            .merge(Env::prefixed("DATAGATE_").split("_"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["REDIS_URL"]).map(|_| "redis.url".into()));

        figment.extract()
    }
}
