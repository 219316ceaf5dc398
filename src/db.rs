use crate::config::Config;
use crate::rpc::facade::RpcTimeouts;
use crate::rpc::{Facade, RecordRpc, RpcClient};
use crate::schema::SchemaRegistry;
use crate::service::auth::AuthOrchestrator;
use crate::service::cache::RedisTokenCache;
use crate::service::oauth::{HttpOAuthProvider, OAuthProvider};
use crate::service::session::SessionManager;
use crate::service::token::TokenService;
use crate::service::user::UserService;
use crate::store::{MigrationCoordinator, RecordStore};
use redis::aio::ConnectionManager;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

async fn init_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database.url)
        .await
}

async fn init_redis(config: &Config) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(config.redis.url.as_str())?;
    ConnectionManager::new(client).await
}

/// Builds the whole service graph and hands each piece to Rocket's
/// managed state. Everything downstream receives its dependencies
/// explicitly; nothing reads globals.
pub fn stage_services(config: Config) -> AdHoc {
    AdHoc::try_on_ignite("Service graph", |rocket| async move {
        let pool = match init_pool(&config).await {
            Ok(pool) => {
                tracing::info!("Database pool initialized successfully");
                pool
            }
            Err(e) => {
                tracing::error!("Failed to initialize database pool: {}", e);
                return Err(rocket);
            }
        };

        let redis_conn = match init_redis(&config).await {
            Ok(conn) => {
                tracing::info!("Redis connection manager initialized successfully");
                conn
            }
            Err(e) => {
                tracing::error!("Failed to initialize Redis connection: {}", e);
                return Err(rocket);
            }
        };

        let registry = Arc::new(SchemaRegistry::builtin());
        let store = RecordStore::new(pool.clone(), registry);
        let migrator = MigrationCoordinator::new(pool.clone());

        let timeouts = RpcTimeouts {
            call: Duration::from_secs(config.rpc.call_timeout_secs),
            migration: Duration::from_secs(config.rpc.migration_timeout_secs),
            health: Duration::from_secs(config.rpc.health_timeout_secs),
        };
        let facade: Arc<dyn RecordRpc> = Arc::new(Facade::new(store, migrator, timeouts));
        let rpc = RpcClient::new(facade, config.rpc.max_attempts, Duration::from_millis(config.rpc.retry_delay_ms));

        let tokens = TokenService::new(
            &config.tokens.secret,
            config.tokens.access_ttl_minutes,
            config.tokens.refresh_ttl_days,
        );
        let cache = Arc::new(RedisTokenCache::new(redis_conn));
        let sessions = SessionManager::new(rpc.clone(), cache, tokens.access_ttl_secs());
        let users = UserService::new(rpc.clone());

        let oauth: Option<Arc<dyn OAuthProvider>> = config.oauth.as_ref().map(|o| {
            Arc::new(HttpOAuthProvider::new(
                o.provider.clone(),
                o.client_id.clone(),
                o.client_secret.clone(),
                o.auth_url.clone(),
                o.token_url.clone(),
                o.userinfo_url.clone(),
                o.redirect_uri.clone(),
            )) as Arc<dyn OAuthProvider>
        });

        let auth = AuthOrchestrator::new(users.clone(), sessions.clone(), tokens.clone(), oauth);

        Ok(rocket
            .manage(pool)
            .manage(rpc)
            .manage(tokens)
            .manage(sessions)
            .manage(users)
            .manage(auth))
    })
}
