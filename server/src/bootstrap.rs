//! Startup: configuration, logging, database, seed data and the HTTP router

use anyhow::{Context, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

use crate::api::{create_router, AppState};
use crate::auth::hash_password;
use crate::cert;
use crate::config::{BootstrapAdminConfig, Config};
use crate::db::Database;
use crate::logging;
use crate::models::{new_id, now_rfc3339, Role, User, UserStatus};

pub struct Application {
    pub router: Router,
    pub config: Arc<Config>,
    pub socket_addr: SocketAddr,
    /// Present when HTTPS is enabled
    pub tls_config: Option<RustlsConfig>,
    /// Keeps the background log writer alive
    pub log_guard: Option<WorkerGuard>,
}

/// Directory holding config.toml: `CONFIG_DIR`, else the executable's directory
fn config_dir() -> PathBuf {
    std::env::var("CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."))
        })
}

pub async fn setup() -> Result<Application> {
    let config_dir = config_dir();
    let config_base = config_dir.join("config");

    let mut config = match Config::from_file(&config_base) {
        Ok(cfg) => {
            eprintln!("Configuration loaded from {:?}", config_base);
            cfg
        }
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}, using defaults", e);
            Config::default()
        }
    };

    let log_guard = logging::init(&config.logging);

    tracing::info!("Starting MediBook server...");
    tracing::info!("Server Version: {}", env!("BUILD_INFO"));
    if config.logging.enabled {
        tracing::info!(
            directory = %config.logging.directory,
            prefix = %config.logging.file_prefix,
            rotation = %config.logging.rotation,
            "File logging enabled"
        );
    }

    if let Ok(url) = std::env::var("DATABASE_URL") {
        tracing::info!("Using DATABASE_URL from environment");
        config.database.url = url;
    }
    if config.auth.jwt_secret == Config::default().auth.jwt_secret && !config.is_development() {
        tracing::warn!("auth.jwt_secret is the built-in default; set a private secret for production");
    }

    let state = build_state(config).await?;
    let config = state.config.clone();

    let socket_addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid server address: {}", config.server_address()))?;

    let tls_config = if config.tls.enabled {
        let paths = cert::ensure_certificate(&config.tls, &config_dir)?;
        let tls = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
            .await
            .context("Failed to load TLS certificate")?;
        tracing::info!("TLS certificate ready");
        Some(tls)
    } else {
        None
    };

    let router = create_router(state);

    Ok(Application {
        router,
        config,
        socket_addr,
        tls_config,
        log_guard,
    })
}

/// Open the database, seed settings and the bootstrap admin, and assemble the shared state
pub async fn build_state(config: Config) -> Result<AppState> {
    let db = Database::new(&config.database.url).await?;
    tracing::info!("Database initialized");

    let seeded = db
        .seed_default_settings()
        .await
        .context("Failed to seed default settings")?;
    if seeded > 0 {
        tracing::info!(count = seeded, "Seeded default settings");
    }

    if let Some(admin) = &config.bootstrap_admin {
        ensure_bootstrap_admin(&db, admin, config.auth.bcrypt_cost).await?;
    }

    Ok(AppState::new(Arc::new(db), Arc::new(config)))
}

/// Create the configured administrator unless an account with that email exists.
/// Returns whether an account was created.
pub async fn ensure_bootstrap_admin(
    db: &Database,
    admin: &BootstrapAdminConfig,
    bcrypt_cost: u32,
) -> Result<bool> {
    let email = admin.email.trim().to_lowercase();
    if db.get_user_by_email(&email).await?.is_some() {
        tracing::debug!(email = %email, "Bootstrap admin already exists");
        return Ok(false);
    }

    let now = now_rfc3339();
    let user = User {
        id: new_id(),
        email,
        password_hash: hash_password(&admin.password, bcrypt_cost).await?,
        name: admin.name.clone(),
        phone: None,
        role: Role::Admin,
        status: UserStatus::Active,
        created_at: now.clone(),
        updated_at: now,
        last_login_at: None,
    };
    db.create_user(&user, None)
        .await
        .context("Failed to create bootstrap admin")?;

    tracing::info!(email = %user.email, "Created bootstrap admin account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        config.auth.bcrypt_cost = 4;
        config.logging.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_build_state_seeds_settings() {
        let state = build_state(test_config()).await.unwrap();

        let slot_minutes: u32 = state
            .db
            .get_setting_value("appointment_slot_minutes", 0)
            .await;
        assert_eq!(slot_minutes, 30);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_created_once() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let admin = BootstrapAdminConfig {
            email: "Root@Clinic.example".to_string(),
            password: "super-secret".to_string(),
            name: "Root".to_string(),
        };

        assert!(ensure_bootstrap_admin(&db, &admin, 4).await.unwrap());
        assert!(!ensure_bootstrap_admin(&db, &admin, 4).await.unwrap());

        let user = db
            .get_user_by_email("root@clinic.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.status, UserStatus::Active);
    }
}
