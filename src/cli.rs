//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{Database, NewUser, UserChanges, UserRole};
use crate::password::hash_password_blocking;
use clap::Parser;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Used only in development when no secret is configured.
const DEVELOPMENT_JWT_SECRET: &str = "prime-auth-development-secret-do-not-use-in-production";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "prime-auth",
    about = "Session service with short-lived access tokens and database-tracked refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "prime-auth.db")]
    pub database: String,

    /// Production mode: require a strong JWT secret and send Secure, SameSite=None cookies
    #[arg(long, env = "PRODUCTION")]
    pub production: bool,

    /// Access token lifetime (e.g. "900s", "15m", "1h")
    #[arg(long, env = "ACCESS_TOKEN_EXPIRES_IN", default_value = "15m", value_parser = parse_duration)]
    pub access_ttl: Duration,

    /// Refresh token lifetime (e.g. "7d")
    #[arg(long, env = "REFRESH_TOKEN_EXPIRES_IN", default_value = "7d", value_parser = parse_duration)]
    pub refresh_ttl: Duration,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Login and register attempts allowed per minute per client IP
    #[arg(long, env = "AUTH_RATE_LIMIT")]
    pub auth_rate_limit: Option<NonZeroU32>,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Add the server-side cause of internal errors to response bodies
    #[arg(long)]
    pub expose_error_details: bool,

    /// Create or promote an admin with this email on startup (password from ADMIN_PASSWORD)
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Parse a lifetime such as `30s`, `15m`, `12h` or `7d`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => s.split_at(i),
        None => (s, "s"),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("Invalid duration: {:?}", s))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(format!("Invalid duration unit in {:?}, use s, m, h or d", s)),
    };

    if value == 0 {
        return Err("Duration must be greater than zero".to_string());
    }

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration is too large: {:?}", s))
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Check a configured secret against the deployment mode.
fn check_jwt_secret(secret: String, production: bool) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        if production {
            error!(
                "[SECURITY] JWT secret is shorter than {} characters. Use a longer secret",
                MIN_JWT_SECRET_LENGTH
            );
            return None;
        }
        warn!(
            "JWT secret is shorter than {} characters. This is only acceptable in development",
            MIN_JWT_SECRET_LENGTH
        );
    }
    Some(secret)
}

/// Load JWT secret from environment variable or file.
///
/// In production a missing or short secret is fatal. In development a missing
/// secret falls back to a built-in one with a warning.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(production: bool, jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = match std::env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => {
            // Clear the environment variable to prevent leaking
            // SAFETY: We're single-threaded at this point during startup,
            // and no other code is reading this environment variable.
            unsafe { std::env::remove_var("JWT_SECRET") };
            Some(secret)
        }
        _ => None,
    };

    let secret = match (secret, jwt_secret_file) {
        (Some(secret), _) => secret,
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        },
        (None, None) if production => {
            error!(
                "[SECURITY] JWT secret is required in production. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
            );
            return None;
        }
        (None, None) => {
            warn!("JWT_SECRET is not set, using the built-in development secret");
            return Some(DEVELOPMENT_JWT_SECRET.to_string());
        }
    };

    check_jwt_secret(secret, production)
}

/// Handle the --create-admin flag: create an admin, or promote an existing user.
/// Returns false and logs an error on failure.
pub async fn handle_create_admin(db: &Database, email: &str) -> bool {
    let password = match std::env::var("ADMIN_PASSWORD") {
        Ok(password) if !password.is_empty() => Some(password),
        _ => None,
    };

    let existing = match db.users().get_by_email(email).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            return false;
        }
    };

    if let Some(user) = existing {
        if user.role == UserRole::Admin {
            info!(email = %email, "Admin already exists");
            return true;
        }
        let changes = UserChanges {
            role: Some(UserRole::Admin),
            ..Default::default()
        };
        return match db.users().update(&user.id, &changes).await {
            Ok(_) => {
                info!(email = %email, "Existing user promoted to admin");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to promote user to admin");
                false
            }
        };
    }

    let Some(password) = password else {
        error!("ADMIN_PASSWORD must be set to create a new admin");
        return false;
    };

    let password_hash = match hash_password_blocking(password).await {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            return false;
        }
    };

    let new_user = NewUser {
        email,
        password_hash: &password_hash,
        name: "Administrator",
        role: UserRole::Admin,
    };
    match db.users().create(&new_user).await {
        Ok(user) => {
            info!(email = %email, user_id = %user.id, "Admin user created");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_ttl: args.access_ttl,
        refresh_ttl: args.refresh_ttl,
        production: args.production,
        expose_error_details: args.expose_error_details,
        auth_rate_limit: args.auth_rate_limit,
        trust_proxy: args.trust_proxy,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
