//! Configuration file management for coachline.
//!
//! Provides a TOML-based config file at `~/.config/coachline/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use coachline_core::CooldownPolicy;
use coachline_core::auth::SessionConfig;
use coachline_db::config::DbConfig;

pub const COOLDOWN_DAYS_ENV: &str = "COACHLINE_COOLDOWN_DAYS";
pub const BIND_ENV: &str = "COACHLINE_BIND";
pub const PORT_ENV: &str = "COACHLINE_PORT";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub policy: PolicySection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthSection {
    /// Hex-encoded token secret (64 hex chars = 32 bytes).
    pub token_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySection {
    pub cooldown_days: i64,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            cooldown_days: CooldownPolicy::DEFAULT_DAYS,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the coachline config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/coachline` or
/// `~/.config/coachline`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("coachline");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coachline")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Generate a random token secret: 32 random bytes, hex-encoded (64 chars).
pub fn generate_token_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct CoachlineConfig {
    pub db_config: DbConfig,
    pub session_config: SessionConfig,
    pub server: ServerSection,
    pub policy: CooldownPolicy,
}

impl CoachlineConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `COACHLINE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Token secret: `COACHLINE_TOKEN_SECRET` > `auth.token_secret` > error
    /// - Bind/port: `COACHLINE_BIND`/`COACHLINE_PORT` > `[server]` > `127.0.0.1:3000`
    /// - Cooldown: `COACHLINE_COOLDOWN_DAYS` > `policy.cooldown_days` > 7 days
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file_config = load_config().ok();

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::URL_ENV) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };
        let db_config = DbConfig::new(db_url);

        let session_config = if let Ok(secret_hex) = std::env::var(SessionConfig::SECRET_ENV) {
            SessionConfig::from_hex(&secret_hex)
                .context("COACHLINE_TOKEN_SECRET env var is not a valid hex secret")?
        } else if let Some(ref cfg) = file_config {
            SessionConfig::from_hex(&cfg.auth.token_secret)
                .context("invalid token_secret in config file")?
        } else {
            bail!(
                "token secret not found; set COACHLINE_TOKEN_SECRET or run `coachline init` to create a config file"
            );
        };

        let mut server = file_config
            .as_ref()
            .map(|cfg| cfg.server.clone())
            .unwrap_or_default();
        if let Ok(bind) = std::env::var(BIND_ENV) {
            server.bind = bind;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            server.port = port
                .parse()
                .with_context(|| format!("{PORT_ENV} is not a valid port: {port:?}"))?;
        }

        let cooldown_days = if let Ok(days) = std::env::var(COOLDOWN_DAYS_ENV) {
            days.parse::<i64>()
                .with_context(|| format!("{COOLDOWN_DAYS_ENV} is not a whole number: {days:?}"))?
        } else if let Some(ref cfg) = file_config {
            cfg.policy.cooldown_days
        } else {
            CooldownPolicy::DEFAULT_DAYS
        };
        let Some(policy) = CooldownPolicy::from_days(cooldown_days) else {
            bail!(
                "cooldown_days must be between 1 and {}, got {cooldown_days}",
                CooldownPolicy::MAX_DAYS
            );
        };

        Ok(Self {
            db_config,
            session_config,
            server,
            policy,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    const SECRET: &str = "aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55aa55";

    const ENV_VARS: [&str; 6] = [
        DbConfig::URL_ENV,
        SessionConfig::SECRET_ENV,
        COOLDOWN_DAYS_ENV,
        BIND_ENV,
        PORT_ENV,
        "XDG_CONFIG_HOME",
    ];

    /// Clears every variable `resolve` reads and points the config directory
    /// at an empty temp dir. The returned guard keeps both alive.
    fn isolated_env() -> (std::sync::MutexGuard<'static, ()>, tempfile::TempDir) {
        let lock = crate::test_util::lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        for var in ENV_VARS {
            unsafe { std::env::remove_var(var) };
        }
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        (lock, tmp)
    }

    fn sample_config() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/filedb".to_string(),
            },
            auth: AuthSection {
                token_secret: "bb".repeat(32),
            },
            server: ServerSection {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            policy: PolicySection { cooldown_days: 3 },
        }
    }

    #[test]
    fn generate_token_secret_is_64_hex_chars() {
        let secret = generate_token_secret();
        assert_eq!(secret.len(), 64);
        assert!(
            secret.chars().all(|c| c.is_ascii_hexdigit()),
            "expected all hex digits, got: {secret}"
        );
        assert_ne!(secret, generate_token_secret());
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let (_lock, tmp) = isolated_env();

        save_config(&sample_config()).unwrap();
        assert!(tmp.path().join("coachline/config.toml").exists());

        let loaded = load_config().unwrap();
        assert_eq!(loaded.database.url, "postgresql://filehost:5432/filedb");
        assert_eq!(loaded.auth.token_secret, "bb".repeat(32));
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.policy.cooldown_days, 3);
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_lock, _tmp) = isolated_env();
        save_config(&sample_config()).unwrap();

        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn optional_sections_default_when_absent() {
        let parsed: ConfigFile = toml::from_str(
            "[database]\nurl = \"postgresql://h/db\"\n\n[auth]\ntoken_secret = \"ab\"\n",
        )
        .unwrap();
        assert_eq!(parsed.server, ServerSection::default());
        assert_eq!(parsed.policy.cooldown_days, 7);
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let (_lock, _tmp) = isolated_env();
        save_config(&sample_config()).unwrap();
        unsafe { std::env::set_var(DbConfig::URL_ENV, "postgresql://env:5432/envdb") };

        let config = CoachlineConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        unsafe { std::env::remove_var(DbConfig::URL_ENV) };
    }

    #[test]
    fn resolve_env_overrides_config_file() {
        let (_lock, _tmp) = isolated_env();
        save_config(&sample_config()).unwrap();
        unsafe { std::env::set_var(DbConfig::URL_ENV, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(SessionConfig::SECRET_ENV, SECRET) };
        unsafe { std::env::set_var(COOLDOWN_DAYS_ENV, "14") };
        unsafe { std::env::set_var(PORT_ENV, "9000") };

        let config = CoachlineConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.policy.cooldown, Duration::days(14));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");

        for var in ENV_VARS {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn resolve_reads_config_file() {
        let (_lock, _tmp) = isolated_env();
        save_config(&sample_config()).unwrap();

        let config = CoachlineConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://filehost:5432/filedb");
        assert_eq!(config.policy.cooldown, Duration::days(3));
        assert_eq!(
            config.server,
            ServerSection {
                bind: "0.0.0.0".to_string(),
                port: 8080
            }
        );
    }

    #[test]
    fn resolve_defaults_when_only_secret_is_set() {
        let (_lock, _tmp) = isolated_env();
        unsafe { std::env::set_var(SessionConfig::SECRET_ENV, SECRET) };

        let config = CoachlineConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.policy, CooldownPolicy::default());
        assert_eq!(config.server, ServerSection::default());

        unsafe { std::env::remove_var(SessionConfig::SECRET_ENV) };
    }

    #[test]
    fn resolve_errors_when_no_token_secret() {
        let (_lock, _tmp) = isolated_env();

        let msg = CoachlineConfig::resolve(Some("postgresql://localhost:5432/coachline"))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("token secret not found"), "unexpected error: {msg}");
    }

    #[test]
    fn resolve_rejects_out_of_range_cooldown() {
        let (_lock, _tmp) = isolated_env();
        unsafe { std::env::set_var(SessionConfig::SECRET_ENV, SECRET) };
        unsafe { std::env::set_var(COOLDOWN_DAYS_ENV, "0") };

        let msg = CoachlineConfig::resolve(None).unwrap_err().to_string();
        assert!(msg.contains("cooldown_days must be between 1 and"), "unexpected error: {msg}");

        unsafe { std::env::set_var(COOLDOWN_DAYS_ENV, "100000000") };
        let msg = CoachlineConfig::resolve(None).unwrap_err().to_string();
        assert!(msg.contains("got 100000000"), "unexpected error: {msg}");

        unsafe { std::env::set_var(COOLDOWN_DAYS_ENV, "3650") };
        let config = CoachlineConfig::resolve(None).unwrap();
        assert_eq!(config.policy.cooldown, Duration::days(3650));

        unsafe { std::env::set_var(COOLDOWN_DAYS_ENV, "a week") };
        assert!(CoachlineConfig::resolve(None).is_err());

        unsafe { std::env::remove_var(SessionConfig::SECRET_ENV) };
        unsafe { std::env::remove_var(COOLDOWN_DAYS_ENV) };
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("coachline/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
