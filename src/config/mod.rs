use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::security::password::{Argon2Config, PasswordConfig};
use crate::security::session::SessionConfig;

pub const DEFAULT_CONFIG_FILE: &str = "ticketdesk.toml";
pub const ENV_PREFIX: &str = "TICKETDESK_";

/// `TICKETDESK_*` variables read by the command line rather than the config.
const CLI_ONLY_ENV_KEYS: &[&str] = &["config", "password"];

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub password: PasswordSection,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file (or `:memory:`).
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "ticketdesk.sqlite3".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSection {
    pub policy: PasswordConfig,
    pub argon2: Argon2Config,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=info".to_string(),
            ansi: true,
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file, then `TICKETDESK_*` variables
    /// (`__` separates nested keys, e.g. `TICKETDESK_SERVER__PORT`).
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::figment(file)
            .extract()
            .context("Failed to load configuration")
    }

    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(CLI_ONLY_ENV_KEYS).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::session::SessionBackendKind;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.url, "ticketdesk.sqlite3");
        assert_eq!(config.session.backend, SessionBackendKind::Memory);
        assert_eq!(config.password.policy.min_length, 8);
    }

    #[test]
    fn test_file_and_env_layers() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "desk.toml",
                r#"
                [server]
                port = 9000

                [database]
                url = "/tmp/desk.sqlite3"

                [session]
                backend = "database"
                "#,
            )?;
            jail.set_env("TICKETDESK_SERVER__HOST", "0.0.0.0");

            let config: AppConfig = AppConfig::figment(Path::new("desk.toml")).extract()?;
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.database.url, "/tmp/desk.sqlite3");
            assert_eq!(config.session.backend, SessionBackendKind::Database);
            assert_eq!(config.database.max_connections, 8);
            Ok(())
        });
    }

    #[test]
    fn test_cli_env_vars_are_not_config_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TICKETDESK_PASSWORD", "Tr1cky-Lemur-42");
            jail.set_env("TICKETDESK_CONFIG", "elsewhere.toml");
            jail.set_env("TICKETDESK_PASSWORD__POLICY__MIN_LENGTH", "12");

            let config: AppConfig = AppConfig::figment(Path::new(DEFAULT_CONFIG_FILE)).extract()?;
            assert_eq!(config.password.policy.min_length, 12);
            assert_eq!(config.server.port, 8000);
            Ok(())
        });
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8123,
        };
        let addr = server.socket_addr().expect("valid address");
        assert_eq!(addr.port(), 8123);
    }
}
