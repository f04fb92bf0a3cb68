//! Connection settings merged from flags, environment and config file.
//!
//! Flags beat environment variables, which beat the config file at
//! `~/.config/foremanctl/config.toml`. The string-valued flags carry
//! their environment fallback in the clap definition; only
//! `FOREMAN_VALIDATE_CERTS` is read by hand because the flag side is
//! inverted (`--no-verify-ssl`).

use anyhow::{Context, Result, bail};
use apikit::{DEFAULT_TIMEOUT, SessionConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::ConnectionArgs;

/// Task wait deadline when neither `--timeout` nor the config file
/// give one, in seconds.
const DEFAULT_TASK_TIMEOUT: u64 = 60;

/// Get the config file path
fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("foremanctl").join("config.toml"))
}

#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub connection: ConnectionSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectionSection {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub validate_certs: Option<bool>,
    pub timeout: Option<u64>,
}

impl FileConfig {
    /// Load config.toml; an empty config when the file does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }
}

/// Fully resolved connection settings.
#[derive(Debug)]
pub struct Connection {
    pub session: SessionConfig,
    pub task_timeout: Duration,
}

/// Merge flags, environment and config file into one [`Connection`].
pub fn resolve(args: &ConnectionArgs, file: &FileConfig) -> Result<Connection> {
    let section = &file.connection;

    let Some(base_url) = args.server_url.clone().or_else(|| section.server_url.clone()) else {
        bail!("server URL is not set; use --server-url, FOREMAN_SERVER_URL or the config file");
    };
    let Some(username) = args.username.clone().or_else(|| section.username.clone()) else {
        bail!("username is not set; use --username, FOREMAN_USERNAME or the config file");
    };
    let Some(password) = args.password.clone().or_else(|| section.password.clone()) else {
        bail!("password is not set; use --password, FOREMAN_PASSWORD or the config file");
    };

    let verify_ssl = if args.no_verify_ssl {
        false
    } else if let Some(validate) = env_validate_certs() {
        validate
    } else {
        section.validate_certs.unwrap_or(true)
    };

    let task_timeout = args
        .timeout
        .or(section.timeout)
        .unwrap_or(DEFAULT_TASK_TIMEOUT);

    Ok(Connection {
        session: SessionConfig {
            base_url,
            username,
            password,
            verify_ssl,
            timeout: DEFAULT_TIMEOUT,
        },
        task_timeout: Duration::from_secs(task_timeout),
    })
}

/// FOREMAN_VALIDATE_CERTS, accepting the usual boolean spellings.
fn env_validate_certs() -> Option<bool> {
    let value = std::env::var("FOREMAN_VALIDATE_CERTS").ok()?;
    Some(parse_bool(&value))
}

fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "no" | "off" | "0"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConnectionArgs {
        ConnectionArgs {
            server_url: None,
            username: None,
            password: None,
            no_verify_ssl: false,
            timeout: None,
        }
    }

    fn full_section() -> ConnectionSection {
        ConnectionSection {
            server_url: Some("https://file.example.com".to_string()),
            username: Some("file-admin".to_string()),
            password: Some("file-secret".to_string()),
            validate_certs: None,
            timeout: None,
        }
    }

    #[test]
    fn test_load_from_missing_file_is_empty() {
        let config = FileConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert!(config.connection.server_url.is_none());
    }

    #[test]
    fn test_load_from_parses_connection_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            concat!(
                "[connection]\n",
                "server_url = \"https://foreman.example.com\"\n",
                "username = \"admin\"\n",
                "validate_certs = false\n",
                "timeout = 120\n",
            ),
        )
        .unwrap();

        let config = FileConfig::load_from(&path).unwrap();
        assert_eq!(
            config.connection.server_url.as_deref(),
            Some("https://foreman.example.com")
        );
        assert_eq!(config.connection.validate_certs, Some(false));
        assert_eq!(config.connection.timeout, Some(120));
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[connection\n").unwrap();
        assert!(FileConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_resolve_flags_beat_file() {
        let mut args = args();
        args.server_url = Some("https://flag.example.com".to_string());
        let file = FileConfig {
            connection: full_section(),
        };

        let connection = resolve(&args, &file).unwrap();
        assert_eq!(connection.session.base_url, "https://flag.example.com");
        assert_eq!(connection.session.username, "file-admin");
    }

    #[test]
    fn test_resolve_requires_server_url() {
        let err = resolve(&args(), &FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("server URL"));
    }

    #[test]
    fn test_resolve_no_verify_ssl_flag_wins() {
        let mut args = args();
        args.no_verify_ssl = true;
        let mut file = FileConfig {
            connection: full_section(),
        };
        file.connection.validate_certs = Some(true);

        let connection = resolve(&args, &file).unwrap();
        assert!(!connection.session.verify_ssl);
    }

    #[test]
    fn test_resolve_defaults() {
        let file = FileConfig {
            connection: full_section(),
        };
        let connection = resolve(&args(), &file).unwrap();
        assert!(connection.session.verify_ssl);
        assert_eq!(connection.task_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_resolve_task_timeout_from_file() {
        let mut file = FileConfig {
            connection: full_section(),
        };
        file.connection.timeout = Some(300);
        let connection = resolve(&args(), &file).unwrap();
        assert_eq!(connection.task_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert!(parse_bool("true"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("anything"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("No"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(" off "));
    }
}
