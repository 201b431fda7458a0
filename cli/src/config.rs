//! Connection settings for the `ttrss` CLI.
//!
//! Each field is resolved in order: command-line flag, environment
//! (`TTRSS_URL`, `TTRSS_USER`, `TTRSS_PASSWORD`), the TOML config file, and
//! finally an interactive prompt. A missing config file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const ENV_URL: &str = "TTRSS_URL";
pub const ENV_USER: &str = "TTRSS_USER";
pub const ENV_PASSWORD: &str = "TTRSS_PASSWORD";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// On-disk shape of `config.toml`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
    refresh_labels: bool,
}

/// Partially resolved settings. `password` never appears in `Debug` output.
#[derive(Default)]
pub struct Config {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub timeout: Option<Duration>,
    pub refresh_labels: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("refresh_labels", &self.refresh_labels)
            .finish()
    }
}

/// Fully resolved settings, ready to log in with.
#[derive(Debug)]
pub struct Credentials {
    pub url: String,
    pub user: String,
    pub password: SecretString,
    pub timeout: Duration,
    pub refresh_labels: bool,
}

/// `$XDG_CONFIG_HOME/ttrss/config.toml` or the platform equivalent.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ttrss").join("config.toml"))
}

impl Config {
    /// Read a TOML config file. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config file {}", path.display()));
            }
        };
        let file: FileConfig =
            toml::from_str(&raw).with_context(|| format!("invalid TOML in config file {}", path.display()))?;

        Ok(Self {
            url: file.url,
            user: file.user,
            password: file.password.map(SecretString::from),
            timeout: file.timeout_secs.map(Duration::from_secs),
            refresh_labels: file.refresh_labels,
        })
    }

    /// Overlay values from the environment. `lookup` is `std::env::var` in
    /// production.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.is_empty()) {
            self.url = Some(url);
        }
        if let Some(user) = lookup(ENV_USER).filter(|v| !v.is_empty()) {
            self.user = Some(user);
        }
        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            self.password = Some(SecretString::from(password));
        }
        self
    }

    /// Overlay values given on the command line.
    pub fn with_flags(mut self, url: Option<String>, user: Option<String>) -> Self {
        if url.is_some() {
            self.url = url;
        }
        if user.is_some() {
            self.user = user;
        }
        self
    }

    /// Fill any remaining gaps with `ask`, which receives the field name and
    /// whether the answer is secret.
    pub fn resolve(self, mut ask: impl FnMut(&str, bool) -> Result<String>) -> Result<Credentials> {
        let url = match self.url {
            Some(url) => url,
            None => ask("URL", false)?,
        };
        let user = match self.user {
            Some(user) => user,
            None => ask("User", false)?,
        };
        let password = match self.password {
            Some(password) => password,
            None => SecretString::from(ask("Password", true)?),
        };
        Ok(Credentials {
            url,
            user,
            password,
            timeout: self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            refresh_labels: self.refresh_labels,
        })
    }
}

/// Interactive prompt used for settings found nowhere else.
pub fn prompt(field: &str, secret: bool) -> Result<String> {
    let answer = if secret {
        dialoguer::Password::new().with_prompt(field).interact()
    } else {
        dialoguer::Input::<String>::new().with_prompt(field).interact_text()
    };
    answer.with_context(|| format!("failed to read {field}"))
}

impl Credentials {
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_prompt(field: &str, _secret: bool) -> Result<String> {
        panic!("unexpected prompt for {field}");
    }

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.url.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn file_values_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
url = "https://rss.example.org/tt-rss/api/"
user = "reader"
password = "hunter2"
timeout_secs = 5
refresh_labels = true
"#
        )
        .unwrap();

        let creds = Config::load(file.path()).unwrap().resolve(no_prompt).unwrap();
        assert_eq!(creds.url, "https://rss.example.org/tt-rss/api/");
        assert_eq!(creds.user, "reader");
        assert_eq!(creds.password(), "hunter2");
        assert_eq!(creds.timeout, Duration::from_secs(5));
        assert!(creds.refresh_labels);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url = [unterminated").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn env_overrides_file_and_flags_override_env() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_URL, "http://env/api/"),
            (ENV_USER, "env-user"),
            (ENV_PASSWORD, ""),
        ]);
        let config = Config {
            url: Some("http://file/api/".to_string()),
            user: Some("file-user".to_string()),
            password: Some(SecretString::from("file-pw".to_string())),
            ..Config::default()
        }
        .with_env(|key| env.get(key).map(|v| v.to_string()))
        .with_flags(None, Some("flag-user".to_string()));

        let creds = config.resolve(no_prompt).unwrap();
        assert_eq!(creds.url, "http://env/api/");
        assert_eq!(creds.user, "flag-user");
        assert_eq!(creds.password(), "file-pw", "empty env value must not override");
        assert_eq!(creds.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn missing_values_are_prompted() {
        let mut asked = Vec::new();
        let creds = Config::default()
            .resolve(|field, secret| {
                asked.push((field.to_string(), secret));
                Ok(format!("{}-answer", field.to_lowercase()))
            })
            .unwrap();
        assert_eq!(creds.url, "url-answer");
        assert_eq!(creds.password(), "password-answer");
        assert_eq!(
            asked,
            vec![
                ("URL".to_string(), false),
                ("User".to_string(), false),
                ("Password".to_string(), true)
            ]
        );
    }

    #[test]
    fn debug_redacts_password() {
        let config = Config {
            password: Some(SecretString::from("hunter2".to_string())),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
