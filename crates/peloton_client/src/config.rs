use crate::PelotonError;
use chrono_tz::Tz;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.onepeloton.com";

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub credentials_path: PathBuf,
    pub page_size: u32,
    pub timeout: Duration,
    pub performance_every_n: u32,
    pub concurrency: usize,
    pub timezone: Tz,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            credentials_path: PathBuf::from("config.json"),
            page_size: 100,
            timeout: Duration::from_secs(30),
            performance_every_n: 10_000,
            concurrency: 1,
            timezone: chrono_tz::US::Eastern,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, PelotonError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, PelotonError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let base_url = get("PELOTON_BASE_URL").unwrap_or(defaults.base_url);
        let credentials_path = get("PELOTON_CREDENTIALS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.credentials_path);
        let page_size = parse_positive(&mut get, "PELOTON_PAGE_SIZE", defaults.page_size)?;
        let timeout = get("PELOTON_TIMEOUT_SECS")
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    PelotonError::Config(format!("PELOTON_TIMEOUT_SECS is not a number: {v}"))
                })
            })
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let performance_every_n = parse_positive(
            &mut get,
            "PELOTON_PERFORMANCE_EVERY_N",
            defaults.performance_every_n,
        )?;
        let concurrency =
            parse_positive(&mut get, "PELOTON_CONCURRENCY", defaults.concurrency as u32)? as usize;
        let timezone = match get("PELOTON_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| PelotonError::Config(format!("unknown time zone: {name}")))?,
            None => defaults.timezone,
        };
        Ok(Self {
            base_url,
            credentials_path,
            page_size,
            timeout,
            performance_every_n,
            concurrency,
            timezone,
        })
    }
}

fn parse_positive<F>(get: &mut F, key: &str, default: u32) -> Result<u32, PelotonError>
where
    F: FnMut(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(PelotonError::Config(format!(
                "{key} must be a positive integer, got {v:?}"
            ))),
        },
    }
}

/// Login credentials, read from a JSON file of the form
/// `{"username": "...", "password": "..."}`.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PelotonError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PelotonError::Config(format!("reading credentials {}: {e}", path.display()))
        })?;
        let file: CredentialsFile = serde_json::from_str(&raw).map_err(|e| {
            PelotonError::Config(format!("parsing credentials {}: {e}", path.display()))
        })?;
        Ok(Self::new(file.username, SecretString::new(file.password.into())))
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    username: String,
    password: String,
}
