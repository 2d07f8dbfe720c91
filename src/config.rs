use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TESLAFI_URL: &str = "https://www.teslafi.com/feed.php";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub teslafi: TeslaFiConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    pub database: DbConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeslaFiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Feed token. Without one every fetch fails and is reported as such.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TeslaFiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_TESLAFI_URL.into()
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// Start the poll loop together with the process.
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// Run one cycle immediately when the loop starts, before the first boundary.
    #[serde(default)]
    pub run_on_start: bool,
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            autostart: true,
            run_on_start: false,
            store_timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_interval_minutes() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_store_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Environment overrides are applied last.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)?;
        let expanded = expand_env_placeholders(&raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build the configuration from environment variables alone.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        use anyhow::Context;

        let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let mut cfg = Self {
            teslafi: TeslaFiConfig::default(),
            ingestion: IngestionConfig::default(),
            database: DbConfig {
                url,
                max_connections: default_max_connections(),
                acquire_timeout_secs: default_acquire_timeout_secs(),
            },
            api: ApiConfig::default(),
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<(), anyhow::Error> {
        use anyhow::Context;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(token) = std::env::var("TESLAFI_API_TOKEN") {
            if !token.is_empty() {
                self.teslafi.token = Some(token);
            }
        }
        if let Ok(base_url) = std::env::var("TESLAFI_BASE_URL") {
            self.teslafi.base_url = base_url;
        }
        if let Ok(minutes) = std::env::var("INGESTION_INTERVAL_MINUTES") {
            self.ingestion.interval_minutes = minutes
                .trim()
                .parse()
                .with_context(|| format!("invalid INGESTION_INTERVAL_MINUTES: {}", minutes))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(
            self.ingestion.interval_minutes > 0,
            "ingestion.interval_minutes must be greater than zero"
        );
        anyhow::ensure!(
            self.teslafi.timeout_secs > 0,
            "teslafi.timeout_secs must be greater than zero"
        );
        anyhow::ensure!(
            self.ingestion.store_timeout_secs > 0,
            "ingestion.store_timeout_secs must be greater than zero"
        );
        anyhow::ensure!(
            !self.database.url.is_empty(),
            "database.url must not be empty"
        );
        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" is an escaped literal "$".
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until `end`, consuming it.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
