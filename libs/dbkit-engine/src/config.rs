use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::EngineError;

/// Slow-query threshold used when none is configured.
pub const DEFAULT_LOG_SLOW: Duration = Duration::from_millis(1000);

/// Root configuration, parsed from TOML.
///
/// ```toml
/// [databases.main]
/// type = "sqlite"
/// host = "/var/lib/app/main.db"
/// readonly_hosts = ["/var/lib/app/replica.db"]
/// max_opens = 4
/// log_slow = "500ms"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbsConfig {
    #[serde(default)]
    pub databases: HashMap<String, DbConfig>,
}

impl DbsConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let mut config: DbsConfig =
            toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        for db in config.databases.values_mut() {
            db.split_hosts();
        }
        Ok(config)
    }
}

/// One database: a primary host plus optional read-only replicas.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DbConfig {
    /// Driver name. Only `sqlite` (and `sqlite3`) is built in.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Primary host. For SQLite, a file path or `:memory:`.
    /// A comma-separated list makes the rest read-only replicas.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub readonly_hosts: Vec<String>,

    /// Connections per host. `0` picks the driver default.
    #[serde(default)]
    pub max_opens: usize,

    /// Calls at least this slow are logged. `0` means the default of one second.
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub log_slow: Duration,

    /// Identifier quote character. Defaults to a backtick.
    #[serde(default)]
    pub quote: Option<char>,
}

fn default_kind() -> String {
    "sqlite".to_string()
}

fn default_host() -> String {
    ":memory:".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            host: default_host(),
            readonly_hosts: Vec::new(),
            max_opens: 0,
            log_slow: Duration::ZERO,
            quote: None,
        }
    }
}

impl DbConfig {
    /// Parse `sqlite://<primary>[,<replica>...][?logSlow=500ms&maxOpens=2&quote=%22]`.
    ///
    /// `sqlite:///abs/path.db` addresses an absolute path. Credentials before
    /// an `@` are accepted and ignored.
    pub fn from_url(url: &str) -> Result<Self, EngineError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| EngineError::Config(format!("not a database url: {url}")))?;
        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
        let location = location.rsplit_once('@').map_or(location, |(_, host)| host);

        let mut config = DbConfig {
            kind: scheme.to_string(),
            host: location.to_string(),
            ..DbConfig::default()
        };
        if config.host.is_empty() {
            config.host = default_host();
        }

        for (key, value) in parse_query_string(query) {
            match key.as_str() {
                "logSlow" => {
                    config.log_slow = parse_duration(&value).map_err(EngineError::Config)?;
                }
                "maxOpens" => {
                    config.max_opens = value
                        .parse()
                        .map_err(|e| EngineError::Config(format!("maxOpens '{value}': {e}")))?;
                }
                "quote" => {
                    let mut chars = value.chars();
                    config.quote = match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => {
                            return Err(EngineError::Config(format!(
                                "quote must be one character, got '{value}'"
                            )));
                        }
                    };
                }
                other => tracing::debug!(key = %other, "ignoring unknown database url option"),
            }
        }
        config.split_hosts();
        Ok(config)
    }

    /// Move comma-separated hosts after the first into `readonly_hosts`.
    fn split_hosts(&mut self) {
        if !self.host.contains(',') {
            return;
        }
        let mut hosts = self.host.split(',').map(str::trim).filter(|h| !h.is_empty());
        let primary = hosts.next().unwrap_or_default().to_string();
        let replicas: Vec<String> = hosts.map(str::to_string).collect();
        self.host = primary;
        self.readonly_hosts = replicas;
    }

    pub fn is_sqlite(&self) -> bool {
        self.kind.starts_with("sqlite")
    }

    /// Effective slow-query threshold.
    pub fn slow_threshold(&self) -> Duration {
        if self.log_slow.is_zero() {
            DEFAULT_LOG_SLOW
        } else {
            self.log_slow
        }
    }

    /// Connection string for logs.
    pub fn dsn(&self) -> String {
        let mut hosts = vec![self.host.as_str()];
        hosts.extend(self.readonly_hosts.iter().map(String::as_str));
        format!(
            "{}://{}?logSlow={}ms",
            self.kind,
            hosts.join(","),
            self.slow_threshold().as_millis()
        )
    }
}

/// Parse query string into key-value pairs.
fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((
                urlencoding::decode(key).unwrap_or_default().to_string(),
                urlencoding::decode(value).unwrap_or_default().to_string(),
            ))
        })
        .collect()
}

/// `"500ms"`, `"2s"`, `"1m"`, or bare milliseconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Duration::ZERO);
    }
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{text}'"))?;
    let millis = match unit.trim() {
        "" | "ms" => number,
        "s" => number * 1000.0,
        "m" => number * 60_000.0,
        "h" => number * 3_600_000.0,
        other => return Err(format!("unknown duration unit '{other}' in '{text}'")),
    };
    Ok(Duration::from_micros((millis * 1000.0) as u64))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationSetting {
    Millis(u64),
    Text(String),
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    match DurationSetting::deserialize(deserializer)? {
        DurationSetting::Millis(ms) => Ok(Duration::from_millis(ms)),
        DurationSetting::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
