//! Connection settings loaded from a `.env` style key-value file.

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use crate::probe::ProbeError;

/// Conventional config file name when no override is given.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Resolved connection settings for one invocation. Built once from the
/// config source, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub resource_group: Option<String>,
    pub subscription_id: Option<String>,
}

impl ConnectionConfig {
    /// Load settings from `path`.
    ///
    /// An unreadable file and a missing key are distinct, user-actionable
    /// faults and get distinct messages; the missing key is named.
    pub fn from_env_file(path: &Path) -> Result<Self, ProbeError> {
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            ProbeError::ConfigMissing(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;

        let mut values: HashMap<String, String> = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                ProbeError::ConfigMissing(format!(
                    "malformed line in {}: {e}",
                    path.display()
                ))
            })?;
            values.insert(key, value);
        }

        let mut host = required(&values, "REDIS_HOST", path)?;

        // A portal copy-paste often lands as "host:port"; honour the
        // embedded port when REDIS_PORT itself is absent.
        let mut embedded_port = None;
        if let Some((name, digits)) = host.rsplit_once(':') {
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                embedded_port = Some(digits.to_string());
                host = name.to_string();
            }
        }

        let port_text = match values.get("REDIS_PORT").filter(|v| !v.trim().is_empty()) {
            Some(v) => v.clone(),
            None => embedded_port.ok_or_else(|| missing_key("REDIS_PORT", path))?,
        };
        let port: u16 = port_text.trim().parse().map_err(|_| {
            ProbeError::ConfigMissing(format!(
                "REDIS_PORT in {} is not a valid port number: {port_text:?}",
                path.display()
            ))
        })?;

        let config = ConnectionConfig {
            host,
            port,
            resource_group: optional(&values, "AZURE_RESOURCE_GROUP"),
            subscription_id: optional(&values, "AZURE_SUBSCRIPTION_ID"),
        };
        debug!(
            "Resolved connection config {}:{} from {}",
            config.host,
            config.port,
            path.display()
        );
        Ok(config)
    }
}

fn required(
    values: &HashMap<String, String>,
    key: &str,
    path: &Path,
) -> Result<String, ProbeError> {
    match values.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(missing_key(key, path)),
    }
}

fn optional(values: &HashMap<String, String>, key: &str) -> Option<String> {
    values
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing_key(key: &str, path: &Path) -> ProbeError {
    ProbeError::ConfigMissing(format!(
        "{key} is not set (or empty) in {}",
        path.display()
    ))
}
