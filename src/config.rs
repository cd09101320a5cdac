//! Runtime configuration, read once from the environment at startup.

use std::time::Duration;

use tracing::warn;

use crate::registry::client::DEFAULT_REGISTRY_TIMEOUT;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Webhook settings.
///
/// `delete_fail_closed` selects the delete-path error policy: by default
/// release failures are logged and the deletion is still allowed
/// (fail-open), since blocking namespace deletion on registry outages
/// risks orphaning namespaces. Set `DELETE_FAIL_CLOSED=true` to deny
/// deletions instead.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Pool label key used for placement (`PLACEMENT_LABEL`).
    pub placement_label: String,
    /// Required placement value (`PLACEMENT_VALUE`).
    pub placement_value: String,
    /// TLS listen port (`WEBHOOK_PORT`).
    pub webhook_port: u16,
    /// PEM certificate path (`WEBHOOK_CERT_PATH`).
    pub cert_path: String,
    /// PEM private key path (`WEBHOOK_KEY_PATH`).
    pub key_path: String,
    /// Per-call registry timeout (`REGISTRY_TIMEOUT_SECS`).
    pub registry_timeout: Duration,
    /// Deny namespace deletion when release fails (`DELETE_FAIL_CLOSED`).
    pub delete_fail_closed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            placement_label: "location".to_string(),
            placement_value: "zone-lhr".to_string(),
            webhook_port: WEBHOOK_PORT,
            cert_path: WEBHOOK_CERT_PATH.to_string(),
            key_path: WEBHOOK_KEY_PATH.to_string(),
            registry_timeout: DEFAULT_REGISTRY_TIMEOUT,
            delete_fail_closed: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            placement_label: env_or("PLACEMENT_LABEL", &defaults.placement_label),
            placement_value: env_or("PLACEMENT_VALUE", &defaults.placement_value),
            webhook_port: parse_or("WEBHOOK_PORT", defaults.webhook_port),
            cert_path: env_or("WEBHOOK_CERT_PATH", &defaults.cert_path),
            key_path: env_or("WEBHOOK_KEY_PATH", &defaults.key_path),
            registry_timeout: Duration::from_secs(parse_or(
                "REGISTRY_TIMEOUT_SECS",
                defaults.registry_timeout.as_secs(),
            )),
            delete_fail_closed: bool_env("DELETE_FAIL_CLOSED"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = key, value = %raw, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn bool_env(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("True")
    )
}
