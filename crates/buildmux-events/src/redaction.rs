//! Global secret redaction for buildmux logging.
//!
//! Mirrors the approach used by the rest of the ambient stack: secrets are
//! registered at runtime (e.g. global property values that look sensitive,
//! task-host environment values) and scrubbed from any text before it
//! reaches a log sink or a dump file.

use std::collections::HashSet;
use std::sync::{LazyLock, RwLock};

/// Minimum secret length to redact (shorter secrets cause too many false positives).
pub const MIN_SECRET_LENGTH: usize = 4;

/// Placeholder substituted for redacted secrets.
pub const REDACTED_PLACEHOLDER: &str = "*_*";

static SECRET_REGISTRY: LazyLock<RwLock<HashSet<String>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// Register a secret value for redaction in all future log output.
pub fn register_secret(secret: impl Into<String>) {
    let secret = secret.into();
    if secret.len() >= MIN_SECRET_LENGTH
        && let Ok(mut registry) = SECRET_REGISTRY.write()
    {
        registry.insert(secret);
    }
}

/// Register multiple secrets at once.
pub fn register_secrets(secrets: impl IntoIterator<Item = impl Into<String>>) {
    if let Ok(mut registry) = SECRET_REGISTRY.write() {
        for secret in secrets {
            let s = secret.into();
            if s.len() >= MIN_SECRET_LENGTH {
                registry.insert(s);
            }
        }
    }
}

/// Redact all registered secrets from a string.
///
/// Longer secrets are matched first so one secret that is a substring of
/// another doesn't leave a partial value visible.
#[must_use]
pub fn redact(input: &str) -> String {
    let secrets = match SECRET_REGISTRY.read() {
        Ok(registry) => registry.clone(),
        Err(_) => return input.to_string(),
    };

    if secrets.is_empty() {
        return input.to_string();
    }

    let mut ordered: Vec<&String> = secrets.iter().collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut output = input.to_string();
    for secret in ordered {
        if output.contains(secret.as_str()) {
            output = output.replace(secret.as_str(), REDACTED_PLACEHOLDER);
        }
    }
    output
}
