//! Config redaction: produce safe-to-share config snapshots by masking
//! secrets and the password part of store URLs.

use pulse_logging::redact_credentials;
use serde_json::Value;

/// Keys whose values are always masked.
static SECRET_KEYS: &[&str] = &["password", "secret", "token", "apiKey", "api_key"];

/// Redact a config JSON value for display.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) && !s.is_empty() => Value::String("***".into()),
        Value::String(s) => Value::String(redact_credentials(s)),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_store_url_password() {
        let v = json!({ "store": { "url": "redis://:hunter2@cache:6379/0" } });
        let redacted = redact(&v);
        let url = redacted["store"]["url"].as_str().unwrap();
        assert!(!url.contains("hunter2"));
        assert!(url.contains("cache:6379"));
    }

    #[test]
    fn masks_secret_keys() {
        let v = json!({ "store": { "password": "hunter2" } });
        assert_eq!(redact(&v)["store"]["password"], "***");
    }

    #[test]
    fn passthrough_non_sensitive() {
        let v = json!({ "logging": { "level": "debug" }, "presence": { "sweepBatchSize": 200 } });
        assert_eq!(redact(&v), v);
    }
}
