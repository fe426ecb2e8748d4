use serde::de::DeserializeOwned;

use crate::ipc::error::HandlerErr;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_bool(params: &serde_json::Value, key: &str, default: bool) -> Result<bool, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a boolean", key))),
    }
}

/// Deserializes `params[key]` (or all of `params` when `key` is empty).
pub fn parse_params<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<T, HandlerErr> {
    let raw = if key.is_empty() {
        params.clone()
    } else {
        params
            .get(key)
            .cloned()
            .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))?
    };
    serde_json::from_value(raw).map_err(|e| HandlerErr::new("bad_params", e.to_string()))
}
