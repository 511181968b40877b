use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_SCHEMA_VERSION: i64 = 1;

/// Sanitized settings consumed at context construction.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub api_base_url: String,
    pub cache_ttl: Duration,
    /// Zero disables the background refresh timer.
    pub auto_refresh: Duration,
    pub request_timeout: Duration,
    pub inline_decorations: bool,
    pub max_tree_files: usize,
}

impl Default for EffectiveSettings {
    fn default() -> EffectiveSettings {
        effective_from_value(&default_settings())
    }
}

pub fn load_effective_settings(workspace_path: &str) -> Result<EffectiveSettings, String> {
    let settings = load_settings_from_disk(workspace_path)?;
    Ok(effective_from_value(&settings))
}

pub fn load_settings_from_disk(workspace_path: &str) -> Result<Value, String> {
    let path = settings_path(workspace_path);
    ensure_debtview_dir(workspace_path)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };

    let sanitized = sanitize_settings(original.clone());
    if sanitized != original || !path.exists() {
        write_settings_file(&path, &sanitized)?;
    }

    Ok(sanitized)
}

pub fn save_settings_to_disk(workspace_path: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(workspace_path);
    ensure_debtview_dir(workspace_path)?;

    let mut merged = load_settings_from_disk(workspace_path).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let sanitized = sanitize_settings(merged);
    write_settings_file(&path, &sanitized)?;
    Ok(sanitized)
}

fn effective_from_value(settings: &Value) -> EffectiveSettings {
    let get_u64 = |key: &str, default: u64| settings.get(key).and_then(Value::as_u64).unwrap_or(default);

    EffectiveSettings {
        api_base_url: settings
            .get("apiBaseUrl")
            .and_then(Value::as_str)
            .unwrap_or("http://127.0.0.1:7171")
            .trim_end_matches('/')
            .to_string(),
        cache_ttl: Duration::from_secs(get_u64("cacheTtlSeconds", 300)),
        auto_refresh: Duration::from_secs(get_u64("autoRefreshSeconds", 120)),
        request_timeout: Duration::from_secs(get_u64("requestTimeoutSeconds", 30)),
        inline_decorations: settings
            .get("inlineDecorations")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        max_tree_files: get_u64("maxTreeFiles", 200) as usize,
    }
}

fn settings_path(workspace_path: &str) -> PathBuf {
    Path::new(workspace_path).join(".debtview").join("settings.json")
}

fn ensure_debtview_dir(workspace_path: &str) -> Result<(), String> {
    let dir = Path::new(workspace_path).join(".debtview");
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create .debtview directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "apiBaseUrl": "http://127.0.0.1:7171",
        "cacheTtlSeconds": 300,
        "autoRefreshSeconds": 120,
        "requestTimeoutSeconds": 30,
        "inlineDecorations": true,
        "maxTreeFiles": 200
    })
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

fn sanitize_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    deep_merge_defaults(&mut out, &default_settings());

    let Some(obj) = out.as_object_mut() else {
        return out;
    };

    clamp_u64(obj, "cacheTtlSeconds", 10, 3600, 300);
    clamp_u64(obj, "autoRefreshSeconds", 0, 3600, 120);
    clamp_u64(obj, "requestTimeoutSeconds", 5, 120, 30);
    clamp_u64(obj, "maxTreeFiles", 10, 2000, 200);
    ensure_bool(obj, "inlineDecorations", true);

    let base_url_ok = obj
        .get("apiBaseUrl")
        .and_then(Value::as_str)
        .map(|url| url.starts_with("http://") || url.starts_with("https://"))
        .unwrap_or(false);
    if !base_url_ok {
        obj.insert("apiBaseUrl".to_string(), json!("http://127.0.0.1:7171"));
    }

    obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));

    out
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object())
    else {
        return;
    };

    for (key, default_value) in default_obj {
        target_obj
            .entry(key.clone())
            .or_insert_with(|| default_value.clone());
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}
