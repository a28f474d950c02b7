use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadroute_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let field = |key: &'static str, env_key: &'static str, value: String| Field {
        key,
        env_key,
        value,
    };

    vec![
        field("database.url", "LEADROUTE_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "LEADROUTE_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "LEADROUTE_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "server.bind_address",
            "LEADROUTE_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field("server.port", "LEADROUTE_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.health_check_port",
            "LEADROUTE_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        field(
            "server.graceful_shutdown_secs",
            "LEADROUTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "routing.lookup_timeout_ms",
            "LEADROUTE_ROUTING_LOOKUP_TIMEOUT_MS",
            config.routing.lookup_timeout_ms.to_string(),
        ),
        field(
            "lead_lookup.enabled",
            "LEADROUTE_LEAD_LOOKUP_ENABLED",
            config.lead_lookup.enabled.to_string(),
        ),
        field(
            "lead_lookup.endpoint_url",
            "LEADROUTE_LEAD_LOOKUP_ENDPOINT_URL",
            config.lead_lookup.endpoint_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "lead_lookup.api_token",
            "LEADROUTE_LEAD_LOOKUP_API_TOKEN",
            config
                .lead_lookup
                .api_token
                .as_ref()
                .map(|token| redact_token(token.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("logging.level", "LEADROUTE_LOGGING_LEVEL", config.logging.level.clone()),
        field(
            "logging.format",
            "LEADROUTE_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadroute.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadroute.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long tokens so operators can tell them apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }

    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
