use std::fs;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub poll_secs: u64,
    pub bell_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            poll_secs: 10,
            bell_enabled: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    poll_secs: Option<u64>,
    bell_enabled: Option<bool>,
}

/// Defaults, overridden by the config file, overridden by environment
/// variables. CLI flags are applied on top by the caller.
pub fn load_settings(path: &str) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("KDS_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("KDS_POLL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_secs = parsed;
        }
    }
    if let Ok(v) = std::env::var("KDS_BELL") {
        settings.bell_enabled = v != "0" && !v.eq_ignore_ascii_case("false");
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<FileSettings>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.poll_secs {
        settings.poll_secs = v;
    }
    if let Some(v) = file_cfg.bell_enabled {
        settings.bell_enabled = v;
    }
}
