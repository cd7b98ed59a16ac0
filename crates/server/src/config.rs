use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub max_message_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:7878".into(),
            max_message_bytes: 64 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("APP__MAX_MESSAGE_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_message_bytes = parsed;
        }
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("max_message_bytes") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_message_bytes = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_localhost() {
        let settings = Settings::default();
        assert_eq!(settings.server_bind, "127.0.0.1:7878");
        assert_eq!(settings.max_message_bytes, 64 * 1024);
    }

    #[test]
    fn file_overrides_replace_defaults() {
        let mut settings = Settings::default();
        apply_file_overrides(
            &mut settings,
            "bind_addr = \"0.0.0.0:9000\"\nmax_message_bytes = \"4096\"\n",
        );
        assert_eq!(settings.server_bind, "0.0.0.0:9000");
        assert_eq!(settings.max_message_bytes, 4096);
    }

    #[test]
    fn unparseable_file_leaves_defaults_intact() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "not toml at all [");
        assert_eq!(settings.server_bind, Settings::default().server_bind);
    }

    #[test]
    fn non_numeric_max_message_bytes_is_ignored() {
        let mut settings = Settings::default();
        apply_file_overrides(&mut settings, "max_message_bytes = \"lots\"\n");
        assert_eq!(settings.max_message_bytes, Settings::default().max_message_bytes);
    }
}
