//! Load config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;

/// Daemon configuration. File: ~/.config/beamdrop/config.toml or
/// /etc/beamdrop/config.toml. Env overrides: BEAMDROP_LISTEN_HOST,
/// BEAMDROP_LISTEN_PORT, BEAMDROP_CONNECT, BEAMDROP_DOWNLOAD_DIR.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the peer transport listens on (default 0.0.0.0).
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    /// Port the peer transport listens on (default 45770).
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Deep-link peer to dial once the session has started (host:port).
    #[serde(default)]
    pub connect: Option<String>,
    /// Where received files are written. Defaults to ./beamdrop-downloads.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    45770
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            connect: None,
            download_dir: None,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("beamdrop-downloads"))
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("BEAMDROP_LISTEN_HOST") {
        if !s.is_empty() {
            c.listen_host = s;
        }
    }
    if let Ok(s) = std::env::var("BEAMDROP_LISTEN_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.listen_port = p;
        }
    }
    if let Ok(s) = std::env::var("BEAMDROP_CONNECT") {
        if !s.is_empty() {
            c.connect = Some(s);
        }
    }
    if let Ok(s) = std::env::var("BEAMDROP_DOWNLOAD_DIR") {
        if !s.is_empty() {
            c.download_dir = Some(PathBuf::from(s));
        }
    }
    c
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/beamdrop/config.toml"));
    }
    out.push(PathBuf::from("/etc/beamdrop/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            if let Ok(s) = std::fs::read_to_string(&p) {
                if let Ok(c) = toml::from_str::<Config>(&s) {
                    return Some(c);
                }
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.bind_addr(), "0.0.0.0:45770");
        assert!(c.connect.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let c: Config = toml::from_str("connect = \"192.168.1.20:45770\"").unwrap();
        assert_eq!(c.listen_port, 45770);
        assert_eq!(c.connect.as_deref(), Some("192.168.1.20:45770"));
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("proxy_port = 3128").is_err());
    }
}
