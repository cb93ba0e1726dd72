use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration loaded from `~/.config/mdm/config.toml`.
///
/// Command-line flags override individual fields after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdmConfig {
    /// Maximum total concurrent connections across all transfers (0 = unlimited).
    pub max_total_connections: usize,
    /// Maximum concurrent connections per remote host (0 = unlimited).
    pub max_connections_per_host: usize,
    /// Bandwidth cap applied to new transfers, in bytes per second (0 = unlimited).
    #[serde(default)]
    pub default_speed_cap: u64,
    /// Step used by the increase/decrease bandwidth commands, in bytes per second.
    #[serde(default = "default_speed_step")]
    pub speed_step: u64,
    /// Display refresh interval while transfers are active.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Start every queued transfer right after startup.
    #[serde(default)]
    pub auto_start: bool,
    /// Quit once every transfer has finished.
    #[serde(default)]
    pub auto_exit: bool,
    /// Number of rows moved by page-up / page-down.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_speed_step() -> u64 {
    1024
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_page_size() -> usize {
    20
}

impl Default for MdmConfig {
    fn default() -> Self {
        Self {
            max_total_connections: 0,
            max_connections_per_host: 0,
            default_speed_cap: 0,
            speed_step: default_speed_step(),
            poll_interval_ms: default_poll_interval_ms(),
            auto_start: false,
            auto_exit: false,
            page_size: default_page_size(),
        }
    }
}

impl MdmConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = MdmConfig::default();
        assert_eq!(cfg.max_total_connections, 0);
        assert_eq!(cfg.max_connections_per_host, 0);
        assert_eq!(cfg.speed_step, 1024);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert!(!cfg.auto_start);
        assert!(!cfg.auto_exit);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = MdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: MdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_total_connections, cfg.max_total_connections);
        assert_eq!(parsed.speed_step, cfg.speed_step);
        assert_eq!(parsed.page_size, cfg.page_size);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            max_total_connections = 8
            max_connections_per_host = 2
            auto_exit = true
        "#;
        let cfg: MdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_total_connections, 8);
        assert_eq!(cfg.max_connections_per_host, 2);
        assert!(cfg.auto_exit);
        assert!(!cfg.auto_start);
        assert_eq!(cfg.default_speed_cap, 0);
        assert_eq!(cfg.speed_step, 1024);
        assert_eq!(cfg.poll_interval_ms, 100);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let toml = r#"
            max_total_connections = 0
            max_connections_per_host = 0
            poll_interval_ms = 0
        "#;
        let cfg: MdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }
}
