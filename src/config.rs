//! Configuration management for pioneer
//!
//! Settings are loaded from a TOML file and handed explicitly to the
//! components that need them. Calling [`PioneerConfig::load`] again picks up
//! edits; nothing caches the values globally.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{PioneerError, PioneerResult};

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pioneer/pioneer.toml";

/// Main pioneer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PioneerConfig {
    /// Managed file locations
    #[serde(default)]
    pub paths: ConfigPaths,
    /// DNS/DHCP forwarder control
    #[serde(default)]
    pub forwarder: ForwarderSettings,
    /// Setup hotspot profile
    #[serde(default)]
    pub hotspot: HotspotSettings,
    /// Dashboard status probes
    #[serde(default)]
    pub status: StatusSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPaths {
    /// dnsmasq file holding `dhcp-host=` reservations
    #[serde(default = "default_dhcp_hosts_file")]
    pub dhcp_hosts_file: PathBuf,
    /// dnsmasq file holding `host-record=` overrides
    #[serde(default = "default_dns_hosts_file")]
    pub dns_hosts_file: PathBuf,
    /// Job records and install marker
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderSettings {
    /// systemd unit of the forwarder
    #[serde(default = "default_service")]
    pub service: String,
    /// Syntax check of the on-disk configuration
    #[serde(default = "default_check_command")]
    pub check_command: Vec<String>,
    /// Graceful reload (SIGHUP equivalent)
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
    /// Full restart used when the reload fails
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,
    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,
    #[serde(default = "default_reload_timeout")]
    pub reload_timeout_secs: u64,
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotSettings {
    /// NetworkManager connection profile name
    #[serde(default = "default_profile")]
    pub profile: String,
    /// nmcli binary
    #[serde(default = "default_nmcli")]
    pub nmcli: String,
    /// Interface used when no wifi device is detected
    #[serde(default = "default_fallback_interface")]
    pub fallback_interface: String,
    /// SSID for a freshly created profile
    #[serde(default = "default_ssid")]
    pub ssid: String,
    /// Passphrase for a freshly created profile, generated when unset
    #[serde(default)]
    pub psk: Option<String>,
    /// 802-11-wireless.band ("bg" or "a")
    #[serde(default = "default_band")]
    pub band: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// `connection up` waits for the AP to come up
    #[serde(default = "default_activation_timeout")]
    pub activation_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSettings {
    /// Address pinged to decide whether the uplink works
    #[serde(default = "default_connectivity_probe")]
    pub connectivity_probe: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_dhcp_hosts_file() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.d/pioneer-dhcp.conf")
}

fn default_dns_hosts_file() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.d/pioneer-dns.conf")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/pioneer")
}

fn default_service() -> String {
    "dnsmasq".to_string()
}

fn default_check_command() -> Vec<String> {
    vec!["dnsmasq".to_string(), "--test".to_string()]
}

fn default_reload_command() -> Vec<String> {
    vec!["systemctl".to_string(), "reload".to_string(), default_service()]
}

fn default_restart_command() -> Vec<String> {
    vec!["systemctl".to_string(), "restart".to_string(), default_service()]
}

fn default_check_timeout() -> u64 {
    5
}

fn default_reload_timeout() -> u64 {
    5
}

fn default_restart_timeout() -> u64 {
    10
}

fn default_profile() -> String {
    "PIONEER_SETUP".to_string()
}

fn default_nmcli() -> String {
    "nmcli".to_string()
}

fn default_fallback_interface() -> String {
    "wlan0".to_string()
}

fn default_ssid() -> String {
    "Pioneer-Setup".to_string()
}

fn default_band() -> String {
    "bg".to_string()
}

fn default_command_timeout() -> u64 {
    10
}

fn default_activation_timeout() -> u64 {
    30
}

fn default_connectivity_probe() -> String {
    "8.8.8.8".to_string()
}

fn default_probe_timeout() -> u64 {
    3
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            dhcp_hosts_file: default_dhcp_hosts_file(),
            dns_hosts_file: default_dns_hosts_file(),
            state_dir: default_state_dir(),
        }
    }
}

impl Default for ForwarderSettings {
    fn default() -> Self {
        Self {
            service: default_service(),
            check_command: default_check_command(),
            reload_command: default_reload_command(),
            restart_command: default_restart_command(),
            check_timeout_secs: default_check_timeout(),
            reload_timeout_secs: default_reload_timeout(),
            restart_timeout_secs: default_restart_timeout(),
        }
    }
}

impl ForwarderSettings {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }
}

impl Default for HotspotSettings {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            nmcli: default_nmcli(),
            fallback_interface: default_fallback_interface(),
            ssid: default_ssid(),
            psk: None,
            band: default_band(),
            command_timeout_secs: default_command_timeout(),
            activation_timeout_secs: default_activation_timeout(),
        }
    }
}

impl HotspotSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn activation_timeout(&self) -> Duration {
        Duration::from_secs(self.activation_timeout_secs)
    }
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            connectivity_probe: default_connectivity_probe(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl PioneerConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> PioneerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PioneerError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| PioneerError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> PioneerResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PioneerResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PioneerError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| PioneerError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Reject settings that would make every forwarder or hotspot call fail
    pub fn validate(&self) -> PioneerResult<()> {
        for (name, command) in [
            ("check_command", &self.forwarder.check_command),
            ("reload_command", &self.forwarder.reload_command),
            ("restart_command", &self.forwarder.restart_command),
        ] {
            if command.is_empty() {
                return Err(PioneerError::ConfigError(format!(
                    "forwarder.{} cannot be empty",
                    name
                )));
            }
        }

        if self.hotspot.profile.trim().is_empty() {
            return Err(PioneerError::ConfigError(
                "hotspot.profile cannot be empty".to_string(),
            ));
        }

        if let Some(ref psk) = self.hotspot.psk {
            crate::validation::validate_wifi_password(psk)
                .map_err(|e| PioneerError::ConfigError(format!("hotspot.psk: {}", e)))?;
        }

        Ok(())
    }

    /// Ensure all directories exist
    pub fn ensure_directories(&self) -> PioneerResult<()> {
        let mut dirs = vec![self.paths.state_dir.clone()];
        for file in [&self.paths.dhcp_hosts_file, &self.paths.dns_hosts_file] {
            if let Some(parent) = file.parent() {
                dirs.push(parent.to_path_buf());
            }
        }

        for dir in dirs {
            std::fs::create_dir_all(&dir)
                .map_err(|e| PioneerError::ConfigError(format!("Failed to create directory {:?}: {}", dir, e)))?;
        }
        Ok(())
    }
}
