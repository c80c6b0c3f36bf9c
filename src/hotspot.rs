//! Setup hotspot control through NetworkManager
//!
//! The access point is a NetworkManager connection profile (`PIONEER_SETUP`
//! by default) driven with nmcli. The profile is created on first use, bound
//! to the first wifi device, in AP mode with shared IPv4 and WPA-PSK.

use crate::command::{CommandRunner, Invocation};
use crate::config::HotspotSettings;
use crate::error::{PioneerError, PioneerResult};
use crate::validation;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Profile state as seen by NetworkManager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotState {
    Absent,
    Inactive,
    Active,
}

/// What callers are told; a missing profile is simply not active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotStatus {
    Active,
    Inactive,
}

impl From<HotspotState> for HotspotStatus {
    fn from(state: HotspotState) -> Self {
        match state {
            HotspotState::Active => HotspotStatus::Active,
            HotspotState::Inactive | HotspotState::Absent => HotspotStatus::Inactive,
        }
    }
}

impl fmt::Display for HotspotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotspotStatus::Active => write!(f, "active"),
            HotspotStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Observed attributes of the profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotspotProfile {
    pub name: String,
    pub state: HotspotState,
    pub ssid: Option<String>,
    pub psk: Option<String>,
    pub interface: Option<String>,
}

/// Split one line of `nmcli -t` output on unescaped colons
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn generate_psk() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

pub struct HotspotController {
    runner: Arc<dyn CommandRunner>,
    settings: HotspotSettings,
}

impl HotspotController {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: HotspotSettings) -> Self {
        Self { runner, settings }
    }

    pub fn profile_name(&self) -> &str {
        &self.settings.profile
    }

    /// Active or Inactive; a missing profile reports Inactive
    pub async fn status(&self) -> PioneerResult<HotspotStatus> {
        Ok(self.state().await?.into())
    }

    /// Absent, Inactive or Active, straight from `nmcli connection show`
    pub async fn state(&self) -> PioneerResult<HotspotState> {
        let output = self
            .nmcli(&["-t", "-f", "NAME,ACTIVE", "connection", "show"], self.settings.command_timeout())
            .await?;

        for line in output.lines() {
            let fields = split_terse(line);
            if fields.first().map(String::as_str) == Some(self.settings.profile.as_str()) {
                let active = fields.get(1).map(|a| a == "yes").unwrap_or(false);
                return Ok(if active { HotspotState::Active } else { HotspotState::Inactive });
            }
        }

        Ok(HotspotState::Absent)
    }

    /// Create the profile if it does not exist yet
    ///
    /// Returns the state after the call; a freshly created profile is
    /// Inactive.
    pub async fn ensure_exists(&self) -> PioneerResult<HotspotState> {
        let state = self.state().await?;
        if state != HotspotState::Absent {
            return Ok(state);
        }

        let interface = self.detect_wifi_interface().await;
        validation::validate_interface_name(&interface)?;
        validation::validate_ssid(&self.settings.ssid)?;

        let psk = match self.settings.psk {
            Some(ref psk) => psk.clone(),
            None => {
                info!("No hotspot passphrase configured, generating one");
                generate_psk()
            }
        };
        validation::validate_wifi_password(&psk)?;

        let args = [
            "connection", "add",
            "type", "wifi",
            "ifname", interface.as_str(),
            "con-name", self.settings.profile.as_str(),
            "autoconnect", "no",
            "ssid", self.settings.ssid.as_str(),
            "802-11-wireless.mode", "ap",
            "802-11-wireless.band", self.settings.band.as_str(),
            "ipv4.method", "shared",
            "wifi-sec.key-mgmt", "wpa-psk",
            "wifi-sec.psk", psk.as_str(),
        ];

        self.nmcli(&args, self.settings.command_timeout())
            .await
            .map_err(|e| self.provision_error("create", e))?;

        info!(
            "Created hotspot profile {} on {} (ssid {})",
            self.settings.profile, interface, self.settings.ssid
        );
        Ok(HotspotState::Inactive)
    }

    /// Flip the profile up or down and return the expected new status
    ///
    /// nmcli returns before the radio settles, so the result is optimistic;
    /// call [`status`](Self::status) to confirm.
    pub async fn toggle(&self) -> PioneerResult<HotspotStatus> {
        let state = self.ensure_exists().await?;

        match state {
            HotspotState::Active => {
                self.down().await?;
                info!("Hotspot {} brought down", self.settings.profile);
                Ok(HotspotStatus::Inactive)
            }
            HotspotState::Inactive | HotspotState::Absent => {
                self.up().await?;
                info!("Hotspot {} brought up", self.settings.profile);
                Ok(HotspotStatus::Active)
            }
        }
    }

    /// Change SSID and passphrase, then cycle the profile to apply them
    pub async fn update(&self, ssid: &str, psk: &str) -> PioneerResult<HotspotStatus> {
        validation::validate_ssid(ssid)?;
        validation::validate_wifi_password(psk)?;

        self.ensure_exists().await?;

        let args = [
            "connection", "modify",
            self.settings.profile.as_str(),
            "802-11-wireless.ssid", ssid,
            "wifi-sec.key-mgmt", "wpa-psk",
            "wifi-sec.psk", psk,
        ];
        self.nmcli(&args, self.settings.command_timeout())
            .await
            .map_err(|e| self.provision_error("modify", e))?;

        // Already down is fine
        if let Err(e) = self.down().await {
            debug!("Ignoring hotspot down failure before re-activation: {}", e);
        }

        self.up().await?;
        info!("Hotspot {} updated (ssid {})", self.settings.profile, ssid);
        Ok(HotspotStatus::Active)
    }

    /// SSID, passphrase and interface of the profile
    pub async fn profile(&self) -> PioneerResult<HotspotProfile> {
        let state = self.state().await?;
        let mut profile = HotspotProfile {
            name: self.settings.profile.clone(),
            state,
            ssid: None,
            psk: None,
            interface: None,
        };

        if state == HotspotState::Absent {
            return Ok(profile);
        }

        let output = self
            .nmcli(
                &[
                    "-s", "-t",
                    "-f", "802-11-wireless.ssid,802-11-wireless-security.psk,connection.interface-name",
                    "connection", "show", self.settings.profile.as_str(),
                ],
                self.settings.command_timeout(),
            )
            .await?;

        for line in output.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = split_terse(value).join(":");
            let value = if value.is_empty() || value == "--" { None } else { Some(value) };
            match key {
                "802-11-wireless.ssid" => profile.ssid = value,
                "802-11-wireless-security.psk" => profile.psk = value,
                "connection.interface-name" => profile.interface = value,
                _ => {}
            }
        }

        Ok(profile)
    }

    async fn up(&self) -> PioneerResult<()> {
        self.nmcli(
            &["connection", "up", "id", self.settings.profile.as_str()],
            self.settings.activation_timeout(),
        )
        .await
        .map(|_| ())
        .map_err(|e| self.provision_error("activate", e))
    }

    async fn down(&self) -> PioneerResult<()> {
        self.nmcli(
            &["connection", "down", "id", self.settings.profile.as_str()],
            self.settings.command_timeout(),
        )
        .await
        .map(|_| ())
        .map_err(|e| self.provision_error("deactivate", e))
    }

    /// First device of type wifi, or the configured fallback
    async fn detect_wifi_interface(&self) -> String {
        match self
            .nmcli(&["-t", "-f", "DEVICE,TYPE", "device"], self.settings.command_timeout())
            .await
        {
            Ok(output) => {
                for line in output.lines() {
                    let fields = split_terse(line);
                    if fields.get(1).map(String::as_str) == Some("wifi") {
                        if let Some(device) = fields.first().filter(|d| !d.is_empty()) {
                            debug!("Using wifi interface {}", device);
                            return device.clone();
                        }
                    }
                }
                warn!(
                    "No wifi device reported by nmcli, falling back to {}",
                    self.settings.fallback_interface
                );
            }
            Err(e) => warn!(
                "Wifi device detection failed, falling back to {}: {}",
                self.settings.fallback_interface, e
            ),
        }
        self.settings.fallback_interface.clone()
    }

    // Missing nmcli or a timeout stays what it is
    fn provision_error(&self, action: &str, error: PioneerError) -> PioneerError {
        match error {
            PioneerError::CommandFailed { .. } => {
                warn!("Failed to {} hotspot profile {}: {}", action, self.settings.profile, error);
                PioneerError::Provision(format!(
                    "failed to {} profile {}: {}",
                    action, self.settings.profile, error
                ))
            }
            other => {
                warn!("Failed to {} hotspot profile {}: {}", action, self.settings.profile, other);
                other
            }
        }
    }

    async fn nmcli(&self, args: &[&str], timeout: Duration) -> PioneerResult<String> {
        let invocation = Invocation::new(self.settings.nmcli.clone(), args.iter().copied(), timeout);
        self.runner.run(&invocation).await?.into_stdout(&invocation)
    }
}
