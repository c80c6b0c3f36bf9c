//! DHCP reservation management via dnsmasq `dhcp-host=` lines

use crate::config_store::{self, ConfigFile};
use crate::error::PioneerResult;
use crate::reload::{ReloadCoordinator, ReloadOutcome};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// dnsmasq directive holding static leases
pub const DHCP_HOST_DIRECTIVE: &str = "dhcp-host";

/// A fixed IPv4 address bound to a hardware address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpReservation {
    /// Lowercase, colon separated
    pub mac: String,
    pub ip: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl DhcpReservation {
    pub fn to_line(&self) -> String {
        let mut fields = vec![self.ip.to_string()];
        if let Some(ref hostname) = self.hostname {
            fields.push(hostname.clone());
        }
        config_store::ConfigRecord::new(self.mac.clone(), fields).to_line(DHCP_HOST_DIRECTIVE)
    }

    fn from_record(record: &config_store::ConfigRecord) -> Option<Self> {
        let mac = validation::normalize_mac(&record.key).ok()?;
        let ip = validation::validate_ipv4(record.fields.first()?).ok()?;
        let hostname = record
            .fields
            .get(1)
            .filter(|h| !h.is_empty())
            .cloned();
        Some(Self { mac, ip, hostname })
    }
}

pub struct DhcpReservationManager {
    file: ConfigFile,
    reload: Arc<ReloadCoordinator>,
}

impl DhcpReservationManager {
    pub fn new(path: PathBuf, reload: Arc<ReloadCoordinator>) -> Self {
        Self {
            file: ConfigFile::new(path),
            reload,
        }
    }

    /// All reservations in file order; malformed lines are skipped
    pub async fn list(&self) -> PioneerResult<Vec<DhcpReservation>> {
        let lines = self.file.read().await?;

        for line in config_store::malformed_lines(&lines, DHCP_HOST_DIRECTIVE) {
            warn!("Skipping malformed reservation in {}: {}", self.file.path().display(), line);
        }

        let mut reservations = Vec::new();
        for record in config_store::records(&lines, DHCP_HOST_DIRECTIVE) {
            match DhcpReservation::from_record(&record) {
                Some(reservation) => reservations.push(reservation),
                None => warn!(
                    "Skipping malformed reservation in {}: {}",
                    self.file.path().display(),
                    record.to_line(DHCP_HOST_DIRECTIVE)
                ),
            }
        }

        Ok(reservations)
    }

    /// Create or replace the reservation for `mac`, then reload the forwarder
    ///
    /// Validation happens before the file is touched. Reload errors are
    /// returned after the new line is already on disk.
    pub async fn upsert(
        &self,
        mac: &str,
        ip: &str,
        hostname: Option<&str>,
    ) -> PioneerResult<ReloadOutcome> {
        let reservation = DhcpReservation {
            mac: validation::normalize_mac(mac)?,
            ip: validation::validate_ipv4(ip)?,
            hostname: match hostname.map(str::trim).filter(|h| !h.is_empty()) {
                Some(h) => Some(validation::normalize_hostname(h)?),
                None => None,
            },
        };

        let line = reservation.to_line();
        let changed = self
            .file
            .update(|lines| config_store::upsert(lines, DHCP_HOST_DIRECTIVE, &reservation.mac, line))
            .await
            .map_err(|e| {
                warn!("Failed to write reservation for {}: {}", reservation.mac, e);
                e
            })?;

        info!(
            "DHCP reservation {} -> {}{}",
            reservation.mac,
            reservation.ip,
            if changed { "" } else { " (unchanged)" }
        );

        self.apply("upsert", &reservation.mac).await
    }

    /// Remove the reservation for `mac`
    ///
    /// Returns `Ok(None)` without touching the file or the forwarder when no
    /// such reservation exists.
    pub async fn delete(&self, mac: &str) -> PioneerResult<Option<ReloadOutcome>> {
        let mac = validation::normalize_mac(mac)?;

        let changed = self
            .file
            .update(|lines| config_store::remove(lines, DHCP_HOST_DIRECTIVE, &mac))
            .await?;

        if !changed {
            info!("No DHCP reservation for {}, nothing to delete", mac);
            return Ok(None);
        }

        info!("DHCP reservation {} removed", mac);
        self.apply("delete", &mac).await.map(Some)
    }

    async fn apply(&self, operation: &str, mac: &str) -> PioneerResult<ReloadOutcome> {
        self.reload.apply().await.map_err(|e| {
            warn!(operation, mac, error = %e, "DHCP reservation saved but forwarder not refreshed");
            e
        })
    }
}
