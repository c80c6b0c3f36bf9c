//! Entry point for the web layer
//!
//! Thin composition of the record managers and the hotspot controller. Each
//! method maps onto exactly one component call and returns its error as is.

use crate::command::CommandRunner;
use crate::config::PioneerConfig;
use crate::dhcp::{DhcpReservation, DhcpReservationManager};
use crate::dns::{DnsRecord, DnsRecordManager};
use crate::error::PioneerResult;
use crate::hotspot::{HotspotController, HotspotProfile, HotspotStatus};
use crate::reload::{ReloadCoordinator, ReloadOutcome};
use std::sync::Arc;

pub struct NetworkFacade {
    dhcp: DhcpReservationManager,
    dns: DnsRecordManager,
    hotspot: HotspotController,
}

impl NetworkFacade {
    pub fn new(dhcp: DhcpReservationManager, dns: DnsRecordManager, hotspot: HotspotController) -> Self {
        Self { dhcp, dns, hotspot }
    }

    /// Wire up all components from settings, sharing one reload coordinator
    pub fn from_config(config: &PioneerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let reload = Arc::new(ReloadCoordinator::new(runner.clone(), config.forwarder.clone()));
        Self {
            dhcp: DhcpReservationManager::new(config.paths.dhcp_hosts_file.clone(), reload.clone()),
            dns: DnsRecordManager::new(config.paths.dns_hosts_file.clone(), reload),
            hotspot: HotspotController::new(runner, config.hotspot.clone()),
        }
    }

    pub async fn list_dhcp(&self) -> PioneerResult<Vec<DhcpReservation>> {
        self.dhcp.list().await
    }

    pub async fn upsert_dhcp(&self, mac: &str, ip: &str, hostname: Option<&str>) -> PioneerResult<ReloadOutcome> {
        self.dhcp.upsert(mac, ip, hostname).await
    }

    pub async fn delete_dhcp(&self, mac: &str) -> PioneerResult<Option<ReloadOutcome>> {
        self.dhcp.delete(mac).await
    }

    pub async fn list_dns(&self) -> PioneerResult<Vec<DnsRecord>> {
        self.dns.list().await
    }

    pub async fn upsert_dns(&self, hostname: &str, ip: &str) -> PioneerResult<ReloadOutcome> {
        self.dns.upsert(hostname, ip).await
    }

    pub async fn delete_dns(&self, hostname: &str) -> PioneerResult<Option<ReloadOutcome>> {
        self.dns.delete(hostname).await
    }

    pub async fn hotspot_status(&self) -> PioneerResult<HotspotStatus> {
        self.hotspot.status().await
    }

    pub async fn toggle_hotspot(&self) -> PioneerResult<HotspotStatus> {
        self.hotspot.toggle().await
    }

    pub async fn update_hotspot(&self, ssid: &str, psk: &str) -> PioneerResult<HotspotStatus> {
        self.hotspot.update(ssid, psk).await
    }

    pub async fn hotspot_profile(&self) -> PioneerResult<HotspotProfile> {
        self.hotspot.profile().await
    }
}
