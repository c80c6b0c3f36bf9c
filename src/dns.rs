//! DNS override management via dnsmasq `host-record=` lines

use crate::config_store::{self, ConfigFile, ConfigRecord};
use crate::error::PioneerResult;
use crate::reload::{ReloadCoordinator, ReloadOutcome};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// dnsmasq directive holding static name to address mappings
pub const HOST_RECORD_DIRECTIVE: &str = "host-record";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub hostname: String,
    pub ip: Ipv4Addr,
}

impl DnsRecord {
    pub fn to_line(&self) -> String {
        ConfigRecord::new(self.hostname.clone(), vec![self.ip.to_string()]).to_line(HOST_RECORD_DIRECTIVE)
    }

    // host-record may list aliases before the address: name,alias,10.0.0.5
    fn from_record(record: &ConfigRecord) -> Option<Self> {
        let hostname = validation::normalize_hostname(&record.key).ok()?;
        let ip = record
            .fields
            .iter()
            .find_map(|field| field.parse::<Ipv4Addr>().ok())?;
        Some(Self { hostname, ip })
    }
}

pub struct DnsRecordManager {
    file: ConfigFile,
    reload: Arc<ReloadCoordinator>,
}

impl DnsRecordManager {
    pub fn new(path: PathBuf, reload: Arc<ReloadCoordinator>) -> Self {
        Self {
            file: ConfigFile::new(path),
            reload,
        }
    }

    pub async fn list(&self) -> PioneerResult<Vec<DnsRecord>> {
        let lines = self.file.read().await?;

        for line in config_store::malformed_lines(&lines, HOST_RECORD_DIRECTIVE) {
            warn!("Skipping malformed DNS record in {}: {}", self.file.path().display(), line);
        }

        Ok(config_store::records(&lines, HOST_RECORD_DIRECTIVE)
            .filter_map(|record| {
                let parsed = DnsRecord::from_record(&record);
                if parsed.is_none() {
                    warn!(
                        "Skipping malformed DNS record in {}: {}",
                        self.file.path().display(),
                        record.to_line(HOST_RECORD_DIRECTIVE)
                    );
                }
                parsed
            })
            .collect())
    }

    /// Point `hostname` at `ip`, replacing any previous address
    pub async fn upsert(&self, hostname: &str, ip: &str) -> PioneerResult<ReloadOutcome> {
        let record = DnsRecord {
            hostname: validation::normalize_hostname(hostname)?,
            ip: validation::validate_ipv4(ip)?,
        };

        let line = record.to_line();
        self.file
            .update(|lines| config_store::upsert(lines, HOST_RECORD_DIRECTIVE, &record.hostname, line))
            .await
            .map_err(|e| {
                warn!("Failed to write DNS record for {}: {}", record.hostname, e);
                e
            })?;

        info!("DNS record {} -> {}", record.hostname, record.ip);
        self.apply("upsert", &record.hostname).await
    }

    /// Remove `hostname`; absent records are a no-op
    pub async fn delete(&self, hostname: &str) -> PioneerResult<Option<ReloadOutcome>> {
        let hostname = validation::normalize_hostname(hostname)?;

        let changed = self
            .file
            .update(|lines| config_store::remove(lines, HOST_RECORD_DIRECTIVE, &hostname))
            .await?;

        if !changed {
            info!("No DNS record for {}, nothing to delete", hostname);
            return Ok(None);
        }

        info!("DNS record {} removed", hostname);
        self.apply("delete", &hostname).await.map(Some)
    }

    async fn apply(&self, operation: &str, hostname: &str) -> PioneerResult<ReloadOutcome> {
        self.reload.apply().await.map_err(|e| {
            warn!(operation, hostname, error = %e, "DNS record saved but forwarder not refreshed");
            e
        })
    }
}
