//! Dashboard status probes and power actions
//!
//! The probes only feed a dashboard, so they never fail: any error is logged
//! at debug level and reported as "not up".

use crate::command::{CommandRunner, Invocation};
use crate::config::PioneerConfig;
use crate::error::PioneerResult;
use crate::hotspot::{HotspotController, HotspotStatus};
use crate::jobs::InstallMarker;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const POWER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub hostname: String,
    pub internet: bool,
    /// None when NetworkManager could not be queried
    pub hotspot: Option<HotspotStatus>,
    pub forwarder_active: bool,
    /// App currently being installed
    pub installing: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Reboot,
    Shutdown,
}

impl PowerAction {
    fn args(self) -> [&'static str; 2] {
        match self {
            PowerAction::Reboot => ["-r", "now"],
            PowerAction::Shutdown => ["-h", "now"],
        }
    }
}

pub struct StatusProbe {
    runner: Arc<dyn CommandRunner>,
    hotspot: HotspotController,
    probe_address: String,
    probe_timeout: Duration,
    forwarder_service: String,
    state_dir: PathBuf,
}

impl StatusProbe {
    pub fn from_config(config: &PioneerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            hotspot: HotspotController::new(runner.clone(), config.hotspot.clone()),
            runner,
            probe_address: config.status.connectivity_probe.clone(),
            probe_timeout: Duration::from_secs(config.status.probe_timeout_secs),
            forwarder_service: config.forwarder.service.clone(),
            state_dir: config.paths.state_dir.clone(),
        }
    }

    pub async fn overview(&self) -> SystemStatus {
        let (internet, hotspot, forwarder_active, installing) = tokio::join!(
            self.internet(),
            self.hotspot(),
            self.service_active(&self.forwarder_service),
            self.installing(),
        );

        SystemStatus {
            hostname: hostname().await,
            internet,
            hotspot,
            forwarder_active,
            installing,
        }
    }

    /// One ping to the probe address
    pub async fn internet(&self) -> bool {
        // ping's own deadline, rounded up to whole seconds
        let wait = self.probe_timeout.as_secs().max(1).to_string();
        let invocation = Invocation::new(
            "ping",
            ["-c", "1", "-W", wait.as_str(), self.probe_address.as_str()],
            self.probe_timeout + Duration::from_secs(1),
        );
        self.succeeds(&invocation).await
    }

    /// `systemctl is-active <unit>`
    pub async fn service_active(&self, unit: &str) -> bool {
        let invocation = Invocation::new("systemctl", ["is-active", "--quiet", unit], self.probe_timeout);
        self.succeeds(&invocation).await
    }

    async fn hotspot(&self) -> Option<HotspotStatus> {
        match self.hotspot.status().await {
            Ok(status) => Some(status),
            Err(e) => {
                debug!("Hotspot status unavailable: {}", e);
                None
            }
        }
    }

    async fn installing(&self) -> Option<String> {
        match InstallMarker::current(&self.state_dir).await {
            Ok(marker) => marker.map(|m| m.app),
            Err(e) => {
                debug!("Install marker unreadable: {}", e);
                None
            }
        }
    }

    async fn succeeds(&self, invocation: &Invocation) -> bool {
        match self.runner.run(invocation).await {
            Ok(output) => output.success(),
            Err(e) => {
                debug!("Status probe '{}' failed: {}", invocation.display(), e);
                false
            }
        }
    }

    /// Ask the system to reboot or power off
    pub async fn power(&self, action: PowerAction) -> PioneerResult<()> {
        let invocation = Invocation::new("shutdown", action.args(), POWER_TIMEOUT);
        info!("Requesting {:?}", action);
        self.runner
            .run(&invocation)
            .await?
            .into_stdout(&invocation)
            .map_err(|e| {
                warn!("Power action {:?} failed: {}", action, e);
                e
            })?;
        Ok(())
    }
}

async fn hostname() -> String {
    match tokio::fs::read_to_string("/proc/sys/kernel/hostname").await {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => "pioneer".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, MockCommandRunner};
    use crate::error::PioneerError;
    use tempfile::TempDir;

    fn config(state_dir: &std::path::Path) -> PioneerConfig {
        let mut config = PioneerConfig::default();
        config.paths.state_dir = state_dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_overview_suppresses_errors() {
        let dir = TempDir::new().unwrap();
        InstallMarker::begin(dir.path(), "jellyfin").await.unwrap();

        let mut runner = MockCommandRunner::new();
        runner.expect_run()
            .withf(|inv| inv.program == "ping")
            .returning(|_| Ok(CommandOutput { code: Some(0), ..Default::default() }));
        runner.expect_run()
            .withf(|inv| inv.program == "systemctl")
            .returning(|_| Ok(CommandOutput { code: Some(3), ..Default::default() }));
        runner.expect_run()
            .withf(|inv| inv.program == "nmcli")
            .returning(|inv| Err(PioneerError::ToolUnavailable {
                tool: inv.program.clone(),
                detail: "No such file or directory".to_string(),
            }));

        let probe = StatusProbe::from_config(&config(dir.path()), Arc::new(runner));
        let status = probe.overview().await;
        assert!(status.internet);
        assert!(!status.forwarder_active);
        assert_eq!(status.hotspot, None);
        assert_eq!(status.installing.as_deref(), Some("jellyfin"));
        assert!(!status.hostname.is_empty());
    }

    #[tokio::test]
    async fn test_power_action_surfaces_failure() {
        let dir = TempDir::new().unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run()
            .withf(|inv| inv.program == "shutdown" && inv.args == vec!["-r", "now"])
            .times(1)
            .returning(|_| Ok(CommandOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "Failed to set wall message".to_string(),
            }));

        let probe = StatusProbe::from_config(&config(dir.path()), Arc::new(runner));
        assert!(matches!(
            probe.power(PowerAction::Reboot).await,
            Err(PioneerError::CommandFailed { .. })
        ));
    }
}
