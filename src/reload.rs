//! Forwarder reload coordination
//!
//! After a managed file changes the forwarder (dnsmasq) is asked to pick it
//! up: syntax check first, then a graceful reload, then a restart if the
//! reload does not work. A failed check leaves the running service alone so
//! the last good configuration keeps serving.

use crate::command::{CommandRunner, Invocation};
use crate::config::ForwarderSettings;
use crate::error::{PioneerError, PioneerResult};
use crate::validation::sanitize_error_message;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Progress of a single apply call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPhase {
    /// The on-disk configuration passed the syntax check
    Validated,
    /// The service is running with the new configuration
    Applied,
}

/// How the new configuration was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMethod {
    Graceful,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadOutcome {
    pub phase: ReloadPhase,
    pub method: ReloadMethod,
}

pub struct ReloadCoordinator {
    runner: Arc<dyn CommandRunner>,
    settings: ForwarderSettings,
    serial: Mutex<()>,
}

impl ReloadCoordinator {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: ForwarderSettings) -> Self {
        Self {
            runner,
            settings,
            serial: Mutex::new(()),
        }
    }

    pub fn service(&self) -> &str {
        &self.settings.service
    }

    /// Check the configuration and bring the running service up to date
    pub async fn apply(&self) -> PioneerResult<ReloadOutcome> {
        let _guard = self.serial.lock().await;

        self.validate().await?;
        debug!("{} configuration validated", self.settings.service);

        let graceful = match self
            .attempt(&self.settings.reload_command, self.settings.reload_timeout())
            .await
        {
            Ok(()) => {
                info!("{} reloaded", self.settings.service);
                return Ok(ReloadOutcome {
                    phase: ReloadPhase::Applied,
                    method: ReloadMethod::Graceful,
                });
            }
            Err(e) => {
                warn!("Graceful reload of {} failed, restarting: {}", self.settings.service, e);
                e
            }
        };

        match self
            .attempt(&self.settings.restart_command, self.settings.restart_timeout())
            .await
        {
            Ok(()) => {
                info!("{} restarted", self.settings.service);
                Ok(ReloadOutcome {
                    phase: ReloadPhase::Applied,
                    method: ReloadMethod::Restart,
                })
            }
            Err(restart) => {
                error!(
                    service = %self.settings.service,
                    reload_error = %graceful,
                    restart_error = %restart,
                    "Forwarder not refreshed; changes are saved but not active"
                );
                Err(PioneerError::ReloadFailed {
                    graceful: graceful.to_string(),
                    restart: restart.to_string(),
                })
            }
        }
    }

    /// Run the forwarder's own syntax check against the on-disk files
    pub async fn validate(&self) -> PioneerResult<()> {
        let invocation =
            Invocation::from_command_line(&self.settings.check_command, self.settings.check_timeout())?;

        let output = match self.runner.run(&invocation).await {
            Ok(output) => output,
            Err(PioneerError::Timeout { cmd, secs }) => {
                error!("Configuration check '{}' timed out after {}s", cmd, secs);
                return Err(PioneerError::ConfigInvalid {
                    service: self.settings.service.clone(),
                    detail: format!("syntax check timed out after {}s", secs),
                });
            }
            Err(e) => {
                error!("Configuration check '{}' could not run: {}", invocation.display(), e);
                return Err(e);
            }
        };

        if output.success() {
            return Ok(());
        }

        // dnsmasq reports the offending line on stderr
        let detail = if output.stderr.trim().is_empty() {
            sanitize_error_message(&output.stdout)
        } else {
            sanitize_error_message(&output.stderr)
        };
        error!(
            cmd = %invocation.display(),
            code = ?output.code,
            stderr = %detail,
            "Forwarder rejected configuration; service not signalled"
        );
        Err(PioneerError::ConfigInvalid {
            service: self.settings.service.clone(),
            detail,
        })
    }

    async fn attempt(&self, command: &[String], timeout: Duration) -> PioneerResult<()> {
        let invocation = Invocation::from_command_line(command, timeout)?;
        self.runner.run(&invocation).await?.into_stdout(&invocation)?;
        Ok(())
    }
}
