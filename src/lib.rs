//! pioneer - Network configuration core for the Pioneer appliance
//!
//! Async library behind the appliance control panel:
//! - DHCP reservations (dnsmasq `dhcp-host=` lines)
//! - DNS overrides (dnsmasq `host-record=` lines)
//! - Forwarder reload with syntax check and restart fallback
//! - Setup hotspot via NetworkManager (nmcli)
//! - Dashboard status probes and persistent job records
//!
//! The web layer talks to [`NetworkFacade`].

pub mod error;
pub mod validation;
pub mod config;
pub mod command;
pub mod file_lock;
pub mod config_store;
pub mod reload;
pub mod dhcp;
pub mod dns;
pub mod hotspot;
pub mod facade;
pub mod status;
pub mod jobs;

// Re-export commonly used types
pub use error::{ErrorKind, PioneerError, PioneerResult};
pub use config::PioneerConfig;
pub use command::{CommandOutput, CommandRunner, Invocation, SystemCommandRunner};
pub use config_store::{ConfigFile, ConfigRecord};
pub use file_lock::FileLock;
pub use reload::{ReloadCoordinator, ReloadMethod, ReloadOutcome, ReloadPhase};
pub use dhcp::{DhcpReservation, DhcpReservationManager};
pub use dns::{DnsRecord, DnsRecordManager};
pub use hotspot::{HotspotController, HotspotProfile, HotspotState, HotspotStatus};
pub use facade::NetworkFacade;
pub use status::{PowerAction, StatusProbe, SystemStatus};
pub use jobs::{InstallMarker, JobRecord, JobState, JobStore};
