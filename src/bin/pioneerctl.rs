//! pioneerctl - Pioneer network configuration CLI
//!
//! Drives the same core the control panel uses: DHCP reservations, DNS
//! overrides, the setup hotspot, dashboard status and job records.
//!
//! # Usage
//!
//! ```bash
//! pioneerctl dhcp list
//! sudo pioneerctl dhcp set AA:BB:CC:DD:EE:FF 192.168.1.60 --hostname printer
//! sudo pioneerctl dns set nas.lan 192.168.1.10
//! sudo pioneerctl hotspot toggle
//! pioneerctl --json status
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use libpioneer::config::DEFAULT_CONFIG_PATH;
use libpioneer::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Pioneer network configuration CLI
#[derive(Parser, Debug)]
#[command(name = "pioneerctl")]
#[command(version)]
#[command(about = "Pioneer network configuration CLI - DHCP reservations, DNS overrides and setup hotspot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print JSON instead of tables
    #[arg(short, long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage DHCP reservations
    #[command(subcommand)]
    Dhcp(DhcpCommands),

    /// Manage DNS overrides
    #[command(subcommand)]
    Dns(DnsCommands),

    /// Control the setup hotspot
    #[command(subcommand)]
    Hotspot(HotspotCommands),

    /// Show system status
    Status,

    /// Reboot or power off the appliance
    #[command(subcommand)]
    Power(PowerCommands),

    /// Inspect background jobs
    #[command(subcommand)]
    Job(JobCommands),
}

#[derive(Subcommand, Debug)]
enum DhcpCommands {
    /// List reservations
    List,
    /// Create or replace a reservation
    Set {
        /// Hardware address (AA:BB:CC:DD:EE:FF)
        mac: String,
        /// IPv4 address to hand out
        ip: String,
        /// Hostname to assign
        #[arg(long)]
        hostname: Option<String>,
    },
    /// Delete a reservation
    Delete {
        mac: String,
    },
}

#[derive(Subcommand, Debug)]
enum DnsCommands {
    /// List overrides
    List,
    /// Create or replace an override
    Set {
        hostname: String,
        ip: String,
    },
    /// Delete an override
    Delete {
        hostname: String,
    },
}

#[derive(Subcommand, Debug)]
enum HotspotCommands {
    /// Show whether the hotspot is active
    Status,
    /// Turn the hotspot on or off
    Toggle,
    /// Change SSID and password
    Update {
        ssid: String,
        /// WPA2 passphrase (8-63 characters)
        password: String,
    },
    /// Show profile details
    Show,
}

#[derive(Subcommand, Debug)]
enum PowerCommands {
    Reboot,
    Shutdown,
}

#[derive(Subcommand, Debug)]
enum JobCommands {
    /// List jobs, oldest first
    List,
    /// Show one job
    Show {
        id: Uuid,
    },
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!("pioneerctl={},libpioneer={}", log_level, log_level))
        });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();
}

fn warn_if_not_root() {
    #[cfg(target_os = "linux")]
    {
        let uid = unsafe { libc::getuid() };
        if uid != 0 {
            warn!("Not running as root - writing dnsmasq files or driving nmcli may fail");
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<PioneerConfig> {
    if !path.exists() {
        debug!("{} not found, using default settings", path.display());
    }
    PioneerConfig::load_or_default(path)
        .with_context(|| format!("loading settings from {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_reload(cli: &Cli, what: &str, outcome: Option<ReloadOutcome>) -> anyhow::Result<()> {
    if cli.json {
        return print_json(&serde_json::json!({ "changed": what, "reload": outcome }));
    }
    match outcome {
        Some(outcome) => println!("{} (forwarder {:?})", what, outcome.method),
        None => println!("{}: nothing to do", what),
    }
    Ok(())
}

async fn handle_dhcp(cmd: &DhcpCommands, cli: &Cli, facade: &NetworkFacade) -> anyhow::Result<()> {
    match cmd {
        DhcpCommands::List => {
            let reservations = facade.list_dhcp().await?;
            if cli.json {
                return print_json(&reservations);
            }
            println!("{:<19} {:<16} {}", "MAC", "IP", "HOSTNAME");
            for r in reservations {
                println!("{:<19} {:<16} {}", r.mac, r.ip, r.hostname.as_deref().unwrap_or("--"));
            }
            Ok(())
        }
        DhcpCommands::Set { mac, ip, hostname } => {
            warn_if_not_root();
            let outcome = facade.upsert_dhcp(mac, ip, hostname.as_deref()).await?;
            print_reload(cli, "Reservation saved", Some(outcome))
        }
        DhcpCommands::Delete { mac } => {
            warn_if_not_root();
            let outcome = facade.delete_dhcp(mac).await?;
            print_reload(cli, "Reservation deleted", outcome)
        }
    }
}

async fn handle_dns(cmd: &DnsCommands, cli: &Cli, facade: &NetworkFacade) -> anyhow::Result<()> {
    match cmd {
        DnsCommands::List => {
            let records = facade.list_dns().await?;
            if cli.json {
                return print_json(&records);
            }
            println!("{:<40} {}", "HOSTNAME", "IP");
            for r in records {
                println!("{:<40} {}", r.hostname, r.ip);
            }
            Ok(())
        }
        DnsCommands::Set { hostname, ip } => {
            warn_if_not_root();
            let outcome = facade.upsert_dns(hostname, ip).await?;
            print_reload(cli, "Record saved", Some(outcome))
        }
        DnsCommands::Delete { hostname } => {
            warn_if_not_root();
            let outcome = facade.delete_dns(hostname).await?;
            print_reload(cli, "Record deleted", outcome)
        }
    }
}

async fn handle_hotspot(cmd: &HotspotCommands, cli: &Cli, facade: &NetworkFacade) -> anyhow::Result<()> {
    let status = match cmd {
        HotspotCommands::Status => facade.hotspot_status().await?,
        HotspotCommands::Toggle => facade.toggle_hotspot().await?,
        HotspotCommands::Update { ssid, password } => facade.update_hotspot(ssid, password).await?,
        HotspotCommands::Show => {
            let profile = facade.hotspot_profile().await?;
            if cli.json {
                return print_json(&profile);
            }
            println!("PROFILE:   {}", profile.name);
            println!("STATE:     {:?}", profile.state);
            println!("SSID:      {}", profile.ssid.as_deref().unwrap_or("--"));
            println!("PASSWORD:  {}", profile.psk.as_deref().unwrap_or("--"));
            println!("INTERFACE: {}", profile.interface.as_deref().unwrap_or("--"));
            return Ok(());
        }
    };

    if cli.json {
        return print_json(&serde_json::json!({ "hotspot": status }));
    }
    println!("Hotspot {}", status);
    Ok(())
}

async fn handle_status(cli: &Cli, probe: &StatusProbe) -> anyhow::Result<()> {
    let status = probe.overview().await;
    if cli.json {
        return print_json(&status);
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("HOSTNAME:   {}", status.hostname);
    println!("INTERNET:   {}", yes_no(status.internet));
    println!(
        "HOTSPOT:    {}",
        status.hotspot.map(|h| h.to_string()).unwrap_or_else(|| "unknown".to_string())
    );
    println!("FORWARDER:  {}", if status.forwarder_active { "active" } else { "inactive" });
    println!("INSTALLING: {}", status.installing.as_deref().unwrap_or("--"));
    Ok(())
}

async fn handle_job(cmd: &JobCommands, cli: &Cli, store: &JobStore) -> anyhow::Result<()> {
    match cmd {
        JobCommands::List => {
            let jobs = store.list().await?;
            if cli.json {
                return print_json(&jobs);
            }
            println!("{:<36}  {:<10} {:<10} {:<20} {}", "ID", "KIND", "STATE", "SUBJECT", "UPDATED");
            for job in jobs {
                println!(
                    "{:<36}  {:<10} {:<10} {:<20} {}",
                    job.id,
                    job.kind,
                    format!("{:?}", job.state).to_lowercase(),
                    job.subject,
                    job.updated_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            Ok(())
        }
        JobCommands::Show { id } => {
            let job = store.get(*id).await?;
            print_json(&job)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.config)?;
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());

    match &cli.command {
        Commands::Dhcp(cmd) => {
            let facade = NetworkFacade::from_config(&config, runner);
            handle_dhcp(cmd, cli, &facade).await
        }
        Commands::Dns(cmd) => {
            let facade = NetworkFacade::from_config(&config, runner);
            handle_dns(cmd, cli, &facade).await
        }
        Commands::Hotspot(cmd) => {
            let facade = NetworkFacade::from_config(&config, runner);
            handle_hotspot(cmd, cli, &facade).await
        }
        Commands::Status => {
            let probe = StatusProbe::from_config(&config, runner);
            handle_status(cli, &probe).await
        }
        Commands::Power(cmd) => {
            warn_if_not_root();
            let probe = StatusProbe::from_config(&config, runner);
            let action = match cmd {
                PowerCommands::Reboot => PowerAction::Reboot,
                PowerCommands::Shutdown => PowerAction::Shutdown,
            };
            probe.power(action).await?;
            Ok(())
        }
        Commands::Job(cmd) => {
            let store = JobStore::new(&config.paths.state_dir);
            handle_job(cmd, cli, &store).await
        }
    }
}

/// 2 for bad input, 3 when a change is saved but not active, 1 otherwise
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<PioneerError>() {
        Some(e) if e.is_client_error() => 2,
        Some(e) if e.change_persisted() => 3,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(pe) = e.downcast_ref::<PioneerError>() {
            if pe.change_persisted() {
                eprintln!("The change was saved and will apply on the next successful reload.");
            }
        }
        process::exit(exit_code(&e));
    }
}
