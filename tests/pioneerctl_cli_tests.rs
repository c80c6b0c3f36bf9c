//! Integration tests for pioneerctl
//!
//! Each test writes its own settings file so the managed dnsmasq files and
//! the state directory live in a temp dir. The forwarder commands are
//! replaced with `true`/`false` so no real service is touched.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn pioneerctl() -> Command {
    Command::cargo_bin("pioneerctl").unwrap()
}

/// Settings file pointing every path into `dir`; `reload` is the program
/// used for reload and restart
fn write_config(dir: &Path, reload: &str) -> PathBuf {
    let path = dir.join("pioneer.toml");
    let content = format!(
        r#"[paths]
dhcp_hosts_file = "{dir}/dhcp.conf"
dns_hosts_file = "{dir}/dns.conf"
state_dir = "{dir}/state"

[forwarder]
check_command = ["true"]
reload_command = ["{reload}"]
restart_command = ["{reload}"]
"#,
        dir = dir.display(),
        reload = reload,
    );
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_command() {
    pioneerctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pioneer network configuration CLI"));
}

#[test]
fn test_dhcp_list() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    fs::write(
        dir.path().join("dhcp.conf"),
        "# leases\ndhcp-host=aa:bb:cc:dd:ee:ff,192.168.1.50,printer\n",
    )
    .unwrap();

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dhcp", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aa:bb:cc:dd:ee:ff"))
        .stdout(predicate::str::contains("printer"));
}

#[test]
fn test_dhcp_set_writes_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dhcp", "set", "AA:BB:CC:DD:EE:01", "192.168.1.20", "--hostname", "tv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reservation saved"));

    let content = fs::read_to_string(dir.path().join("dhcp.conf")).unwrap();
    assert_eq!(content, "dhcp-host=aa:bb:cc:dd:ee:01,192.168.1.20,tv\n");
}

#[test]
fn test_dhcp_set_invalid_mac_exits_2() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let original = "dhcp-host=aa:bb:cc:dd:ee:ff,192.168.1.50\n";
    fs::write(dir.path().join("dhcp.conf"), original).unwrap();

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dhcp", "set", "bad-mac", "10.0.0.5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("MAC"));

    assert_eq!(fs::read_to_string(dir.path().join("dhcp.conf")).unwrap(), original);
}

#[test]
fn test_failed_reload_exits_3_and_keeps_change() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "false");

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dns", "set", "nas.lan", "192.168.1.10"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("saved"));

    let content = fs::read_to_string(dir.path().join("dns.conf")).unwrap();
    assert_eq!(content, "host-record=nas.lan,192.168.1.10\n");
}

#[test]
fn test_dns_list_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    fs::write(dir.path().join("dns.conf"), "host-record=foo.local,10.0.0.5\n").unwrap();

    let output = pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["--json", "dns", "list"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records[0]["hostname"], "foo.local");
    assert_eq!(records[0]["ip"], "10.0.0.5");
}

#[test]
fn test_dns_delete_absent() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "false");

    // nothing to delete, so the failing reload command is never run
    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dns", "delete", "ghost.lan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn test_job_list_empty() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["--json", "job", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_job_show_unknown_exits_2() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["job", "show", "6f9619ff-8b86-4011-b42d-00cf4fc964ff"])
        .assert()
        .code(2);
}

#[test]
fn test_malformed_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("pioneer.toml");
    fs::write(&config, "[paths\n").unwrap();

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dhcp", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("loading settings"));
}

#[test]
fn test_invalid_settings_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let mut content = fs::read_to_string(&config).unwrap();
    content.push_str("\n[hotspot]\npsk = \"short\"\n");
    fs::write(&config, content).unwrap();

    pioneerctl()
        .arg("--config")
        .arg(&config)
        .args(["dhcp", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("hotspot.psk"));
}

#[test]
fn test_parallel_processes_keep_every_record() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let bin = assert_cmd::cargo::cargo_bin("pioneerctl");

    let children: Vec<_> = (0..8)
        .map(|i| {
            std::process::Command::new(&bin)
                .arg("--config")
                .arg(&config)
                .args(["dns", "set", &format!("host{}.lan", i), &format!("10.0.3.{}", 10 + i)])
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
                .expect("Failed to spawn pioneerctl")
        })
        .collect();
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }

    let content = fs::read_to_string(dir.path().join("dns.conf")).unwrap();
    assert_eq!(content.lines().count(), 8);
    for i in 0..8 {
        assert!(content.contains(&format!("host-record=host{}.lan,10.0.3.{}", i, 10 + i)));
    }
}
