//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use libpioneer::{CommandOutput, CommandRunner, Invocation, PioneerConfig, PioneerResult};
use std::path::Path;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&Invocation) -> PioneerResult<CommandOutput> + Send + Sync>;

/// Records every invocation and answers with a test-supplied closure
pub struct ScriptedRunner {
    calls: Mutex<Vec<Invocation>>,
    responder: Responder,
}

impl ScriptedRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Invocation) -> PioneerResult<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// Every command succeeds with empty output
    pub fn all_ok() -> Self {
        Self::new(|_| Ok(exit(0, "")))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose command line starts with `prefix`
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|inv| matches_prefix(inv, prefix))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> PioneerResult<CommandOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        (self.responder)(invocation)
    }
}

pub fn matches_prefix(inv: &Invocation, prefix: &[&str]) -> bool {
    let line: Vec<&str> = std::iter::once(inv.program.as_str())
        .chain(inv.args.iter().map(String::as_str))
        .collect();
    line.len() >= prefix.len() && line.iter().zip(prefix).all(|(a, b)| a == b)
}

pub fn exit(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn stdout(text: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: text.to_string(),
        stderr: String::new(),
    }
}

/// Default settings with both managed files and the state dir under `dir`
pub fn test_config(dir: &Path) -> PioneerConfig {
    let mut config = PioneerConfig::default();
    config.paths.dhcp_hosts_file = dir.join("pioneer-dhcp.conf");
    config.paths.dns_hosts_file = dir.join("pioneer-dns.conf");
    config.paths.state_dir = dir.join("state");
    config
}
