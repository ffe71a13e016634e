//! One-shot hypervisor probe
//!
//! The agent itself knows how to talk to every hypervisor backend, so the probe
//! writes the live configuration to a private temporary file and runs the agent
//! once in print mode. The agent never enters its polling loop and its output
//! goes to the log instead of the screen.

use crate::connector::{ConnectorError, ConnectorResult, HypervisorProbe};
use crate::ini::VirtWhoConfig;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Runs `<agent_bin> --print --config <file>` with a deadline.
#[derive(Debug, Clone)]
pub struct AgentProbe {
    agent_bin: PathBuf,
    timeout: Duration,
}

impl AgentProbe {
    pub fn new(agent_bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            agent_bin: agent_bin.into(),
            timeout,
        }
    }
}

fn prepare(err: std::io::Error) -> ConnectorError {
    ConnectorError::Backend(format!("Unable to prepare hypervisor probe: {}", err))
}

/// Captured agent output. Bytes that are not UTF-8 are replaced, not dropped.
fn read_back(mut file: File) -> ConnectorResult<String> {
    let mut out = Vec::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut out))
        .map_err(|e| ConnectorError::Backend(format!("Unable to read hypervisor probe output: {}", e)))?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

impl HypervisorProbe for AgentProbe {
    fn synchronize(&self, config: &VirtWhoConfig) -> ConnectorResult<()> {
        let mut config_file = tempfile::Builder::new()
            .prefix("virt-who-tui-")
            .suffix(".conf")
            .tempfile()
            .map_err(prepare)?;
        config_file
            .write_all(config.to_ini().as_bytes())
            .and_then(|_| config_file.flush())
            .map_err(prepare)?;

        let stdout = tempfile::tempfile().map_err(prepare)?;
        let stderr = tempfile::tempfile().map_err(prepare)?;

        log::info!(
            "Probing hypervisor '{}' with {}",
            config.name(),
            self.agent_bin.display()
        );
        let mut child = Command::new(&self.agent_bin)
            .arg("--print")
            .arg("--config")
            .arg(config_file.path())
            .stdin(Stdio::null())
            .stdout(stdout.try_clone().map_err(prepare)?)
            .stderr(stderr.try_clone().map_err(prepare)?)
            .spawn()
            .map_err(|e| {
                ConnectorError::Backend(format!(
                    "Unable to run {}: {}",
                    self.agent_bin.display(),
                    e
                ))
            })?;

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                child.kill()?;
                child.wait()?;
                return Err(ConnectorError::Connection(format!(
                    "No answer from the hypervisor within {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        let out = read_back(stdout)?;
        let err = read_back(stderr)?;
        if !out.trim().is_empty() {
            log::info!("{}", out.trim_end());
        }
        if !err.trim().is_empty() {
            log::info!("{}", err.trim_end());
        }

        if status.success() {
            return Ok(());
        }
        let detail = if err.trim().is_empty() { out.trim() } else { err.trim() };
        Err(ConnectorError::Backend(format!(
            "{} exited with {}: {}",
            self.agent_bin.display(),
            status,
            detail
        )))
    }
}
