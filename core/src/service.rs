//! Lifecycle control of the agent's system service

use crate::{Error, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Output from a command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// What to show the operator when the command failed.
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Run a command and capture its output
pub fn run_cmd(cmd: &str, args: &[&str]) -> Result<CommandOutput> {
    log::debug!("Running {} {}", cmd, args.join(" "));
    let output = Command::new(cmd).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::CommandNotFound(cmd.to_string())
        } else {
            Error::Command {
                cmd: format!("{} {}", cmd, args.join(" ")),
                message: e.to_string(),
            }
        }
    })?;

    Ok(parse_output(output))
}

fn parse_output(output: Output) -> CommandOutput {
    CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

/// Start and enable the agent.
pub trait ServiceControl {
    fn start(&self) -> Result<()>;
    fn enable(&self) -> Result<()>;
}

/// Init system generation of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSystem {
    Systemd,
    SysV,
}

impl InitSystem {
    pub fn detect() -> Self {
        Self::detect_at(Path::new("/run/systemd/system"))
    }

    /// systemd creates `marker` early at boot.
    pub fn detect_at(marker: &Path) -> Self {
        if marker.is_dir() {
            InitSystem::Systemd
        } else {
            InitSystem::SysV
        }
    }

    pub fn start_command(&self, service: &str) -> (&'static str, Vec<String>) {
        match self {
            InitSystem::Systemd => ("systemctl", vec!["restart".into(), service.into()]),
            InitSystem::SysV => ("service", vec![service.into(), "restart".into()]),
        }
    }

    pub fn enable_command(&self, service: &str) -> (&'static str, Vec<String>) {
        match self {
            InitSystem::Systemd => ("systemctl", vec!["enable".into(), service.into()]),
            InitSystem::SysV => ("chkconfig", vec![service.into(), "on".into()]),
        }
    }
}

/// The agent's service on this host.
#[derive(Debug, Clone)]
pub struct SystemService {
    name: String,
    init: InitSystem,
}

impl SystemService {
    pub fn new(name: impl Into<String>, init: InitSystem) -> Self {
        Self {
            name: name.into(),
            init,
        }
    }

    fn invoke(&self, action: &str, (cmd, args): (&str, Vec<String>)) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_cmd(cmd, &args).map_err(|e| Error::Service {
            action: action.to_string(),
            detail: e.to_string(),
        })?;

        if !output.success() {
            log::warn!(
                "{} {} exited with {}: {}",
                cmd,
                args.join(" "),
                output.exit_code,
                output.detail()
            );
            return Err(Error::Service {
                action: action.to_string(),
                detail: output.detail(),
            });
        }

        log::info!("{} service {}", self.name, action);
        Ok(())
    }
}

impl ServiceControl for SystemService {
    fn start(&self) -> Result<()> {
        self.invoke("start", self.init.start_command(&self.name))
    }

    fn enable(&self) -> Result<()> {
        self.invoke("enable", self.init.enable_command(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_init_system() {
        let dir = tempdir().unwrap();
        assert_eq!(InitSystem::detect_at(dir.path()), InitSystem::Systemd);
        assert_eq!(
            InitSystem::detect_at(&dir.path().join("missing")),
            InitSystem::SysV
        );
    }

    #[test]
    fn test_commands_per_init_system() {
        let (cmd, args) = InitSystem::Systemd.start_command("virt-who");
        assert_eq!((cmd, args.as_slice()), ("systemctl", &["restart".to_string(), "virt-who".to_string()][..]));

        let (cmd, args) = InitSystem::SysV.enable_command("virt-who");
        assert_eq!(cmd, "chkconfig");
        assert_eq!(args, vec!["virt-who", "on"]);
    }

    #[test]
    fn test_run_cmd_captures_output() {
        let output = run_cmd("sh", &["-c", "echo out; echo err >&2; exit 3"]).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.detail(), "err");
    }

    #[test]
    fn test_missing_command() {
        let err = run_cmd("definitely-not-a-command-xyz", &[]).unwrap_err();
        assert!(matches!(err, Error::CommandNotFound(_)));
    }

    #[test]
    fn test_detail_falls_back_to_stdout() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "Unit virt-who.service not found.\n".to_string(),
            stderr: "  ".to_string(),
        };
        assert_eq!(output.detail(), "Unit virt-who.service not found.");
    }
}
