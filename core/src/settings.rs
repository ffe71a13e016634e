//! Settings of the wizard itself (paths, service name, probe limits)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current settings version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Where the settings file is looked up when no path is given
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/virt-who-tui/settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub paths: PathsSection,
    pub service: ServiceSection,
    pub probe: ProbeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Directory the generated configuration files are written to
    pub config_dir: PathBuf,
    /// Encryption key shared with the agent
    pub key_file: PathBuf,
    /// Log file of the wizard
    pub log_file: PathBuf,
    /// Log of the agent, named in the success summary
    pub agent_log: PathBuf,
    pub rhsm_conf: PathBuf,
    pub rhsm_ca_dir: PathBuf,
    /// Consumer certificate of a registered host
    pub consumer_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    /// Agent binary run once in print mode
    pub agent_bin: PathBuf,
    pub timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            paths: PathsSection::default(),
            service: ServiceSection::default(),
            probe: ProbeSection::default(),
        }
    }
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/virt-who.d"),
            key_file: PathBuf::from("/var/lib/virt-who/key"),
            log_file: PathBuf::from("/var/log/virt-who-tui.log"),
            agent_log: PathBuf::from("/var/log/rhsm/rhsm.log"),
            rhsm_conf: PathBuf::from("/etc/rhsm/rhsm.conf"),
            rhsm_ca_dir: PathBuf::from("/etc/rhsm/ca"),
            consumer_dir: PathBuf::from("/etc/pki/consumer"),
        }
    }
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "virt-who".to_string(),
        }
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            agent_bin: PathBuf::from("/usr/sbin/virt-who"),
            timeout_secs: 60,
            http_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_SETTINGS_PATH)
    }

    /// Load settings from `path`, or use the defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.name.trim().is_empty() {
            return Err(Error::invalid("Service name cannot be empty"));
        }
        if self.probe.timeout_secs == 0 || self.probe.http_timeout_secs == 0 {
            return Err(Error::invalid("Timeouts must be at least one second"));
        }
        let paths = [
            ("config_dir", &self.paths.config_dir),
            ("key_file", &self.paths.key_file),
            ("log_file", &self.paths.log_file),
            ("agent_log", &self.paths.agent_log),
            ("rhsm_conf", &self.paths.rhsm_conf),
            ("rhsm_ca_dir", &self.paths.rhsm_ca_dir),
            ("consumer_dir", &self.paths.consumer_dir),
            ("agent_bin", &self.probe.agent_bin),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(Error::invalid(format!("Path '{}' cannot be empty", name)));
            }
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.http_timeout_secs)
    }
}
