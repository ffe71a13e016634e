//! Minimal INI handling for virt-who style config files
//!
//! The agent reads one section per configuration file. Only what the wizard
//! writes (and the few keys it reads back from `rhsm.conf`) is supported.

use crate::{Error, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// One named section with ordered keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtWhoConfig {
    name: String,
    entries: Vec<(String, String)>,
}

impl VirtWhoConfig {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::parse("section name cannot be empty"));
        }
        if name.contains(['[', ']', '\n', '\r']) {
            return Err(Error::parse(format!("invalid section name '{}'", name)));
        }
        Ok(Self {
            name,
            entries: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a key. Empty values are skipped.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        if value.contains(['\n', '\r']) {
            return Err(Error::parse(format!("value of '{}' spans several lines", key)));
        }
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn to_ini(&self) -> String {
        let mut out = format!("[{}]\n", self.name);
        for (key, value) in &self.entries {
            out.push_str(&format!("{}={}\n", key, value));
        }
        out
    }

    /// Write the section to `path` readable by root only.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(self.to_ini().as_bytes())?;
        Ok(())
    }
}

/// Read the keys of `section` from INI text. Comments and other sections are ignored.
pub fn read_section(content: &str, section: &str) -> Vec<(String, String)> {
    let mut in_section = false;
    let mut values = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.trim() == section;
            continue;
        }
        if !in_section {
            continue;
        }
        let Some((key, value)) = line.split_once(['=', ':']) else {
            continue;
        };
        values.push((key.trim().to_string(), value.trim().to_string()));
    }

    values
}
