//! Registration state of the host running the wizard

use crate::service::run_cmd;
use crate::HostFacts;
use uuid::Uuid;

/// Ask subscription-manager who this host is registered as.
///
/// Any failure means "not registered"; the wizard then simply stops offering
/// the host's own settings as the default.
pub fn detect() -> HostFacts {
    match run_cmd("subscription-manager", &["identity"]) {
        Ok(output) if output.success() => parse_identity(&output.stdout),
        Ok(output) => {
            log::info!("Host is not registered: {}", output.detail());
            HostFacts::default()
        }
        Err(e) => {
            log::info!("Unable to query registration: {}", e);
            HostFacts::default()
        }
    }
}

/// Parse the output of `subscription-manager identity`.
pub fn parse_identity(output: &str) -> HostFacts {
    let mut facts = HostFacts::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if matches!(key.trim().to_lowercase().as_str(), "system identity" | "current identity is") {
            facts.consumer_uuid = Uuid::parse_str(value).ok().map(|u| u.to_string());
        }
    }
    facts
}
