//! The configuration being built by the wizard
//!
//! One [`ConfigModel`] lives for the whole run. Pages write into it as the
//! operator advances, validation rules read from it, and the commit pipeline
//! turns it into the agent's config file.

use crate::ini::VirtWhoConfig;
use crate::password::KeyStore;
use crate::{
    Error, FieldId, FieldValue, HypervisorId, ReportingTarget, Result, RhsmSettingsSource, SmType,
    VirtType,
};
use std::path::{Path, PathBuf};

/// Accumulated answers plus derived fields.
#[derive(Debug, Clone)]
pub struct ConfigModel {
    config_dir: PathBuf,

    pub config_name: String,
    pub reporting_target: Option<ReportingTarget>,
    pub rhsm_source: RhsmSettingsSource,

    // Satellite 5
    pub sat_server: String,
    pub sat_username: String,
    pub sat_password: String,
    pub sat_encrypt_pass: bool,
    pub sat_encrypted_password: Option<String>,

    // subscription-manager
    pub rhsm_hostname: String,
    pub rhsm_prefix: String,
    pub rhsm_port: String,
    pub rhsm_username: String,
    pub rhsm_password: String,
    pub rhsm_proxy_hostname: String,
    pub rhsm_proxy_port: String,
    pub rhsm_proxy_user: String,
    pub rhsm_proxy_password: String,
    pub rhsm_encrypt_pass: bool,
    pub rhsm_encrypted_password: Option<String>,
    pub rhsm_encrypted_proxy_password: Option<String>,

    // Hypervisor
    pub virt_type: Option<VirtType>,
    pub server: String,
    pub username: String,
    pub password: String,
    pub env: String,
    pub owner: String,
    pub hypervisor_id: HypervisorId,
    pub encrypt_pass: bool,
    pub encrypted_password: Option<String>,
}

impl ConfigModel {
    /// Create an empty model whose file will land in `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            config_name: String::new(),
            reporting_target: None,
            rhsm_source: RhsmSettingsSource::default(),
            sat_server: String::new(),
            sat_username: String::new(),
            sat_password: String::new(),
            sat_encrypt_pass: true,
            sat_encrypted_password: None,
            rhsm_hostname: String::new(),
            rhsm_prefix: String::new(),
            rhsm_port: String::new(),
            rhsm_username: String::new(),
            rhsm_password: String::new(),
            rhsm_proxy_hostname: String::new(),
            rhsm_proxy_port: String::new(),
            rhsm_proxy_user: String::new(),
            rhsm_proxy_password: String::new(),
            rhsm_encrypt_pass: true,
            rhsm_encrypted_password: None,
            rhsm_encrypted_proxy_password: None,
            virt_type: None,
            server: String::new(),
            username: String::new(),
            password: String::new(),
            env: String::new(),
            owner: String::new(),
            hypervisor_id: HypervisorId::default(),
            encrypt_pass: true,
            encrypted_password: None,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn sm_type(&self) -> Option<SmType> {
        self.reporting_target.map(|t| t.sm_type())
    }

    /// Label of the chosen reporting target, for titles and messages.
    pub fn reporting_target_label(&self) -> &'static str {
        self.reporting_target
            .map(|t| t.display_name())
            .unwrap_or("Subscription Manager")
    }

    pub fn virt_type_label(&self) -> &'static str {
        self.virt_type
            .map(|t| t.display_name())
            .unwrap_or("Hypervisor")
    }

    // ==================== Field Access ====================

    fn text_mut(&mut self, field: FieldId) -> Option<&mut String> {
        let slot = match field {
            FieldId::ConfigName => &mut self.config_name,
            FieldId::SatServer => &mut self.sat_server,
            FieldId::SatUsername => &mut self.sat_username,
            FieldId::SatPassword => &mut self.sat_password,
            FieldId::RhsmHostname => &mut self.rhsm_hostname,
            FieldId::RhsmPrefix => &mut self.rhsm_prefix,
            FieldId::RhsmPort => &mut self.rhsm_port,
            FieldId::RhsmUsername => &mut self.rhsm_username,
            FieldId::RhsmPassword => &mut self.rhsm_password,
            FieldId::RhsmProxyHostname => &mut self.rhsm_proxy_hostname,
            FieldId::RhsmProxyPort => &mut self.rhsm_proxy_port,
            FieldId::RhsmProxyUser => &mut self.rhsm_proxy_user,
            FieldId::RhsmProxyPassword => &mut self.rhsm_proxy_password,
            FieldId::Owner => &mut self.owner,
            FieldId::Env => &mut self.env,
            FieldId::Server => &mut self.server,
            FieldId::Username => &mut self.username,
            FieldId::Password => &mut self.password,
            _ => return None,
        };
        Some(slot)
    }

    fn flag_mut(&mut self, field: FieldId) -> Option<&mut bool> {
        match field {
            FieldId::SatEncryptPass => Some(&mut self.sat_encrypt_pass),
            FieldId::RhsmEncryptPass => Some(&mut self.rhsm_encrypt_pass),
            FieldId::EncryptPass => Some(&mut self.encrypt_pass),
            _ => None,
        }
    }

    /// Set a field from a collected input value.
    pub fn set_field(&mut self, field: FieldId, value: FieldValue) -> Result<()> {
        let mismatch = |value: &FieldValue| {
            Error::unexpected(format!("field '{}' cannot hold {:?}", field, value))
        };

        match value {
            FieldValue::Text(text) => {
                let slot = self.text_mut(field).ok_or_else(|| mismatch(&FieldValue::Text(String::new())))?;
                *slot = text;
            }
            FieldValue::Flag(flag) => {
                let slot = self.flag_mut(field).ok_or_else(|| mismatch(&FieldValue::Flag(flag)))?;
                *slot = flag;
            }
            FieldValue::Choice(label) => match field {
                FieldId::ReportingTarget => {
                    self.reporting_target =
                        label.as_deref().map(ReportingTarget::from_label).transpose()?;
                }
                FieldId::VirtType => {
                    self.virt_type = label.as_deref().map(VirtType::from_label).transpose()?;
                }
                FieldId::HypervisorId => {
                    self.hypervisor_id = label
                        .as_deref()
                        .map(HypervisorId::from_label)
                        .transpose()?
                        .unwrap_or_default();
                }
                FieldId::RhsmSource => {
                    self.rhsm_source = label
                        .as_deref()
                        .map(RhsmSettingsSource::from_label)
                        .transpose()?
                        .unwrap_or_default();
                }
                _ => return Err(mismatch(&FieldValue::Choice(label))),
            },
        }
        Ok(())
    }

    /// Current value of a field, in the shape a page renders it.
    pub fn field(&self, field: FieldId) -> FieldValue {
        match field {
            FieldId::ReportingTarget => {
                FieldValue::Choice(self.reporting_target.map(|t| t.display_name().to_string()))
            }
            FieldId::VirtType => {
                FieldValue::Choice(self.virt_type.map(|t| t.display_name().to_string()))
            }
            FieldId::HypervisorId => FieldValue::choice(self.hypervisor_id.as_str()),
            FieldId::RhsmSource => FieldValue::choice(self.rhsm_source.display_name()),
            FieldId::SatEncryptPass => FieldValue::Flag(self.sat_encrypt_pass),
            FieldId::RhsmEncryptPass => FieldValue::Flag(self.rhsm_encrypt_pass),
            FieldId::EncryptPass => FieldValue::Flag(self.encrypt_pass),
            FieldId::ConfigName => FieldValue::text(&self.config_name),
            FieldId::SatServer => FieldValue::text(&self.sat_server),
            FieldId::SatUsername => FieldValue::text(&self.sat_username),
            FieldId::SatPassword => FieldValue::text(&self.sat_password),
            FieldId::RhsmHostname => FieldValue::text(&self.rhsm_hostname),
            FieldId::RhsmPrefix => FieldValue::text(&self.rhsm_prefix),
            FieldId::RhsmPort => FieldValue::text(&self.rhsm_port),
            FieldId::RhsmUsername => FieldValue::text(&self.rhsm_username),
            FieldId::RhsmPassword => FieldValue::text(&self.rhsm_password),
            FieldId::RhsmProxyHostname => FieldValue::text(&self.rhsm_proxy_hostname),
            FieldId::RhsmProxyPort => FieldValue::text(&self.rhsm_proxy_port),
            FieldId::RhsmProxyUser => FieldValue::text(&self.rhsm_proxy_user),
            FieldId::RhsmProxyPassword => FieldValue::text(&self.rhsm_proxy_password),
            FieldId::Owner => FieldValue::text(&self.owner),
            FieldId::Env => FieldValue::text(&self.env),
            FieldId::Server => FieldValue::text(&self.server),
            FieldId::Username => FieldValue::text(&self.username),
            FieldId::Password => FieldValue::text(&self.password),
        }
    }

    /// Forget any custom subscription-manager connection settings.
    pub fn clear_subscription_manager_fields(&mut self) {
        for field in [
            FieldId::RhsmHostname,
            FieldId::RhsmPrefix,
            FieldId::RhsmPort,
            FieldId::RhsmUsername,
            FieldId::RhsmPassword,
            FieldId::RhsmProxyHostname,
            FieldId::RhsmProxyPort,
            FieldId::RhsmProxyUser,
            FieldId::RhsmProxyPassword,
        ] {
            if let Some(slot) = self.text_mut(field) {
                slot.clear();
            }
        }
        self.rhsm_encrypted_password = None;
        self.rhsm_encrypted_proxy_password = None;
    }

    // ==================== Validation ====================

    pub fn validate_config_name(&self) -> Result<()> {
        if self.config_name.trim().is_empty() {
            return Err(Error::invalid("Please enter a name for your configuration"));
        }
        if self.config_name.contains(['/', '\\', '[', ']', '\n', '\r']) {
            return Err(Error::invalid(
                "The configuration name must not contain '/', '\\', '[' or ']'.",
            ));
        }
        if self.config_name.eq_ignore_ascii_case("default") {
            return Err(Error::invalid(
                "'default' is not a valid configuration name. Please enter other name.",
            ));
        }
        Ok(())
    }

    pub fn validate_reporting_target_selected(&self) -> Result<()> {
        if self.reporting_target.is_none() {
            return Err(Error::invalid(
                "Please specify where the host/guest associations should be reported.",
            ));
        }
        Ok(())
    }

    pub fn validate_hypervisor_type(&self) -> Result<()> {
        match self.virt_type {
            Some(_) => Ok(()),
            None => Err(Error::invalid("Please specify a virtualization backend.")),
        }
    }

    pub fn validate_satellite5_config(&self) -> Result<()> {
        if self.sm_type() != Some(SmType::Satellite5) {
            return Ok(());
        }
        if self.sat_server.is_empty() {
            return Err(Error::invalid("Please specify URL of Satellite 5."));
        }
        if self.sat_username.is_empty() {
            return Err(Error::invalid("Please specify username of Satellite 5."));
        }
        if self.sat_password.is_empty() {
            return Err(Error::invalid("Please specify password of Satellite 5."));
        }
        Ok(())
    }

    pub fn validate_subscription_manager_config(&self) -> Result<()> {
        if self.sm_type() != Some(SmType::SubscriptionManager) {
            return Ok(());
        }
        let label = self.reporting_target_label();
        if self.rhsm_hostname.is_empty() {
            return Err(Error::invalid(format!("Please specify hostname of {}.", label)));
        }
        if self.rhsm_username.is_empty() {
            return Err(Error::invalid(format!("Please specify username of {}.", label)));
        }
        if self.rhsm_password.is_empty() {
            return Err(Error::invalid(format!("Please specify password of {}.", label)));
        }
        Ok(())
    }

    /// Accepts an empty value or digits only.
    pub fn validate_integer(&self, field: FieldId) -> Result<()> {
        let FieldValue::Text(value) = self.field(field) else {
            return Err(Error::unexpected(format!("field '{}' is not a text field", field)));
        };
        if !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::invalid(format!("'{}' must be a number.", field)));
        }
        Ok(())
    }

    /// True when the hypervisor is reached over the network.
    pub fn is_remote_hypervisor(&self) -> bool {
        match self.virt_type {
            Some(VirtType::Libvirt) => !self.server.is_empty(),
            Some(VirtType::Vdsm) | None => false,
            Some(_) => true,
        }
    }

    pub fn validate_hypervisor_config(&self) -> Result<()> {
        self.validate_hypervisor_type()?;
        let virt_type = self.virt_type.unwrap_or(VirtType::Libvirt);

        if self.server.is_empty() && !virt_type.is_local_capable() {
            return Err(Error::invalid(
                "Please specify URL of virtualization backend server.",
            ));
        }

        if self.sm_type() == Some(SmType::SubscriptionManager) && self.is_remote_hypervisor() {
            if self.env.is_empty() {
                return Err(Error::invalid(format!(
                    "Please specify environment that '{}' belongs to.",
                    virt_type.as_str()
                )));
            }
            if self.owner.is_empty() {
                return Err(Error::invalid("Please specify an organization."));
            }
        }

        if virt_type == VirtType::Libvirt
            && !self.server.is_empty()
            && (self.server.contains("ssh://") || !self.server.contains("://"))
            && !self.password.is_empty()
        {
            return Err(Error::invalid(
                "Password authentication doesn't work with ssh transport on libvirt backend, \
                 please copy your public ssh key to the remote machine.",
            ));
        }

        Ok(())
    }

    // ==================== Materialization ====================

    /// Where the configuration file will be written.
    pub fn compute_destination_path(&self) -> PathBuf {
        // Path separators never reach the file name, so the file stays in config_dir.
        let name: String = self
            .config_name
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.config_dir.join(format!("{}.conf", name))
    }

    /// Recompute every encrypted password from its plaintext.
    ///
    /// Encrypted fields are always cleared first so a stale ciphertext never
    /// survives a changed password or a cleared flag.
    pub fn encrypt_secrets(&mut self, keys: &KeyStore) -> Result<()> {
        self.sat_encrypted_password = None;
        self.rhsm_encrypted_password = None;
        self.rhsm_encrypted_proxy_password = None;
        self.encrypted_password = None;

        let wanted = (self.sat_encrypt_pass && !self.sat_password.is_empty())
            || (self.rhsm_encrypt_pass
                && (!self.rhsm_password.is_empty() || !self.rhsm_proxy_password.is_empty()))
            || (self.encrypt_pass && !self.password.is_empty());
        if !wanted {
            return Ok(());
        }

        let cipher = keys.load_or_create()?;
        let encrypt = |enabled: bool, plaintext: &str| -> Result<Option<String>> {
            if enabled && !plaintext.is_empty() {
                cipher.encrypt(plaintext).map(Some)
            } else {
                Ok(None)
            }
        };

        self.sat_encrypted_password = encrypt(self.sat_encrypt_pass, &self.sat_password)?;
        self.rhsm_encrypted_password = encrypt(self.rhsm_encrypt_pass, &self.rhsm_password)?;
        self.rhsm_encrypted_proxy_password =
            encrypt(self.rhsm_encrypt_pass, &self.rhsm_proxy_password)?;
        self.encrypted_password = encrypt(self.encrypt_pass, &self.password)?;
        Ok(())
    }

    /// Build the config section.
    ///
    /// With `for_persistence` set, plaintext passwords whose encrypt-flag is on
    /// are left out in favour of the encrypted fields. Without it the result
    /// carries plaintext and is suitable for live connection attempts.
    pub fn materialize(&self, for_persistence: bool) -> Result<VirtWhoConfig> {
        self.validate_config_name()?;
        let virt_type = self
            .virt_type
            .ok_or_else(|| Error::parse("no virtualization backend selected"))?;
        let mut config = VirtWhoConfig::new(&self.config_name)?;
        let plaintext = |encrypted: bool, value: &str| -> String {
            if for_persistence && encrypted {
                String::new()
            } else {
                value.to_string()
            }
        };

        config.set("type", virt_type.as_str())?;
        config.set("server", &self.server)?;
        config.set("username", &self.username)?;
        config.set("password", &plaintext(self.encrypt_pass, &self.password))?;
        config.set("encrypted_password", self.encrypted_password.as_deref().unwrap_or(""))?;

        let local_libvirt = virt_type == VirtType::Libvirt && self.server.is_empty();
        if !local_libvirt {
            config.set("env", &self.env)?;
            config.set("owner", &self.owner)?;
        }
        config.set("hypervisor_id", self.hypervisor_id.as_str())?;

        match self.sm_type() {
            Some(SmType::Satellite5) => {
                config.set("sm_type", SmType::Satellite5.as_str())?;
                config.set("sat_server", &self.sat_server)?;
                config.set("sat_username", &self.sat_username)?;
                config.set("sat_password", &plaintext(self.sat_encrypt_pass, &self.sat_password))?;
                config.set(
                    "sat_encrypted_password",
                    self.sat_encrypted_password.as_deref().unwrap_or(""),
                )?;
            }
            Some(SmType::SubscriptionManager) => {
                config.set("sm_type", SmType::SubscriptionManager.as_str())?;
                config.set("rhsm_hostname", &self.rhsm_hostname)?;
                config.set("rhsm_prefix", &self.rhsm_prefix)?;
                config.set("rhsm_port", &self.rhsm_port)?;
                config.set("rhsm_username", &self.rhsm_username)?;
                config.set("rhsm_password", &plaintext(self.rhsm_encrypt_pass, &self.rhsm_password))?;
                config.set(
                    "rhsm_encrypted_password",
                    self.rhsm_encrypted_password.as_deref().unwrap_or(""),
                )?;
                config.set("rhsm_proxy_hostname", &self.rhsm_proxy_hostname)?;
                config.set("rhsm_proxy_port", &self.rhsm_proxy_port)?;
                config.set("rhsm_proxy_user", &self.rhsm_proxy_user)?;
                config.set(
                    "rhsm_proxy_password",
                    &plaintext(self.rhsm_encrypt_pass, &self.rhsm_proxy_password),
                )?;
                config.set(
                    "rhsm_encrypted_proxy_password",
                    self.rhsm_encrypted_proxy_password.as_deref().unwrap_or(""),
                )?;
            }
            None => {}
        }

        Ok(config)
    }

    /// Write the persistence variant to [`ConfigModel::compute_destination_path`].
    pub fn persist(&self) -> Result<PathBuf> {
        let config = self.materialize(true)?;
        let path = self.compute_destination_path();
        config.write_to(&path)?;
        log::info!("Wrote configuration '{}' to {}", config.name(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn rhsm_model(dir: &Path) -> ConfigModel {
        let mut model = ConfigModel::new(dir);
        model.config_name = "lab1".to_string();
        model.reporting_target = Some(ReportingTarget::Satellite6);
        model.rhsm_hostname = "satellite.example.com".to_string();
        model.rhsm_username = "admin".to_string();
        model.rhsm_password = "changeme".to_string();
        model
    }

    #[test]
    fn test_config_name_validation() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        for name in ["", "default", "DEFAULT", "Default"] {
            model.config_name = name.to_string();
            assert!(matches!(model.validate_config_name(), Err(Error::InvalidOption(_))));
        }
        for name in ["lab1", "defaults", "my default"] {
            model.config_name = name.to_string();
            assert!(model.validate_config_name().is_ok());
        }
    }

    #[test]
    fn test_destination_path_is_normalized() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        model.config_name = "My ESX Farm".to_string();
        assert_eq!(
            model.compute_destination_path(),
            PathBuf::from("/etc/virt-who.d/my_esx_farm.conf")
        );
    }

    #[test]
    fn test_config_name_stays_inside_config_dir() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        for name in ["../../etc/cron.d/job", "a/b", "lab]", "[lab", "   "] {
            model.config_name = name.to_string();
            assert!(
                matches!(model.validate_config_name(), Err(Error::InvalidOption(_))),
                "{:?} should be rejected",
                name
            );
        }

        model.config_name = "../escape".to_string();
        let path = model.compute_destination_path();
        assert_eq!(path.parent(), Some(Path::new("/etc/virt-who.d")));
        assert_eq!(path, PathBuf::from("/etc/virt-who.d/.._escape.conf"));
    }

    #[test]
    fn test_validate_integer() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        for ok in ["", "443", "0080"] {
            model.rhsm_port = ok.to_string();
            assert!(model.validate_integer(FieldId::RhsmPort).is_ok());
        }
        for bad in ["44a", "-1", " 443", "4.5"] {
            model.rhsm_port = bad.to_string();
            assert!(matches!(
                model.validate_integer(FieldId::RhsmPort),
                Err(Error::InvalidOption(_))
            ));
        }
    }

    #[test]
    fn test_reporting_target_validation_is_selection_gated() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        model.reporting_target = Some(ReportingTarget::CustomerPortal);
        // Satellite 5 fields empty, but subscription-manager is selected.
        assert!(model.validate_satellite5_config().is_ok());
        assert!(model.validate_subscription_manager_config().is_err());

        model.reporting_target = Some(ReportingTarget::Satellite5);
        model.rhsm_hostname = "x".to_string();
        assert!(model.validate_subscription_manager_config().is_ok());
        let err = model.validate_satellite5_config().unwrap_err();
        assert!(err.to_string().contains("URL"));

        model.sat_server = "https://sat5.example.com".to_string();
        model.sat_username = "admin".to_string();
        let err = model.validate_satellite5_config().unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_reporting_target_required() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        assert!(model.validate_reporting_target_selected().is_err());
        model
            .set_field(FieldId::ReportingTarget, FieldValue::choice("Red Hat Satellite 5"))
            .unwrap();
        assert!(model.validate_reporting_target_selected().is_ok());
        assert_eq!(model.sm_type(), Some(SmType::Satellite5));
    }

    #[test]
    fn test_local_libvirt_scenario() {
        let dir = tempdir().unwrap();
        let mut model = rhsm_model(dir.path());
        model.virt_type = Some(VirtType::Libvirt);
        // Left over from an abandoned remote branch.
        model.env = "Library".to_string();
        model.owner = "ACME".to_string();

        model.validate_hypervisor_config().unwrap();
        for persist in [true, false] {
            let config = model.materialize(persist).unwrap();
            assert!(!config.contains_key("owner"));
            assert!(!config.contains_key("env"));
        }
    }

    #[test]
    fn test_remote_hypervisor_requires_env_and_owner() {
        let dir = tempdir().unwrap();
        let mut model = rhsm_model(dir.path());
        model.virt_type = Some(VirtType::Esx);
        model.server = "https://h.example.com".to_string();

        let err = model.validate_hypervisor_config().unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)));
        assert!(err.to_string().contains("environment"));

        model.env = "Library".to_string();
        let err = model.validate_hypervisor_config().unwrap_err();
        assert!(err.to_string().contains("organization"));

        model.owner = "ACME".to_string();
        assert!(model.validate_hypervisor_config().is_ok());
    }

    #[test]
    fn test_remote_hypervisor_needs_server() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        model.reporting_target = Some(ReportingTarget::Satellite5);
        model.virt_type = Some(VirtType::Rhevm);
        assert!(model.validate_hypervisor_config().is_err());

        model.virt_type = Some(VirtType::Vdsm);
        assert!(model.validate_hypervisor_config().is_ok());
    }

    #[test]
    fn test_libvirt_ssh_rejects_password() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        model.reporting_target = Some(ReportingTarget::Satellite5);
        model.virt_type = Some(VirtType::Libvirt);
        model.password = "secret".to_string();

        for server in ["ssh://host/system", "qemu+ssh://host/system", "host.example.com"] {
            model.server = server.to_string();
            let err = model.validate_hypervisor_config().unwrap_err();
            assert!(err.to_string().contains("ssh"), "{}", server);
        }

        model.server = "qemu+tls://host/system".to_string();
        assert!(model.validate_hypervisor_config().is_ok());
    }

    #[test]
    fn test_encrypt_secrets_resets_before_recompute() {
        let dir = tempdir().unwrap();
        let keys = KeyStore::new(dir.path().join("key"));
        let mut model = rhsm_model(dir.path());
        model.password = "virt-secret".to_string();

        model.encrypt_secrets(&keys).unwrap();
        let first = model.encrypted_password.clone().unwrap();
        model.encrypt_secrets(&keys).unwrap();
        let second = model.encrypted_password.clone().unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert!(model.rhsm_encrypted_password.is_some());
        assert!(model.sat_encrypted_password.is_none());

        model.encrypt_pass = false;
        model.encrypt_secrets(&keys).unwrap();
        assert!(model.encrypted_password.is_none());
        assert!(model.rhsm_encrypted_password.is_some());
    }

    #[test]
    fn test_encrypt_secrets_without_flags_needs_no_key() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();
        let keys = KeyStore::new(blocker.join("key"));

        let mut model = rhsm_model(dir.path());
        model.rhsm_encrypt_pass = false;
        model.encrypted_password = Some("stale".to_string());
        model.encrypt_secrets(&keys).unwrap();
        assert!(model.encrypted_password.is_none());

        model.rhsm_encrypt_pass = true;
        assert!(matches!(
            model.encrypt_secrets(&keys),
            Err(Error::UnwritableKeyFile { .. })
        ));
    }

    #[test]
    fn test_materialize_omits_plaintext_for_persistence() {
        let dir = tempdir().unwrap();
        let keys = KeyStore::new(dir.path().join("key"));
        let mut model = rhsm_model(dir.path());
        model.virt_type = Some(VirtType::Esx);
        model.server = "https://h.example.com".to_string();
        model.password = "virt-secret".to_string();
        model.rhsm_proxy_password = "proxy-secret".to_string();
        model.encrypt_secrets(&keys).unwrap();

        let live = model.materialize(false).unwrap();
        assert_eq!(live.get("password"), Some("virt-secret"));
        assert_eq!(live.get("rhsm_password"), Some("changeme"));

        let stored = model.materialize(true).unwrap();
        for key in ["password", "rhsm_password", "rhsm_proxy_password"] {
            assert!(!stored.contains_key(key), "{}", key);
        }
        for key in [
            "encrypted_password",
            "rhsm_encrypted_password",
            "rhsm_encrypted_proxy_password",
        ] {
            assert!(stored.contains_key(key), "{}", key);
        }
        assert!(!stored.keys().any(|k| k.starts_with("sat_")));
    }

    #[test]
    fn test_only_selected_reporting_fields_materialize() {
        let dir = tempdir().unwrap();
        let mut model = rhsm_model(dir.path());
        model.virt_type = Some(VirtType::Vdsm);
        model.sat_server = "https://sat5.example.com".to_string();

        let config = model.materialize(true).unwrap();
        assert_eq!(config.get("sm_type"), Some("sam"));
        assert!(!config.contains_key("sat_server"));

        model.reporting_target = Some(ReportingTarget::Satellite5);
        let config = model.materialize(true).unwrap();
        assert_eq!(config.get("sm_type"), Some("satellite"));
        assert!(!config.contains_key("rhsm_hostname"));
        assert_eq!(config.get("sat_server"), Some("https://sat5.example.com"));
    }

    #[test]
    fn test_persist_writes_section() {
        let dir = tempdir().unwrap();
        let mut model = rhsm_model(dir.path());
        model.config_name = "Lab One".to_string();
        model.virt_type = Some(VirtType::Libvirt);
        model.rhsm_encrypt_pass = false;

        let path = model.persist().unwrap();
        assert_eq!(path, dir.path().join("lab_one.conf"));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("[Lab One]\n"));
        assert!(content.contains("type=libvirt\n"));
        assert!(content.contains("rhsm_password=changeme\n"));
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let mut model = rhsm_model(&dir.path().join("missing"));
        model.virt_type = Some(VirtType::Libvirt);
        assert!(matches!(model.persist(), Err(Error::Io(_))));
    }

    #[test]
    fn test_set_field_rejects_wrong_shape() {
        let mut model = ConfigModel::new("/etc/virt-who.d");
        assert!(model.set_field(FieldId::Server, FieldValue::Flag(true)).is_err());
        assert!(model
            .set_field(FieldId::EncryptPass, FieldValue::text("yes"))
            .is_err());
        model
            .set_field(FieldId::VirtType, FieldValue::choice("RHEV-M"))
            .unwrap();
        assert_eq!(model.virt_type, Some(VirtType::Rhevm));
        model.set_field(FieldId::VirtType, FieldValue::Choice(None)).unwrap();
        assert!(model.validate_hypervisor_type().is_err());
    }
}
