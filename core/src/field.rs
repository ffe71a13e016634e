//! Field identifiers shared between rendered pages and the config model

use std::fmt;

/// Every input a page can collect into the [`ConfigModel`](crate::ConfigModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    ConfigName,
    ReportingTarget,
    RhsmSource,
    SatServer,
    SatUsername,
    SatPassword,
    SatEncryptPass,
    RhsmHostname,
    RhsmPrefix,
    RhsmPort,
    RhsmUsername,
    RhsmPassword,
    RhsmProxyHostname,
    RhsmProxyPort,
    RhsmProxyUser,
    RhsmProxyPassword,
    RhsmEncryptPass,
    VirtType,
    Owner,
    Env,
    Server,
    Username,
    Password,
    HypervisorId,
    EncryptPass,
}

impl FieldId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::ConfigName => "config_name",
            FieldId::ReportingTarget => "sm_type",
            FieldId::RhsmSource => "rhsm_source",
            FieldId::SatServer => "sat_server",
            FieldId::SatUsername => "sat_username",
            FieldId::SatPassword => "sat_password",
            FieldId::SatEncryptPass => "sat_encrypt_pass",
            FieldId::RhsmHostname => "rhsm_hostname",
            FieldId::RhsmPrefix => "rhsm_prefix",
            FieldId::RhsmPort => "rhsm_port",
            FieldId::RhsmUsername => "rhsm_username",
            FieldId::RhsmPassword => "rhsm_password",
            FieldId::RhsmProxyHostname => "rhsm_proxy_hostname",
            FieldId::RhsmProxyPort => "rhsm_proxy_port",
            FieldId::RhsmProxyUser => "rhsm_proxy_user",
            FieldId::RhsmProxyPassword => "rhsm_proxy_password",
            FieldId::RhsmEncryptPass => "rhsm_encrypt_pass",
            FieldId::VirtType => "type",
            FieldId::Owner => "owner",
            FieldId::Env => "env",
            FieldId::Server => "server",
            FieldId::Username => "username",
            FieldId::Password => "password",
            FieldId::HypervisorId => "hypervisor_id",
            FieldId::EncryptPass => "encrypt_pass",
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collected input value. Text boxes yield text, checkboxes a flag and
/// radio groups the label of the selected button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Choice(Option<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn choice(label: impl Into<String>) -> Self {
        FieldValue::Choice(Some(label.into()))
    }
}
