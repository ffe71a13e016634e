//! Domain model types for Virt-who TUI

use crate::{Error, Result};

/// Underlying reporting protocol handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmType {
    SubscriptionManager,
    Satellite5,
}

impl SmType {
    /// Value written to the `sm_type` key of the agent's config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            SmType::SubscriptionManager => "sam",
            SmType::Satellite5 => "satellite",
        }
    }
}

/// The reporting target as the operator sees it. Four variants, two handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportingTarget {
    #[default]
    CustomerPortal,
    Satellite6,
    SubscriptionAssetManager,
    Satellite5,
}

impl ReportingTarget {
    pub const ALL: [ReportingTarget; 4] = [
        ReportingTarget::CustomerPortal,
        ReportingTarget::Satellite6,
        ReportingTarget::SubscriptionAssetManager,
        ReportingTarget::Satellite5,
    ];

    pub const LABELS: [&'static str; 4] = [
        "Red Hat Customer Portal",
        "Red Hat Satellite 6",
        "Subscription Asset Manager",
        "Red Hat Satellite 5",
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ReportingTarget::CustomerPortal => Self::LABELS[0],
            ReportingTarget::Satellite6 => Self::LABELS[1],
            ReportingTarget::SubscriptionAssetManager => Self::LABELS[2],
            ReportingTarget::Satellite5 => Self::LABELS[3],
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.display_name() == label)
            .ok_or_else(|| Error::invalid(format!("'{}' is not a supported reporting target.", label)))
    }

    pub fn sm_type(&self) -> SmType {
        match self {
            ReportingTarget::Satellite5 => SmType::Satellite5,
            _ => SmType::SubscriptionManager,
        }
    }
}

/// Hypervisor backend polled by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtType {
    Esx,
    HyperV,
    Libvirt,
    Rhevm,
    Vdsm,
    Xen,
}

impl VirtType {
    pub const ALL: [VirtType; 6] = [
        VirtType::Esx,
        VirtType::HyperV,
        VirtType::Libvirt,
        VirtType::Rhevm,
        VirtType::Vdsm,
        VirtType::Xen,
    ];

    pub const LABELS: [&'static str; 6] = ["ESX", "Hyper-V", "Libvirt", "RHEV-M", "Vdsm", "XEN"];

    pub fn as_str(&self) -> &'static str {
        match self {
            VirtType::Esx => "esx",
            VirtType::HyperV => "hyperv",
            VirtType::Libvirt => "libvirt",
            VirtType::Rhevm => "rhevm",
            VirtType::Vdsm => "vdsm",
            VirtType::Xen => "xen",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            VirtType::Esx => "ESX",
            VirtType::HyperV => "Hyper-V",
            VirtType::Libvirt => "Libvirt",
            VirtType::Rhevm => "RHEV-M",
            VirtType::Vdsm => "Vdsm",
            VirtType::Xen => "XEN",
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.display_name() == label || t.as_str() == label)
            .ok_or_else(|| {
                Error::invalid(format!("'{}' is not a supported virtualization backend.", label))
            })
    }

    /// Backends that talk to the local host and need no server URL.
    pub fn is_local_capable(&self) -> bool {
        matches!(self, VirtType::Libvirt | VirtType::Vdsm)
    }

    /// Example server URL shown under the server field.
    pub fn server_help(&self) -> Option<&'static str> {
        match self {
            VirtType::Libvirt => Some("e.g. qemu+ssh://host.example.com/system"),
            VirtType::Xen | VirtType::Esx => Some("e.g. https://host.example.com"),
            VirtType::Rhevm => Some(
                "e.g.\nRHEV-M 3: https://host.example.com:443\nRHEV-M 4: https://host.example.com:443/ovirt-engine",
            ),
            VirtType::HyperV | VirtType::Vdsm => None,
        }
    }

    pub fn username_help(&self) -> Option<&'static str> {
        match self {
            VirtType::Rhevm => Some("e.g. admin@internal"),
            _ => None,
        }
    }
}

/// Which host attribute identifies a polled hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HypervisorId {
    #[default]
    Uuid,
    Hostname,
    HwUuid,
}

impl HypervisorId {
    pub const LABELS: [&'static str; 3] = ["uuid", "hostname", "hwuuid"];

    pub fn as_str(&self) -> &'static str {
        match self {
            HypervisorId::Uuid => "uuid",
            HypervisorId::Hostname => "hostname",
            HypervisorId::HwUuid => "hwuuid",
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        match label {
            "uuid" => Ok(HypervisorId::Uuid),
            "hostname" => Ok(HypervisorId::Hostname),
            "hwuuid" => Ok(HypervisorId::HwUuid),
            other => Err(Error::invalid(format!(
                "'{}' is not a supported hypervisor identification.",
                other
            ))),
        }
    }
}

/// Answer of the "use different subscription-manager settings?" question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RhsmSettingsSource {
    #[default]
    Host,
    Custom,
}

impl RhsmSettingsSource {
    pub const LABELS: [&'static str; 2] = [
        "Use the settings this host is registered with",
        "Enter different settings",
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            RhsmSettingsSource::Host => Self::LABELS[0],
            RhsmSettingsSource::Custom => Self::LABELS[1],
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        if label == Self::LABELS[0] {
            Ok(RhsmSettingsSource::Host)
        } else if label == Self::LABELS[1] {
            Ok(RhsmSettingsSource::Custom)
        } else {
            Err(Error::invalid(format!("'{}' is not a valid answer.", label)))
        }
    }
}

/// Facts about the host gathered once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFacts {
    /// Consumer UUID of the host's subscription-manager registration.
    pub consumer_uuid: Option<String>,
}

impl HostFacts {
    pub fn is_registered(&self) -> bool {
        self.consumer_uuid.is_some()
    }
}
