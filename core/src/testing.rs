//! Recording collaborators for pipeline and controller tests

use crate::connector::{
    ConnectorError, ConnectorFactory, ConnectorResult, HypervisorProbe, ReportingTargetConnector,
};
use crate::ini::VirtWhoConfig;
use crate::password::KeyStore;
use crate::pipeline::Collaborators;
use crate::service::ServiceControl;
use crate::{ConfigModel, Error, Result};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Calls seen by the mocks, in order.
pub type CallLog = Rc<RefCell<Vec<String>>>;

#[derive(Clone, Default)]
pub struct Behavior {
    pub connect_error: Option<String>,
    pub refuse_connect: bool,
    pub owner: Option<String>,
    pub probe_error: Option<String>,
    pub start_error: Option<String>,
    pub enable_error: Option<String>,
}

struct MockConnector {
    calls: CallLog,
    behavior: Behavior,
}

impl ReportingTargetConnector for MockConnector {
    fn connect(&mut self) -> ConnectorResult<()> {
        self.calls.borrow_mut().push("connect".into());
        if self.behavior.refuse_connect {
            return Err(ConnectorError::Socket(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Connection refused",
            )));
        }
        match &self.behavior.connect_error {
            Some(msg) => Err(ConnectorError::Backend(msg.clone())),
            None => Ok(()),
        }
    }

    fn logout(&mut self) -> ConnectorResult<()> {
        self.calls.borrow_mut().push("logout".into());
        Ok(())
    }

    fn owner(&mut self, consumer_uuid: &str) -> ConnectorResult<Option<String>> {
        self.calls.borrow_mut().push(format!("owner {}", consumer_uuid));
        Ok(self.behavior.owner.clone())
    }
}

struct MockFactory {
    calls: CallLog,
    behavior: Behavior,
}

impl ConnectorFactory for MockFactory {
    fn reporting_target(&self, model: &ConfigModel) -> Result<Box<dyn ReportingTargetConnector>> {
        if model.sm_type().is_none() {
            return Err(Error::unexpected("no reporting target selected"));
        }
        Ok(Box::new(MockConnector {
            calls: self.calls.clone(),
            behavior: self.behavior.clone(),
        }))
    }
}

struct MockProbe {
    calls: CallLog,
    behavior: Behavior,
}

impl HypervisorProbe for MockProbe {
    fn synchronize(&self, config: &VirtWhoConfig) -> ConnectorResult<()> {
        self.calls.borrow_mut().push(format!("probe {}", config.name()));
        match &self.behavior.probe_error {
            Some(msg) => Err(ConnectorError::Backend(msg.clone())),
            None => Ok(()),
        }
    }
}

struct MockServices {
    calls: CallLog,
    behavior: Behavior,
}

impl ServiceControl for MockServices {
    fn start(&self) -> Result<()> {
        self.calls.borrow_mut().push("start".into());
        match &self.behavior.start_error {
            Some(detail) => Err(Error::Service {
                action: "start".into(),
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }

    fn enable(&self) -> Result<()> {
        self.calls.borrow_mut().push("enable".into());
        match &self.behavior.enable_error {
            Some(detail) => Err(Error::Service {
                action: "enable".into(),
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Mock collaborators sharing one call log. The key file lives in `dir`.
pub fn collaborators(dir: &Path, behavior: Behavior) -> (Collaborators, CallLog) {
    let calls = CallLog::default();
    let collaborators = Collaborators {
        keys: KeyStore::new(dir.join("key")),
        connectors: Box::new(MockFactory {
            calls: calls.clone(),
            behavior: behavior.clone(),
        }),
        hypervisor: Box::new(MockProbe {
            calls: calls.clone(),
            behavior: behavior.clone(),
        }),
        services: Box::new(MockServices {
            calls: calls.clone(),
            behavior,
        }),
        agent_log: dir.join("rhsm.log"),
    };
    (collaborators, calls)
}
