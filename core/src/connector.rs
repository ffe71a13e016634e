//! Uniform surface over the remote collaborators
//!
//! The wizard talks to two kinds of remote services before it writes anything:
//! the reporting target (subscription-manager or Satellite 5) and the hypervisor
//! backend. Both are reached through the traits below, and every call into them
//! is wrapped in [`run_guarded`], which turns the recoverable failures into
//! messages the operator can read.

use crate::ini::VirtWhoConfig;
use crate::{ConfigModel, Error, Result};
use regex::Regex;
use std::io;
use thiserror::Error;

/// Hint added when a server refused the connection.
pub const PORT_HINT: &str = "Please make sure the server port is open.";

/// Failures raised by concrete connectors.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Declared protocol or backend failure (HTTP status, XML-RPC fault, agent error).
    #[error("{0}")]
    Backend(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Socket error: {0}")]
    Socket(#[from] io::Error),

    /// Not recoverable at the connector boundary.
    #[error("{0}")]
    Unexpected(String),
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Client for the service host/guest associations are reported to.
pub trait ReportingTargetConnector {
    /// Perform the handshake and log in.
    fn connect(&mut self) -> ConnectorResult<()>;

    fn logout(&mut self) -> ConnectorResult<()>;

    /// Organization the consumer identified by `consumer_uuid` belongs to.
    ///
    /// Only subscription-manager connectors know how to answer this.
    fn owner(&mut self, _consumer_uuid: &str) -> ConnectorResult<Option<String>> {
        Ok(None)
    }
}

/// One-shot data collection from a hypervisor backend.
pub trait HypervisorProbe {
    /// Run a single collection round with `config` and report whether it worked.
    fn synchronize(&self, config: &VirtWhoConfig) -> ConnectorResult<()>;
}

/// Builds the reporting-target connector matching the model's selection.
pub trait ConnectorFactory {
    fn reporting_target(&self, model: &ConfigModel) -> Result<Box<dyn ReportingTargetConnector>>;
}

/// Run connector calls and collect recoverable failures as messages.
///
/// Returns an empty list when `f` succeeds. Backend, connection and socket
/// errors are turned into strings; [`ConnectorError::Unexpected`] is returned
/// as [`Error::Unexpected`] for the caller to propagate.
pub fn run_guarded<F>(f: F) -> Result<Vec<String>>
where
    F: FnOnce() -> ConnectorResult<()>,
{
    let err = match f() {
        Ok(()) => return Ok(Vec::new()),
        Err(err) => err,
    };

    let refused = match &err {
        ConnectorError::Unexpected(msg) => return Err(Error::unexpected(msg.clone())),
        ConnectorError::Socket(e) => e.kind() == io::ErrorKind::ConnectionRefused,
        _ => false,
    };

    let message = err.to_string();
    log::warn!("Connector error: {}", message);

    let mut errors = Vec::new();
    if refused || mentions_refused(&message) {
        errors.push(PORT_HINT.to_string());
    }
    errors.push(message);
    Ok(errors)
}

fn mentions_refused(message: &str) -> bool {
    match Regex::new(r"(?i)connection\s+refused") {
        Ok(re) => re.is_match(message),
        Err(_) => false,
    }
}
