//! Virt-who TUI Core Library
//!
//! This crate holds everything behind the virt-who configuration wizard: the
//! configuration model and its validation, password encryption, the
//! connectors used to test a configuration, service control, the commit
//! pipeline and the page graph. It has no terminal code.

pub mod config;
pub mod connector;
pub mod error;
pub mod field;
pub mod ini;
pub mod manager;
pub mod model;
pub mod password;
pub mod pipeline;
pub mod registration;
pub mod service;
pub mod settings;
pub mod virt;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use config::ConfigModel;
pub use connector::{run_guarded, ConnectorError, ConnectorFactory, HypervisorProbe, ReportingTargetConnector};
pub use error::{Error, Result};
pub use field::{FieldId, FieldValue};
pub use ini::VirtWhoConfig;
pub use model::*;
pub use password::KeyStore;
pub use pipeline::{Collaborators, CommitPipeline, PipelineOutcome, Stage, StageState};
pub use settings::Settings;
pub use wizard::{Page, PageKind, Popup, PopupButtons, PopupStyle, WizardController};
