//! Commit pipeline run by the last wizard page
//!
//! Stages run strictly in order and the first failure aborts the rest. Stage
//! failures are reported to the caller as an [`PipelineOutcome::Aborted`]
//! value; only unexpected errors come back as `Err`.

use crate::connector::{run_guarded, ConnectorFactory, HypervisorProbe};
use crate::manager::RemoteConnectors;
use crate::password::KeyStore;
use crate::service::{InitSystem, ServiceControl, SystemService};
use crate::settings::Settings;
use crate::virt::AgentProbe;
use crate::{ConfigModel, Error, Result};
use std::path::PathBuf;

/// Everything the pipeline reaches outside of the model.
pub struct Collaborators {
    pub keys: KeyStore,
    pub connectors: Box<dyn ConnectorFactory>,
    pub hypervisor: Box<dyn HypervisorProbe>,
    pub services: Box<dyn ServiceControl>,
    /// Log of the agent, named in the success summary.
    pub agent_log: PathBuf,
}

impl Collaborators {
    /// The real thing: network connectors, the agent binary and the host's init system.
    pub fn from_settings(settings: &Settings) -> Self {
        let init = InitSystem::detect();
        log::info!("Detected init system: {:?}", init);
        Self {
            keys: KeyStore::new(&settings.paths.key_file),
            connectors: Box::new(RemoteConnectors::new(settings)),
            hypervisor: Box::new(AgentProbe::new(
                &settings.probe.agent_bin,
                settings.probe_timeout(),
            )),
            services: Box::new(SystemService::new(&settings.service.name, init)),
            agent_log: settings.paths.agent_log.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configure,
    ConnectReportingTarget,
    ConnectHypervisor,
    Persist,
    StartService,
    EnableService,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Configure,
        Stage::ConnectReportingTarget,
        Stage::ConnectHypervisor,
        Stage::Persist,
        Stage::StartService,
        Stage::EnableService,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Configure => "Configuring your settings",
            Stage::ConnectReportingTarget => "Connecting to Subscription Manager",
            Stage::ConnectHypervisor => "Connecting to Hypervisor Backend",
            Stage::Persist => "Writing configuration file",
            Stage::StartService => "Starting virt-who service",
            Stage::EnableService => "Enabling virt-who service",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Running,
    Passed,
    Failed,
}

impl StageState {
    pub fn marker(&self) -> &'static str {
        match self {
            StageState::Running => "",
            StageState::Passed => "PASSED",
            StageState::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed { path: PathBuf },
    Aborted {
        stage: Stage,
        title: String,
        errors: Vec<String>,
    },
}

/// A recoverable stage failure.
struct StageFailure {
    title: String,
    errors: Vec<String>,
}

impl StageFailure {
    fn new(title: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            title: title.into(),
            errors,
        }
    }
}

type StageResult<T> = std::result::Result<T, StageFailure>;

/// Reports stage progress, typically by redrawing the terminal page.
pub type Progress<'p> = dyn FnMut(Stage, StageState) -> Result<()> + 'p;

pub struct CommitPipeline<'a> {
    collaborators: &'a Collaborators,
}

impl<'a> CommitPipeline<'a> {
    pub fn new(collaborators: &'a Collaborators) -> Self {
        Self { collaborators }
    }

    pub fn run(&self, model: &mut ConfigModel, progress: &mut Progress<'_>) -> Result<PipelineOutcome> {
        log::info!("Committing configuration '{}'", model.config_name);

        let live = match step(Stage::Configure, progress, || self.configure(model))? {
            Ok(config) => config,
            Err(outcome) => return Ok(outcome),
        };

        if let Err(outcome) = step(Stage::ConnectReportingTarget, progress, || {
            self.connect_reporting_target(model)
        })? {
            return Ok(outcome);
        }

        if let Err(outcome) = step(Stage::ConnectHypervisor, progress, || {
            let errors = run_guarded(|| self.collaborators.hypervisor.synchronize(&live))?;
            Ok(collected(
                errors,
                format!("Failed to connect to '{}' server", model.virt_type_label()),
            ))
        })? {
            return Ok(outcome);
        }

        let path = match step(Stage::Persist, progress, || persist(model))? {
            Ok(path) => path,
            Err(outcome) => return Ok(outcome),
        };

        if let Err(outcome) = step(Stage::StartService, progress, || {
            service_result(self.collaborators.services.start(), "start")
        })? {
            return Ok(outcome);
        }

        if let Err(outcome) = step(Stage::EnableService, progress, || {
            service_result(self.collaborators.services.enable(), "enable")
        })? {
            return Ok(outcome);
        }

        log::info!("Configuration '{}' committed to {}", model.config_name, path.display());
        Ok(PipelineOutcome::Completed { path })
    }

    fn configure(&self, model: &mut ConfigModel) -> Result<StageResult<crate::VirtWhoConfig>> {
        let result = model
            .encrypt_secrets(&self.collaborators.keys)
            .and_then(|_| model.materialize(false));
        match result {
            Ok(config) => Ok(Ok(config)),
            Err(e @ Error::Unexpected(_)) => Err(e),
            Err(e) if e.is_key_file() => Ok(Err(StageFailure::new(
                "Failed to encrypt password.",
                vec![e.to_string()],
            ))),
            Err(e) => Ok(Err(StageFailure::new(
                "Failed to parse configuration",
                vec![e.to_string()],
            ))),
        }
    }

    fn connect_reporting_target(&self, model: &ConfigModel) -> Result<StageResult<()>> {
        let mut connector = self.collaborators.connectors.reporting_target(model)?;
        let errors = run_guarded(|| {
            connector.connect()?;
            connector.logout()
        })?;
        Ok(collected(
            errors,
            format!("Failed to connect to '{}' server", model.reporting_target_label()),
        ))
    }
}

fn collected(errors: Vec<String>, title: String) -> StageResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StageFailure::new(title, errors))
    }
}

fn persist(model: &ConfigModel) -> Result<StageResult<PathBuf>> {
    match model.persist() {
        Ok(path) => Ok(Ok(path)),
        Err(e @ Error::Unexpected(_)) => Err(e),
        Err(e) => Ok(Err(StageFailure::new(
            format!(
                "Failed to create '{}' configuration file:",
                model.compute_destination_path().display()
            ),
            vec![e.to_string()],
        ))),
    }
}

fn service_result(result: Result<()>, action: &str) -> Result<StageResult<()>> {
    match result {
        Ok(()) => Ok(Ok(())),
        Err(e @ Error::Unexpected(_)) => Err(e),
        Err(e) => Ok(Err(StageFailure::new(
            format!("Failed to {} virt-who service", action),
            vec![e.to_string()],
        ))),
    }
}

/// Run one stage and report it. `Err` in the inner result ends the pipeline.
fn step<T, F>(
    stage: Stage,
    progress: &mut Progress<'_>,
    f: F,
) -> Result<std::result::Result<T, PipelineOutcome>>
where
    F: FnOnce() -> Result<StageResult<T>>,
{
    progress(stage, StageState::Running)?;
    match f()? {
        Ok(value) => {
            log::info!("{}: PASSED", stage.label());
            progress(stage, StageState::Passed)?;
            Ok(Ok(value))
        }
        Err(failure) => {
            log::warn!("{}: FAILED ({})", stage.label(), failure.errors.join("; "));
            progress(stage, StageState::Failed)?;
            Ok(Err(PipelineOutcome::Aborted {
                stage,
                title: failure.title,
                errors: failure.errors,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collaborators, Behavior};
    use crate::{ReportingTarget, VirtType};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn model(dir: &Path) -> ConfigModel {
        let mut model = ConfigModel::new(dir);
        model.config_name = "lab1".to_string();
        model.reporting_target = Some(ReportingTarget::Satellite6);
        model.rhsm_hostname = "satellite.example.com".to_string();
        model.rhsm_username = "admin".to_string();
        model.rhsm_password = "changeme".to_string();
        model.virt_type = Some(VirtType::Esx);
        model.server = "https://h.example.com".to_string();
        model.username = "root".to_string();
        model.password = "virt-secret".to_string();
        model.env = "Library".to_string();
        model.owner = "ACME".to_string();
        model
    }

    fn run(model: &mut ConfigModel, collab: &Collaborators) -> (PipelineOutcome, Vec<(Stage, StageState)>) {
        let mut seen = Vec::new();
        let outcome = CommitPipeline::new(collab)
            .run(model, &mut |stage, state| {
                seen.push((stage, state));
                Ok(())
            })
            .unwrap();
        (outcome, seen)
    }

    #[test]
    fn test_happy_path() {
        let dir = tempdir().unwrap();
        let (collab, calls) = collaborators(dir.path(), Behavior::default());
        let mut model = model(dir.path());

        let (outcome, seen) = run(&mut model, &collab);
        let path = dir.path().join("lab1.conf");
        assert_eq!(outcome, PipelineOutcome::Completed { path: path.clone() });

        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("[lab1]\n"));
        for line in ["type=esx", "server=https://h.example.com", "env=Library", "owner=ACME", "sm_type=sam"] {
            assert!(content.contains(line), "{}", line);
        }
        assert!(!content.contains("virt-secret"));
        assert!(content.contains("encrypted_password="));

        assert_eq!(
            *calls.borrow(),
            vec!["connect", "logout", "probe lab1", "start", "enable"]
        );
        let passed: Vec<_> = seen
            .iter()
            .filter(|(_, s)| *s == StageState::Passed)
            .map(|(stage, _)| *stage)
            .collect();
        assert_eq!(passed, Stage::ALL.to_vec());
    }

    #[test]
    fn test_reporting_target_failure_aborts() {
        let dir = tempdir().unwrap();
        let behavior = Behavior {
            connect_error: Some("401 Unauthorized".into()),
            ..Default::default()
        };
        let (collab, calls) = collaborators(dir.path(), behavior);
        let mut model = model(dir.path());

        let (outcome, seen) = run(&mut model, &collab);
        match outcome {
            PipelineOutcome::Aborted { stage, title, errors } => {
                assert_eq!(stage, Stage::ConnectReportingTarget);
                assert_eq!(title, "Failed to connect to 'Red Hat Satellite 6' server");
                assert_eq!(errors, vec!["401 Unauthorized".to_string()]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(*calls.borrow(), vec!["connect"]);
        assert!(!dir.path().join("lab1.conf").exists());
        assert_eq!(
            seen.last(),
            Some(&(Stage::ConnectReportingTarget, StageState::Failed))
        );
    }

    #[test]
    fn test_hypervisor_failure_aborts_before_persist() {
        let dir = tempdir().unwrap();
        let behavior = Behavior {
            probe_error: Some("Connection refused".into()),
            ..Default::default()
        };
        let (collab, calls) = collaborators(dir.path(), behavior);
        let mut model = model(dir.path());

        let (outcome, _) = run(&mut model, &collab);
        let PipelineOutcome::Aborted { stage, title, errors } = outcome else {
            panic!("pipeline should abort");
        };
        assert_eq!(stage, Stage::ConnectHypervisor);
        assert_eq!(title, "Failed to connect to 'ESX' server");
        assert_eq!(errors[0], crate::connector::PORT_HINT);
        assert!(!calls.borrow().contains(&"start".to_string()));
        assert!(!dir.path().join("lab1.conf").exists());
    }

    #[test]
    fn test_key_store_failure_aborts_first_stage() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let (mut collab, calls) = collaborators(dir.path(), Behavior::default());
        collab.keys = KeyStore::new(blocker.join("key"));
        let mut model = model(dir.path());

        let (outcome, _) = run(&mut model, &collab);
        let PipelineOutcome::Aborted { stage, title, .. } = outcome else {
            panic!("pipeline should abort");
        };
        assert_eq!(stage, Stage::Configure);
        assert_eq!(title, "Failed to encrypt password.");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_bad_server_address_aborts_instead_of_failing() {
        let dir = tempdir().unwrap();
        let (mut collab, calls) = collaborators(dir.path(), Behavior::default());
        let mut settings = Settings::default();
        settings.paths.rhsm_conf = dir.path().join("rhsm.conf");
        settings.paths.rhsm_ca_dir = dir.path().join("ca");
        settings.paths.consumer_dir = dir.path().join("consumer");
        collab.connectors = Box::new(RemoteConnectors::new(&settings));
        let mut model = model(dir.path());
        model.rhsm_hostname = "sat6.example.com:8443".to_string();

        let (outcome, _) = run(&mut model, &collab);
        let PipelineOutcome::Aborted { stage, errors, .. } = outcome else {
            panic!("pipeline should abort");
        };
        assert_eq!(stage, Stage::ConnectReportingTarget);
        assert!(errors[0].contains("Invalid server address"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_persist_failure() {
        let dir = tempdir().unwrap();
        let (collab, calls) = collaborators(dir.path(), Behavior::default());
        let mut model = model(&dir.path().join("missing"));

        let (outcome, _) = run(&mut model, &collab);
        let PipelineOutcome::Aborted { stage, title, .. } = outcome else {
            panic!("pipeline should abort");
        };
        assert_eq!(stage, Stage::Persist);
        assert!(title.contains("lab1.conf"));
        assert_eq!(*calls.borrow(), vec!["connect", "logout", "probe lab1"]);
    }

    #[test]
    fn test_service_start_failure_skips_enable() {
        let dir = tempdir().unwrap();
        let behavior = Behavior {
            start_error: Some("Unit virt-who.service not found.".into()),
            ..Default::default()
        };
        let (collab, calls) = collaborators(dir.path(), behavior);
        let mut model = model(dir.path());

        let (outcome, _) = run(&mut model, &collab);
        let PipelineOutcome::Aborted { stage, title, errors } = outcome else {
            panic!("pipeline should abort");
        };
        assert_eq!(stage, Stage::StartService);
        assert_eq!(title, "Failed to start virt-who service");
        assert!(errors[0].contains("not found"));
        assert_eq!(calls.borrow().last().map(String::as_str), Some("start"));
        assert!(dir.path().join("lab1.conf").exists());
    }

    #[test]
    fn test_progress_errors_propagate() {
        let dir = tempdir().unwrap();
        let (collab, _) = collaborators(dir.path(), Behavior::default());
        let mut model = model(dir.path());

        let result = CommitPipeline::new(&collab).run(&mut model, &mut |_, _| {
            Err(Error::unexpected("terminal went away"))
        });
        assert!(matches!(result, Err(Error::Unexpected(_))));
    }
}
