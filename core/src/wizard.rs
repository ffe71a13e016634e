//! Page graph and the controller that walks it
//!
//! The controller owns the [`ConfigModel`] and a stack of rendered pages. The
//! top of the stack is the current page; everything below it is kept alive so
//! "Back" shows exactly what was on screen before, without re-validating.
//! Field edits live in the page until the operator advances, at which point
//! they are collected into the model and checked.

use crate::connector::run_guarded;
use crate::pipeline::{Collaborators, CommitPipeline, PipelineOutcome, Stage, StageState};
use crate::{
    ConfigModel, Error, FieldId, FieldValue, HostFacts, HypervisorId, ReportingTarget, Result,
    RhsmSettingsSource, SmType, VirtType,
};

/// Shown in the owner field while the organization is looked up.
pub const FETCHING: &str = "Fetching...";

/// Identity of every page in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Welcome,
    ReportingTargetChoice,
    ReportingTargetDetailQuestion,
    ReportingTargetDetail,
    HypervisorChoice,
    HypervisorDetail,
    Commit,
}

/// The page that follows `kind`, given what has been collected so far.
pub fn next_page(kind: PageKind, model: &ConfigModel) -> Option<PageKind> {
    match kind {
        PageKind::Welcome => Some(PageKind::ReportingTargetChoice),
        PageKind::ReportingTargetChoice => match model.sm_type() {
            Some(SmType::Satellite5) => Some(PageKind::ReportingTargetDetail),
            _ => Some(PageKind::ReportingTargetDetailQuestion),
        },
        PageKind::ReportingTargetDetailQuestion => match model.rhsm_source {
            RhsmSettingsSource::Host => Some(PageKind::HypervisorChoice),
            RhsmSettingsSource::Custom => Some(PageKind::ReportingTargetDetail),
        },
        PageKind::ReportingTargetDetail => Some(PageKind::HypervisorChoice),
        PageKind::HypervisorChoice => Some(PageKind::HypervisorDetail),
        PageKind::HypervisorDetail => Some(PageKind::Commit),
        PageKind::Commit => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Password,
    Check,
    Radio(Vec<String>),
    /// Read-only caption without a value.
    Label,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub id: Option<FieldId>,
    pub kind: FieldKind,
    pub label: String,
    pub help: Option<String>,
}

impl FieldSpec {
    fn new(id: FieldId, kind: FieldKind, label: &str) -> Self {
        Self {
            id: Some(id),
            kind,
            label: label.to_string(),
            help: None,
        }
    }

    fn radio(id: FieldId, label: &str, options: &[&str]) -> Self {
        let options = options.iter().map(|o| o.to_string()).collect();
        Self::new(id, FieldKind::Radio(options), label)
    }

    fn caption(label: &str) -> Self {
        Self {
            id: None,
            kind: FieldKind::Label,
            label: label.to_string(),
            help: None,
        }
    }

    fn help(mut self, help: Option<&str>) -> Self {
        self.help = help.map(str::to_string);
        self
    }

    pub fn is_editable(&self) -> bool {
        self.kind != FieldKind::Label
    }
}

/// Work a page does right after it is first shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    FetchOwner,
    RunCommit,
}

/// One rendered step of the wizard with its in-progress edits.
#[derive(Debug, Clone)]
pub struct Page {
    pub kind: PageKind,
    pub title: String,
    pub text: String,
    pub fields: Vec<FieldSpec>,
    /// Parallel to `fields`.
    pub values: Vec<FieldValue>,
    pub stages: Vec<(Stage, StageState)>,
    pub next_label: &'static str,
    deferred: Option<Deferred>,
}

impl Page {
    fn new(kind: PageKind, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            text: text.into(),
            fields: Vec::new(),
            values: Vec::new(),
            stages: Vec::new(),
            next_label: "Next",
            deferred: None,
        }
    }

    fn with_field(mut self, spec: FieldSpec, value: FieldValue) -> Self {
        self.fields.push(spec);
        self.values.push(value);
        self
    }

    /// Field prefilled from the model.
    fn with_model_field(self, spec: FieldSpec, model: &ConfigModel) -> Self {
        let value = match spec.id {
            Some(id) => model.field(id),
            None => FieldValue::text(""),
        };
        self.with_field(spec, value)
    }

    /// Build `kind` against the current model state.
    pub fn build(kind: PageKind, model: &ConfigModel, host: &HostFacts) -> Self {
        match kind {
            PageKind::Welcome => Page::new(
                kind,
                "Welcome to Virt-who TUI",
                "Virt-who TUI aims to simplify the complexity of setting up virt-who by guiding users step by step.\n\n\
                 Please enter a name for your configuration. It can be any name that is meaningful to you, \
                 such as 'redhat_rhevm_library'.",
            )
            .with_model_field(FieldSpec::new(FieldId::ConfigName, FieldKind::Text, "Name"), model),

            PageKind::ReportingTargetChoice => {
                let selected = model.reporting_target.unwrap_or_default();
                Page::new(kind, "Subscription Service", "Where does your Virt-who report to?").with_field(
                    FieldSpec::radio(FieldId::ReportingTarget, "Report to", &ReportingTarget::LABELS),
                    FieldValue::choice(selected.display_name()),
                )
            }

            PageKind::ReportingTargetDetailQuestion => {
                let label = model.reporting_target_label();
                let (text, source) = if host.is_registered() {
                    (
                        format!(
                            "This host is registered to a subscription service. Virt-who can report to \
                             {} with the same settings, or you can enter different ones.",
                            label
                        ),
                        model.rhsm_source,
                    )
                } else {
                    (
                        format!(
                            "This host is not registered. Please enter the settings virt-who should use \
                             to reach {}.",
                            label
                        ),
                        RhsmSettingsSource::Custom,
                    )
                };
                Page::new(kind, format!("{} Settings", label), text).with_field(
                    FieldSpec::radio(FieldId::RhsmSource, "Settings", &RhsmSettingsSource::LABELS),
                    FieldValue::choice(source.display_name()),
                )
            }

            PageKind::ReportingTargetDetail => {
                let page = Page::new(
                    kind,
                    format!("{} Information", model.reporting_target_label()),
                    "",
                );
                let specs = if model.sm_type() == Some(SmType::Satellite5) {
                    vec![
                        FieldSpec::new(FieldId::SatServer, FieldKind::Text, "Server")
                            .help(Some("e.g. https://satellite.example.com")),
                        FieldSpec::new(FieldId::SatUsername, FieldKind::Text, "Username"),
                        FieldSpec::new(FieldId::SatPassword, FieldKind::Password, "Password"),
                        FieldSpec::new(FieldId::SatEncryptPass, FieldKind::Check, "Encrypt Password?"),
                    ]
                } else {
                    vec![
                        FieldSpec::new(FieldId::RhsmHostname, FieldKind::Text, "Hostname"),
                        FieldSpec::new(FieldId::RhsmPrefix, FieldKind::Text, "Prefix")
                            .help(Some("e.g. /rhsm")),
                        FieldSpec::new(FieldId::RhsmPort, FieldKind::Text, "Port").help(Some("e.g. 443")),
                        FieldSpec::new(FieldId::RhsmUsername, FieldKind::Text, "Username"),
                        FieldSpec::new(FieldId::RhsmPassword, FieldKind::Password, "Password"),
                        FieldSpec::new(FieldId::RhsmProxyHostname, FieldKind::Text, "Proxy Hostname"),
                        FieldSpec::new(FieldId::RhsmProxyPort, FieldKind::Text, "Proxy Port"),
                        FieldSpec::new(FieldId::RhsmProxyUser, FieldKind::Text, "Proxy Username"),
                        FieldSpec::new(FieldId::RhsmProxyPassword, FieldKind::Password, "Proxy Password"),
                        FieldSpec::new(FieldId::RhsmEncryptPass, FieldKind::Check, "Encrypt Password?"),
                    ]
                };
                specs
                    .into_iter()
                    .fold(page, |page, spec| page.with_model_field(spec, model))
            }

            PageKind::HypervisorChoice => Page::new(
                kind,
                "Hypervisor Backend",
                "Choose a hypervisor backend that should be used to gather host/guest associations:",
            )
            .with_model_field(
                FieldSpec::radio(FieldId::VirtType, "Backend", &VirtType::LABELS),
                model,
            ),

            PageKind::HypervisorDetail => Self::hypervisor_detail(model, host),

            PageKind::Commit => {
                let mut page = Page::new(kind, "Virt-who TUI", "Processing...");
                page.deferred = Some(Deferred::RunCommit);
                page
            }
        }
    }

    fn hypervisor_detail(model: &ConfigModel, host: &HostFacts) -> Self {
        let virt_type = model.virt_type.unwrap_or(VirtType::Libvirt);
        let mut page = Page::new(
            PageKind::HypervisorDetail,
            format!("{} Information", model.virt_type_label()),
            "",
        );
        page.next_label = "Submit";

        if should_fetch_owner(model, host) {
            page = page.with_field(
                FieldSpec::new(FieldId::Owner, FieldKind::Text, "Organization"),
                FieldValue::text(FETCHING),
            );
            page.deferred = Some(Deferred::FetchOwner);
        } else {
            page = page.with_model_field(
                FieldSpec::new(FieldId::Owner, FieldKind::Text, "Organization").help(Some(
                    "Can be retrieved by executing 'subscription-manager orgs' command. e.g. 1234567",
                )),
                model,
            );
        }

        page.with_model_field(
            FieldSpec::new(FieldId::Env, FieldKind::Text, "Environment").help(Some("e.g. Library")),
            model,
        )
        .with_model_field(
            FieldSpec::new(FieldId::Server, FieldKind::Text, "Server").help(virt_type.server_help()),
            model,
        )
        .with_model_field(
            FieldSpec::new(FieldId::Username, FieldKind::Text, "Username").help(virt_type.username_help()),
            model,
        )
        .with_model_field(FieldSpec::new(FieldId::Password, FieldKind::Password, "Password"), model)
        .with_model_field(FieldSpec::caption("How will the hypervisor(s) be identified?"), model)
        .with_model_field(
            FieldSpec::radio(FieldId::HypervisorId, "Identified by", &HypervisorId::LABELS),
            model,
        )
        .with_model_field(
            FieldSpec::new(FieldId::EncryptPass, FieldKind::Check, "Encrypt Password?"),
            model,
        )
    }

    pub fn deferred(&self) -> Option<Deferred> {
        self.deferred
    }

    fn index_of(&self, id: FieldId) -> Option<usize> {
        self.fields.iter().position(|f| f.id == Some(id))
    }

    pub fn value(&self, id: FieldId) -> Option<&FieldValue> {
        self.index_of(id).map(|i| &self.values[i])
    }

    pub fn set_value(&mut self, id: FieldId, value: FieldValue) {
        if let Some(i) = self.index_of(id) {
            self.values[i] = value;
        }
    }

    // ==================== Editing ====================

    pub fn push_char(&mut self, index: usize, c: char) {
        if let Some(FieldValue::Text(text)) = self.values.get_mut(index) {
            text.push(c);
        }
    }

    pub fn pop_char(&mut self, index: usize) {
        if let Some(FieldValue::Text(text)) = self.values.get_mut(index) {
            text.pop();
        }
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(FieldValue::Flag(flag)) = self.values.get_mut(index) {
            *flag = !*flag;
        }
    }

    /// Move a radio selection one option forward or back.
    pub fn cycle(&mut self, index: usize, forward: bool) {
        let Some(FieldKind::Radio(options)) = self.fields.get(index).map(|f| &f.kind) else {
            return;
        };
        if options.is_empty() {
            return;
        }
        let Some(FieldValue::Choice(selected)) = self.values.get_mut(index) else {
            return;
        };
        let current = selected
            .as_ref()
            .and_then(|s| options.iter().position(|o| o == s));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => options.len() - 1,
            (Some(i), true) => (i + 1) % options.len(),
            (Some(i), false) => (i + options.len() - 1) % options.len(),
        };
        *selected = Some(options[next].clone());
    }
}

/// Whether the hypervisor page should look up the organization itself.
///
/// Only possible when reporting with the settings this host is registered
/// with; a custom server may not know this host at all.
fn should_fetch_owner(model: &ConfigModel, host: &HostFacts) -> bool {
    model.sm_type() == Some(SmType::SubscriptionManager)
        && model.rhsm_hostname.is_empty()
        && host.is_registered()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupStyle {
    Error,
    Pass,
}

/// Action taken when a Yes/No popup is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    ReplaceExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupButtons {
    Ok,
    YesNo(ConfirmAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub lines: Vec<String>,
    pub style: PopupStyle,
    pub buttons: PopupButtons,
}

impl Popup {
    pub fn error(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
            style: PopupStyle::Error,
            buttons: PopupButtons::Ok,
        }
    }

    pub fn pass(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
            style: PopupStyle::Pass,
            buttons: PopupButtons::Ok,
        }
    }
}

/// Result of validating the current page.
enum Gate {
    Open,
    Confirm(Popup),
}

/// Walks the page graph for one wizard run.
pub struct WizardController {
    model: ConfigModel,
    host: HostFacts,
    pages: Vec<Page>,
    popup: Option<Popup>,
    quit: bool,
}

impl WizardController {
    pub fn new(model: ConfigModel, host: HostFacts) -> Self {
        let welcome = Page::build(PageKind::Welcome, &model, &host);
        Self {
            model,
            host,
            pages: vec![welcome],
            popup: None,
            quit: false,
        }
    }

    pub fn model(&self) -> &ConfigModel {
        &self.model
    }

    pub fn page(&self) -> &Page {
        // The stack starts with the welcome page and never pops below it.
        &self.pages[self.pages.len() - 1]
    }

    pub fn page_mut(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn can_go_back(&self) -> bool {
        self.pages.len() > 1 && self.page().kind != PageKind::Commit
    }

    pub fn has_next(&self) -> bool {
        next_page(self.page().kind, &self.model).is_some()
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Collect the current page, validate it and move on.
    ///
    /// Validation failures become a popup; only unexpected errors are returned.
    pub fn advance(&mut self) -> Result<()> {
        if self.popup.is_some() || !self.has_next() {
            return Ok(());
        }

        match self.collect_and_validate() {
            Ok(Gate::Open) => self.push_next(),
            Ok(Gate::Confirm(popup)) => self.popup = Some(popup),
            Err(Error::InvalidOption(msg)) => {
                log::debug!("Validation failed on {:?}: {}", self.page().kind, msg);
                self.popup = Some(Popup::error("Failed with following errors:", vec![msg]));
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Drop the current page and its unsaved edits.
    pub fn go_back(&mut self) {
        if self.popup.is_none() && self.can_go_back() {
            self.pages.pop();
        }
    }

    /// OK or Yes on the popup.
    pub fn confirm_popup(&mut self) {
        if let Some(popup) = self.popup.take() {
            match popup.buttons {
                PopupButtons::YesNo(ConfirmAction::ReplaceExisting) => self.push_next(),
                PopupButtons::Ok => {}
            }
        }
    }

    /// No, or Esc.
    pub fn dismiss_popup(&mut self) {
        self.popup = None;
    }

    fn collect_and_validate(&mut self) -> Result<Gate> {
        let page = &self.pages[self.pages.len() - 1];
        for (spec, value) in page.fields.iter().zip(&page.values) {
            if let Some(id) = spec.id {
                self.model.set_field(id, value.clone())?;
            }
        }

        let model = &mut self.model;
        match page.kind {
            PageKind::Welcome => {
                model.validate_config_name()?;
                let path = model.compute_destination_path();
                if path.exists() {
                    return Ok(Gate::Confirm(Popup {
                        title: "Warning".to_string(),
                        lines: vec![format!(
                            "A configuration with the same name already exists in {}. \
                             Are you sure you want to REPLACE it?",
                            path.display()
                        )],
                        style: PopupStyle::Error,
                        buttons: PopupButtons::YesNo(ConfirmAction::ReplaceExisting),
                    }));
                }
            }
            PageKind::ReportingTargetChoice => model.validate_reporting_target_selected()?,
            PageKind::ReportingTargetDetailQuestion => {
                if model.rhsm_source == RhsmSettingsSource::Host {
                    model.clear_subscription_manager_fields();
                }
            }
            PageKind::ReportingTargetDetail => {
                model.validate_subscription_manager_config()?;
                model.validate_satellite5_config()?;
                if model.sm_type() == Some(SmType::SubscriptionManager) {
                    model.validate_integer(FieldId::RhsmPort)?;
                    model.validate_integer(FieldId::RhsmProxyPort)?;
                }
            }
            PageKind::HypervisorChoice => model.validate_hypervisor_type()?,
            PageKind::HypervisorDetail => model.validate_hypervisor_config()?,
            PageKind::Commit => {}
        }
        Ok(Gate::Open)
    }

    fn push_next(&mut self) {
        if let Some(kind) = next_page(self.page().kind, &self.model) {
            log::debug!("Showing page {:?}", kind);
            let page = Page::build(kind, &self.model, &self.host);
            self.pages.push(page);
        }
    }

    /// Run the current page's deferred work, if it has any left.
    ///
    /// `refresh` redraws the page while the work is in progress.
    pub fn run_deferred(
        &mut self,
        collaborators: &Collaborators,
        refresh: &mut dyn FnMut(&Page) -> Result<()>,
    ) -> Result<()> {
        let Some(deferred) = self.page_mut().deferred.take() else {
            return Ok(());
        };
        match deferred {
            Deferred::FetchOwner => self.fetch_owner(collaborators),
            Deferred::RunCommit => self.commit(collaborators, refresh),
        }
    }

    fn fetch_owner(&mut self, collaborators: &Collaborators) -> Result<()> {
        let Some(uuid) = self.host.consumer_uuid.clone() else {
            return Ok(());
        };

        let mut connector = collaborators.connectors.reporting_target(&self.model)?;
        let mut owner = None;
        let errors = run_guarded(|| {
            connector.connect()?;
            owner = connector.owner(&uuid)?;
            connector.logout()
        })?;

        match owner {
            Some(owner) => {
                log::info!("Organization of this host is '{}'", owner);
                self.page_mut().set_value(FieldId::Owner, FieldValue::text(&owner));
                self.model.owner = owner;
            }
            None => self.page_mut().set_value(FieldId::Owner, FieldValue::text("")),
        }
        if !errors.is_empty() {
            self.popup = Some(Popup::error("Failed to get Organization", errors));
        }
        Ok(())
    }

    fn commit(
        &mut self,
        collaborators: &Collaborators,
        refresh: &mut dyn FnMut(&Page) -> Result<()>,
    ) -> Result<()> {
        let last = self.pages.len() - 1;
        let page = &mut self.pages[last];
        refresh(&*page)?;

        let outcome = CommitPipeline::new(collaborators).run(&mut self.model, &mut |stage, state| {
            match page.stages.iter_mut().find(|(s, _)| *s == stage) {
                Some(entry) => entry.1 = state,
                None => page.stages.push((stage, state)),
            }
            refresh(&*page)
        })?;

        self.popup = Some(match outcome {
            PipelineOutcome::Completed { .. } => Popup::pass(
                "Congratulations!!!",
                vec![
                    format!(
                        "Virt-who configuration has been completed successfully. \
                         Please check the virt-who log in '{}' for more information.",
                        collaborators.agent_log.display()
                    ),
                    "Press 'Quit' button to exit this application".to_string(),
                ],
            ),
            PipelineOutcome::Aborted { title, errors, .. } => Popup::error(title, errors),
        });
        Ok(())
    }
}
