//! Virt-who TUI
//!
//! Terminal wizard that walks an administrator through writing a virt-who
//! configuration, tests it against the reporting target and the hypervisor,
//! and starts the virt-who service.

mod app;
mod logging;
mod views;

use anyhow::{Context, Result};
use app::VirtWhoTuiApp;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use virt_who_tui_core::settings::DEFAULT_SETTINGS_PATH;
use virt_who_tui_core::{registration, Collaborators, ConfigModel, Settings, WizardController};

const ROOT_REQUIRED: &str = "This application requires root permission. Please run it as root.";

#[derive(Parser, Debug)]
#[command(name = "virt-who-tui", version, about = "Configure virt-who step by step")]
struct Cli {
    /// Settings file for the wizard itself
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Directory the virt-who configuration is written to
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run without root, for development
    #[arg(long)]
    skip_root_check: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.skip_root_check && uzers::get_effective_uid() != 0 {
        eprintln!("{}", ROOT_REQUIRED);
        return ExitCode::from(1);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Virt-who TUI failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load_or_default(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;
    if let Some(dir) = cli.config_dir {
        settings.paths.config_dir = dir;
    }
    if let Some(file) = cli.log_file {
        settings.paths.log_file = file;
    }
    settings.validate().context("Invalid settings")?;

    logging::initialize(&settings.paths.log_file)?;
    log::info!("Virt-who TUI {} starting", env!("CARGO_PKG_VERSION"));

    let host = registration::detect();
    log::info!("Host registered: {}", host.is_registered());

    let model = ConfigModel::new(&settings.paths.config_dir);
    let controller = WizardController::new(model, host);
    let collaborators = Collaborators::from_settings(&settings);
    let mut app = VirtWhoTuiApp::new(controller, collaborators);

    let mut terminal = app::setup_terminal()?;
    let result = app.run(&mut terminal);
    app::restore_terminal(&mut terminal)?;
    result
}
