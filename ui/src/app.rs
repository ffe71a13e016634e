//! Application state and event loop for the terminal wizard

use crate::views::{self, Chrome};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::Duration;
use virt_who_tui_core::wizard::FieldKind;
use virt_who_tui_core::{Collaborators, PageKind, PopupButtons, WizardController};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Back,
    Next,
    Quit,
}

/// What keyboard input currently goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Field(usize),
    Button(Button),
}

pub fn setup_terminal() -> Result<Tui> {
    install_panic_hook();
    enable_raw_mode()?;
    let mut out = stdout();
    out.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

/// Leave raw mode and the alternate screen before a panic message is printed.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Best effort: the terminal may already be gone.
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
        previous(info);
    }));
}

pub fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub struct VirtWhoTuiApp {
    controller: WizardController,
    collaborators: Collaborators,
    focus: Focus,
    popup_yes: bool,
    shown: PageKind,
}

impl VirtWhoTuiApp {
    pub fn new(controller: WizardController, collaborators: Collaborators) -> Self {
        let shown = controller.page().kind;
        let mut app = Self {
            controller,
            collaborators,
            focus: Focus::Button(Button::Quit),
            popup_yes: false,
            shown,
        };
        app.reset_focus();
        app
    }

    pub fn run(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.controller.should_quit() {
            self.draw(terminal)?;

            if self.controller.popup().is_none() && self.controller.page().deferred().is_some() {
                self.run_deferred(terminal)?;
                continue;
            }

            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key)?;
                    }
                }
            }
        }
        log::info!("Wizard closed");
        Ok(())
    }

    fn chrome(&self) -> Chrome {
        Chrome {
            focus: self.focus,
            back: self.controller.can_go_back(),
            next: self.controller.has_next(),
        }
    }

    fn draw(&self, terminal: &mut Tui) -> Result<()> {
        let chrome = self.chrome();
        let popup = self.controller.popup().map(|p| (p, self.popup_yes));
        terminal.draw(|f| views::draw(f, self.controller.page(), &chrome, popup))?;
        Ok(())
    }

    fn run_deferred(&mut self, terminal: &mut Tui) -> Result<()> {
        let chrome = Chrome {
            focus: self.focus,
            back: false,
            next: false,
        };
        let collaborators = &self.collaborators;
        self.controller.run_deferred(collaborators, &mut |page| {
            terminal.draw(|f| views::draw(f, page, &chrome, None))?;
            Ok(())
        })?;
        self.sync_page();
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.controller.request_quit();
            return Ok(());
        }

        if let Some(popup) = self.controller.popup() {
            let yes_no = matches!(popup.buttons, PopupButtons::YesNo(_));
            match key.code {
                KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab if yes_no => {
                    self.popup_yes = !self.popup_yes;
                }
                KeyCode::Enter | KeyCode::Char(' ') => {
                    if yes_no && !self.popup_yes {
                        self.controller.dismiss_popup();
                    } else {
                        self.controller.confirm_popup();
                    }
                    self.popup_yes = false;
                }
                KeyCode::Esc => {
                    self.controller.dismiss_popup();
                    self.popup_yes = false;
                }
                _ => {}
            }
            self.sync_page();
            return Ok(());
        }

        match key.code {
            KeyCode::Tab | KeyCode::Down => self.move_focus(true),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
            _ => match self.focus {
                Focus::Field(index) => self.edit_field(index, key),
                Focus::Button(button) => match key.code {
                    KeyCode::Right => self.move_focus(true),
                    KeyCode::Left => self.move_focus(false),
                    KeyCode::Enter | KeyCode::Char(' ') => self.press(button)?,
                    _ => {}
                },
            },
        }
        Ok(())
    }

    fn edit_field(&mut self, index: usize, key: KeyEvent) {
        let Some(kind) = self.controller.page().fields.get(index).map(|f| f.kind.clone()) else {
            return;
        };
        if key.code == KeyCode::Enter && kind != FieldKind::Check {
            self.move_focus(true);
            return;
        }
        let page = self.controller.page_mut();
        match (kind, key.code) {
            (FieldKind::Text | FieldKind::Password, KeyCode::Char(c)) => page.push_char(index, c),
            (FieldKind::Text | FieldKind::Password, KeyCode::Backspace) => page.pop_char(index),
            (FieldKind::Check, KeyCode::Char(' ') | KeyCode::Enter) => page.toggle(index),
            (FieldKind::Radio(_), KeyCode::Right | KeyCode::Char(' ')) => page.cycle(index, true),
            (FieldKind::Radio(_), KeyCode::Left) => page.cycle(index, false),
            _ => {}
        }
    }

    fn press(&mut self, button: Button) -> Result<()> {
        match button {
            Button::Back => self.controller.go_back(),
            Button::Next => self.controller.advance()?,
            Button::Quit => self.controller.request_quit(),
        }
        self.sync_page();
        Ok(())
    }

    /// Focus targets of the current page in Tab order.
    fn targets(&self) -> Vec<Focus> {
        let mut targets: Vec<Focus> = self
            .controller
            .page()
            .fields
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.is_editable())
            .map(|(index, _)| Focus::Field(index))
            .collect();
        if self.controller.can_go_back() {
            targets.push(Focus::Button(Button::Back));
        }
        if self.controller.has_next() {
            targets.push(Focus::Button(Button::Next));
        }
        targets.push(Focus::Button(Button::Quit));
        targets
    }

    fn move_focus(&mut self, forward: bool) {
        let targets = self.targets();
        let current = targets.iter().position(|t| *t == self.focus).unwrap_or(0);
        let len = targets.len();
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.focus = targets[next];
    }

    fn reset_focus(&mut self) {
        let targets = self.targets();
        self.focus = targets
            .iter()
            .copied()
            .find(|t| matches!(t, Focus::Field(_)))
            .or_else(|| {
                targets
                    .iter()
                    .copied()
                    .find(|t| *t == Focus::Button(Button::Next))
            })
            .unwrap_or(Focus::Button(Button::Quit));
    }

    /// Refocus after the page changed underneath us.
    fn sync_page(&mut self) {
        let kind = self.controller.page().kind;
        if kind != self.shown || !self.targets().contains(&self.focus) {
            self.shown = kind;
            self.reset_focus();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use std::path::Path;
    use tempfile::TempDir;
    use virt_who_tui_core::{ConfigModel, HostFacts, Settings};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn app(dir: &Path) -> VirtWhoTuiApp {
        let model = ConfigModel::new(dir);
        let controller = WizardController::new(model, HostFacts::default());
        let collaborators = Collaborators::from_settings(&Settings::default());
        VirtWhoTuiApp::new(controller, collaborators)
    }

    fn type_text(app: &mut VirtWhoTuiApp, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).unwrap();
        }
    }

    #[test]
    fn test_welcome_focuses_config_name() {
        let dir = TempDir::new().unwrap();
        let app = app(dir.path());
        assert!(matches!(app.focus, Focus::Field(_)));
        assert_eq!(app.controller.page().kind, PageKind::Welcome);
    }

    #[test]
    fn test_tab_cycles_through_buttons() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path());
        app.handle_key(key(KeyCode::Tab)).unwrap();
        assert_eq!(app.focus, Focus::Button(Button::Next));
        app.handle_key(key(KeyCode::Tab)).unwrap();
        assert_eq!(app.focus, Focus::Button(Button::Quit));
        app.handle_key(key(KeyCode::Tab)).unwrap();
        assert!(matches!(app.focus, Focus::Field(_)));
        app.handle_key(key(KeyCode::BackTab)).unwrap();
        assert_eq!(app.focus, Focus::Button(Button::Quit));
    }

    #[test]
    fn test_empty_name_shows_error_popup() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path());
        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        let popup = app.controller.popup().unwrap();
        assert_eq!(popup.title, "Failed with following errors:");

        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert!(app.controller.popup().is_none());
        assert_eq!(app.controller.page().kind, PageKind::Welcome);
    }

    #[test]
    fn test_typing_name_and_advancing() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path());
        type_text(&mut app, "lab-esx");
        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();

        assert!(app.controller.popup().is_none());
        assert_eq!(app.controller.page().kind, PageKind::ReportingTargetChoice);
        assert!(matches!(app.focus, Focus::Field(_)));
    }

    #[test]
    fn test_existing_config_asks_before_replacing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("lab.conf"), "[lab]\n").unwrap();
        let mut app = app(dir.path());
        type_text(&mut app, "lab");
        app.handle_key(key(KeyCode::Tab)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert!(matches!(
            app.controller.popup().map(|p| &p.buttons),
            Some(PopupButtons::YesNo(_))
        ));

        // No is the default choice.
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.controller.page().kind, PageKind::Welcome);

        app.handle_key(key(KeyCode::Enter)).unwrap();
        app.handle_key(key(KeyCode::Left)).unwrap();
        app.handle_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.controller.page().kind, PageKind::ReportingTargetChoice);
    }

    #[test]
    fn test_panic_hook_chains_previous_hook() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let reported = Arc::new(AtomicBool::new(false));
        let flag = reported.clone();
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |_| flag.store(true, Ordering::SeqCst)));

        install_panic_hook();
        let result = std::panic::catch_unwind(|| panic!("boom"));

        let _ = std::panic::take_hook();
        std::panic::set_hook(original);
        assert!(result.is_err());
        assert!(reported.load(Ordering::SeqCst));
    }

    #[test]
    fn test_ctrl_c_quits() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path());
        let mut event = key(KeyCode::Char('c'));
        event.modifiers = KeyModifiers::CONTROL;
        app.handle_key(event).unwrap();
        assert!(app.controller.should_quit());
    }
}
