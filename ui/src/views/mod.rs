//! Drawing code for the Virt-who TUI terminal surface

mod page;
mod popup;

use crate::app::{Button, Focus};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use virt_who_tui_core::{Page, Popup};

/// Button row and focus state around a page.
#[derive(Debug, Clone, Copy)]
pub struct Chrome {
    pub focus: Focus,
    pub back: bool,
    pub next: bool,
}

pub fn draw(f: &mut Frame<'_>, page: &Page, chrome: &Chrome, popup: Option<(&Popup, bool)>) {
    let window = centered_window(f.size(), 84, 30);

    let outer = Block::default()
        .borders(Borders::ALL)
        .title(" Virt-who TUI ")
        .title_alignment(Alignment::Center);
    f.render_widget(outer, window);

    let inner = window.inner(&Margin {
        vertical: 1,
        horizontal: 2,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(inner);

    page::draw_page(f, rows[0], page, chrome.focus);
    draw_buttons(f, rows[1], page, chrome);

    if let Some((popup, yes_focused)) = popup {
        popup::draw_popup(f, window, popup, yes_focused);
    }
}

pub fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(40.min(area.width));
    let h = height.min(area.height.saturating_sub(2)).max(12.min(area.height));
    Rect {
        x: area.x + area.width.saturating_sub(w) / 2,
        y: area.y + area.height.saturating_sub(h) / 2,
        width: w,
        height: h,
    }
}

pub fn button_text(label: &str, focused: bool) -> Span<'static> {
    let style = if focused {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    Span::styled(format!("[ {} ]", label), style)
}

fn draw_buttons(f: &mut Frame<'_>, area: Rect, page: &Page, chrome: &Chrome) {
    let mut spans = Vec::new();
    if chrome.back {
        spans.push(button_text("Back", chrome.focus == Focus::Button(Button::Back)));
        spans.push(Span::raw(" "));
    }
    if chrome.next {
        spans.push(button_text(
            page.next_label,
            chrome.focus == Focus::Button(Button::Next),
        ));
        spans.push(Span::raw(" "));
    }
    spans.push(button_text("Quit", chrome.focus == Focus::Button(Button::Quit)));

    let p = Paragraph::new(Text::from(Line::from(spans))).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn title_style() -> Style {
    Style::default()
        .fg(Color::Magenta)
        .add_modifier(Modifier::BOLD)
}
