use super::button_text;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use virt_who_tui_core::{Popup, PopupButtons, PopupStyle};

/// Modal dialog drawn over the page window.
pub fn draw_popup(f: &mut Frame<'_>, window: Rect, popup: &Popup, yes_focused: bool) {
    let modal_w = 70u16.min(window.width.saturating_sub(4)).max(30.min(window.width));
    let body_lines: usize = popup
        .lines
        .iter()
        .map(|l| l.chars().count() / (modal_w.saturating_sub(4).max(1) as usize) + 1)
        .sum();
    let modal_h = (body_lines as u16 + popup.lines.len() as u16 + 4)
        .min(window.height.saturating_sub(2))
        .max(6.min(window.height));
    let area = Rect {
        x: window.x + window.width.saturating_sub(modal_w) / 2,
        y: window.y + window.height.saturating_sub(modal_h) / 2,
        width: modal_w,
        height: modal_h,
    };

    let title_style = match popup.style {
        PopupStyle::Error => Style::default().fg(Color::White).bg(Color::Red),
        PopupStyle::Pass => Style::default().fg(Color::Green),
    }
    .add_modifier(Modifier::BOLD);

    let mut text = Vec::new();
    for line in &popup.lines {
        text.push(Line::from(line.clone()));
        text.push(Line::from(""));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(format!(" {} ", popup.title), title_style));
    let body = Paragraph::new(Text::from(text))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(body, area);

    let buttons_area = Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(2),
        width: area.width.saturating_sub(2),
        height: 1,
    };
    let buttons = match popup.buttons {
        PopupButtons::Ok => vec![button_text("OK", true)],
        PopupButtons::YesNo(_) => vec![
            button_text("Yes", yes_focused),
            Span::raw(" "),
            button_text("No", !yes_focused),
        ],
    };
    let p = Paragraph::new(Text::from(Line::from(buttons))).alignment(Alignment::Right);
    f.render_widget(p, buttons_area);
}
