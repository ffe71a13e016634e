use super::title_style;
use crate::app::Focus;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;
use virt_who_tui_core::field::FieldValue;
use virt_who_tui_core::wizard::FieldKind;
use virt_who_tui_core::{Page, StageState};

const LABEL_WIDTH: usize = 17;
const STAGE_WIDTH: usize = 45;

pub fn draw_page(f: &mut Frame<'_>, area: Rect, page: &Page, focus: Focus) {
    let mut lines = vec![Line::from(Span::styled(page.title.clone(), title_style())), Line::from("")];

    if !page.text.is_empty() {
        for text_line in page.text.lines() {
            lines.push(Line::from(text_line.to_string()));
        }
        lines.push(Line::from(""));
    }

    let mut focus_line = 0;
    for (index, (spec, value)) in page.fields.iter().zip(&page.values).enumerate() {
        let focused = focus == Focus::Field(index);
        if focused {
            focus_line = lines.len();
        }
        field_lines(&mut lines, &spec.label, &spec.kind, value, focused);
        if let Some(help) = &spec.help {
            for help_line in help.lines() {
                lines.push(Line::from(Span::styled(
                    format!("{:width$}  {}", "", help_line, width = LABEL_WIDTH),
                    Style::default().fg(Color::Blue),
                )));
            }
        }
    }

    for (stage, state) in &page.stages {
        let style = match state {
            StageState::Passed => Style::default().fg(Color::Green),
            StageState::Failed => Style::default().fg(Color::Red),
            StageState::Running => Style::default(),
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{:<width$}", stage.label(), width = STAGE_WIDTH)),
            Span::styled(state.marker(), style.add_modifier(Modifier::BOLD)),
        ]));
    }

    // Keep the focused field visible on small terminals.
    let height = area.height as usize;
    let scroll = if height > 0 && focus_line >= height {
        (focus_line + 1 - height) as u16
    } else {
        0
    };

    let p = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(p, area);
}

fn field_lines(
    lines: &mut Vec<Line<'static>>,
    label: &str,
    kind: &FieldKind,
    value: &FieldValue,
    focused: bool,
) {
    let focus_style = if focused {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default().fg(Color::Cyan)
    };

    match (kind, value) {
        (FieldKind::Text, FieldValue::Text(text)) | (FieldKind::Password, FieldValue::Text(text)) => {
            let shown = if *kind == FieldKind::Password {
                "*".repeat(text.chars().count())
            } else {
                text.clone()
            };
            let cursor = if focused { "_" } else { "" };
            lines.push(Line::from(vec![
                Span::raw(format!("{:>width$}: ", label, width = LABEL_WIDTH)),
                Span::styled(format!("[{}{}]", shown, cursor), focus_style),
            ]));
        }
        (FieldKind::Check, FieldValue::Flag(flag)) => {
            let mark = if *flag { "x" } else { " " };
            lines.push(Line::from(vec![
                Span::raw(format!("{:width$}  ", "", width = LABEL_WIDTH)),
                Span::styled(format!("[{}] {}", mark, label), focus_style),
            ]));
        }
        (FieldKind::Radio(options), FieldValue::Choice(selected)) => {
            lines.push(Line::from(format!("{:>width$}:", label, width = LABEL_WIDTH)));
            for option in options {
                let chosen = selected.as_deref() == Some(option.as_str());
                let text = format!("({}) {}", if chosen { "*" } else { " " }, option);
                let style = if chosen { focus_style } else { Style::default() };
                lines.push(Line::from(vec![
                    Span::raw(format!("{:width$}  ", "", width = LABEL_WIDTH)),
                    Span::styled(text, style),
                ]));
            }
        }
        (FieldKind::Label, _) => {
            lines.push(Line::from(""));
            lines.push(Line::from(label.to_string()));
        }
        _ => {
            log::warn!("Field '{}' holds an unexpected value {:?}", label, value);
        }
    }
}
