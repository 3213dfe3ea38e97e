use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::{App, ChatRole, InputMode, Screen, UploadState, WELCOME};
use crate::claim::{format_cny, StageStatus};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Progress => render_progress_screen(app, frame, body_area),
        Screen::Consult => render_consult_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_upload {
        render_upload_overlay(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            " Property Insurance AI Service ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(
            format!(" case {} ", app.case.case_id),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = if app.show_upload {
        " SCAN "
    } else {
        match app.screen {
            Screen::Progress => " CLAIM ",
            Screen::Consult => " AI ",
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<Span> = if app.show_upload {
        match app.upload_state {
            UploadState::Idle => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" scan ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" close ", label_style),
            ],
            UploadState::Scanning => vec![
                Span::styled(" Esc ", key_style),
                Span::styled(" cancel ", label_style),
            ],
            UploadState::Result => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" confirm ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" close ", label_style),
            ],
        }
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Progress, _) => vec![
                Span::styled(" Tab ", key_style),
                Span::styled(" consult ", label_style),
                Span::styled(" u ", key_style),
                Span::styled(" upload ", label_style),
                Span::styled(" a ", key_style),
                Span::styled(" ask AI ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
            (Screen::Consult, InputMode::Normal) => vec![
                Span::styled(" i ", key_style),
                Span::styled(" ask ", label_style),
                Span::styled(" j/k ", key_style),
                Span::styled(" scroll ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" progress ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ],
            (Screen::Consult, InputMode::Editing) => vec![
                Span::styled(" Enter ", key_style),
                Span::styled(" send ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" done ", label_style),
            ],
        }
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_progress_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = None;

    let stepper_height = app.case.stages.len() as u16 + 2;
    let [stepper_area, notice_area, advance_area, hint_area] = Layout::vertical([
        Constraint::Length(stepper_height),
        Constraint::Length(5),
        Constraint::Length(6),
        Constraint::Min(0),
    ])
    .areas(area);

    // Stepper card
    let stepper_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Claim Progress  {} ", app.case.case_id));

    let mut step_lines: Vec<Line> = Vec::new();
    for (idx, stage) in app.case.stages.iter().enumerate() {
        let line = match app.case.stage_status(idx) {
            StageStatus::Completed => Line::from(Span::styled(
                format!(" ✓  {}", stage),
                Style::default().fg(Color::Green),
            )),
            StageStatus::Active => Line::from(Span::styled(
                format!(" ●  {}  (in progress)", stage),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            StageStatus::Pending => Line::from(Span::styled(
                format!(" {}  {}", idx + 1, stage),
                Style::default().fg(Color::DarkGray),
            )),
        };
        step_lines.push(line);
    }

    let stepper = Paragraph::new(Text::from(step_lines)).block(stepper_block);
    frame.render_widget(stepper, stepper_area);

    // On-site survey notice
    let surveyor = &app.case.surveyor;
    let notice_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" On-site Survey ");

    let notice = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("Surveyor arriving within {} minutes", surveyor.eta_minutes),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "Assigned surveyor: {} ({})",
            surveyor.name, surveyor.phone
        )),
        Line::from(Span::styled(
            format!("{:.1} km away", surveyor.distance_km),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(notice_block);
    frame.render_widget(notice, notice_area);

    // Advance payment card
    let advance = &app.case.advance;
    let advance_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Advance Payment ");

    let advance_card = Paragraph::new(vec![
        Line::from(Span::styled(
            format_cny(advance.amount_cny),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!(
            "{}% paid out once the assessment clears",
            advance.percent
        )),
        Line::from(Span::styled(
            format!("Per {}", advance.legal_basis),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(format!("Status: {}", advance.status)),
    ])
    .block(advance_block);
    frame.render_widget(advance_card, advance_area);

    let hint = Paragraph::new("Press u to attach site photos or invoices.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(hint, hint_area);
}

fn render_consult_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store area and dimensions for mouse hit-testing and scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" AI Consultation ({}) ", app.backend.display_name()));

    let mut lines: Vec<Line> = Vec::new();

    // Standing greeting; not part of the session history
    lines.push(assistant_role_line());
    lines.push(Line::from(Span::styled(
        WELCOME,
        Style::default().fg(Color::Gray),
    )));
    lines.push(Line::default());

    for msg in &app.chat_messages {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(msg.content.as_str()));
            }
            ChatRole::Assistant => {
                lines.push(assistant_role_line());
                for line in msg.content.lines() {
                    lines.push(Line::from(line));
                }
                if !msg.citations.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "Verified policy sources:",
                        Style::default().fg(Color::DarkGray),
                    )));
                    for citation in &msg.citations {
                        lines.push(Line::from(Span::styled(
                            format!("  • {}", citation),
                            Style::default().fg(Color::Blue),
                        )));
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if app.thinking {
        lines.push(assistant_role_line());
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize % 3) + 1);
        lines.push(Line::from(Span::styled(
            format!("Searching the policy clause index{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        for section in &app.matched_sources {
            lines.push(Line::from(Span::styled(
                format!("✓ Matched clause: {}", section),
                Style::default().fg(Color::Green),
            )));
        }
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    // Question input at the bottom; highlighted while editing
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(if editing {
            " Ask (Enter to send, Esc to stop editing) "
        } else {
            " Ask (i to edit) "
        });

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.consult_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.consult_input.is_empty() && !editing {
        Paragraph::new("e.g. An elevator fault trapped a resident, is that covered?")
            .style(Style::default().fg(Color::DarkGray))
            .block(input_block)
    } else {
        let visible_text: String = app
            .consult_input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block)
    };
    frame.render_widget(input, input_area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn assistant_role_line() -> Line<'static> {
    Line::from(Span::styled(
        "AI:",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

fn render_upload_overlay(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = 13.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Smart Document Scan ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    match app.upload_state {
        UploadState::Idle => {
            let mut lines = vec![
                Line::default(),
                Line::from(Span::styled(
                    "Press Enter to scan the sample document",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::default(),
                Line::from(Span::styled(
                    "JPG / PNG / PDF supported; fields are checked automatically",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            if let Some(error) = &app.scan_error {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    format!("Recognition failed: {}", error),
                    Style::default().fg(Color::Red),
                )));
            }

            let body = Paragraph::new(Text::from(lines))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(body, inner);
        }
        UploadState::Scanning => {
            // A sweeping line over a blank sheet, teletype style
            let rows = inner.height.saturating_sub(1);
            let bar_row = if rows > 0 { app.animation_frame as u16 % rows } else { 0 };

            let mut lines: Vec<Line> = Vec::new();
            for row in 0..rows {
                if row == bar_row {
                    lines.push(Line::from(Span::styled(
                        "▔".repeat(inner.width as usize),
                        Style::default().fg(Color::Yellow),
                    )));
                } else {
                    lines.push(Line::default());
                }
            }
            lines.push(Line::from(Span::styled(
                "Recognizing document fields...",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )));

            let body = Paragraph::new(Text::from(lines)).alignment(Alignment::Center);
            frame.render_widget(body, inner);
        }
        UploadState::Result => {
            let mut lines = vec![Line::default()];
            if let Some(doc) = &app.recognized {
                lines.push(Line::from(Span::styled(
                    format!("✓ Recognized: {}", doc.document_type),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::default());
                lines.push(Line::from(format!("Invoice amount:  ¥ {:.2}", doc.amount)));
                lines.push(Line::from(format!("Invoice date:    {}", doc.date)));
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(
                "Enter to confirm and submit, Esc to close",
                Style::default().fg(Color::DarkGray),
            )));

            let body = Paragraph::new(Text::from(lines)).alignment(Alignment::Center);
            frame.render_widget(body, inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, ChatMessage};
    use crate::assist::Backend;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn mock_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(tx, Backend::Mock, None)
    }

    #[test]
    fn progress_screen_shows_the_case() {
        let mut app = mock_app();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Claim Progress"));
        assert!(text.contains("#20240901A"));
        assert!(text.contains("Survey & Assessment"));
        assert!(text.contains("¥ 50,000"));
    }

    #[test]
    fn consult_screen_shows_messages_and_citations() {
        let mut app = mock_app();
        app.screen = Screen::Consult;
        app.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: "is the elevator covered?".to_string(),
            citations: Vec::new(),
        });
        app.chat_messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: "Covered with conditions.".to_string(),
            citations: vec!["Public Liability - Exclusions, Clause 2.3".to_string()],
        });

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("You:"));
        assert!(text.contains("is the elevator covered?"));
        assert!(text.contains("Verified policy sources:"));
        assert!(text.contains("Clause 2.3"));
    }

    #[test]
    fn thinking_indicator_lists_matched_sources() {
        let mut app = mock_app();
        app.screen = Screen::Consult;
        app.thinking = true;
        app.matched_sources
            .push("Special Equipment Safety Law, Article 38".to_string());

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Searching the policy clause index"));
        assert!(text.contains("Matched clause: Special Equipment Safety Law"));
    }

    #[test]
    fn upload_overlay_renders_over_the_body() {
        let mut app = mock_app();
        app.open_upload();

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Smart Document Scan"));
        assert!(text.contains("Press Enter to scan"));
    }
}
