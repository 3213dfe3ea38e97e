use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode, Screen, UploadState};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Consult { cycle, event } => app.apply_consult_event(cycle, event),
        AppEvent::Scan { cycle, event } => app.apply_scan_event(cycle, event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The upload overlay captures all input while visible
    if app.show_upload {
        handle_upload_key(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_upload_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_upload(),
        KeyCode::Enter | KeyCode::Char(' ') => match app.upload_state {
            UploadState::Idle => app.begin_scan(),
            UploadState::Scanning => {}
            UploadState::Result => app.confirm_upload(),
        },
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Screen switching
        KeyCode::Tab => {
            app.screen = match app.screen {
                Screen::Progress => Screen::Consult,
                Screen::Consult => Screen::Progress,
            };
        }

        _ => match app.screen {
            Screen::Progress => handle_progress_normal(app, key),
            Screen::Consult => handle_consult_normal(app, key),
        },
    }
}

fn handle_progress_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Attach site photos / invoices
        KeyCode::Char('u') => app.open_upload(),

        // Jump straight into the consultation input
        KeyCode::Char('a') => {
            app.screen = Screen::Consult;
            app.input_mode = InputMode::Editing;
            app.consult_cursor = app.consult_input.chars().count();
        }

        _ => {}
    }
}

fn handle_consult_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.screen = Screen::Progress,

        // Edit the question
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
            app.consult_cursor = app.consult_input.chars().count();
        }

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(),
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if app.send_message() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Backspace => {
            if app.consult_cursor > 0 {
                app.consult_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.consult_input, app.consult_cursor);
                app.consult_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.consult_input.chars().count();
            if app.consult_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.consult_input, app.consult_cursor);
                app.consult_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.consult_cursor = app.consult_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.consult_input.chars().count();
            app.consult_cursor = (app.consult_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.consult_cursor = 0;
        }
        KeyCode::End => {
            app.consult_cursor = app.consult_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.consult_input, app.consult_cursor);
            app.consult_input.insert(byte_pos, c);
            app.consult_cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Consult || app.show_upload {
        return;
    }

    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            app.scroll_chat_down();
            app.scroll_chat_down();
            app.scroll_chat_down();
        }
        MouseEventKind::ScrollUp => {
            app.scroll_chat_up();
            app.scroll_chat_up();
            app.scroll_chat_up();
        }
        _ => {}
    }
}
