use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use tui_input::backend::crossterm::to_input_request;

use crate::app::{App, Mode};

/// Handle key event and update app state
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl-C quits from any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match app.mode() {
        Mode::Normal => handle_normal_mode(app, key),
        Mode::EditUrl => handle_edit_url_mode(app, key),
    }
}

/// Handle key event in Normal mode
fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),

        // Run lifecycle
        KeyCode::Char('s') | KeyCode::Enter => app.start_download(),
        KeyCode::Char('x') => app.stop_download(),

        // URL editing
        KeyCode::Char('e') | KeyCode::Char('i') => app.begin_edit_url(),

        // Cookie conversion (json_input/ -> cookies/)
        KeyCode::Char('C') => app.convert_cookies(),

        // Pane switching
        KeyCode::Tab => app.toggle_pane(),

        // Vertical scroll (j/k)
        KeyCode::Char('j') => app.current_view_mut().scroll_down(),
        KeyCode::Char('k') => app.current_view_mut().scroll_up(),

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.current_view_mut().scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.current_view_mut().scroll_half_page_up();
        }

        // Jump to top/bottom
        KeyCode::Char('g') => app.current_view_mut().scroll_to_top(),
        KeyCode::Char('G') => app.current_view_mut().scroll_to_bottom(),

        // Toggle auto-scroll
        KeyCode::Char('f') => app.current_view_mut().toggle_auto_scroll(),

        _ => {}
    }
}

/// Handle key event while editing the target URL
fn handle_edit_url_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_edit_url(),
        KeyCode::Enter => app.commit_url(),

        // Delegate to tui-input for text editing (Emacs-like keybindings)
        _ => {
            if let Some(req) = to_input_request(&Event::Key(key)) {
                app.url_input_mut().handle(req);
            }
        }
    }
}
