//! Keyboard input handling for the TUI.
//!
//! Translates key events into application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, Tab, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // Notification actions take priority while one is shown
    if app.notification.is_some() {
        match key.code {
            KeyCode::Char('o') => {
                app.click_notification();
                return Ok(false);
            }
            KeyCode::Char('x') | KeyCode::Esc => {
                app.dismiss_notification();
                return Ok(false);
            }
            _ => {}
        }
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        KeyCode::Char('1') => app.current_tab = Tab::Recipe,
        KeyCode::Char('2') => app.current_tab = Tab::Brew,
        KeyCode::Char('3') => {
            app.current_tab = Tab::Cache;
            app.refresh_cache_status();
        }
        KeyCode::Tab => app.current_tab = app.current_tab.next(),
        KeyCode::BackTab => app.current_tab = app.current_tab.prev(),
        _ => match app.current_tab {
            Tab::Recipe => handle_recipe_input(app, key),
            Tab::Brew => handle_brew_input(app, key),
            Tab::Cache => handle_cache_input(app, key),
        },
    }

    Ok(false)
}

fn handle_recipe_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => app.table_selection = 0,
        KeyCode::End => app.table_selection = app.table.len().saturating_sub(1),
        KeyCode::Left | KeyCode::Char('-') => app.ratio_down(),
        KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => app.ratio_up(),
        KeyCode::Char('r') => {
            if app.ratio.show_reset() {
                app.reset_ratio();
            }
        }
        KeyCode::Enter => app.select_recipe(),
        _ => {}
    }
}

fn handle_brew_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_step(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_step(1),
        KeyCode::Enter | KeyCode::Char(' ') => app.click_step(),
        KeyCode::Char('r') => app.reset_brew(),
        KeyCode::Esc => app.current_tab = Tab::Recipe,
        _ => {}
    }
}

fn handle_cache_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('a') => app.activate_update(),
        KeyCode::Char('u') => app.refresh_cache_status(),
        _ => {}
    }
}
