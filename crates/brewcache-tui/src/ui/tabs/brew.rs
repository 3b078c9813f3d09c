use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use brewcache_core::{BrewStep, StepState};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if !app.session.panel_visible() {
        render_placeholder(frame, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);

    render_label(frame, app, chunks[0]);
    render_steps(frame, app, chunks[1]);
    render_completion(frame, app, chunks[2]);
}

fn render_placeholder(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Brew ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    let text = Paragraph::new(Line::from(Span::styled(
        " Select a recipe on the Recipe tab to start brewing",
        styles::muted_style(),
    )))
    .block(block);
    frame.render_widget(text, area);
}

fn render_label(frame: &mut Frame, app: &App, area: Rect) {
    let label = app.session.label().unwrap_or_default();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled(" Brewing ", styles::muted_style()),
        Span::styled(label, styles::title_style()),
    ]))
    .block(block);
    frame.render_widget(paragraph, area);
}

fn state_marker(state: StepState) -> &'static str {
    match state {
        StepState::Locked => "·",
        StepState::Available => "○",
        StepState::Running => "▶",
        StepState::Completed => "✓",
    }
}

fn render_steps(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    for (i, step) in BrewStep::ALL.iter().enumerate() {
        let state = app.session.state(i).unwrap_or(StepState::Locked);
        let style = if i == app.step_selection {
            styles::step_style(state).patch(styles::selected_style())
        } else {
            styles::step_style(state)
        };

        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", state_marker(state)), style),
            Span::styled(format!("{}. {:<12}", i + 1, step.title()), style),
            Span::styled(format!("{:?}", state).to_lowercase(), styles::muted_style()),
        ]));
        if let Some(detail) = app.session.detail(i) {
            lines.push(Line::from(Span::styled(
                format!("      {}", detail),
                styles::step_style(state),
            )));
        }
        lines.push(Line::from(""));
    }

    let block = Block::default()
        .title(" Steps ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_completion(frame: &mut Frame, app: &App, area: Rect) {
    let line = if app.session.is_complete() {
        Line::from(Span::styled(
            " ☕ Brew complete. Enjoy your coffee!",
            styles::success_style(),
        ))
    } else {
        match app.session.running_step() {
            Some(i) => Line::from(Span::styled(
                format!(" {} in progress, Enter when done", BrewStep::ALL[i].title()),
                styles::highlight_style(),
            )),
            None => Line::from(Span::styled(
                " Press Enter to start the next step",
                styles::muted_style(),
            )),
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(line).block(block), area);
}
