use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use brewcache_core::cache::WorkerStatus;

use crate::app::App;
use crate::ui::styles;
use crate::utils::truncate_string;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_generations(frame, app, chunks[0]);
    render_buckets(frame, app, chunks[1]);
}

fn worker_line(label: &'static str, worker: Option<&WorkerStatus>) -> Line<'static> {
    match worker {
        Some(w) => Line::from(vec![
            Span::styled(format!(" {:<9}", label), styles::highlight_style()),
            Span::raw(w.cache_name.clone()),
            Span::styled(format!("  ({})", w.state), styles::muted_style()),
        ]),
        None => Line::from(vec![
            Span::styled(format!(" {:<9}", label), styles::highlight_style()),
            Span::styled("none", styles::muted_style()),
        ]),
    }
}

fn render_generations(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    match app.cache_status {
        Some(ref status) => {
            lines.push(Line::from(vec![
                Span::styled(" Scope    ", styles::highlight_style()),
                Span::raw(status.scope.clone()),
            ]));
            lines.push(Line::from(""));
            lines.push(worker_line("Active", status.active.as_ref()));
            lines.push(worker_line("Waiting", status.waiting.as_ref()));
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled(" Clients  ", styles::highlight_style()),
                Span::raw(status.clients.to_string()),
            ]));
            if status.waiting.is_some() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    " A new version is ready. Press [a] to activate it.",
                    styles::success_style(),
                )));
            }
        }
        None => lines.push(Line::from(Span::styled(
            " Checking offline cache...",
            styles::muted_style(),
        ))),
    }

    let block = Block::default()
        .title(" Offline cache ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_buckets(frame: &mut Frame, app: &App, area: Rect) {
    let name_width = (area.width as usize).saturating_sub(16).max(8);
    let buckets = app
        .cache_status
        .as_ref()
        .map(|s| s.buckets.as_slice())
        .unwrap_or_default();

    let mut lines: Vec<Line> = buckets
        .iter()
        .map(|bucket| {
            Line::from(vec![
                Span::raw(format!(
                    " {:<width$}",
                    truncate_string(&bucket.name, name_width),
                    width = name_width
                )),
                Span::styled(format!("{:>4} entries", bucket.entries), styles::muted_style()),
            ])
        })
        .collect();

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            " Nothing stored yet",
            styles::muted_style(),
        )));
    }

    let block = Block::default()
        .title(format!(" Generations ({}) ", buckets.len()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
