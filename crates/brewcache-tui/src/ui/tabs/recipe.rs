use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::format_grams;

/// Width of the ratio gauge in cells
const GAUGE_WIDTH: usize = 30;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(5)])
        .split(area);

    render_ratio(frame, app, chunks[0]);
    render_table(frame, app, chunks[1]);
}

fn gauge(app: &App) -> String {
    let settings = app.ratio.settings();
    let span = (settings.max_ratio - settings.min_ratio).max(f64::EPSILON);
    let fraction = ((app.ratio.raw() - settings.min_ratio) / span).clamp(0.0, 1.0);
    let filled = (fraction * GAUGE_WIDTH as f64).round() as usize;
    format!(
        "{:.0} {}{} {:.0}",
        settings.min_ratio,
        "━".repeat(filled),
        "─".repeat(GAUGE_WIDTH - filled),
        settings.max_ratio
    )
}

fn render_ratio(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Brew ratio ", styles::muted_style()),
        Span::styled(app.ratio.display(), styles::title_style()),
        Span::raw("   "),
        Span::styled(gauge(app), styles::highlight_style()),
    ];
    if app.ratio.show_reset() {
        spans.push(Span::styled("   [r] reset to default", styles::muted_style()));
    }

    let lines = vec![
        Line::from(spans),
        Line::from(Span::styled(
            " Pick a water amount and press Enter to start brewing",
            styles::muted_style(),
        )),
    ];

    let block = Block::default()
        .title(" Ratio ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let header =
        Row::new(["Water", "Coffee", "Bloom", "Pour 1", "Pour 2"]).style(styles::highlight_style());

    let rows: Vec<Row> = app
        .table
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let r = row.recipe;
            let marker = if row.highlighted { " ★" } else { "" };
            let style = if i == app.table_selection {
                styles::selected_style()
            } else if row.highlighted {
                styles::highlight_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(format!("{}g{}", r.water, marker)),
                Cell::from(format_grams(r.coffee)),
                Cell::from(format!("{}g", r.bloom)),
                Cell::from(format!("{}g", r.pour1)),
                Cell::from(format!("{}g", r.pour2)),
            ])
            .style(style)
        })
        .collect();

    let widths = [Constraint::Length(10); 5];
    let block = Block::default()
        .title(format!(" Recipes at {} ", app.ratio.display()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let table = Table::new(rows, widths).header(header).block(block);

    let mut state = TableState::default();
    state.select(Some(app.table_selection));
    frame.render_stateful_widget(table, area, &mut state);
}
