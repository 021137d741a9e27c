use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use storkval_core::report::{ReportLine, StatusReport};
use storkval_core::{CycleStatus, DisplayState};

use super::styles;

/// Spinner frames, advanced once per render tick while a cycle runs
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub fn render(frame: &mut Frame, state: &DisplayState, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(3),    // Report
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, state, tick, chunks[0]);
    render_report(frame, state, chunks[1]);
    render_status_bar(frame, chunks[2]);
}

fn render_title_bar(frame: &mut Frame, state: &DisplayState, tick: usize, area: Rect) {
    let busy = matches!(
        state.status,
        CycleStatus::RefreshingToken | CycleStatus::Fetching
    );
    let mut spans = vec![Span::styled("  Stork Oracle Validator", styles::title_style())];
    if busy {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            SPINNER[tick % SPINNER.len()],
            styles::help_key_style(),
        ));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_report(frame: &mut Frame, state: &DisplayState, area: Rect) {
    let lines: Vec<Line> = StatusReport::from_state(state)
        .into_iter()
        .map(report_line)
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn report_line(line: ReportLine) -> Line<'static> {
    match line {
        ReportLine::Rule { text } => Line::from(Span::styled(text, styles::rule_style())),
        ReportLine::Field { label, value, tone } => Line::from(vec![
            Span::styled(label, styles::label_style()),
            Span::raw(" : "),
            Span::styled(value, styles::tone_style(tone)),
        ]),
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q]", styles::help_key_style()),
        Span::raw(" Quit"),
    ]);
    frame.render_widget(
        Paragraph::new(line).style(styles::status_bar_style()),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use storkval_core::models::UserStats;

    fn draw(state: &DisplayState, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| render(f, state, 0)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_empty_state() {
        let text = draw(&DisplayState::default(), 60, 20);
        assert!(text.contains("Stork Oracle Validator"));
        assert!(text.contains("Email"));
        assert!(text.contains("Idle"));
    }

    #[test]
    fn test_render_tiny_terminal() {
        draw(&DisplayState::default(), 8, 2);
    }

    #[test]
    fn test_render_populated_state() {
        let state = DisplayState {
            stats: Some(UserStats {
                email: "a@b.com".to_string(),
                id: "42".to_string(),
                valid_count: 3,
                invalid_count: 1,
                last_verified_at: None,
            }),
            status: CycleStatus::Fetching,
            ..Default::default()
        };
        let text = draw(&state, 60, 20);
        assert!(text.contains("a@b.com"));
        assert!(text.contains("Fetching"));
    }
}
