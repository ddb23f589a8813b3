use std::io;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph};

use mls_standings::config::{PipelineConfig, parse_db_path_arg};
use mls_standings::dashboard::{DashboardState, Focus, StandingsReader, chart_bounds};

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Red,
    Color::Blue,
];

struct App {
    reader: StandingsReader,
    state: DashboardState,
    status: String,
    should_quit: bool,
}

impl App {
    fn new(reader: StandingsReader) -> Self {
        let (state, status) = match reader.load_standings() {
            Ok(rows) => {
                let status = load_status(rows.len());
                (DashboardState::new(rows), status)
            }
            Err(err) => (
                DashboardState::new(Default::default()),
                format!("[WARN] load failed: {err:#}"),
            ),
        };
        Self {
            reader,
            state,
            status,
            should_quit: false,
        }
    }

    fn reload(&mut self) {
        match self.reader.load_standings() {
            Ok(rows) => {
                self.status = load_status(rows.len());
                self.state.set_rows(rows);
            }
            Err(err) => self.status = format!("[WARN] reload failed: {err:#}"),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.state.toggle_focus(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Enter | KeyCode::Char(' ') => self.state.activate(),
            KeyCode::Char('a') => self.state.select_all_seasons(),
            KeyCode::Char('c') => self.state.clear_seasons(),
            KeyCode::Char('t') => self.state.clear_team(),
            KeyCode::Char('x') => self.state.toggle_x_axis(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }
}

fn load_status(rows: usize) -> String {
    if rows == 0 {
        "[INFO] No standings yet; run standings_etl".to_string()
    } else {
        format!("[INFO] Loaded {rows} standings rows")
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cfg = PipelineConfig::from_env()?;
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let db_path = parse_db_path_arg(&args).unwrap_or(cfg.db_path);
    let mut app = App::new(StandingsReader::new(db_path));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    exit_result(res)
}

/// Loop failures surface after the terminal is restored, so the process
/// exits non-zero.
fn exit_result(res: io::Result<()>) -> anyhow::Result<()> {
    res.context("dashboard loop failed")
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(area);

    let header = Paragraph::new(header_text(app))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(30)])
        .split(chunks[1]);
    let lists = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(body[0]);

    render_team_list(frame, lists[0], &app.state);
    render_season_list(frame, lists[1], &app.state);
    render_chart(frame, body[1], &app.state);

    let footer = Paragraph::new(footer_text())
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.state.help_overlay {
        render_help_overlay(frame, area);
    }
}

fn header_text(app: &App) -> String {
    let team = app.state.selected_team.as_deref().unwrap_or("-");
    format!(
        "MLS STANDINGS | Team: {} | Seasons: {} | X: {} | {}",
        team,
        app.state.selected_seasons.len(),
        app.state.x_axis.label(),
        app.status
    )
}

fn footer_text() -> &'static str {
    "Tab Focus | j/k/↑/↓ Move | Enter/Space Select | a All seasons | c Clear seasons | t Clear team | x Axis | r Reload | ? Help | q Quit"
}

fn list_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style)
}

fn render_team_list(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let focused = state.focus == Focus::Teams;
    let block = list_block("Team", focused);
    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(state.team_cursor, state.teams.len(), visible);

    let mut lines = Vec::new();
    for idx in start..end {
        let name = &state.teams[idx];
        let cursor = if focused && idx == state.team_cursor { ">" } else { " " };
        let mark = if state.selected_team.as_ref() == Some(name) {
            "(*)"
        } else {
            "( )"
        };
        lines.push(format!("{cursor}{mark} {name}"));
    }
    if lines.is_empty() {
        lines.push("No teams".to_string());
    }
    frame.render_widget(Paragraph::new(lines.join("\n")).block(block), area);
}

fn render_season_list(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let focused = state.focus == Focus::Seasons;
    let block = list_block("Seasons", focused);
    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(state.season_cursor, state.seasons.len(), visible);

    let mut lines = Vec::new();
    for idx in start..end {
        let season = &state.seasons[idx];
        let cursor = if focused && idx == state.season_cursor { ">" } else { " " };
        let mark = if state.selected_seasons.contains(season) {
            "[x]"
        } else {
            "[ ]"
        };
        lines.push(format!("{cursor}{mark} {season}"));
    }
    if lines.is_empty() {
        lines.push("No seasons".to_string());
    }
    frame.render_widget(Paragraph::new(lines.join("\n")).block(block), area);
}

fn render_chart(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let series = state.series();
    let (x_max, y_max) = chart_bounds(&series);

    let datasets = series
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            Dataset::default()
                .name(s.season.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[idx % SERIES_COLORS.len()]))
                .data(&s.points)
        })
        .collect::<Vec<_>>();

    let title = if series.is_empty() {
        "Cumulative points (select a team and seasons)".to_string()
    } else {
        format!("Cumulative points ({} series)", series.len())
    };

    let chart = Chart::new(datasets)
        .block(Block::default().title(title).borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title(state.x_axis.label())
                .style(Style::default().fg(Color::DarkGray))
                .bounds([1.0, x_max])
                .labels(axis_labels(1.0, x_max)),
        )
        .y_axis(
            Axis::default()
                .title("Points")
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, y_max])
                .labels(axis_labels(0.0, y_max)),
        );
    frame.render_widget(chart, area);
}

fn axis_labels(min: f64, max: f64) -> Vec<Span<'static>> {
    let mid = (min + max) / 2.0;
    vec![
        Span::raw(format!("{min:.0}")),
        Span::raw(format!("{mid:.0}")),
        Span::raw(format!("{max:.0}")),
    ]
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 50, area);
    let text = [
        "Tab        switch between team and season lists",
        "j/k, ↑/↓   move the cursor",
        "Enter/Spc  pick team / toggle season",
        "a / c      select all / clear seasons",
        "t          clear the team selection",
        "x          plot against game number or matchday",
        "r          reload after a pipeline run",
        "q          quit",
    ]
    .join("\n");
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(text).block(Block::default().title("Help").borders(Borders::ALL)),
        popup,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;

    use super::*;

    fn empty_app() -> App {
        App::new(StandingsReader::new("/definitely/not/here.sqlite"))
    }

    #[test]
    fn loop_errors_keep_a_failing_exit() {
        let err = exit_result(Err(io::Error::other("tty gone"))).unwrap_err();
        assert!(format!("{err:#}").contains("tty gone"));
        assert!(exit_result(Ok(())).is_ok());
    }

    #[test]
    fn renders_empty_dashboard_and_help() {
        let mut app = empty_app();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(f, &app)).unwrap();

        app.on_key(KeyEvent::from(KeyCode::Char('?')));
        assert!(app.state.help_overlay);
        terminal.draw(|f| ui(f, &app)).unwrap();

        app.on_key(KeyEvent::from(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn visible_range_follows_cursor() {
        assert_eq!(visible_range(0, 0, 5), (0, 0));
        assert_eq!(visible_range(3, 4, 10), (0, 4));
        assert_eq!(visible_range(9, 10, 4), (6, 10));
        assert_eq!(visible_range(5, 20, 4), (3, 7));
    }
}
