//! Ratatui-based terminal UI.
//!
//! Shows the fitted curve over the loaded partition table next to a parameter
//! panel. Keys toggle the model choice, the elastic constant and the σ mode;
//! every toggle refits the same data.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Terminal,
};

use crate::app::pipeline::{RunOutput, run_fit_with_data};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::fit::{fitted_grid, radius_grid};
use crate::io::{PartitionData, load_partition_csv};

mod plotters_chart;

use plotters_chart::LatticeChart;

/// Pull beyond which an observation is highlighted.
const FLAG_PULL: f64 = 2.0;

/// Start the TUI on the configured partition table.
pub fn run(config: FitConfig) -> Result<(), AppError> {
    // Load before touching the terminal so input errors print normally.
    let data = load_partition_csv(&config.csv_path)?;
    let mut app = App::new(config, data);

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    config: FitConfig,
    data: PartitionData,
    run: Option<RunOutput>,
    status: String,
}

impl App {
    fn new(config: FitConfig, data: PartitionData) -> Self {
        let mut app = Self {
            config,
            data,
            run: None,
            status: String::new(),
        };
        app.refit();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('m') => {
                self.config.model_spec = self.config.model_spec.next();
                self.refit();
            }
            KeyCode::Char('k') => {
                self.config.q = self.config.q.toggle();
                self.refit();
            }
            KeyCode::Char('s') => {
                self.config.sigma_mode = self.config.sigma_mode.toggle();
                self.refit();
            }
            KeyCode::Char('r') => match load_partition_csv(&self.config.csv_path) {
                Ok(data) => {
                    self.data = data;
                    self.refit();
                }
                Err(err) => self.status = format!("reload failed: {err}"),
            },
            _ => {}
        }
        false
    }

    /// Refit with the current settings; failures are shown, not fatal.
    fn refit(&mut self) {
        match run_fit_with_data(&self.config, self.data.clone()) {
            Ok(run) => {
                self.status = format!(
                    "model: {:?} | Q: {} | sigma: {:?}",
                    self.config.model_spec,
                    self.config.q.label(),
                    self.config.sigma_mode
                );
                self.run = Some(run);
            }
            Err(err) => {
                tracing::warn!("refit failed: {err}");
                self.status = format!("fit failed: {err}");
                self.run = None;
            }
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let c = &self.data.set.conditions;
        let lines = vec![
            Line::from(vec![
                Span::styled("lsm", Style::default().fg(Color::Cyan)),
                Span::raw(format!(" - {}", self.config.csv_path.display())),
            ]),
            Line::from(Span::styled(
                format!(
                    "n={} | T={:.1} °C | P={:.2} GPa | radius=[{:.3}, {:.3}] Å",
                    self.data.stats.n_points,
                    self.data.temperature_c,
                    c.pressure_gpa,
                    self.data.stats.radius_min,
                    self.data.stats.radius_max,
                ),
                Style::default().fg(Color::Gray),
            )),
        ];
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(36)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_params(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Lattice strain").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = &self.run else {
            let msg = Paragraph::new("No fit available.").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        };

        let series = chart_series(run, &self.config);
        let widget = LatticeChart {
            curve: &series.curve,
            points: &series.points,
            error_bars: &series.error_bars,
            flagged: &series.flagged,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: "radius (Å)",
            y_label: format!("log10 {}", self.config.phase_label),
        };
        frame.render_widget(widget, inner);
    }

    fn draw_params(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        match &self.run {
            Some(run) => {
                let best = &run.selection.best;
                lines.push(Line::from(Span::styled(
                    best.model.display_name(),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                for line in crate::report::format_annotation(best).lines() {
                    lines.push(Line::from(line.to_string()));
                }
                lines.push(Line::from(crate::report::format_pressure(best.conditions.pressure_gpa)));
                lines.push(Line::from(""));
                lines.push(Line::from(format!("chi2 = {:.4}", best.quality.chi2)));
                lines.push(Line::from(format!(
                    "red. chi2 = {}",
                    best.quality
                        .reduced_chi2
                        .map(|v| format!("{v:.4}"))
                        .unwrap_or_else(|| "n/a".to_string())
                )));
                lines.push(Line::from(format!("nfev = {}", best.quality.nfev)));
                lines.push(Line::from(""));
                for fit in &run.selection.fits {
                    let mark = if fit.model == best.model { "*" } else { " " };
                    lines.push(Line::from(format!(
                        "{mark} {:<14} BIC {:.2}",
                        fit.model.display_name(),
                        fit.quality.bic
                    )));
                }
                for (kind, _) in &run.selection.skipped {
                    lines.push(Line::from(Span::styled(
                        format!("  {:<14} skipped", kind.display_name()),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
            None => lines.push(Line::from("-")),
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().title("Parameters").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "m model  k Q  s sigma  r reload  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Chart data in `(radius, log10 D)` coordinates.
struct ChartSeries {
    curve: Vec<(f64, f64)>,
    points: Vec<(f64, f64)>,
    error_bars: Vec<(f64, f64, f64)>,
    flagged: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn chart_series(run: &RunOutput, config: &FitConfig) -> ChartSeries {
    let stats = &run.data.stats;
    let radii = radius_grid(stats.radius_min, stats.radius_max, 200);
    let d = fitted_grid(&run.selection.best, &config.constants, &radii);
    let curve: Vec<(f64, f64)> = radii
        .iter()
        .zip(d)
        .filter(|&(_, d)| d.is_finite() && d > 0.0)
        .map(|(&r, d)| (r, d.log10()))
        .collect();

    let samples = &run.data.set.samples;
    let points: Vec<(f64, f64)> = samples.iter().map(|s| (s.radius, s.d.log10())).collect();
    let error_bars = samples
        .iter()
        .map(|s| {
            let lo = (s.d - s.sigma).max(s.d * 1e-3);
            (s.radius, lo.log10(), (s.d + s.sigma).log10())
        })
        .collect::<Vec<_>>();
    let flagged = run
        .residuals
        .iter()
        .filter(|r| r.pull.is_some_and(|p| p.abs() > FLAG_PULL))
        .map(|r| (r.sample.radius, r.sample.d.log10()))
        .collect();

    let x_bounds = match (radii.first(), radii.last()) {
        (Some(&lo), Some(&hi)) if hi > lo => [lo, hi],
        _ => [0.8, 1.2],
    };

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let ys = curve
        .iter()
        .map(|&(_, y)| y)
        .chain(error_bars.iter().flat_map(|&(_, lo, hi)| [lo, hi]));
    for y in ys.filter(|y| y.is_finite()) {
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        y_min = -1.0;
        y_max = 1.0;
    }
    let pad = ((y_max - y_min) * 0.05).max(1e-6);

    ChartSeries {
        curve,
        points,
        error_bars,
        flagged,
        x_bounds,
        y_bounds: [y_min - pad, y_max + pad],
    }
}
