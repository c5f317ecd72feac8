//! Dashboard for session frames.
//!
//! [`TerminalDisplay`] draws the full page with ratatui on any backend:
//! crossterm for an interactive terminal, `TestBackend` in tests.
//! [`JsonDisplay`] writes one JSON line per frame when stdout is not a tty.

use std::io::{self, Write};

use ratatui::{prelude::*, symbols, widgets::*};
use serde_json::json;

use crate::controls::Sliders;
use crate::history::HistoryLog;
use crate::sample::ChargeState;
use crate::session::{self, Mode};

pub const TITLE: &str = "SoC Simulator";
pub const INPUTS_TITLE: &str = "Input Parameters";
pub const AUTO_TOGGLE: &str = "Enable Auto Simulation";
pub const SOC_LABEL: &str = "Estimated SoC";
pub const TABLE_TITLE: &str = "Current Input Values:";
pub const CHART_TITLE: &str = "SoC Estimation Graph";
pub const CAPTION: &str = "Real-Time SoC Estimation using Machine Learning";

/// Everything one redraw shows.
pub struct Page<'a> {
    pub mode: Mode,
    /// Latest handled event, `None` before the first one.
    pub frame: Option<&'a session::Frame>,
    pub history: &'a HistoryLog,
    /// Shown only in manual mode.
    pub sliders: Option<&'a Sliders>,
}

pub trait Display {
    fn show(&mut self, page: &Page<'_>) -> io::Result<()>;
}

pub fn format_soc(soc: f64) -> String {
    format!("{:.2}%", soc)
}

pub fn state_color(state: ChargeState) -> Color {
    match state {
        ChargeState::Charging => Color::Green,
        ChargeState::Discharging => Color::Red,
        ChargeState::Idle => Color::Gray,
    }
}

pub struct TerminalDisplay<B: Backend> {
    terminal: Terminal<B>,
    chart_width: usize,
}

impl<B: Backend> TerminalDisplay<B> {
    pub fn new(backend: B, chart_width: usize) -> io::Result<Self> {
        Ok(Self {
            terminal: Terminal::new(backend)?,
            chart_width: chart_width.max(1),
        })
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

impl<B: Backend> Display for TerminalDisplay<B> {
    fn show(&mut self, page: &Page<'_>) -> io::Result<()> {
        let width = self.chart_width;
        self.terminal.draw(|f| draw(f, page, width))?;
        Ok(())
    }
}

/// Full page, top to bottom.
pub fn draw(f: &mut Frame, page: &Page<'_>, chart_width: usize) {
    let inputs_height = match page.sliders {
        Some(s) => s.items.len() as u16 + 3,
        None => 3,
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(inputs_height),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(4),
            Constraint::Min(6),
            Constraint::Length(2),
        ])
        .split(f.size());

    f.render_widget(
        Paragraph::new(TITLE)
            .style(Style::new().bg(Color::Rgb(50, 50, 50)).fg(Color::White).bold())
            .alignment(Alignment::Center),
        layout[0],
    );
    render_inputs(f, layout[1], page);
    render_soc(f, layout[2], page.frame);
    render_heading(f, layout[3], page.frame);
    render_table(f, layout[4], page.frame);
    render_chart(f, layout[5], page.history, chart_width);
    render_footer(f, layout[6], page.mode);
}

fn render_inputs(f: &mut Frame, area: Rect, page: &Page<'_>) {
    let block = Block::default()
        .title(format!(" {} ", INPUTS_TITLE))
        .borders(Borders::ALL)
        .border_style(Style::new().fg(Color::DarkGray));
    f.render_widget(block, area);
    let inner = area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let mut constraints = vec![Constraint::Length(1)];
    if let Some(sliders) = page.sliders {
        constraints.extend(sliders.items.iter().map(|_| Constraint::Length(1)));
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    let mark = if page.mode == Mode::Auto { "[x]" } else { "[ ]" };
    f.render_widget(Paragraph::new(format!("{} {}", mark, AUTO_TOGGLE)), rows[0]);

    let Some(sliders) = page.sliders else {
        return;
    };
    for (i, slider) in sliders.items.iter().enumerate() {
        let color = if i == sliders.selected {
            Color::Yellow
        } else {
            Color::DarkGray
        };
        f.render_widget(
            Gauge::default()
                .ratio(slider.ratio())
                .gauge_style(Style::new().fg(color))
                .label(format!("{}: {}", slider.label, slider.display_value())),
            rows[i + 1],
        );
    }
}

fn render_soc(f: &mut Frame, area: Rect, frame: Option<&session::Frame>) {
    let (percent, label) = match frame {
        Some(fr) => (fr.soc.clamp(0.0, 100.0) as u16, format_soc(fr.soc)),
        None => (0, "--".to_string()),
    };
    f.render_widget(
        Gauge::default()
            .block(Block::default().title(SOC_LABEL).borders(Borders::ALL))
            .percent(percent)
            .gauge_style(Style::new().fg(Color::Cyan))
            .label(label),
        area,
    );
}

fn render_heading(f: &mut Frame, area: Rect, frame: Option<&session::Frame>) {
    let heading = match frame {
        Some(fr) => Paragraph::new(fr.charge_state.label())
            .style(Style::new().fg(state_color(fr.charge_state)).bold()),
        None => Paragraph::new("Waiting for first sample...").style(Style::new().fg(Color::DarkGray)),
    };
    f.render_widget(heading.alignment(Alignment::Center), area);
}

fn render_table(f: &mut Frame, area: Rect, frame: Option<&session::Frame>) {
    let rows: Vec<Row> = frame
        .map(|fr| {
            Row::new(vec![
                Cell::from(format!("{:.2}", fr.sample.voltage)),
                Cell::from(format!("{:.2}", fr.sample.current)),
                Cell::from(format!("{:.1}", fr.sample.temperature)),
            ])
        })
        .into_iter()
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ],
    )
    .header(
        Row::new(vec!["Voltage", "Current", "Temp"])
            .style(Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().title(TABLE_TITLE).borders(Borders::ALL))
    .column_spacing(2);
    f.render_widget(table, area);
}

/// Last `width` points of the series as `(seq, soc)` pairs.
pub fn chart_points(series: &[f64], width: usize) -> Vec<(f64, f64)> {
    let start = series.len().saturating_sub(width);
    series[start..]
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| ((start + i) as f64, v))
        .collect()
}

/// Axis bounds covering `points`, padded so a flat series stays visible.
pub fn chart_bounds(points: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    let Some(&(x_lo, _)) = points.first() else {
        return ([0.0, 1.0], [0.0, 100.0]);
    };
    let x_hi = points.last().map_or(x_lo, |p| p.0).max(x_lo + 1.0);
    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.1), hi.max(p.1))
        });
    let pad = ((hi - lo) * 0.1).max(1.0);
    ([x_lo, x_hi], [lo - pad, hi + pad])
}

fn render_chart(f: &mut Frame, area: Rect, history: &HistoryLog, width: usize) {
    let series = history.soc_series();
    let points = chart_points(&series, width);
    let (x, y) = chart_bounds(&points);
    let chart = Chart::new(vec![Dataset::default()
        .name("SoC")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::new().fg(Color::Cyan))
        .data(&points)])
    .block(
        Block::default()
            .title(format!("{} ({} points)", CHART_TITLE, series.len()))
            .borders(Borders::ALL),
    )
    .x_axis(
        Axis::default()
            .title("Sample")
            .bounds(x)
            .labels(vec![format!("{:.0}", x[0]).into(), format!("{:.0}", x[1]).into()]),
    )
    .y_axis(
        Axis::default()
            .title("SoC (%)")
            .bounds(y)
            .labels(vec![format!("{:.1}", y[0]).into(), format!("{:.1}", y[1]).into()]),
    );
    f.render_widget(chart, area);
}

fn render_footer(f: &mut Frame, area: Rect, mode: Mode) {
    let help = match mode {
        Mode::Auto => " [A] Manual input | [Q] Quit ",
        Mode::Manual => {
            " [↑↓] Select | [←→] Adjust | [PgUp/PgDn] x10 | [Enter] Resend | [A] Auto | [Q] Quit "
        }
    };
    let lines = vec![
        Line::from(CAPTION).fg(Color::DarkGray).alignment(Alignment::Center),
        Line::from(help).bg(Color::Rgb(50, 50, 50)).fg(Color::White),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

/// One JSON object per frame, for piped or redirected stdout.
pub struct JsonDisplay<W> {
    out: W,
}

impl<W: Write> JsonDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Display for JsonDisplay<W> {
    fn show(&mut self, page: &Page<'_>) -> io::Result<()> {
        let Some(fr) = page.frame else {
            return Ok(());
        };
        let record = json!({
            "seq": fr.seq,
            "mode": page.mode.as_str(),
            "voltage": fr.sample.voltage,
            "current": fr.sample.current,
            "temp": fr.sample.temperature,
            "soc": fr.soc,
            "soc_display": format_soc(fr.soc),
            "charge_state": fr.charge_state.as_str(),
            "color": fr.charge_state.color(),
            "points": page.history.len(),
        });
        serde_json::to_writer(&mut self.out, &record)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
