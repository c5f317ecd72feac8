use anyhow::{Context, Result};
use crossterm::{
    event::{self as term, Event as TermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::backend::CrosstermBackend;
use std::io::{self, IsTerminal, Stdout};
use std::panic;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use socsim::artifact::{ensure_artifact, ArtifactSource};
use socsim::config::Config;
use socsim::controls::{handle_key, Action, Sliders};
use socsim::display::{Display, JsonDisplay, Page, TerminalDisplay};
use socsim::logging::{
    fatal, info, obj, run_id, set_console, ts_epoch_ms, v_num, v_str, warn, Domain,
};
use socsim::model::{load_model, Estimator};
use socsim::session::{Event, Frame, Mode, Session};
use socsim::storage::HistoryStore;

type SimSession = Session<Estimator, StdRng>;
type Dashboard = TerminalDisplay<CrosstermBackend<Stdout>>;

struct Runtime<D> {
    session: SimSession,
    display: D,
    store: Option<HistoryStore>,
    mode: Mode,
    sliders: Sliders,
    last: Option<Frame>,
    handled: u64,
}

impl<D: Display> Runtime<D> {
    fn new(session: SimSession, display: D, store: Option<HistoryStore>, mode: Mode) -> Self {
        Self {
            session,
            display,
            store,
            mode,
            sliders: Sliders::default(),
            last: None,
            handled: 0,
        }
    }

    fn on_event(&mut self, event: Event) -> Result<()> {
        let frame = self.session.handle(event, ts_epoch_ms())?;
        self.last = Some(frame);
        self.handled += 1;
        if let (Some(store), Some(row)) = (self.store.as_mut(), self.session.history().last()) {
            if let Err(e) = store.append(run_id(), row) {
                warn(
                    Domain::Storage,
                    "history_append_failed",
                    obj(&[("seq", v_num(row.seq as f64)), ("error", v_str(&format!("{:#}", e)))]),
                );
            }
        }
        self.redraw()
    }

    fn redraw(&mut self) -> Result<()> {
        let page = Page {
            mode: self.mode,
            frame: self.last.as_ref(),
            history: self.session.history(),
            sliders: (self.mode == Mode::Manual).then_some(&self.sliders),
        };
        self.display.show(&page).context("writing display")
    }

    fn done(&self, cfg: &Config) -> bool {
        cfg.max_ticks().is_some_and(|max| self.handled >= max)
    }
}

async fn run_auto<D: Display>(rt: &mut Runtime<D>, cfg: &Config) -> Result<()> {
    let mut ticker = interval(Duration::from_millis(cfg.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while !rt.done(cfg) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = ticker.tick() => rt.on_event(Event::Tick)?,
        }
    }
    Ok(())
}

async fn run_manual<D: Display>(rt: &mut Runtime<D>, cfg: &Config) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("enter `voltage current temperature` per line (blank = defaults)");
    while !rt.done(cfg) {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            line = lines.next_line() => line.context("reading stdin")?,
        };
        let Some(line) = line else {
            return Ok(());
        };
        match Event::parse_manual(&line) {
            Ok(event) => rt.on_event(event)?,
            Err(e) => warn(
                Domain::Session,
                "bad_override",
                obj(&[("input", v_str(&line)), ("error", v_str(&format!("{:#}", e)))]),
            ),
        }
    }
    Ok(())
}

/// Interactive dashboard: ticks on a timer in auto mode, slider keys in
/// manual mode, `a` switches between them.
fn run_dashboard(rt: &mut Runtime<Dashboard>, cfg: &Config) -> Result<()> {
    let tick_rate = Duration::from_millis(cfg.tick_ms.max(1));
    let mut last_tick: Option<Instant> = None;

    if rt.mode == Mode::Manual {
        let event = rt.sliders.event();
        rt.on_event(event)?;
    } else {
        rt.redraw()?;
    }

    while !rt.done(cfg) {
        if rt.mode == Mode::Auto && last_tick.map_or(true, |t| t.elapsed() >= tick_rate) {
            rt.on_event(Event::Tick)?;
            last_tick = Some(Instant::now());
            continue;
        }

        if !term::poll(Duration::from_millis(50))? {
            continue;
        }
        let TermEvent::Key(key) = term::read()? else {
            continue;
        };
        match handle_key(key, rt.mode, &mut rt.sliders) {
            Action::None => {}
            Action::Redraw => rt.redraw()?,
            Action::Quit => break,
            Action::Submit(event) => rt.on_event(event)?,
            Action::ToggleAuto => {
                rt.mode = match rt.mode {
                    Mode::Auto => Mode::Manual,
                    Mode::Manual => Mode::Auto,
                };
                info(Domain::Session, "mode_changed", obj(&[("mode", v_str(rt.mode.as_str()))]));
                match rt.mode {
                    Mode::Auto => last_tick = None,
                    Mode::Manual => {
                        rt.sliders.reset();
                        let event = rt.sliders.event();
                        rt.on_event(event)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn enter_dashboard(chart_width: usize) -> Result<Dashboard> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    set_console(false);
    Ok(TerminalDisplay::new(CrosstermBackend::new(stdout), chart_width)?)
}

fn leave_dashboard(display: &mut Dashboard) -> Result<()> {
    set_console(true);
    disable_raw_mode()?;
    let terminal = display.terminal_mut();
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn log_summary<D>(rt: &Runtime<D>, result: &Result<()>) {
    if let Err(e) = result {
        fatal(
            Domain::System,
            "session_aborted",
            obj(&[("error", v_str(&format!("{:#}", e)))]),
        );
    }
    let mut fields = obj(&[("rows", v_num(rt.session.history().len() as f64))]);
    if let Some(s) = rt.session.history().summary() {
        fields.insert("soc_min".to_string(), v_num(s.soc_min));
        fields.insert("soc_max".to_string(), v_num(s.soc_max));
        fields.insert("soc_mean".to_string(), v_num(s.soc_mean));
    }
    fields.insert("final_voltage".to_string(), v_num(rt.session.state().voltage));
    fields.insert("final_mode".to_string(), v_str(rt.mode.as_str()));
    info(Domain::System, "session_summary", fields);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let interactive = io::stdout().is_terminal();
    info(
        Domain::System,
        "startup",
        obj(&[
            ("mode", v_str(cfg.mode.as_str())),
            ("model_path", v_str(&cfg.model_path.display().to_string())),
            ("tick_ms", v_num(cfg.tick_ms as f64)),
            ("display", v_str(if interactive { "dashboard" } else { "json" })),
        ]),
    );

    let path = ensure_artifact(&ArtifactSource::from_config(&cfg)).await?;
    let model = load_model(&path)?;
    info(
        Domain::Model,
        "model_loaded",
        obj(&[(
            "kind",
            v_str(match &model {
                Estimator::Linear { .. } => "linear",
                Estimator::Forest { .. } => "forest",
            }),
        )]),
    );

    let rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let store = match &cfg.history_db {
        Some(db) => {
            let mut store = HistoryStore::new(db).with_context(|| format!("opening {}", db))?;
            store.init()?;
            Some(store)
        }
        None => None,
    };
    let session = Session::new(model, rng);

    if interactive {
        let display = enter_dashboard(cfg.chart_width)?;
        let mut rt = Runtime::new(session, display, store, cfg.mode);
        let result = run_dashboard(&mut rt, &cfg);
        leave_dashboard(&mut rt.display)?;
        log_summary(&rt, &result);
        return result;
    }

    let mut rt = Runtime::new(session, JsonDisplay::new(io::stdout()), store, cfg.mode);
    let result = match cfg.mode {
        Mode::Auto => run_auto(&mut rt, &cfg).await,
        Mode::Manual => run_manual(&mut rt, &cfg).await,
    };
    log_summary(&rt, &result);
    result
}
