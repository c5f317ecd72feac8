//! Session context: one simulated battery, its estimator and its history.
//!
//! Each tick or user interaction is one [`Event`] handled top to bottom:
//! produce a sample, estimate SoC, append to history, return a [`Frame`]
//! for display. The voltage walk is advanced through [`step`], which
//! returns the next state instead of mutating it.

use anyhow::{bail, Context, Result};
use rand::Rng;

use crate::history::HistoryLog;
use crate::logging::{debug, obj, v_num, v_str, Domain};
use crate::model::SocModel;
use crate::sample::{ChargeState, Sample, CURRENT, TEMPERATURE, VOLTAGE};
use crate::simulator::{auto_step, manual_sample, SimulationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Mode::Auto),
            "manual" => Some(Mode::Manual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Auto-simulation tick.
    Tick,
    /// User-supplied override; the voltage walk is left untouched.
    Manual {
        voltage: f64,
        current: f64,
        temperature: f64,
    },
}

impl Event {
    /// Parses a manual override line `voltage current temperature`.
    /// A blank line selects the input defaults.
    pub fn parse_manual(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            return Ok(Event::Manual {
                voltage: VOLTAGE.default,
                current: CURRENT.default,
                temperature: TEMPERATURE.default,
            });
        }
        if fields.len() != 3 {
            bail!(
                "expected `voltage current temperature`, got {} value(s)",
                fields.len()
            );
        }
        let names = ["voltage", "current", "temperature"];
        let mut vals = [0.0; 3];
        for ((slot, raw), name) in vals.iter_mut().zip(&fields).zip(names) {
            let v: f64 = raw
                .parse()
                .with_context(|| format!("invalid {} {:?}", name, raw))?;
            if !v.is_finite() {
                bail!("{} must be finite", name);
            }
            *slot = v;
        }
        Ok(Event::Manual {
            voltage: vals[0],
            current: vals[1],
            temperature: vals[2],
        })
    }
}

/// Everything the display needs after one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub seq: u64,
    pub sample: Sample,
    pub soc: f64,
    pub charge_state: ChargeState,
}

/// Next simulation state and the sample an event produces.
pub fn step<R: Rng + ?Sized>(
    state: SimulationState,
    event: Event,
    rng: &mut R,
) -> (SimulationState, Sample) {
    match event {
        Event::Tick => auto_step(state, rng),
        Event::Manual {
            voltage,
            current,
            temperature,
        } => (state, manual_sample(voltage, current, temperature)),
    }
}

pub struct Session<M, R> {
    state: SimulationState,
    history: HistoryLog,
    model: M,
    rng: R,
}

impl<M: SocModel, R: Rng> Session<M, R> {
    pub fn new(model: M, rng: R) -> Self {
        Self {
            state: SimulationState::default(),
            history: HistoryLog::new(),
            model,
            rng,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn estimate(&self, sample: &Sample) -> Result<f64> {
        let out = self
            .model
            .predict(&[sample.features()])
            .context("SoC prediction failed")?;
        let Some(&soc) = out.first() else {
            bail!("model returned no prediction for one input row");
        };
        if !soc.is_finite() {
            bail!("model returned non-finite SoC {}", soc);
        }
        Ok(soc)
    }

    /// Handles one event. The new voltage is committed and the history row
    /// appended only once the estimate succeeded.
    pub fn handle(&mut self, event: Event, ts_ms: u64) -> Result<Frame> {
        let (next, sample) = step(self.state, event, &mut self.rng);
        let soc = self.estimate(&sample)?;
        self.state = next;
        let row = self.history.push(ts_ms, sample, soc);
        let frame = Frame {
            seq: row.seq,
            sample,
            soc,
            charge_state: row.charge_state,
        };
        debug(
            Domain::Session,
            "tick",
            obj(&[
                ("seq", v_num(frame.seq as f64)),
                ("voltage", v_num(sample.voltage)),
                ("current", v_num(sample.current)),
                ("temp", v_num(sample.temperature)),
                ("soc", v_num(soc)),
                ("charge_state", v_str(frame.charge_state.as_str())),
                ("walk_voltage", v_num(self.state.voltage)),
            ]),
        );
        Ok(frame)
    }
}
