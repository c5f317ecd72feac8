//! Runtime settings read from the environment, with defaults for anything
//! unset or unparsable.

use std::path::PathBuf;

use crate::session::Mode;

#[derive(Debug, Clone)]
pub struct Config {
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub model_sha256: Option<String>,
    pub mode: Mode,
    /// Delay between auto-simulation ticks.
    pub tick_ms: u64,
    /// 0 runs until interrupted.
    pub max_ticks: u64,
    pub seed: Option<u64>,
    pub history_db: Option<String>,
    pub chart_width: usize,
    pub fetch_retries: u32,
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.json"),
            model_url: None,
            model_sha256: None,
            mode: Mode::Auto,
            tick_ms: 1000,
            max_ticks: 0,
            seed: None,
            history_db: None,
            chart_width: 60,
            fetch_retries: 3,
            fetch_timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            model_path: std::env::var("MODEL_PATH").map(PathBuf::from).unwrap_or(d.model_path),
            model_url: std::env::var("MODEL_URL").ok().filter(|v| !v.is_empty()),
            model_sha256: std::env::var("MODEL_SHA256").ok().map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty()),
            mode: std::env::var("SIM_MODE").ok().and_then(|v| Mode::parse(&v)).unwrap_or(d.mode),
            tick_ms: std::env::var("TICK_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.tick_ms),
            max_ticks: std::env::var("MAX_TICKS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_ticks),
            seed: std::env::var("SIM_SEED").ok().and_then(|v| v.parse().ok()),
            history_db: std::env::var("HISTORY_DB").ok().filter(|v| !v.is_empty()),
            chart_width: std::env::var("CHART_WIDTH").ok().and_then(|v| v.parse().ok()).filter(|w| *w > 0).unwrap_or(d.chart_width),
            fetch_retries: std::env::var("FETCH_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_retries),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_timeout_secs),
        }
    }

    pub fn max_ticks(&self) -> Option<u64> {
        if self.max_ticks == 0 {
            None
        } else {
            Some(self.max_ticks)
        }
    }
}
