//! In-memory record of every sample a session produced and its estimate.

use serde::{Deserialize, Serialize};

use crate::sample::{ChargeState, Sample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub seq: u64,
    pub ts_ms: u64,
    pub sample: Sample,
    pub soc: f64,
    pub charge_state: ChargeState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistorySummary {
    pub rows: usize,
    pub soc_min: f64,
    pub soc_max: f64,
    pub soc_mean: f64,
}

/// Append-only log of every sample the session produced, with its estimate.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    rows: Vec<HistoryRow>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&self) -> u64 {
        self.rows.last().map(|r| r.seq + 1).unwrap_or(0)
    }

    pub fn push(&mut self, ts_ms: u64, sample: Sample, soc: f64) -> &HistoryRow {
        let row = HistoryRow {
            seq: self.next_seq(),
            ts_ms,
            sample,
            soc,
            charge_state: sample.charge_state(),
        };
        self.rows.push(row);
        &self.rows[self.rows.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn last(&self) -> Option<&HistoryRow> {
        self.rows.last()
    }

    /// SoC values in insertion order, the series the chart plots.
    pub fn soc_series(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.soc).collect()
    }

    pub fn summary(&self) -> Option<HistorySummary> {
        if self.rows.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for r in &self.rows {
            min = min.min(r.soc);
            max = max.max(r.soc);
            sum += r.soc;
        }
        Some(HistorySummary {
            rows: self.rows.len(),
            soc_min: min,
            soc_max: max,
            soc_mean: sum / self.rows.len() as f64,
        })
    }
}
