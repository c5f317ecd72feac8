//! SQLite persistence for history rows, keyed by run id and sequence.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use crate::history::HistoryRow;
use crate::sample::{ChargeState, Sample};

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS history (
                run_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                ts_ms INTEGER NOT NULL,
                voltage REAL NOT NULL,
                current REAL NOT NULL,
                temp REAL NOT NULL,
                soc REAL NOT NULL,
                charge_state TEXT NOT NULL,
                PRIMARY KEY (run_id, seq)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn append(&mut self, run_id: &str, row: &HistoryRow) -> Result<()> {
        self.conn.execute(
            "INSERT INTO history (run_id, seq, ts_ms, voltage, current, temp, soc, charge_state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                row.seq as i64,
                row.ts_ms as i64,
                row.sample.voltage,
                row.sample.current,
                row.sample.temperature,
                row.soc,
                row.charge_state.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn load_run(&self, run_id: &str) -> Result<Vec<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, ts_ms, voltage, current, temp, soc, charge_state
             FROM history WHERE run_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![run_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, f64>(2)?,
                r.get::<_, f64>(3)?,
                r.get::<_, f64>(4)?,
                r.get::<_, f64>(5)?,
                r.get::<_, String>(6)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (seq, ts_ms, voltage, current, temperature, soc, state) = row?;
            let charge_state = ChargeState::parse(&state)
                .ok_or_else(|| anyhow!("unknown charge_state {:?} at seq {}", state, seq))?;
            out.push(HistoryRow {
                seq: seq as u64,
                ts_ms: ts_ms as u64,
                sample: Sample {
                    voltage,
                    current,
                    temperature,
                },
                soc,
                charge_state,
            });
        }
        Ok(out)
    }

    pub fn count(&self, run_id: &str) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM history WHERE run_id = ?1",
            params![run_id],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryLog;

    #[test]
    fn test_append_and_load() {
        let mut store = HistoryStore::in_memory().unwrap();
        store.init().unwrap();
        let mut log = HistoryLog::new();
        for (i, current) in [1.0, -2.0, 0.0].into_iter().enumerate() {
            let sample = Sample {
                voltage: 3.7,
                current,
                temperature: i as f64,
            };
            let row = log.push(100 + i as u64, sample, 50.0 + i as f64).clone();
            store.append("run-a", &row).unwrap();
        }
        store.append("run-b", &log.rows()[0]).unwrap();

        assert_eq!(store.count("run-a").unwrap(), 3);
        assert_eq!(store.count("run-b").unwrap(), 1);
        assert_eq!(store.load_run("run-a").unwrap(), log.rows().to_vec());
    }

    #[test]
    fn test_duplicate_seq_rejected() {
        let mut store = HistoryStore::in_memory().unwrap();
        store.init().unwrap();
        let mut log = HistoryLog::new();
        let sample = Sample {
            voltage: 3.7,
            current: 1.0,
            temperature: 0.0,
        };
        let row = log.push(0, sample, 50.0).clone();
        store.append("r", &row).unwrap();
        assert!(store.append("r", &row).is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut store = HistoryStore::in_memory().unwrap();
        store.init().unwrap();
        store.init().unwrap();
        assert_eq!(store.count("none").unwrap(), 0);
    }
}
