//! Synthetic battery state: a bounded voltage random walk driven by a
//! uniformly drawn current, plus an independent temperature draw.

use rand::Rng;

use crate::sample::{round_to, Sample, CURRENT, TEMPERATURE, VOLTAGE};

/// Initial voltage of a fresh session.
pub const NOMINAL_VOLTAGE: f64 = 3.7;
/// Fixed voltage increment applied on every charging tick.
pub const CHARGE_STEP: f64 = 0.005;
/// Volts lost per amp of discharge current on a discharging tick.
pub const DISCHARGE_GAIN: f64 = 0.01;

/// Voltage carried from one auto-simulation tick to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    pub voltage: f64,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            voltage: NOMINAL_VOLTAGE,
        }
    }
}

impl SimulationState {
    pub fn new(voltage: f64) -> Self {
        Self { voltage }
    }

    /// Returns the state after one tick at `current`.
    pub fn advance(self, current: f64) -> Self {
        Self {
            voltage: next_voltage(self.voltage, current),
        }
    }
}

/// Charging adds a fixed step capped at the top of the range; discharging
/// subtracts proportionally to current, floored at the bottom; zero current
/// leaves the voltage unchanged. The result always lies in the voltage range;
/// a NaN start resets to [`NOMINAL_VOLTAGE`].
pub fn next_voltage(prev: f64, current: f64) -> f64 {
    if prev.is_nan() {
        return NOMINAL_VOLTAGE;
    }
    let next = if current > 0.0 {
        (prev + CHARGE_STEP).min(VOLTAGE.max)
    } else if current < 0.0 {
        (prev + current * DISCHARGE_GAIN).max(VOLTAGE.min)
    } else {
        prev
    };
    VOLTAGE.clamp(next)
}

pub fn draw_current<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    round_to(rng.gen_range(CURRENT.min..CURRENT.max), 2)
}

pub fn draw_temperature<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    round_to(rng.gen_range(TEMPERATURE.min..TEMPERATURE.max), 1)
}

/// One auto-simulation tick. Current is drawn before temperature.
pub fn auto_step<R: Rng + ?Sized>(state: SimulationState, rng: &mut R) -> (SimulationState, Sample) {
    let current = draw_current(rng);
    let temperature = draw_temperature(rng);
    tick_with(state, current, temperature)
}

/// Advances the walk at `current`; the sample shows the new voltage at
/// two decimals while the state keeps it unrounded.
pub fn tick_with(state: SimulationState, current: f64, temperature: f64) -> (SimulationState, Sample) {
    let next = state.advance(current);
    (
        next,
        Sample {
            voltage: round_to(next.voltage, VOLTAGE.decimals),
            current,
            temperature,
        },
    )
}

/// Sample built from user overrides, snapped to the input bounds.
pub fn manual_sample(voltage: f64, current: f64, temperature: f64) -> Sample {
    Sample {
        voltage: VOLTAGE.snap(voltage),
        current: CURRENT.snap(current),
        temperature: TEMPERATURE.snap(temperature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_charge_step() {
        assert!(close(next_voltage(3.7, 1.5), 3.705));
    }

    #[test]
    fn test_charge_clamped_at_top() {
        assert_eq!(next_voltage(4.199, 1.0), 4.2);
        assert_eq!(next_voltage(4.2, 0.01), 4.2);
    }

    #[test]
    fn test_discharge_proportional() {
        assert!(close(next_voltage(3.7, -2.0), 3.68));
    }

    #[test]
    fn test_discharge_clamped_at_bottom() {
        assert_eq!(next_voltage(3.21, -5.0), 3.2);
    }

    #[test]
    fn test_idle_unchanged() {
        assert_eq!(next_voltage(3.81234, 0.0), 3.81234);
        assert_eq!(next_voltage(3.81234, -0.0), 3.81234);
    }

    #[test]
    fn test_out_of_range_start_is_pulled_in() {
        assert_eq!(next_voltage(5.0, -0.5), 4.2);
        assert_eq!(next_voltage(1.0, 0.0), 3.2);
    }

    #[test]
    fn test_nan_start_resets_to_nominal() {
        assert_eq!(next_voltage(f64::NAN, 1.0), NOMINAL_VOLTAGE);
        assert_eq!(next_voltage(f64::NAN, -1.0), NOMINAL_VOLTAGE);
        assert_eq!(next_voltage(f64::NAN, 0.0), NOMINAL_VOLTAGE);
        assert_eq!(SimulationState::new(f64::NAN).advance(1.5).voltage, NOMINAL_VOLTAGE);
    }

    #[test]
    fn test_first_charging_tick_shows_rounded_up() {
        let (next, sample) = tick_with(SimulationState::default(), 1.5, 10.0);
        assert_eq!(next.voltage, 3.705);
        assert_eq!(sample.voltage, 3.71);
    }

    #[test]
    fn test_walk_replay_exact_values() {
        // (current, walk voltage after the tick, displayed voltage)
        let expected = [
            (1.5, 3.705, 3.71),
            (1.0, 3.71, 3.71),
            (0.3, 3.715, 3.71),
            (-0.42, 3.7108, 3.71),
            (1.99, 3.7157999999999998, 3.72),
            (-2.87, 3.6870999999999996, 3.69),
            (0.0, 3.6870999999999996, 3.69),
            (0.01, 3.6920999999999995, 3.69),
            (0.01, 3.6970999999999994, 3.7),
            (-1.25, 3.684599999999999, 3.68),
        ];
        let mut state = SimulationState::default();
        for (i, (current, walk, shown)) in expected.into_iter().enumerate() {
            let (next, sample) = tick_with(state, current, 0.0);
            assert_eq!(next.voltage, walk, "walk at tick {}", i);
            assert_eq!(sample.voltage, shown, "display at tick {}", i);
            state = next;
        }
    }

    #[test]
    fn test_charging_run_crosses_ties() {
        let shown: Vec<f64> = (0..6)
            .scan(SimulationState::default(), |state, _| {
                let (next, sample) = tick_with(*state, 1.0, 0.0);
                *state = next;
                Some(sample.voltage)
            })
            .collect();
        assert_eq!(shown, vec![3.71, 3.71, 3.71, 3.72, 3.72, 3.73]);
    }

    #[test]
    fn test_monotonic_by_sign() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let prev = rng.gen_range(3.2..=4.2);
            let current: f64 = rng.gen_range(-10.0..10.0);
            let next = next_voltage(prev, current);
            if current > 0.0 {
                assert!(next >= prev);
                assert_eq!(next, (prev + CHARGE_STEP).min(4.2));
            } else if current < 0.0 {
                assert!(next <= prev);
                assert_eq!(next, (prev + current * DISCHARGE_GAIN).max(3.2));
            }
            assert!((3.2..=4.2).contains(&next));
        }
    }

    #[test]
    fn test_auto_step_draws_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = SimulationState::default();
        for _ in 0..5_000 {
            let (next, sample) = auto_step(state, &mut rng);
            assert!((-3.0..=2.0).contains(&sample.current));
            assert!((-20.0..=25.0).contains(&sample.temperature));
            assert!((3.2..=4.2).contains(&next.voltage));
            assert!((3.2..=4.2).contains(&sample.voltage));
            assert_eq!(sample.current, round_to(sample.current, 2));
            assert_eq!(sample.temperature, round_to(sample.temperature, 1));
            state = next;
        }
    }

    #[test]
    fn test_auto_step_is_deterministic_for_seed() {
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        let s = SimulationState::default();
        assert_eq!(auto_step(s, &mut a), auto_step(s, &mut b));
    }

    #[test]
    fn test_manual_sample_snaps() {
        let s = manual_sample(9.0, -1.234, 7.6);
        assert_eq!(s.voltage, 4.2);
        assert_eq!(s.current, -1.23);
        assert_eq!(s.temperature, 8.0);
    }
}
