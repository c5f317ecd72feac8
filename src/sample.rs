//! Battery sensor sample and the input bounds shared by the auto simulator
//! and manual overrides.

use serde::{Deserialize, Serialize};

/// Column order expected by every SoC model artifact.
pub const FEATURE_NAMES: [&str; 3] = ["Voltage", "Current", "Temp"];

/// Range and resolution of one input channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    /// Decimal places implied by `step`.
    pub decimals: usize,
}

pub const VOLTAGE: Bounds = Bounds {
    min: 3.2,
    max: 4.2,
    step: 0.01,
    default: 3.7,
    decimals: 2,
};

pub const CURRENT: Bounds = Bounds {
    min: -3.0,
    max: 2.0,
    step: 0.01,
    default: -1.0,
    decimals: 2,
};

pub const TEMPERATURE: Bounds = Bounds {
    min: -20.0,
    max: 25.0,
    step: 1.0,
    default: 0.0,
    decimals: 0,
};

impl Bounds {
    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }

    /// Clamp into range and quantize to the nearest step counted from `min`.
    pub fn snap(&self, x: f64) -> f64 {
        if x.is_nan() {
            return self.default;
        }
        let clamped = self.clamp(x);
        let steps = ((clamped - self.min) / self.step).round();
        let snapped = round_to(self.min + steps * self.step, self.decimals);
        self.clamp(snapped)
    }
}

/// Round to `decimals` places on the exact binary value of `x`, ties to even.
///
/// Scaling by `10^decimals` first would round the product, so `3.705`
/// (stored just above the tie) would come out as `3.70`. Fixed-precision
/// formatting works on the exact value instead.
pub fn round_to(x: f64, decimals: usize) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{:.*}", decimals, x).parse().unwrap_or(x)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    Charging,
    Discharging,
    Idle,
}

impl ChargeState {
    /// Pure function of the sign of `current`; zero and NaN are idle.
    pub fn from_current(current: f64) -> Self {
        if current > 0.0 {
            ChargeState::Charging
        } else if current < 0.0 {
            ChargeState::Discharging
        } else {
            ChargeState::Idle
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChargeState::Charging => "Charging",
            ChargeState::Discharging => "Discharging",
            ChargeState::Idle => "Idle",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ChargeState::Charging => "green",
            ChargeState::Discharging => "red",
            ChargeState::Idle => "gray",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeState::Charging => "charging",
            ChargeState::Discharging => "discharging",
            ChargeState::Idle => "idle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "charging" => Some(ChargeState::Charging),
            "discharging" => Some(ChargeState::Discharging),
            "idle" => Some(ChargeState::Idle),
            _ => None,
        }
    }
}

/// One model input row in `FEATURE_NAMES` order.
pub type FeatureRow = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
}

impl Sample {
    pub fn features(&self) -> FeatureRow {
        [self.voltage, self.current, self.temperature]
    }

    pub fn charge_state(&self) -> ChargeState {
        ChargeState::from_current(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_state_sign() {
        assert_eq!(ChargeState::from_current(0.01), ChargeState::Charging);
        assert_eq!(ChargeState::from_current(-0.01), ChargeState::Discharging);
        assert_eq!(ChargeState::from_current(0.0), ChargeState::Idle);
        assert_eq!(ChargeState::from_current(-0.0), ChargeState::Idle);
        assert_eq!(ChargeState::from_current(f64::NAN), ChargeState::Idle);
        assert_eq!(ChargeState::from_current(f64::INFINITY), ChargeState::Charging);
        assert_eq!(ChargeState::from_current(f64::NEG_INFINITY), ChargeState::Discharging);
    }

    #[test]
    fn test_charge_state_parse_round_trip() {
        for s in [ChargeState::Charging, ChargeState::Discharging, ChargeState::Idle] {
            assert_eq!(ChargeState::parse(s.as_str()), Some(s));
        }
        assert_eq!(ChargeState::parse("full"), None);
    }

    #[test]
    fn test_round_to_half_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(1.5, 0), 2.0);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-1.234, 1), -1.2);
    }

    #[test]
    fn test_round_to_uses_exact_binary_value() {
        // 3.705 is stored slightly above the tie, 2.675 slightly below.
        assert_eq!(round_to(3.705, 2), 3.71);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(-1.005, 2), -1.0);
        assert_eq!(round_to(12.25, 1), 12.2);
        assert_eq!(round_to(-7.45, 1), -7.5);
        // current draws at two decimals
        assert_eq!(round_to(-1.125, 2), -1.12);
        assert_eq!(round_to(0.015, 2), 0.01);
        assert_eq!(round_to(1.985, 2), 1.99);
    }

    #[test]
    fn test_round_to_passes_non_finite_through() {
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_snap_clamps_and_quantizes() {
        assert_eq!(VOLTAGE.snap(5.0), 4.2);
        assert_eq!(VOLTAGE.snap(1.0), 3.2);
        assert_eq!(VOLTAGE.snap(3.7049), 3.7);
        assert_eq!(CURRENT.snap(-1.236), -1.24);
        assert_eq!(TEMPERATURE.snap(12.4), 12.0);
        assert_eq!(TEMPERATURE.snap(-40.0), -20.0);
        assert_eq!(TEMPERATURE.snap(f64::NAN), 0.0);
    }

    #[test]
    fn test_defaults_inside_bounds() {
        for b in [VOLTAGE, CURRENT, TEMPERATURE] {
            assert!((b.min..=b.max).contains(&b.default));
            assert_eq!(b.snap(b.default), b.default);
        }
    }

    #[test]
    fn test_features_order() {
        let s = Sample { voltage: 3.9, current: -0.5, temperature: 10.0 };
        assert_eq!(s.features(), [3.9, -0.5, 10.0]);
        assert_eq!(s.charge_state(), ChargeState::Discharging);
    }
}
