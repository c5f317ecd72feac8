//! Manual-mode input sliders and the key bindings that drive them.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::sample::{Bounds, CURRENT, TEMPERATURE, VOLTAGE};
use crate::session::{Event, Mode};

/// Steps moved by PageUp/PageDown.
const COARSE_STEPS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slider {
    pub label: &'static str,
    pub bounds: Bounds,
    pub value: f64,
}

impl Slider {
    pub fn new(label: &'static str, bounds: Bounds) -> Self {
        Self {
            label,
            bounds,
            value: bounds.default,
        }
    }

    /// Moves by whole steps, staying on the step grid inside the range.
    /// Returns whether the value changed.
    pub fn nudge(&mut self, steps: i32) -> bool {
        let next = self.bounds.snap(self.value + steps as f64 * self.bounds.step);
        let changed = next != self.value;
        self.value = next;
        changed
    }

    /// Position in the range, 0.0 at `min` and 1.0 at `max`.
    pub fn ratio(&self) -> f64 {
        let span = self.bounds.max - self.bounds.min;
        ((self.value - self.bounds.min) / span).clamp(0.0, 1.0)
    }

    pub fn display_value(&self) -> String {
        format!("{:.*}", self.bounds.decimals, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sliders {
    pub items: [Slider; 3],
    pub selected: usize,
}

impl Default for Sliders {
    fn default() -> Self {
        Self {
            items: [
                Slider::new("Voltage (V)", VOLTAGE),
                Slider::new("Current (A)", CURRENT),
                Slider::new("Temperature (°C)", TEMPERATURE),
            ],
            selected: 0,
        }
    }
}

impl Sliders {
    /// Back to the input defaults, as when manual mode is first shown.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.items.len();
    }

    pub fn select_prev(&mut self) {
        self.selected = (self.selected + self.items.len() - 1) % self.items.len();
    }

    pub fn nudge_selected(&mut self, steps: i32) -> bool {
        self.items[self.selected].nudge(steps)
    }

    /// Override built from the current slider positions.
    pub fn event(&self) -> Event {
        Event::Manual {
            voltage: self.items[0].value,
            current: self.items[1].value,
            temperature: self.items[2].value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    None,
    Redraw,
    Quit,
    ToggleAuto,
    Submit(Event),
}

/// Maps a key press to what the runtime should do. Slider keys are only
/// live in manual mode, and every change submits a fresh override.
pub fn handle_key(key: KeyEvent, mode: Mode, sliders: &mut Sliders) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Action::Quit,
        KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Char(' ') => return Action::ToggleAuto,
        _ => {}
    }
    if mode == Mode::Auto {
        return Action::None;
    }
    let steps = match key.code {
        KeyCode::Up => {
            sliders.select_prev();
            return Action::Redraw;
        }
        KeyCode::Down | KeyCode::Tab => {
            sliders.select_next();
            return Action::Redraw;
        }
        KeyCode::Enter => return Action::Submit(sliders.event()),
        KeyCode::Left => -1,
        KeyCode::Right => 1,
        KeyCode::PageDown => -COARSE_STEPS,
        KeyCode::PageUp => COARSE_STEPS,
        _ => return Action::None,
    };
    if sliders.nudge_selected(steps) {
        Action::Submit(sliders.event())
    } else {
        Action::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_defaults_match_inputs() {
        let s = Sliders::default();
        assert_eq!(
            s.event(),
            Event::Manual { voltage: 3.7, current: -1.0, temperature: 0.0 }
        );
    }

    #[test]
    fn test_nudge_stays_on_grid_and_in_range() {
        let mut v = Slider::new("Voltage (V)", VOLTAGE);
        assert!(v.nudge(1));
        assert_eq!(v.value, 3.71);
        assert!(v.nudge(-3));
        assert_eq!(v.value, 3.68);
        v.nudge(1_000);
        assert_eq!(v.value, 4.2);
        assert!(!v.nudge(1));
        assert_eq!(v.value, 4.2);

        let mut t = Slider::new("Temperature (°C)", TEMPERATURE);
        t.nudge(-COARSE_STEPS);
        assert_eq!(t.value, -10.0);
        assert_eq!(t.display_value(), "-10");
    }

    #[test]
    fn test_ratio() {
        let mut t = Slider::new("Temperature (°C)", TEMPERATURE);
        t.value = -20.0;
        assert_eq!(t.ratio(), 0.0);
        t.value = 25.0;
        assert_eq!(t.ratio(), 1.0);
    }

    #[test]
    fn test_selection_wraps() {
        let mut s = Sliders::default();
        s.select_prev();
        assert_eq!(s.selected, 2);
        s.select_next();
        assert_eq!(s.selected, 0);
    }

    #[test]
    fn test_manual_keys_submit_overrides() {
        let mut s = Sliders::default();
        assert_eq!(handle_key(press(KeyCode::Down), Mode::Manual, &mut s), Action::Redraw);
        assert_eq!(
            handle_key(press(KeyCode::Right), Mode::Manual, &mut s),
            Action::Submit(Event::Manual { voltage: 3.7, current: -0.99, temperature: 0.0 })
        );
        assert_eq!(
            handle_key(press(KeyCode::Enter), Mode::Manual, &mut s),
            Action::Submit(Event::Manual { voltage: 3.7, current: -0.99, temperature: 0.0 })
        );
    }

    #[test]
    fn test_slider_at_limit_does_not_resubmit() {
        let mut s = Sliders::default();
        s.items[0].value = 4.2;
        assert_eq!(handle_key(press(KeyCode::Right), Mode::Manual, &mut s), Action::None);
    }

    #[test]
    fn test_slider_keys_ignored_in_auto() {
        let mut s = Sliders::default();
        assert_eq!(handle_key(press(KeyCode::Right), Mode::Auto, &mut s), Action::None);
        assert_eq!(s, Sliders::default());
    }

    #[test]
    fn test_quit_and_toggle() {
        let mut s = Sliders::default();
        assert_eq!(handle_key(press(KeyCode::Char('q')), Mode::Auto, &mut s), Action::Quit);
        assert_eq!(
            handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), Mode::Manual, &mut s),
            Action::Quit
        );
        assert_eq!(handle_key(press(KeyCode::Char('a')), Mode::Manual, &mut s), Action::ToggleAuto);
    }
}
