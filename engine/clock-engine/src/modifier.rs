//! Time modifiers: rules turning measured elapsed time into the delta callbacks see.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// Largest rolling window, in samples, accepted for [`ModifierKind::Average`]
pub const MAX_AVERAGE_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Measured delta passes through unchanged
    None,
    /// Delta is always the modifier value
    Fixed,
    /// Delta is the measured delta times the modifier value
    Multiply,
    /// Delta is the measured delta capped at the modifier value
    Maxed,
    /// Delta is the rolling mean of the last `value` measured deltas
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub value: f64,
}

impl Default for Modifier {
    fn default() -> Self {
        Self::NONE
    }
}

impl Modifier {
    pub const NONE: Modifier = Modifier { kind: ModifierKind::None, value: 0.0 };

    pub fn new(kind: ModifierKind, value: f64) -> Result<Self, ClockError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ClockError::InvalidModifierValue { value });
        }
        if kind == ModifierKind::Average && !(1.0..=MAX_AVERAGE_WINDOW as f64).contains(&value) {
            return Err(ClockError::InvalidModifierValue { value });
        }
        if kind == ModifierKind::None {
            return Ok(Self::NONE);
        }
        Ok(Self { kind, value })
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == ModifierKind::None
    }

    /// Computes the effective delta for a measured `dt`.
    ///
    /// `history` is only touched by [`ModifierKind::Average`].
    pub fn apply(&self, dt: f64, history: &mut DtHistory) -> f64 {
        match self.kind {
            ModifierKind::None => dt,
            ModifierKind::Fixed => self.value,
            ModifierKind::Multiply => dt * self.value,
            ModifierKind::Maxed => dt.min(self.value),
            ModifierKind::Average => history.push_and_average(dt, self.window()),
        }
    }

    fn window(&self) -> usize {
        (self.value.round() as usize).clamp(1, MAX_AVERAGE_WINDOW)
    }
}

/// Rolling window of measured deltas backing the AVERAGE modifier
#[derive(Debug, Clone, Default)]
pub struct DtHistory {
    samples: VecDeque<f64>,
}

impl DtHistory {
    pub fn push_and_average(&mut self, dt: f64, window: usize) -> f64 {
        self.samples.push_back(dt);
        while self.samples.len() > window {
            self.samples.pop_front();
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fixed_ignores_measured_time() {
        let m = Modifier::new(ModifierKind::Fixed, 0.02).unwrap();
        let mut h = DtHistory::default();
        assert!(close(m.apply(0.5, &mut h), 0.02));
        assert!(close(m.apply(0.0, &mut h), 0.02));
    }

    #[test]
    fn multiply_scales() {
        let m = Modifier::new(ModifierKind::Multiply, 0.5).unwrap();
        let mut h = DtHistory::default();
        assert!(close(m.apply(0.1, &mut h), 0.05));
    }

    #[test]
    fn maxed_caps_large_deltas_only() {
        let m = Modifier::new(ModifierKind::Maxed, 0.05).unwrap();
        let mut h = DtHistory::default();
        assert!(close(m.apply(0.2, &mut h), 0.05));
        assert!(close(m.apply(0.01, &mut h), 0.01));
    }

    #[test]
    fn average_uses_rolling_window() {
        let m = Modifier::new(ModifierKind::Average, 3.0).unwrap();
        let mut h = DtHistory::default();
        assert!(close(m.apply(0.3, &mut h), 0.3));
        assert!(close(m.apply(0.0, &mut h), 0.15));
        assert!(close(m.apply(0.3, &mut h), 0.2));
        // 0.3 drops out of the window
        assert!(close(m.apply(0.0, &mut h), 0.1));
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Modifier::new(ModifierKind::Multiply, -1.0).is_err());
        assert!(Modifier::new(ModifierKind::Fixed, f64::NAN).is_err());
        assert!(Modifier::new(ModifierKind::Average, 0.5).is_err());
        assert!(Modifier::new(ModifierKind::Average, 1e15).is_err());
        assert!(Modifier::new(ModifierKind::Average, MAX_AVERAGE_WINDOW as f64).is_ok());
    }

    #[test]
    fn none_kind_normalizes_value() {
        let m = Modifier::new(ModifierKind::None, 4.0).unwrap();
        assert_eq!(m, Modifier::NONE);
        let mut h = DtHistory::default();
        assert!(close(m.apply(0.25, &mut h), 0.25));
    }
}
