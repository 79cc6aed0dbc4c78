use serde::{Deserialize, Serialize};

use crate::effects::{AudioEffect, HighShelf, Limiter, Smoothed};

pub const DEFAULT_AIR: f32 = 0.30;
pub const DEFAULT_CEILING: f32 = 0.85;

pub const SHELF_FREQ: f32 = 10_000.0;
/// Shelf boost at `air = 1.0`.
pub const MAX_AIR_DB: f32 = 12.0;
/// Parameter ramp time constant in seconds.
pub const SMOOTHING_TAU: f32 = 0.1;

pub fn air_to_db(air: f32) -> f32 { air * MAX_AIR_DB }

pub fn ceiling_to_threshold_db(ceiling: f32) -> f32 { -20.0 + ceiling * 18.0 }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterParam {
    Air,
    Ceiling,
}

impl MasterParam {
    pub fn name(self) -> &'static str {
        match self { Self::Air => "air", Self::Ceiling => "ceiling" }
    }
}

/// Target values of the bus, mirrored on the control side for display.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasterLevels {
    pub air:     f32,
    pub ceiling: f32,
}

impl Default for MasterLevels {
    fn default() -> Self { Self { air: DEFAULT_AIR, ceiling: DEFAULT_CEILING } }
}

impl MasterLevels {
    /// Clamps and stores one parameter; returns the stored value.
    pub fn set(&mut self, param: MasterParam, value: f32) -> f32 {
        let v = if value.is_nan() { self.get(param) } else { value.clamp(0.0, 1.0) };
        match param {
            MasterParam::Air     => self.air = v,
            MasterParam::Ceiling => self.ceiling = v,
        }
        v
    }

    pub fn get(&self, param: MasterParam) -> f32 {
        match param {
            MasterParam::Air     => self.air,
            MasterParam::Ceiling => self.ceiling,
        }
    }
}

/// Fixed output chain: air shelf → peak limiter.
///
/// Parameters never jump; each `set_parameter` only moves the target of a
/// one-pole ramp that advances once per sample.
pub struct MasterBus {
    air:     Smoothed,
    ceiling: Smoothed,
    shelf:   HighShelf,
    limiter: Limiter,
}

impl MasterBus {
    pub fn new(sample_rate: f32, levels: MasterLevels) -> Self {
        let air     = levels.air.clamp(0.0, 1.0);
        let ceiling = levels.ceiling.clamp(0.0, 1.0);
        Self {
            air:     Smoothed::new(air, SMOOTHING_TAU, sample_rate),
            ceiling: Smoothed::new(ceiling, SMOOTHING_TAU, sample_rate),
            shelf:   HighShelf::new(sample_rate, SHELF_FREQ, air_to_db(air)),
            limiter: Limiter::new(sample_rate, ceiling_to_threshold_db(ceiling)),
        }
    }

    pub fn set_parameter(&mut self, param: MasterParam, value: f32) -> f32 {
        if value.is_nan() { return self.target(param); }
        let v = value.clamp(0.0, 1.0);
        match param {
            MasterParam::Air     => self.air.set_target(v),
            MasterParam::Ceiling => self.ceiling.set_target(v),
        }
        v
    }

    pub fn target(&self, param: MasterParam) -> f32 {
        match param {
            MasterParam::Air     => self.air.target(),
            MasterParam::Ceiling => self.ceiling.target(),
        }
    }

    /// Current (ramping) value of a parameter.
    pub fn current(&self, param: MasterParam) -> f32 {
        match param {
            MasterParam::Air     => self.air.value(),
            MasterParam::Ceiling => self.ceiling.value(),
        }
    }

    pub fn reduction_db(&self) -> f32 { self.limiter.reduction_db() }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let air     = self.air.next();
        let ceiling = self.ceiling.next();
        // Retune the shelf only when the gain actually moved.
        let db = air_to_db(air);
        if (db - self.shelf.gain_db).abs() > 1e-3 {
            self.shelf.gain_db = db;
        }
        self.limiter.threshold_db = ceiling_to_threshold_db(ceiling);
        self.limiter.process(self.shelf.process(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    #[test]
    fn parameter_mapping() {
        assert!((air_to_db(0.30) - 3.6).abs() < 1e-5);
        assert_eq!(ceiling_to_threshold_db(0.0), -20.0);
        assert_eq!(ceiling_to_threshold_db(1.0), -2.0);
        assert!((ceiling_to_threshold_db(DEFAULT_CEILING) - -4.7).abs() < 1e-4);
    }

    #[test]
    fn set_parameter_clamps_and_ramps() {
        let mut bus = MasterBus::new(SR, MasterLevels::default());
        assert_eq!(bus.set_parameter(MasterParam::Air, 3.0), 1.0);
        assert_eq!(bus.target(MasterParam::Air), 1.0);
        assert!((bus.current(MasterParam::Air) - DEFAULT_AIR).abs() < 1e-6);

        for _ in 0..(SMOOTHING_TAU * SR) as usize { bus.process(0.0); }
        let expected = DEFAULT_AIR + (1.0 - DEFAULT_AIR) * 0.632;
        assert!((bus.current(MasterParam::Air) - expected).abs() < 0.01);

        assert_eq!(bus.set_parameter(MasterParam::Ceiling, -1.0), 0.0);
        assert_eq!(bus.set_parameter(MasterParam::Ceiling, f32::NAN), 0.0);
    }

    #[test]
    fn loud_input_is_held_near_threshold() {
        let mut bus = MasterBus::new(SR, MasterLevels { air: 0.0, ceiling: 0.0 });
        let mut y = 0.0f32;
        for _ in 0..SR as usize { y = bus.process(1.0); }
        assert!(y.abs() < 0.13, "{y}");
        assert!(bus.reduction_db() < -18.0);
    }

    #[test]
    fn silence_stays_silent() {
        let mut bus = MasterBus::new(SR, MasterLevels::default());
        for _ in 0..1000 { assert_eq!(bus.process(0.0), 0.0); }
    }

    #[test]
    fn levels_mirror_clamps() {
        let mut l = MasterLevels::default();
        assert_eq!(l.set(MasterParam::Ceiling, 2.0), 1.0);
        assert_eq!(l.set(MasterParam::Air, f32::NAN), DEFAULT_AIR);
        assert_eq!(l.get(MasterParam::Ceiling), 1.0);
    }
}
