use std::f32::consts::PI;

/// Mono audio effect: one sample in, one sample out.
///
/// Implementations must be `Send` so they can live inside the audio thread.
pub trait AudioEffect: Send {
    fn process(&mut self, sample: f32) -> f32;
    fn name(&self) -> &'static str;
    /// Reset all internal state (filter memory, envelopes).
    fn reset(&mut self);
}

#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-9).log10()
}

// ── Parameter smoothing ───────────────────────────────────────────────────────

/// One-pole ramp toward a target: after `tau` seconds the value has covered
/// ~63% of the distance.
pub struct Smoothed {
    value:  f32,
    target: f32,
    coeff:  f32,
}

impl Smoothed {
    pub fn new(initial: f32, tau_s: f32, sample_rate: f32) -> Self {
        Self {
            value:  initial,
            target: initial,
            coeff:  1.0 - (-1.0 / (tau_s * sample_rate).max(1.0)).exp(),
        }
    }

    pub fn set_target(&mut self, target: f32) { self.target = target; }

    pub fn target(&self) -> f32 { self.target }

    pub fn value(&self) -> f32 { self.value }

    #[inline]
    pub fn next(&mut self) -> f32 {
        self.value += self.coeff * (self.target - self.value);
        self.value
    }
}

// ── High shelf (RBJ Audio EQ Cookbook, shelf slope 1) ─────────────────────────

pub struct HighShelf {
    pub freq:    f32,
    pub gain_db: f32,
    sample_rate: f32,
    // Cached normalised coefficients
    b0: f32, b1: f32, b2: f32, a1: f32, a2: f32,
    // Direct Form I delay state
    x1: f32, x2: f32, y1: f32, y2: f32,
    // Last computed params to detect when a recompute is needed
    last_freq: f32, last_gain_db: f32,
}

impl HighShelf {
    pub fn new(sample_rate: f32, freq: f32, gain_db: f32) -> Self {
        let mut f = Self {
            freq,
            gain_db,
            sample_rate,
            b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0,
            x1: 0.0, x2: 0.0, y1: 0.0, y2: 0.0,
            last_freq: -1.0, last_gain_db: f32::NAN,
        };
        f.recompute();
        f
    }

    fn recompute(&mut self) {
        let a     = 10f32.powf(self.gain_db / 40.0);
        let w0    = 2.0 * PI * self.freq.min(self.sample_rate * 0.499) / self.sample_rate;
        let cos_w = w0.cos();
        let alpha = w0.sin() / 2.0 * 2f32.sqrt();
        let sq    = 2.0 * a.sqrt() * alpha;

        let b0 =        a * ((a + 1.0) + (a - 1.0) * cos_w + sq);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w);
        let b2 =        a * ((a + 1.0) + (a - 1.0) * cos_w - sq);
        let a0 =             (a + 1.0) - (a - 1.0) * cos_w + sq;
        let a1 =  2.0 *     ((a - 1.0) - (a + 1.0) * cos_w);
        let a2 =             (a + 1.0) - (a - 1.0) * cos_w - sq;

        self.b0 = b0 / a0;  self.b1 = b1 / a0;  self.b2 = b2 / a0;
        self.a1 = a1 / a0;  self.a2 = a2 / a0;

        self.last_freq    = self.freq;
        self.last_gain_db = self.gain_db;
    }
}

impl AudioEffect for HighShelf {
    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        if self.freq != self.last_freq || self.gain_db != self.last_gain_db {
            self.recompute();
        }
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
                             - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;  self.x1 = x;
        self.y2 = self.y1;  self.y1 = y;
        y
    }

    fn name(&self) -> &'static str { "Air" }

    fn reset(&mut self) {
        self.x1 = 0.0; self.x2 = 0.0; self.y1 = 0.0; self.y2 = 0.0;
    }
}

// ── Peak limiter ──────────────────────────────────────────────────────────────

/// Hard-knee feed-forward compressor with a high ratio.
pub struct Limiter {
    pub threshold_db: f32,
    pub ratio:        f32,
    attack:  f32,
    release: f32,
    env:     f32,
}

impl Limiter {
    pub fn new(sample_rate: f32, threshold_db: f32) -> Self {
        Self {
            threshold_db,
            ratio:   20.0,
            attack:  (-1.0 / (0.003 * sample_rate)).exp(),
            release: (-1.0 / (0.250 * sample_rate)).exp(),
            env:     0.0,
        }
    }

    /// Current gain reduction in dB (≤ 0).
    pub fn reduction_db(&self) -> f32 {
        let over = gain_to_db(self.env) - self.threshold_db;
        if over > 0.0 { -over * (1.0 - 1.0 / self.ratio) } else { 0.0 }
    }
}

impl AudioEffect for Limiter {
    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let level = x.abs();
        let coeff = if level > self.env { self.attack } else { self.release };
        self.env = coeff * self.env + (1.0 - coeff) * level;
        x * db_to_gain(self.reduction_db())
    }

    fn name(&self) -> &'static str { "Limiter" }

    fn reset(&mut self) { self.env = 0.0; }
}
