use std::f32::consts::PI;

use serde::Serialize;

// ── Archetype ─────────────────────────────────────────────────────────────────

/// Synthesis recipe a track plays through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Archetype {
    Kick,
    Snare,
    Clap,
    Rim,
    ClosedHat,
    OpenHat,
    Tom,
    Bass,
    Lead,
    Noise,
}

impl Archetype {
    pub const ALL: [Archetype; 10] = [
        Archetype::Kick,
        Archetype::Snare,
        Archetype::Clap,
        Archetype::Rim,
        Archetype::ClosedHat,
        Archetype::OpenHat,
        Archetype::Tom,
        Archetype::Bass,
        Archetype::Lead,
        Archetype::Noise,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Kick      => "Kick",
            Self::Snare     => "Snare",
            Self::Clap      => "Clap",
            Self::Rim       => "Rim",
            Self::ClosedHat => "C-Hat",
            Self::OpenHat   => "O-Hat",
            Self::Tom       => "Tom",
            Self::Bass      => "Bass",
            Self::Lead      => "Lead",
            Self::Noise     => "Noise",
        }
    }

    /// Envelope length in seconds; the voice is dropped after this.
    pub fn duration(self) -> f32 {
        match self {
            Self::Kick      => 0.40,
            Self::Snare     => 0.20,
            Self::Clap      => 0.22,
            Self::Rim       => 0.06,
            Self::ClosedHat => 0.06,
            Self::OpenHat   => 0.38,
            Self::Tom       => 0.35,
            Self::Bass      => 0.30,
            Self::Lead      => 0.30,
            Self::Noise     => 0.30,
        }
    }

    /// Octave of the reference note for archetypes that follow clip pitch.
    pub fn register(self) -> Option<i32> {
        match self {
            Self::Bass                => Some(2),
            Self::Tom                 => Some(3),
            Self::Lead | Self::Noise  => Some(4),
            _                         => None,
        }
    }

    /// Fixed tone for the unpitched drums.
    pub fn base_freq(self) -> f32 {
        match self {
            Self::Kick  => 44.0,
            Self::Snare => 195.0,
            Self::Rim   => 820.0,
            _           => 0.0,
        }
    }
}

/// Everything the render engine needs to start one note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceSpec {
    pub archetype:  Archetype,
    /// `velocity * volume`.
    pub gain:       f32,
    /// Fundamental in Hz (ignored by noise-only recipes).
    pub freq:       f32,
    /// Normalised low-pass cutoff, 0.0–1.0.
    pub brightness: f32,
}

/// Cutoff in Hz for a normalised brightness: 200 Hz … 20 kHz, exponential.
pub fn brightness_to_hz(brightness: f32) -> f32 {
    200.0 * 100f32.powf(brightness.clamp(0.0, 1.0))
}

// ── Noise ─────────────────────────────────────────────────────────────────────

/// Fast XOR-shift PRNG.  Returns values uniformly in [-1, 1].
#[inline(always)]
fn xorshift(state: &mut u32) -> f32 {
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    (*state as i32 as f32) * (1.0 / i32::MAX as f32)
}

// ── Single voice ──────────────────────────────────────────────────────────────

/// One triggered note.  Generates samples until its envelope runs out.
pub struct Voice {
    archetype:   Archetype,
    sample_pos:  u64,
    dur_samples: u64,
    /// Phase accumulator for tonal components (0..1 normalised).
    phase:       f32,
    noise:       u32,
    sample_rate: f32,
    gain:        f32,
    freq:        f32,
    lp_coeff:    f32,
    lp_state:    f32,
}

impl Voice {
    pub fn new(spec: &VoiceSpec, sample_rate: f32, seed: u32) -> Self {
        let cutoff = brightness_to_hz(spec.brightness).min(sample_rate * 0.45);
        Self {
            archetype:   spec.archetype,
            sample_pos:  0,
            dur_samples: (spec.archetype.duration() * sample_rate).ceil() as u64,
            phase:       0.0,
            noise:       seed | 1, // xorshift must never be 0
            sample_rate,
            gain:        spec.gain.clamp(0.0, 1.0),
            freq:        spec.freq.max(0.0),
            lp_coeff:    1.0 - (-2.0 * PI * cutoff / sample_rate).exp(),
            lp_state:    0.0,
        }
    }

    pub fn archetype(&self) -> Archetype { self.archetype }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.sample_pos >= self.dur_samples
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.sample_pos as f32 / self.sample_rate;
        let raw = match self.archetype {
            Archetype::Kick      => self.kick(t),
            Archetype::Snare     => self.snare(t),
            Archetype::Clap      => self.clap(t),
            Archetype::Rim       => self.rim(t),
            Archetype::ClosedHat => self.closed_hat(t),
            Archetype::OpenHat   => self.open_hat(t),
            Archetype::Tom       => self.tom(t),
            Archetype::Bass      => self.saw_voice(t, 0.9),
            Archetype::Lead      => self.saw_voice(t, 0.6),
            Archetype::Noise     => self.noise_sweep(t),
        };
        self.sample_pos += 1;
        self.lp_state += self.lp_coeff * (raw - self.lp_state);
        (self.lp_state * self.gain * self.envelope(t)).clamp(-1.0, 1.0)
    }

    /// Exponential fade reaching -80 dB at the end of the voice.
    #[inline]
    fn envelope(&self, t: f32) -> f32 {
        let dur = self.archetype.duration();
        (0.0001f32.ln() * t / dur).exp()
    }

    // ── Synthesis helpers ─────────────────────────────────────────────────

    #[inline]
    fn noise(&mut self) -> f32 {
        xorshift(&mut self.noise)
    }

    #[inline]
    fn advance_phase(&mut self, freq: f32) -> f32 {
        self.phase += freq / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        self.phase
    }

    #[inline]
    fn sine(&mut self, freq: f32) -> f32 {
        (self.advance_phase(freq) * 2.0 * PI).sin()
    }

    #[inline]
    fn saw(&mut self, freq: f32) -> f32 {
        self.advance_phase(freq) * 2.0 - 1.0
    }

    // ── Recipes ───────────────────────────────────────────────────────────

    fn kick(&mut self, t: f32) -> f32 {
        // 140 Hz falling to the base tone over the first 100 ms
        let freq  = self.freq + (140.0 - self.freq) * (-t * 46.0_f32).exp();
        let tone  = self.sine(freq);
        let click = if t < 0.004 { self.noise() * 0.38 } else { 0.0 };
        tone * 0.88 + click
    }

    fn snare(&mut self, t: f32) -> f32 {
        let noise = self.noise();
        let tone  = self.sine(self.freq);
        let amp   = (-t * 12.0_f32).exp();
        (noise * 0.72 + tone * 0.28) * amp
    }

    fn rim(&mut self, _t: f32) -> f32 {
        let tone  = self.sine(self.freq);
        let noise = self.noise();
        tone * 0.7 + noise * 0.3
    }

    fn closed_hat(&mut self, _t: f32) -> f32 {
        self.noise()
    }

    fn open_hat(&mut self, t: f32) -> f32 {
        self.noise() * (-t * 3.0_f32).exp()
    }

    fn clap(&mut self, t: f32) -> f32 {
        let noise = self.noise();
        let t_ms  = t * 1000.0;
        // Three staggered transient bursts that mimic a hand clap
        let burst = if      t_ms <  4.0 { 1.00 }
                    else if t_ms <  9.0 { 0.00 }
                    else if t_ms < 13.0 { 0.82 }
                    else if t_ms < 17.0 { 0.00 }
                    else if t_ms < 21.0 { 0.62 }
                    else                { 0.00 };
        let body = if t > 0.024 { 0.42 } else { 0.0 };
        noise * (burst + body)
    }

    fn tom(&mut self, t: f32) -> f32 {
        let target = self.freq;
        let freq   = target + target * 0.6 * (-t * 22.0_f32).exp();
        let tone   = self.sine(freq);
        let noise  = self.noise();
        tone * 0.85 + noise * 0.15
    }

    fn saw_voice(&mut self, _t: f32, level: f32) -> f32 {
        self.saw(self.freq) * level
    }

    fn noise_sweep(&mut self, t: f32) -> f32 {
        // Noise ring-modulated by a downward sweep around the pitch centre
        let centre = self.freq * (1.0 + 2.0 * (-t * 9.0_f32).exp());
        let carrier = self.sine(centre);
        self.noise() * carrier
    }
}

// ── Voice pool ────────────────────────────────────────────────────────────────

/// Polyphonic pool of sounding voices with oldest-first stealing.
pub struct VoicePool {
    voices:      Vec<Voice>,
    max_voices:  usize,
    sample_rate: f32,
    /// Advanced before each trigger so every hit has a distinct noise flavour.
    seed:        u32,
}

impl VoicePool {
    pub fn new(sample_rate: f32, max_voices: usize) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            voices: Vec::with_capacity(max_voices),
            max_voices,
            sample_rate,
            seed: 0xBEEF_CAFE,
        }
    }

    pub fn len(&self) -> usize { self.voices.len() }

    pub fn is_empty(&self) -> bool { self.voices.is_empty() }

    pub fn trigger(&mut self, spec: &VoiceSpec) {
        // Hi-hat choke: a closed hat silences any ringing open hat.
        if spec.archetype == Archetype::ClosedHat {
            self.voices.retain(|v| v.archetype() != Archetype::OpenHat);
        }
        if self.voices.len() >= self.max_voices {
            self.voices.remove(0);
        }
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.voices.push(Voice::new(spec, self.sample_rate, self.seed));
    }

    /// Sum of all voices for one sample; finished voices are dropped.
    pub fn next_sample(&mut self) -> f32 {
        let mut mix = 0.0f32;
        for v in &mut self.voices {
            mix += v.next_sample();
        }
        self.voices.retain(|v| !v.is_finished());
        mix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(archetype: Archetype) -> VoiceSpec {
        VoiceSpec { archetype, gain: 0.8, freq: 110.0, brightness: 0.8 }
    }

    #[test]
    fn every_voice_terminates_within_envelope_bound() {
        let sr = 48_000.0;
        for a in Archetype::ALL {
            assert!(a.duration() <= 0.4, "{:?}", a);
            let mut v = Voice::new(&spec(a), sr, 7);
            let mut n = 0;
            while !v.is_finished() {
                let s = v.next_sample();
                assert!(s.is_finite() && s.abs() <= 1.0);
                n += 1;
            }
            assert!(n as f32 <= 0.4 * sr + 1.0);
            assert_eq!(v.next_sample(), 0.0);
        }
    }

    #[test]
    fn silent_gain_renders_silence() {
        let mut v = Voice::new(&VoiceSpec { gain: 0.0, ..spec(Archetype::Snare) }, 44_100.0, 3);
        for _ in 0..1000 {
            assert_eq!(v.next_sample(), 0.0);
        }
    }

    #[test]
    fn brightness_maps_exponentially() {
        assert!((brightness_to_hz(0.0) - 200.0).abs() < 1e-3);
        assert!((brightness_to_hz(0.5) - 2000.0).abs() < 0.5);
        assert!((brightness_to_hz(1.0) - 20_000.0).abs() < 1.0);
    }

    #[test]
    fn pool_steals_oldest_and_chokes_open_hat() {
        let mut pool = VoicePool::new(48_000.0, 3);
        pool.trigger(&spec(Archetype::OpenHat));
        pool.trigger(&spec(Archetype::Kick));
        pool.trigger(&spec(Archetype::Bass));
        pool.trigger(&spec(Archetype::Lead));
        assert_eq!(pool.len(), 3);
        assert!(pool.voices.iter().all(|v| v.archetype() != Archetype::OpenHat));

        pool.trigger(&spec(Archetype::OpenHat));
        pool.trigger(&spec(Archetype::ClosedHat));
        assert!(pool.voices.iter().all(|v| v.archetype() != Archetype::OpenHat));
    }

    #[test]
    fn pool_drains_to_empty() {
        let mut pool = VoicePool::new(8_000.0, 8);
        pool.trigger(&spec(Archetype::Kick));
        pool.trigger(&spec(Archetype::ClosedHat));
        for _ in 0..(0.5 * 8_000.0) as usize {
            pool.next_sample();
        }
        assert!(pool.is_empty());
    }
}
