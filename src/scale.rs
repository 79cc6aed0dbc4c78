use serde::Serialize;

pub const NOTE_NAMES: [&str; 12] = ["C","C#","D","D#","E","F","F#","G","G#","A","A#","B"];

/// Pitch value that plays the reference note of a track (the root).
pub const REFERENCE_PITCH: u8 = 12;
pub const MAX_PITCH: u8 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Scale { Major, Minor }

impl Scale {
    pub fn name(self) -> &'static str {
        match self { Self::Major => "Major", Self::Minor => "Minor" }
    }

    pub fn next(self) -> Self {
        match self { Self::Major => Self::Minor, Self::Minor => Self::Major }
    }

    /// Semitone offsets of the scale degrees within one octave.
    pub fn intervals(self) -> &'static [u8; 7] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Some(Self::Major),
            "minor" | "min" => Some(Self::Minor),
            _ => None,
        }
    }

    /// True if `pitch` (0..=24, 12 = root) lands on a degree of this scale.
    pub fn contains(self, pitch: u8) -> bool {
        self.intervals().contains(&(pitch % 12))
    }

    /// Next in-scale pitch above `pitch`, saturating at `MAX_PITCH`.
    pub fn step_up(self, pitch: u8) -> u8 {
        (pitch + 1..=MAX_PITCH).find(|&p| self.contains(p)).unwrap_or(pitch.min(MAX_PITCH))
    }

    /// Next in-scale pitch below `pitch`, saturating at 0.
    pub fn step_down(self, pitch: u8) -> u8 {
        (0..pitch.min(MAX_PITCH + 1)).rev().find(|&p| self.contains(p)).unwrap_or(pitch.min(MAX_PITCH))
    }
}

/// Pitch class 0..12 (0 = C).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RootNote(pub u8);

impl RootNote {
    pub fn name(self) -> &'static str { NOTE_NAMES[(self.0 % 12) as usize] }

    pub fn next(self) -> Self { Self((self.0 + 1) % 12) }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        NOTE_NAMES.iter()
            .position(|n| n.eq_ignore_ascii_case(s))
            .map(|i| Self(i as u8))
    }

    /// Frequency of this root in the given octave (C4 = MIDI 60).
    pub fn freq(self, octave: i32) -> f32 {
        let midi = (octave + 1) * 12 + (self.0 % 12) as i32;
        midi_to_freq(midi as f32)
    }
}

impl Default for RootNote {
    fn default() -> Self { Self(0) }
}

pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2f32.powf((note - 69.0) / 12.0)
}

/// Equal-tempered frequency of a clip pitch relative to `reference`.
pub fn pitch_to_freq(pitch: u8, reference: f32) -> f32 {
    reference * 2f32.powf((pitch as f32 - REFERENCE_PITCH as f32) / 12.0)
}

/// Display name of a clip pitch with the given root, e.g. `C4`, `D#3`.
pub fn pitch_name(pitch: u8, root: RootNote, octave: i32) -> String {
    let semis = root.0 as i32 + pitch as i32 - REFERENCE_PITCH as i32;
    let class = semis.rem_euclid(12) as usize;
    let oct = octave + semis.div_euclid(12);
    format!("{}{}", NOTE_NAMES[class], oct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_pitch_plays_root() {
        let c4 = RootNote(0).freq(4);
        assert!((c4 - 261.63).abs() < 0.01);
        assert!((pitch_to_freq(12, c4) - c4).abs() < 1e-3);
        assert!((pitch_to_freq(24, c4) - 2.0 * c4).abs() < 1e-2);
        assert!((pitch_to_freq(0, c4) - 0.5 * c4).abs() < 1e-2);
        assert!((RootNote(9).freq(4) - 440.0).abs() < 1e-3);
    }

    #[test]
    fn scale_stepping_stays_in_range() {
        assert_eq!(Scale::Major.step_up(12), 14);
        assert_eq!(Scale::Minor.step_up(14), 15);
        assert_eq!(Scale::Minor.step_down(15), 14);
        assert_eq!(Scale::Major.step_up(24), 24);
        assert_eq!(Scale::Major.step_down(0), 0);
    }

    #[test]
    fn names_and_parsing() {
        assert_eq!(pitch_name(12, RootNote(0), 4), "C4");
        assert_eq!(pitch_name(11, RootNote(0), 4), "B3");
        assert_eq!(pitch_name(15, RootNote(9), 2), "C3");
        assert_eq!(RootNote::parse("d#"), Some(RootNote(3)));
        assert_eq!(RootNote::parse("H"), None);
        assert_eq!(Scale::parse("Minor"), Some(Scale::Minor));
    }
}
