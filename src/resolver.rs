use serde::Serialize;

use crate::store::Track;

// ── Random source ─────────────────────────────────────────────────────────────

/// Uniform draws in `[0, 1)` for probability rolls.
pub trait RandomSource {
    fn next_unit(&mut self) -> f32;
}

/// Seeded XOR-shift generator used for live playback.
pub struct XorShift {
    state: u32,
}

impl XorShift {
    pub fn new(seed: u32) -> Self {
        Self { state: seed | 1 } // xorshift must never be 0
    }
}

impl Default for XorShift {
    fn default() -> Self { Self::new(0xDEAD_BEEF) }
}

impl RandomSource for XorShift {
    fn next_unit(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        // Top 24 bits fit an f32 mantissa exactly, so the result stays below 1.
        (self.state >> 8) as f32 / (1u32 << 24) as f32
    }
}

// ── Fire events ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FireEvent {
    pub track_index: usize,
    pub track_id:    String,
    pub step:        usize,
    pub velocity:    f32,
    pub pitch:       u8,
}

/// Whether a track may sound at all given the solo state of the session.
/// Mute always wins on the same track.
pub fn is_audible(track: &Track, any_solo: bool) -> bool {
    !track.mute && (!any_solo || track.solo)
}

/// Probability gate: never below or at zero, always at one.
pub fn passes(probability: f32, roll: f32) -> bool {
    probability > 0.0 && roll <= probability
}

/// Decides which tracks fire at `position`.
///
/// Each track reads its own step (`position % clip length`).  A roll is only
/// drawn for gated, audible steps, so silent tracks never consume randomness.
pub fn resolve(position: u64, tracks: &[Track], rng: &mut dyn RandomSource) -> Vec<FireEvent> {
    let any_solo = tracks.iter().any(|t| t.solo);
    let mut fired = Vec::new();

    for (index, track) in tracks.iter().enumerate() {
        let clip = track.active_clip();
        let step = clip.step_at(position);
        if !clip.gate(step) { continue; }
        if !is_audible(track, any_solo) { continue; }

        let probability = clip.probability(step);
        if probability < 1.0 && !passes(probability, rng.next_unit()) {
            continue;
        }

        fired.push(FireEvent {
            track_index: index,
            track_id:    track.id.clone(),
            step,
            velocity:    clip.velocity(step),
            pitch:       clip.pitch(step),
        });
    }
    fired
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{Clip, SequencerState, TrackParams};
    use crate::voice::Archetype;

    /// Replays a fixed sequence of rolls, cycling.
    pub struct FixedRolls {
        rolls: Vec<f32>,
        next:  usize,
    }

    impl FixedRolls {
        pub fn new(rolls: &[f32]) -> Self {
            Self { rolls: rolls.to_vec(), next: 0 }
        }
    }

    impl RandomSource for FixedRolls {
        fn next_unit(&mut self) -> f32 {
            let r = self.rolls[self.next % self.rolls.len()];
            self.next += 1;
            r
        }
    }

    fn every_step(id: &str, probability: f32) -> Track {
        Track::new(id, id, "white", Archetype::Kick, 1.0, Clip::pattern(16, |_| true, |_| 0.8, probability))
    }

    #[test]
    fn solo_mute_precedence() {
        let mut a = every_step("a", 1.0);
        a.solo = true;
        let b = every_step("b", 1.0);
        let mut c = every_step("c", 1.0);
        c.mute = true;
        let mut rng = XorShift::default();
        let fired = resolve(0, &[a, b, c], &mut rng);
        let ids: Vec<&str> = fired.iter().map(|e| e.track_id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[test]
    fn mute_beats_solo_on_same_track() {
        let mut a = every_step("a", 1.0);
        a.solo = true;
        a.mute = true;
        let mut rng = XorShift::default();
        assert!(resolve(3, &[a, every_step("b", 1.0)], &mut rng).is_empty());
    }

    #[test]
    fn certain_and_impossible_probabilities() {
        let tracks = [every_step("always", 1.0), every_step("never", 0.0)];
        let mut rng = FixedRolls::new(&[0.0, 0.5, 0.999]);
        let mut always = 0;
        for pos in 0..1000 {
            for e in resolve(pos, &tracks, &mut rng) {
                assert_eq!(e.track_id, "always");
                always += 1;
            }
        }
        assert_eq!(always, 1000);
    }

    #[test]
    fn roll_at_threshold_fires() {
        let tracks = [every_step("half", 0.5)];
        assert_eq!(resolve(0, &tracks, &mut FixedRolls::new(&[0.5])).len(), 1);
        assert!(resolve(0, &tracks, &mut FixedRolls::new(&[0.51])).is_empty());
    }

    #[test]
    fn xorshift_stays_in_unit_interval() {
        let mut rng = XorShift::new(42);
        for _ in 0..10_000 {
            let r = rng.next_unit();
            assert!((0.0..1.0).contains(&r), "{r}");
        }
    }

    #[test]
    fn polymetric_tracks_use_own_length() {
        let mut s = SequencerState::initial_kit();
        s.toggle_step("ai", 0);
        s.set_step_probability("ai", 0, 1.0);
        for t in s.tracks.iter().map(|t| t.id.clone()).collect::<Vec<_>>() {
            if t != "ai" {
                s.set_track_param(&t, TrackParams { mute: Some(true), ..Default::default() });
            }
        }
        let mut rng = XorShift::default();
        let hits: Vec<u64> = (0..48)
            .filter(|&p| !resolve(p, &s.tracks, &mut rng).is_empty())
            .collect();
        assert_eq!(hits, vec![0, 12, 24, 36]);
    }

    #[test]
    fn event_carries_step_data() {
        let mut s = SequencerState::initial_kit();
        s.set_step_pitch("bd", 4, 19);
        let mut rng = XorShift::default();
        let e = resolve(4, &s.tracks, &mut rng).into_iter().find(|e| e.track_id == "bd").unwrap();
        assert_eq!((e.track_index, e.step, e.pitch), (0, 4, 19));
        assert_eq!(e.velocity, 0.9);
    }
}
