use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::clock::clamp_bpm;
use crate::scale::{RootNote, Scale, MAX_PITCH, REFERENCE_PITCH};
use crate::voice::Archetype;

pub const MAX_CLIPS: usize = 4;
pub const DEFAULT_CLIP_LEN: usize = 16;
pub const MAX_CLIP_LEN: usize = 64;

pub const DEFAULT_VELOCITY: f32 = 0.8;
pub const DEFAULT_PROBABILITY: f32 = 1.0;
pub const DEFAULT_FREQUENCY: f32 = 0.8;

// ── Clip identity ─────────────────────────────────────────────────────────────

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ClipId(pub u64);

fn next_clip_id() -> ClipId {
    ClipId(NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub beats:       u8,
    pub subdivision: u8,
}

impl TimeSignature {
    /// Steps in one bar of this signature.
    pub fn grid_len(self) -> usize {
        (self.beats.max(1) as usize) * (self.subdivision.max(1) as usize)
    }
}

impl Default for TimeSignature {
    fn default() -> Self { Self { beats: 4, subdivision: 4 } }
}

// ── Clip ──────────────────────────────────────────────────────────────────────

/// One pattern: parallel per-step arrays that always share one length.
///
/// The arrays are private so every edit goes through a method that keeps
/// them in lockstep.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    id:             ClipId,
    steps:          Vec<bool>,
    velocities:     Vec<f32>,
    probabilities:  Vec<f32>,
    pitches:        Vec<u8>,
    pub time_signature: TimeSignature,
}

impl Clip {
    pub fn empty(len: usize) -> Self {
        let len = len.clamp(1, MAX_CLIP_LEN);
        Self {
            id:             next_clip_id(),
            steps:          vec![false; len],
            velocities:     vec![DEFAULT_VELOCITY; len],
            probabilities:  vec![DEFAULT_PROBABILITY; len],
            pitches:        vec![REFERENCE_PITCH; len],
            time_signature: TimeSignature::default(),
        }
    }

    /// Builds a clip from per-step gate and velocity functions.
    pub fn pattern(
        len: usize,
        gate: impl Fn(usize) -> bool,
        velocity: impl Fn(usize) -> f32,
        probability: f32,
    ) -> Self {
        let mut clip = Self::empty(len);
        for i in 0..clip.len() {
            clip.steps[i]         = gate(i);
            clip.velocities[i]    = velocity(i).clamp(0.0, 1.0);
            clip.probabilities[i] = probability.clamp(0.0, 1.0);
        }
        clip
    }

    /// Deep copy under a fresh identity.
    pub fn duplicate(&self) -> Self {
        Self { id: next_clip_id(), ..self.clone() }
    }

    pub fn id(&self) -> ClipId { self.id }

    pub fn len(&self) -> usize { self.steps.len() }

    /// True when no step is gated.
    pub fn has_no_gates(&self) -> bool { !self.steps.iter().any(|&s| s) }

    pub fn steps(&self) -> &[bool] { &self.steps }
    pub fn velocities(&self) -> &[f32] { &self.velocities }
    pub fn probabilities(&self) -> &[f32] { &self.probabilities }
    pub fn pitches(&self) -> &[u8] { &self.pitches }

    pub fn gate(&self, step: usize) -> bool { self.steps.get(step).copied().unwrap_or(false) }
    pub fn velocity(&self, step: usize) -> f32 { self.velocities.get(step).copied().unwrap_or(0.0) }
    pub fn probability(&self, step: usize) -> f32 { self.probabilities.get(step).copied().unwrap_or(0.0) }
    pub fn pitch(&self, step: usize) -> u8 { self.pitches.get(step).copied().unwrap_or(REFERENCE_PITCH) }

    /// Indices of all set gates.
    pub fn active_steps(&self) -> Vec<usize> {
        self.steps.iter().enumerate().filter(|(_, &s)| s).map(|(i, _)| i).collect()
    }

    /// Step index this clip plays at a global transport position.
    pub fn step_at(&self, position: u64) -> usize {
        (position % self.len() as u64) as usize
    }

    pub fn toggle(&mut self, step: usize) -> bool {
        match self.steps.get_mut(step) {
            Some(s) => { *s = !*s; true }
            None => false,
        }
    }

    /// Resets every gate; velocities, probabilities and pitches stay.
    pub fn clear(&mut self) {
        self.steps.fill(false);
    }

    pub fn set_velocity(&mut self, step: usize, v: f32) -> bool {
        set_clamped(&mut self.velocities, step, v)
    }

    pub fn set_probability(&mut self, step: usize, p: f32) -> bool {
        set_clamped(&mut self.probabilities, step, p)
    }

    pub fn set_pitch(&mut self, step: usize, pitch: u8) -> bool {
        match self.pitches.get_mut(step) {
            Some(p) => { *p = pitch.min(MAX_PITCH); true }
            None => false,
        }
    }

    /// Resizes all parallel arrays together; new slots take defaults.
    pub fn resize(&mut self, len: usize) -> bool {
        if len == 0 || len > MAX_CLIP_LEN { return false; }
        self.steps.resize(len, false);
        self.velocities.resize(len, DEFAULT_VELOCITY);
        self.probabilities.resize(len, DEFAULT_PROBABILITY);
        self.pitches.resize(len, REFERENCE_PITCH);
        true
    }

    /// Spreads `hits` gates as evenly as possible over the clip.
    pub fn euclidean(&mut self, hits: usize) {
        let n = self.len();
        let k = hits.min(n);
        self.steps.fill(false);
        let mut bucket = 0usize;
        for i in 0..n {
            bucket += k;
            if bucket >= n { bucket -= n; self.steps[i] = true; }
        }
    }
}

fn set_clamped(values: &mut [f32], step: usize, v: f32) -> bool {
    if v.is_nan() { return false; }
    match values.get_mut(step) {
        Some(slot) => { *slot = v.clamp(0.0, 1.0); true }
        None => false,
    }
}

// ── Track ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id:        String,
    pub name:      String,
    pub color:     &'static str,
    pub mute:      bool,
    pub solo:      bool,
    /// Gain multiplier, 0.0–1.0.
    pub volume:    f32,
    /// Normalised brightness / cutoff, 0.0–1.0.
    pub frequency: f32,
    pub engine:    Archetype,
    clips:         Vec<Clip>,
    active_clip:   usize,
}

impl Track {
    pub fn new(id: &str, name: &str, color: &'static str, engine: Archetype, volume: f32, clip: Clip) -> Self {
        Self {
            id:          id.to_string(),
            name:        name.to_string(),
            color,
            mute:        false,
            solo:        false,
            volume:      volume.clamp(0.0, 1.0),
            frequency:   DEFAULT_FREQUENCY,
            engine,
            clips:       vec![clip],
            active_clip: 0,
        }
    }

    pub fn clips(&self) -> &[Clip] { &self.clips }

    pub fn active_clip_index(&self) -> usize { self.active_clip }

    pub fn active_clip(&self) -> &Clip { &self.clips[self.active_clip] }

    fn active_clip_mut(&mut self) -> &mut Clip { &mut self.clips[self.active_clip] }

    pub fn is_full(&self) -> bool { self.clips.len() >= MAX_CLIPS }
}

/// Partial update of a track's mix controls; `None` leaves a field alone.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrackParams {
    pub volume:    Option<f32>,
    pub mute:      Option<bool>,
    pub solo:      Option<bool>,
    pub frequency: Option<f32>,
}

// ── Sequencer state ───────────────────────────────────────────────────────────

/// Aggregate root of the session: transport mirror, musical settings and the
/// ordered track list.
///
/// Every mutation is total.  Requests naming an unknown track or an
/// out-of-range index return `false` and leave the state untouched.
#[derive(Clone, Debug)]
pub struct SequencerState {
    pub is_playing:     bool,
    pub bpm:            f32,
    pub root_note:      RootNote,
    pub scale:          Scale,
    pub time_signature: TimeSignature,
    pub tracks:         Vec<Track>,
}

impl SequencerState {
    pub fn new(bpm: f32, root_note: RootNote, scale: Scale, tracks: Vec<Track>) -> Self {
        Self {
            is_playing: false,
            bpm: clamp_bpm(bpm),
            root_note,
            scale,
            time_signature: TimeSignature::default(),
            tracks,
        }
    }

    /// The ten-track performance kit every session starts from.
    pub fn initial_kit() -> Self {
        Self::new(124.0, RootNote(0), Scale::Minor, initial_tracks())
    }

    pub fn grid_len(&self) -> usize { self.time_signature.grid_len() }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn track_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn any_solo(&self) -> bool { self.tracks.iter().any(|t| t.solo) }

    pub fn toggle_step(&mut self, track: &str, step: usize) -> bool {
        self.track_mut(track).is_some_and(|t| t.active_clip_mut().toggle(step))
    }

    pub fn set_track_param(&mut self, track: &str, params: TrackParams) -> bool {
        let Some(t) = self.track_mut(track) else { return false };
        if let Some(v) = params.volume.filter(|v| !v.is_nan()) { t.volume = v.clamp(0.0, 1.0); }
        if let Some(m) = params.mute { t.mute = m; }
        if let Some(s) = params.solo { t.solo = s; }
        if let Some(f) = params.frequency.filter(|f| !f.is_nan()) { t.frequency = f.clamp(0.0, 1.0); }
        true
    }

    /// Appends an empty clip (same length as the active one) and launches it.
    pub fn create_clip(&mut self, track: &str) -> bool {
        let Some(t) = self.track_mut(track) else { return false };
        if t.is_full() { return false; }
        let mut clip = Clip::empty(t.active_clip().len());
        clip.time_signature = t.active_clip().time_signature;
        t.clips.push(clip);
        t.active_clip = t.clips.len() - 1;
        true
    }

    /// Appends a deep copy of `clip`; the active clip does not change.
    pub fn duplicate_clip(&mut self, track: &str, clip: usize) -> bool {
        let Some(t) = self.track_mut(track) else { return false };
        if t.is_full() { return false; }
        let Some(copy) = t.clips.get(clip).map(Clip::duplicate) else { return false };
        t.clips.push(copy);
        true
    }

    pub fn clear_clip(&mut self, track: &str, clip: usize) -> bool {
        let Some(c) = self.track_mut(track).and_then(|t| t.clips.get_mut(clip)) else { return false };
        c.clear();
        true
    }

    pub fn launch_clip(&mut self, track: &str, clip: usize) -> bool {
        let Some(t) = self.track_mut(track) else { return false };
        if clip >= t.clips.len() { return false; }
        t.active_clip = clip;
        true
    }

    /// Removes a clip unless it is the track's last one.  The active clip is
    /// kept when it survives, otherwise its neighbour becomes active.
    pub fn delete_clip(&mut self, track: &str, clip: usize) -> bool {
        let Some(t) = self.track_mut(track) else { return false };
        if clip >= t.clips.len() || t.clips.len() == 1 { return false; }
        t.clips.remove(clip);
        if t.active_clip > clip {
            t.active_clip -= 1;
        }
        t.active_clip = t.active_clip.min(t.clips.len() - 1);
        true
    }

    pub fn set_step_velocity(&mut self, track: &str, step: usize, v: f32) -> bool {
        self.track_mut(track).is_some_and(|t| t.active_clip_mut().set_velocity(step, v))
    }

    pub fn set_step_probability(&mut self, track: &str, step: usize, p: f32) -> bool {
        self.track_mut(track).is_some_and(|t| t.active_clip_mut().set_probability(step, p))
    }

    pub fn set_step_pitch(&mut self, track: &str, step: usize, pitch: u8) -> bool {
        self.track_mut(track).is_some_and(|t| t.active_clip_mut().set_pitch(step, pitch))
    }

    pub fn set_clip_length(&mut self, track: &str, len: usize) -> bool {
        self.track_mut(track).is_some_and(|t| t.active_clip_mut().resize(len))
    }

    pub fn euclidean_fill(&mut self, track: &str, hits: usize) -> bool {
        let Some(t) = self.track_mut(track) else { return false };
        t.active_clip_mut().euclidean(hits);
        true
    }
}

fn initial_tracks() -> Vec<Track> {
    use Archetype::*;
    let flat = |v: f32| move |_: usize| v;
    vec![
        Track::new("bd", "Kick_808",    "emerald", Kick,      0.8, Clip::pattern(16, |i| i % 4 == 0, flat(0.9), 1.0)),
        Track::new("sn", "Snare_DX",    "fuchsia", Snare,     0.7, Clip::pattern(16, |i| i == 4 || i == 12, flat(0.7), 1.0)),
        Track::new("cp", "Clap_Analog", "amber",   Clap,      0.6, Clip::pattern(16, |i| i == 4 || i == 12, flat(0.6), 0.9)),
        Track::new("hh", "Closed_Hat",  "cyan",    ClosedHat, 0.5, Clip::pattern(16, |i| i % 2 == 0,
                                                                       |i| if i % 2 == 0 { 0.6 } else { 0.3 }, 1.0)),
        Track::new("oh", "Open_Hat",    "sky",     OpenHat,   0.4, Clip::pattern(16, |i| i == 2 || i == 10, flat(0.5), 0.8)),
        Track::new("tm", "Tom_808",     "indigo",  Tom,       0.6, Clip::pattern(16, |_| false, flat(0.7), 1.0)),
        Track::new("rs", "Rimshot_707", "rose",    Rim,       0.5, Clip::pattern(16, |_| false, flat(0.6), 1.0)),
        Track::new("bs", "Sub_Bass",    "red",     Bass,      0.7, Clip::pattern(16, |_| false, flat(0.8), 1.0)),
        Track::new("ld", "Poly_Lead",   "violet",  Lead,      0.5, Clip::pattern(16, |_| false, flat(0.6), 1.0)),
        Track::new("ai", "Neural_FX",   "emerald", Noise,     0.6, Clip::pattern(12, |_| false, flat(0.6), 0.5)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_consistent(state: &SequencerState) {
        for t in &state.tracks {
            assert!(!t.clips().is_empty() && t.clips().len() <= MAX_CLIPS, "{}: clip count", t.id);
            assert!(t.active_clip_index() < t.clips().len(), "{}: active clip out of range", t.id);
            for c in t.clips() {
                let n = c.len();
                assert_eq!(c.steps().len(), n);
                assert_eq!(c.velocities().len(), n);
                assert_eq!(c.probabilities().len(), n);
                assert_eq!(c.pitches().len(), n);
            }
        }
    }

    #[test]
    fn initial_kit_matches_fixed_configuration() {
        let s = SequencerState::initial_kit();
        assert_consistent(&s);
        assert_eq!(s.bpm, 124.0);
        let ids: Vec<&str> = s.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["bd", "sn", "cp", "hh", "oh", "tm", "rs", "bs", "ld", "ai"]);
        let bd = s.track("bd").unwrap();
        assert_eq!(bd.active_clip().active_steps(), vec![0, 4, 8, 12]);
        assert_eq!(bd.active_clip().len(), 16);
        assert_eq!(s.track("ai").unwrap().active_clip().len(), 12);
        assert_eq!(s.track("hh").unwrap().active_clip().velocity(1), 0.3);
    }

    #[test]
    fn toggle_step_flips_active_clip_only() {
        let mut s = SequencerState::initial_kit();
        assert!(s.toggle_step("bd", 1));
        assert!(s.track("bd").unwrap().active_clip().gate(1));
        assert!(s.toggle_step("bd", 1));
        assert!(!s.track("bd").unwrap().active_clip().gate(1));
        assert!(!s.toggle_step("bd", 16));
        assert!(!s.toggle_step("zz", 0));
    }

    #[test]
    fn set_track_param_merges_subset() {
        let mut s = SequencerState::initial_kit();
        let before = s.track("sn").unwrap().clone();
        assert!(s.set_track_param("sn", TrackParams { mute: Some(true), ..Default::default() }));
        let after = s.track("sn").unwrap();
        assert!(after.mute);
        assert_eq!(after.volume, before.volume);
        assert_eq!(after.solo, before.solo);
        assert_eq!(after.frequency, before.frequency);

        s.set_track_param("sn", TrackParams { volume: Some(4.0), frequency: Some(-1.0), ..Default::default() });
        let t = s.track("sn").unwrap();
        assert_eq!((t.volume, t.frequency), (1.0, 0.0));
        assert!(!s.set_track_param("nope", TrackParams::default()));
    }

    #[test]
    fn clip_count_is_capped_at_four() {
        let mut s = SequencerState::initial_kit();
        assert!(s.create_clip("bd"));
        assert_eq!(s.track("bd").unwrap().active_clip_index(), 1);
        assert!(s.track("bd").unwrap().active_clip().has_no_gates());
        assert!(s.duplicate_clip("bd", 0));
        assert_eq!(s.track("bd").unwrap().active_clip_index(), 1);
        assert!(s.create_clip("bd"));
        assert_eq!(s.track("bd").unwrap().clips().len(), 4);

        let before = s.track("bd").unwrap().clone();
        assert!(!s.create_clip("bd"));
        assert!(!s.duplicate_clip("bd", 0));
        assert_eq!(s.track("bd").unwrap(), &before);
        assert_consistent(&s);
    }

    #[test]
    fn new_clip_takes_defaults() {
        let mut s = SequencerState::initial_kit();
        s.create_clip("ai");
        let c = s.track("ai").unwrap().active_clip();
        assert_eq!(c.len(), 12);
        assert!(c.steps().iter().all(|&g| !g));
        assert!(c.velocities().iter().all(|&v| v == DEFAULT_VELOCITY));
        assert!(c.probabilities().iter().all(|&p| p == DEFAULT_PROBABILITY));
        assert!(c.pitches().iter().all(|&p| p == REFERENCE_PITCH));
    }

    #[test]
    fn duplicate_is_deep_with_new_identity() {
        let mut s = SequencerState::initial_kit();
        assert!(!s.duplicate_clip("bd", 3));
        assert!(s.duplicate_clip("bd", 0));
        let t = s.track("bd").unwrap();
        assert_ne!(t.clips()[0].id(), t.clips()[1].id());
        assert_eq!(t.clips()[0].steps(), t.clips()[1].steps());

        s.launch_clip("bd", 1);
        s.toggle_step("bd", 0);
        let t = s.track("bd").unwrap();
        assert!(t.clips()[0].gate(0));
        assert!(!t.clips()[1].gate(0));
    }

    #[test]
    fn clear_clip_is_idempotent_and_keeps_other_arrays() {
        let mut s = SequencerState::initial_kit();
        s.set_step_velocity("hh", 0, 0.42);
        assert!(s.clear_clip("hh", 0));
        let once = s.track("hh").unwrap().active_clip().clone();
        assert!(s.clear_clip("hh", 0));
        let twice = s.track("hh").unwrap().active_clip();
        assert!(once.steps().iter().all(|&g| !g));
        assert_eq!(once.steps(), twice.steps());
        assert_eq!(twice.velocity(0), 0.42);
        assert!(!s.clear_clip("hh", 1));
    }

    #[test]
    fn launch_ignores_out_of_range() {
        let mut s = SequencerState::initial_kit();
        s.duplicate_clip("sn", 0);
        assert!(s.launch_clip("sn", 1));
        assert_eq!(s.track("sn").unwrap().active_clip_index(), 1);
        assert!(!s.launch_clip("sn", 2));
        assert_eq!(s.track("sn").unwrap().active_clip_index(), 1);
    }

    #[test]
    fn delete_clip_keeps_active_index_valid() {
        let mut s = SequencerState::initial_kit();
        assert!(!s.delete_clip("bd", 0));
        s.duplicate_clip("bd", 0);
        s.duplicate_clip("bd", 0);
        s.launch_clip("bd", 2);
        let active_id = s.track("bd").unwrap().active_clip().id();
        assert!(s.delete_clip("bd", 0));
        assert_eq!(s.track("bd").unwrap().active_clip().id(), active_id);
        assert!(s.delete_clip("bd", 1));
        assert_eq!(s.track("bd").unwrap().active_clip_index(), 0);
        assert_consistent(&s);
    }

    #[test]
    fn resize_keeps_arrays_in_lockstep() {
        let mut s = SequencerState::initial_kit();
        assert!(s.set_clip_length("bd", 7));
        assert!(s.set_clip_length("bd", 32));
        assert!(!s.set_clip_length("bd", 0));
        assert!(!s.set_clip_length("bd", MAX_CLIP_LEN + 1));
        let c = s.track("bd").unwrap().active_clip();
        assert_eq!(c.len(), 32);
        assert_eq!(c.active_steps(), vec![0, 4]);
        assert_consistent(&s);
    }

    #[test]
    fn step_editors_clamp() {
        let mut s = SequencerState::initial_kit();
        assert!(s.set_step_probability("oh", 2, 1.7));
        assert!(s.set_step_pitch("oh", 2, 99));
        assert!(!s.set_step_velocity("oh", 2, f32::NAN));
        let c = s.track("oh").unwrap().active_clip();
        assert_eq!(c.probability(2), 1.0);
        assert_eq!(c.pitch(2), MAX_PITCH);
        assert_eq!(c.velocity(2), 0.5);
    }

    #[test]
    fn euclidean_spreads_hits() {
        let mut s = SequencerState::initial_kit();
        s.euclidean_fill("tm", 4);
        assert_eq!(s.track("tm").unwrap().active_clip().active_steps(), vec![3, 7, 11, 15]);
        s.euclidean_fill("tm", 0);
        assert!(s.track("tm").unwrap().active_clip().has_no_gates());
    }

    #[test]
    fn step_at_wraps_per_clip_length() {
        let c = Clip::empty(12);
        assert_eq!(c.step_at(11), 11);
        assert_eq!(c.step_at(12), 0);
        assert_eq!(c.step_at(16), 4);
    }
}
