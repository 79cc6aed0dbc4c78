use crate::mastering::MasterParam;
use crate::resolver::FireEvent;
use crate::scale::{pitch_to_freq, RootNote};
use crate::store::Track;
use crate::voice::VoiceSpec;

/// Where dispatched voices go.  Delivery is fire-and-forget: a sink may drop
/// a voice but must never block the caller.
pub trait VoiceSink {
    fn play(&mut self, voice: VoiceSpec);

    /// Forwards a mastering change to whatever renders the output.
    fn set_master(&mut self, _param: MasterParam, _value: f32) {}

    /// Manual interaction hint: a sink with a lazily opened device may open
    /// it now.
    fn wake(&mut self) {}
}

/// Discards everything.
#[derive(Default)]
pub struct NullSink;

impl VoiceSink for NullSink {
    fn play(&mut self, _voice: VoiceSpec) {}
}

/// Keeps every delivered voice and master change, in order.
#[derive(Default, Debug)]
pub struct RecordingSink {
    pub voices: Vec<VoiceSpec>,
    pub master: Vec<(MasterParam, f32)>,
    pub wakes:  usize,
}

impl VoiceSink for RecordingSink {
    fn play(&mut self, voice: VoiceSpec) { self.voices.push(voice); }

    fn set_master(&mut self, param: MasterParam, value: f32) { self.master.push((param, value)); }

    fn wake(&mut self) { self.wakes += 1; }
}

/// Builds the voice a track plays for one step.
pub fn voice_spec(track: &Track, velocity: f32, pitch: u8, root: RootNote) -> VoiceSpec {
    let archetype = track.engine;
    let freq = match archetype.register() {
        Some(octave) => pitch_to_freq(pitch, root.freq(octave)),
        None => archetype.base_freq(),
    };
    VoiceSpec {
        archetype,
        gain:       (velocity * track.volume).clamp(0.0, 1.0),
        freq,
        brightness: track.frequency,
    }
}

/// Turns fire events into voices for a sink and counts what it sent.
#[derive(Default)]
pub struct Dispatcher {
    dispatched: u64,
}

impl Dispatcher {
    pub fn new() -> Self { Self::default() }

    pub fn dispatched(&self) -> u64 { self.dispatched }

    pub fn dispatch(&mut self, events: &[FireEvent], tracks: &[Track], root: RootNote, sink: &mut dyn VoiceSink) {
        for e in events {
            let Some(track) = tracks.get(e.track_index) else { continue };
            sink.play(voice_spec(track, e.velocity, e.pitch, root));
            self.dispatched += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::REFERENCE_PITCH;
    use crate::store::{SequencerState, TrackParams};
    use crate::voice::Archetype;

    #[test]
    fn gain_is_velocity_times_volume() {
        let mut s = SequencerState::initial_kit();
        s.set_track_param("bd", TrackParams { volume: Some(0.5), ..Default::default() });
        let v = voice_spec(s.track("bd").unwrap(), 0.8, REFERENCE_PITCH, s.root_note);
        assert!((v.gain - 0.4).abs() < 1e-6);
        assert_eq!(v.archetype, Archetype::Kick);
        assert_eq!(v.brightness, 0.8);
    }

    #[test]
    fn pitched_archetypes_follow_root_and_register() {
        let s = SequencerState::initial_kit();
        let bass = voice_spec(s.track("bs").unwrap(), 1.0, REFERENCE_PITCH, RootNote(0));
        assert!((bass.freq - 65.41).abs() < 0.01);
        let lead = voice_spec(s.track("ld").unwrap(), 1.0, REFERENCE_PITCH + 12, RootNote(9));
        assert!((lead.freq - 880.0).abs() < 0.01);
        let tom = voice_spec(s.track("tm").unwrap(), 1.0, REFERENCE_PITCH, RootNote(0));
        assert!((tom.freq - 130.81).abs() < 0.01);
        let snare = voice_spec(s.track("sn").unwrap(), 1.0, 0, RootNote(0));
        assert_eq!(snare.freq, Archetype::Snare.base_freq());
    }

    #[test]
    fn dispatcher_skips_unknown_indices() {
        let s = SequencerState::initial_kit();
        let events = vec![
            FireEvent { track_index: 0, track_id: "bd".into(), step: 0, velocity: 0.9, pitch: 12 },
            FireEvent { track_index: 99, track_id: "zz".into(), step: 0, velocity: 0.9, pitch: 12 },
        ];
        let mut sink = RecordingSink::default();
        let mut d = Dispatcher::new();
        d.dispatch(&events, &s.tracks, s.root_note, &mut sink);
        assert_eq!(sink.voices.len(), 1);
        assert_eq!(d.dispatched(), 1);
        assert!((sink.voices[0].gain - 0.72).abs() < 1e-6);
    }
}
