use std::fmt::Write as _;

use serde::Serialize;

use crate::clock::Clock;
use crate::mastering::MasterLevels;
use crate::store::SequencerState;
use crate::voice::Archetype;

/// Read-only view of a session at one instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub playing:      bool,
    pub bpm:          f32,
    pub position:     Option<u64>,
    pub current_step: Option<usize>,
    pub root:         &'static str,
    pub scale:        &'static str,
    pub master:       MasterLevels,
    pub tracks:       Vec<TrackSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id:          String,
    pub name:        String,
    pub engine:      Archetype,
    pub volume:      f32,
    pub frequency:   f32,
    pub mute:        bool,
    pub solo:        bool,
    pub active_clip: usize,
    pub clip_count:  usize,
    pub clip_length: usize,
    pub gates:       Vec<usize>,
}

impl Snapshot {
    pub fn capture(state: &SequencerState, clock: &Clock, master: MasterLevels) -> Self {
        Self {
            playing:      clock.is_playing(),
            bpm:          state.bpm,
            position:     clock.position(),
            current_step: clock.current_step(state.grid_len()),
            root:         state.root_note.name(),
            scale:        state.scale.name(),
            master,
            tracks: state.tracks.iter().map(|t| TrackSnapshot {
                id:          t.id.clone(),
                name:        t.name.clone(),
                engine:      t.engine,
                volume:      t.volume,
                frequency:   t.frequency,
                mute:        t.mute,
                solo:        t.solo,
                active_clip: t.active_clip_index(),
                clip_count:  t.clips().len(),
                clip_length: t.active_clip().len(),
                gates:       t.active_clip().active_steps(),
            }).collect(),
        }
    }

    /// Plain-text performance state block.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CURRENT PERFORMANCE STATE:");
        let _ = writeln!(out, "- Transport: {}", if self.playing { "RUNNING" } else { "STOPPED" });
        let _ = writeln!(out, "- Tempo: {} BPM", self.bpm);
        let _ = writeln!(out, "- Key: {} {}", self.root, self.scale);
        let _ = writeln!(out, "- Master: air {:.2}, ceiling {:.2}", self.master.air, self.master.ceiling);

        let layout: Vec<String> = self.tracks.iter().map(|t| {
            format!(
                "{} (Vol: {:.2}, Engine: {}, Mute: {}, Solo: {}, Clip: {}/{})",
                t.name, t.volume, t.engine.name(), t.mute, t.solo, t.active_clip + 1, t.clip_count,
            )
        }).collect();
        let _ = writeln!(out, "- Track Layout: {}", layout.join(", "));

        let steps: Vec<String> = self.tracks.iter().map(|t| {
            let gates: Vec<String> = t.gates.iter().map(|g| g.to_string()).collect();
            format!("{}: [{}]", t.name, gates.join("|"))
        }).collect();
        let _ = writeln!(out, "- Active Steps: {}", steps.join("; "));
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial() -> Snapshot {
        let state = SequencerState::initial_kit();
        let clock = Clock::new(state.bpm);
        Snapshot::capture(&state, &clock, MasterLevels::default())
    }

    #[test]
    fn text_lists_transport_and_gates() {
        let text = initial().to_text();
        assert!(text.contains("- Transport: STOPPED"));
        assert!(text.contains("- Tempo: 124 BPM"));
        assert!(text.contains("- Key: C Minor"));
        assert!(text.contains("Kick_808 (Vol: 0.80, Engine: Kick, Mute: false, Solo: false, Clip: 1/1)"));
        assert!(text.contains("Kick_808: [0|4|8|12]"));
        assert!(text.contains("Neural_FX: []"));
    }

    #[test]
    fn json_carries_track_fields() {
        let json = initial().to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["playing"], false);
        assert_eq!(v["current_step"], serde_json::Value::Null);
        assert_eq!(v["tracks"][0]["id"], "bd");
        assert_eq!(v["tracks"][0]["engine"], "Kick");
        assert_eq!(v["tracks"][9]["clip_length"], 12);
        assert_eq!(v["tracks"][3]["gates"].as_array().unwrap().len(), 8);
    }
}
