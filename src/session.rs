use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::command::Command;
use crate::dispatch::{voice_spec, Dispatcher, VoiceSink};
use crate::mastering::MasterLevels;
use crate::resolver::{resolve, FireEvent, RandomSource, XorShift};
use crate::scale::REFERENCE_PITCH;
use crate::store::{SequencerState, TrackParams};
use crate::telemetry::Snapshot;

/// Single owner of the sequencer: state, clock, random source, dispatcher,
/// mastering mirror and the voice sink.
///
/// Every entry point runs to completion, so a command is always applied
/// whole before or after a tick and never in the middle of one.
pub struct Session<S: VoiceSink> {
    state:      SequencerState,
    clock:      Clock,
    rng:        Box<dyn RandomSource>,
    dispatcher: Dispatcher,
    master:     MasterLevels,
    sink:       S,
    last_fired: Vec<FireEvent>,
}

impl<S: VoiceSink> Session<S> {
    pub fn new(state: SequencerState, master: MasterLevels, sink: S) -> Self {
        Self::with_rng(state, master, sink, Box::new(XorShift::default()))
    }

    pub fn with_rng(state: SequencerState, master: MasterLevels, sink: S, rng: Box<dyn RandomSource>) -> Self {
        let clock = Clock::new(state.bpm);
        let mut state = state;
        state.bpm = clock.bpm();
        state.is_playing = false;
        Self {
            state,
            clock,
            rng,
            dispatcher: Dispatcher::new(),
            master,
            sink,
            last_fired: Vec::new(),
        }
    }

    pub fn state(&self) -> &SequencerState { &self.state }

    pub fn clock(&self) -> &Clock { &self.clock }

    pub fn master(&self) -> MasterLevels { self.master }

    pub fn sink(&self) -> &S { &self.sink }

    /// Events of the most recent tick, for metering.
    pub fn last_fired(&self) -> &[FireEvent] { &self.last_fired }

    pub fn current_step(&self) -> Option<usize> {
        self.clock.current_step(self.state.grid_len())
    }

    pub fn dispatched(&self) -> u64 { self.dispatcher.dispatched() }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.clock.time_until_due(now)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state, &self.clock, self.master)
    }

    // ── Commands ──────────────────────────────────────────────────────────

    pub fn apply(&mut self, cmd: Command) -> bool {
        self.apply_at(cmd, Instant::now())
    }

    /// Applies one command.  Returns `false` when it named something that
    /// does not exist or asked for an impossible change.
    pub fn apply_at(&mut self, cmd: Command, now: Instant) -> bool {
        let desc = cmd.to_string();
        let applied = match cmd {
            Command::Play       => self.start(now),
            Command::Stop       => self.stop(),
            Command::TogglePlay => if self.clock.is_playing() { self.stop() } else { self.start(now) },
            Command::SetBpm(bpm) if !bpm.is_finite() => false,
            Command::SetBpm(bpm) => {
                self.state.bpm = self.clock.set_bpm(bpm, now);
                true
            }
            Command::SetRoot(root) => {
                self.state.root_note = root;
                true
            }
            Command::SetScale(scale) => {
                self.state.scale = scale;
                true
            }
            Command::SetVolume { track, volume } => self.state.set_track_param(
                &track, TrackParams { volume: Some(volume), ..Default::default() },
            ),
            Command::Mute { track, on } => {
                let on = on.or_else(|| self.state.track(&track).map(|t| !t.mute));
                self.state.set_track_param(&track, TrackParams { mute: on, ..Default::default() })
            }
            Command::Solo { track, on } => {
                let on = on.or_else(|| self.state.track(&track).map(|t| !t.solo));
                self.state.set_track_param(&track, TrackParams { solo: on, ..Default::default() })
            }
            Command::SetCutoff { track, frequency } => self.state.set_track_param(
                &track, TrackParams { frequency: Some(frequency), ..Default::default() },
            ),
            Command::ToggleStep { track, step }             => self.state.toggle_step(&track, step),
            Command::CreateClip { track }                   => self.state.create_clip(&track),
            Command::DuplicateClip { track, clip }          => self.state.duplicate_clip(&track, clip),
            Command::ClearClip { track, clip }              => self.state.clear_clip(&track, clip),
            Command::LaunchClip { track, clip }             => self.state.launch_clip(&track, clip),
            Command::DeleteClip { track, clip }             => self.state.delete_clip(&track, clip),
            Command::SetLength { track, len }               => self.state.set_clip_length(&track, len),
            Command::Euclid { track, hits }                 => self.state.euclidean_fill(&track, hits),
            Command::SetVelocity { track, step, value }     => self.state.set_step_velocity(&track, step, value),
            Command::SetProbability { track, step, value }  => self.state.set_step_probability(&track, step, value),
            Command::SetPitch { track, step, pitch }        => self.state.set_step_pitch(&track, step, pitch),
            Command::Master(param, value) => {
                let v = self.master.set(param, value);
                self.sink.set_master(param, v);
                true
            }
        };
        if applied {
            log::debug!("applied '{desc}'");
        } else {
            log::debug!("ignored '{desc}'");
        }
        applied
    }

    fn start(&mut self, now: Instant) -> bool {
        if !self.clock.start(now) { return false; }
        self.state.is_playing = true;
        self.sink.wake();
        log::info!("transport started at {} bpm", self.clock.bpm());
        true
    }

    fn stop(&mut self) -> bool {
        if !self.clock.stop() { return false; }
        self.state.is_playing = false;
        self.last_fired.clear();
        log::info!("transport stopped");
        true
    }

    // ── Ticks ─────────────────────────────────────────────────────────────

    pub fn tick(&mut self) -> Vec<FireEvent> {
        self.tick_at(Instant::now())
    }

    /// Advances one step, resolves every track and dispatches the hits.
    /// Does nothing while stopped.
    pub fn tick_at(&mut self, now: Instant) -> Vec<FireEvent> {
        let Some(position) = self.clock.advance(now) else { return Vec::new() };
        let events = resolve(position, &self.state.tracks, self.rng.as_mut());
        self.dispatcher.dispatch(&events, &self.state.tracks, self.state.root_note, &mut self.sink);
        self.last_fired = events.clone();
        events
    }

    /// Runs one tick if the clock is due.
    pub fn pump(&mut self, now: Instant) -> Option<Vec<FireEvent>> {
        if self.clock.is_due(now) { Some(self.tick_at(now)) } else { None }
    }

    /// Plays a track once at full velocity, outside the grid.
    pub fn audition(&mut self, track: &str) -> bool {
        self.sink.wake();
        let Some(t) = self.state.track(track) else { return false };
        if t.mute { return false; }
        let voice = voice_spec(t, 1.0, REFERENCE_PITCH, self.state.root_note);
        self.sink.play(voice);
        true
    }
}
