use std::time::Instant;

use crossbeam_channel::Receiver;

use lyraflex::clock::{MAX_BPM, MIN_BPM};
use lyraflex::command::Command;
use lyraflex::dispatch::VoiceSink;
use lyraflex::mastering::MasterParam;
use lyraflex::resolver::FireEvent;
use lyraflex::session::Session;
use lyraflex::store::{Track, MAX_CLIPS};

// ── App mode ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    /// Edit the step grid of the selected track.
    Grid,
    /// Per-track volume, cutoff, mute and solo.
    Mixer,
    /// Mastering bus.
    Master,
}

/// What the grid cells show and what `-`/`=` adjust.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditMode {
    Gate,
    Velocity,
    Probability,
    Pitch,
}

impl EditMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gate        => "Gate",
            Self::Velocity    => "Velocity",
            Self::Probability => "Probability",
            Self::Pitch       => "Pitch",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Gate        => Self::Velocity,
            Self::Velocity    => Self::Probability,
            Self::Probability => Self::Pitch,
            Self::Pitch       => Self::Gate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    None,
    /// `:` prompt accepting the text command vocabulary.
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MixerParam {
    Volume,
    Cutoff,
}

// ── App state ─────────────────────────────────────────────────────────────────

pub struct App<S: VoiceSink> {
    pub session:      Session<S>,
    feed:             Option<Receiver<Command>>,
    pub mode:         AppMode,
    pub edit:         EditMode,
    pub input_mode:   InputMode,
    pub input_buf:    String,
    pub track_cursor: usize,
    pub step_cursor:  usize,
    pub mixer_param:  MixerParam,
    pub master_sel:   MasterParam,
    pub should_quit:  bool,
    pub status_msg:   String,
}

impl<S: VoiceSink> App<S> {
    pub fn new(session: Session<S>, feed: Option<Receiver<Command>>) -> Self {
        Self {
            session,
            feed,
            mode:         AppMode::Grid,
            edit:         EditMode::Gate,
            input_mode:   InputMode::None,
            input_buf:    String::new(),
            track_cursor: 0,
            step_cursor:  0,
            mixer_param:  MixerParam::Volume,
            master_sel:   MasterParam::Air,
            should_quit:  false,
            status_msg:   String::new(),
        }
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.session.state().tracks.get(self.track_cursor)
    }

    fn selected_id(&self) -> String {
        self.selected_track().map(|t| t.id.clone()).unwrap_or_default()
    }

    fn track_count(&self) -> usize {
        self.session.state().tracks.len().max(1)
    }

    fn clip_len(&self) -> usize {
        self.selected_track().map_or(1, |t| t.active_clip().len())
    }

    /// Applies one command; a refused command is reported in the status bar.
    pub fn run(&mut self, cmd: Command) -> bool {
        let desc = cmd.to_string();
        let ok = self.session.apply(cmd);
        if !ok {
            self.status_msg = format!("Ignored: {desc}");
        }
        self.clamp_cursor();
        ok
    }

    fn clamp_cursor(&mut self) {
        let n = self.clip_len();
        if self.step_cursor >= n { self.step_cursor = n - 1; }
    }

    // ── Clock + external feed ─────────────────────────────────────────────

    /// Applies everything the external feed has queued.
    pub fn drain_feed(&mut self) {
        let Some(rx) = &self.feed else { return };
        let pending: Vec<Command> = rx.try_iter().collect();
        for cmd in pending {
            let desc = cmd.to_string();
            if self.run(cmd) {
                self.status_msg = format!("Remote: {desc}");
            }
        }
    }

    pub fn pump(&mut self, now: Instant) -> Option<Vec<FireEvent>> {
        self.session.pump(now)
    }

    // ── Command prompt ────────────────────────────────────────────────────

    pub fn open_prompt(&mut self) {
        self.input_mode = InputMode::Command;
        self.input_buf.clear();
    }

    pub fn cancel_prompt(&mut self) {
        self.input_mode = InputMode::None;
        self.input_buf.clear();
        self.status_msg = "Cancelled".to_string();
    }

    pub fn commit_input(&mut self) {
        let line = std::mem::take(&mut self.input_buf);
        self.input_mode = InputMode::None;
        match line.parse::<Command>() {
            Ok(cmd) => {
                let desc = cmd.to_string();
                if self.run(cmd) {
                    self.status_msg = format!("OK: {desc}");
                }
            }
            Err(e) => {
                log::warn!("prompt: {e}");
                self.status_msg = format!("Error: {e}");
            }
        }
    }

    // ── Global controls ───────────────────────────────────────────────────

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AppMode::Grid   => AppMode::Mixer,
            AppMode::Mixer  => AppMode::Master,
            AppMode::Master => AppMode::Grid,
        };
        self.status_msg = match self.mode {
            AppMode::Grid   => "Focus: Grid".to_string(),
            AppMode::Mixer  => "Focus: Mixer".to_string(),
            AppMode::Master => "Focus: Master".to_string(),
        };
    }

    pub fn toggle_play(&mut self) {
        self.run(Command::TogglePlay);
        self.status_msg = if self.session.clock().is_playing() { "Playing".to_string() }
                          else                                  { "Stopped".to_string() };
    }

    pub fn bpm_up(&mut self) { self.bpm_nudge(1.0); }

    pub fn bpm_down(&mut self) { self.bpm_nudge(-1.0); }

    fn bpm_nudge(&mut self, delta: f32) {
        let bpm = (self.session.state().bpm + delta).clamp(MIN_BPM, MAX_BPM);
        self.run(Command::SetBpm(bpm));
        self.status_msg = format!("BPM: {:.0}", self.session.state().bpm);
    }

    pub fn cycle_scale(&mut self) {
        let next = self.session.state().scale.next();
        self.run(Command::SetScale(next));
        self.status_msg = format!("Scale: {}", next.name());
    }

    pub fn cycle_root(&mut self) {
        let next = self.session.state().root_note.next();
        self.run(Command::SetRoot(next));
        self.status_msg = format!("Root: {}", next.name());
    }

    // ── Cursor ────────────────────────────────────────────────────────────

    pub fn track_up(&mut self) {
        let n = self.track_count();
        self.track_cursor = if self.track_cursor == 0 { n - 1 } else { self.track_cursor - 1 };
        self.clamp_cursor();
    }

    pub fn track_down(&mut self) {
        self.track_cursor = (self.track_cursor + 1) % self.track_count();
        self.clamp_cursor();
    }

    pub fn step_left(&mut self) {
        let n = self.clip_len();
        self.step_cursor = if self.step_cursor == 0 { n - 1 } else { self.step_cursor - 1 };
    }

    pub fn step_right(&mut self) {
        self.step_cursor = (self.step_cursor + 1) % self.clip_len();
    }

    // ── Grid editing ──────────────────────────────────────────────────────

    pub fn toggle_step(&mut self) {
        let track = self.selected_id();
        self.run(Command::ToggleStep { track, step: self.step_cursor });
    }

    pub fn cycle_edit_mode(&mut self) {
        self.edit = self.edit.next();
        self.status_msg = format!("Edit: {}", self.edit.name());
    }

    /// `=` / `-` in the grid: edits whatever the current edit mode shows.
    pub fn grid_adjust(&mut self, up: bool) {
        let Some(t) = self.selected_track() else { return };
        let track = t.id.clone();
        let name = t.name.clone();
        let clip = t.active_clip();
        let step = self.step_cursor;
        let sign = if up { 1.0 } else { -1.0 };

        match self.edit {
            EditMode::Gate => {
                // `=` sets the gate, `-` clears it.
                if clip.gate(step) != up {
                    self.run(Command::ToggleStep { track, step });
                }
                self.status_msg = format!("{name} step {} {}", step + 1, if up { "on" } else { "off" });
            }
            EditMode::Velocity => {
                let value = (clip.velocity(step) + 0.1 * sign).clamp(0.0, 1.0);
                self.run(Command::SetVelocity { track, step, value });
                self.status_msg = format!("{name} step {} vel: {:.0}%", step + 1, value * 100.0);
            }
            EditMode::Probability => {
                let value = (clip.probability(step) + 0.1 * sign).clamp(0.0, 1.0);
                self.run(Command::SetProbability { track, step, value });
                self.status_msg = format!("{name} step {} prob: {:.0}%", step + 1, value * 100.0);
            }
            EditMode::Pitch => {
                let scale = self.session.state().scale;
                let pitch = if up { scale.step_up(clip.pitch(step)) } else { scale.step_down(clip.pitch(step)) };
                self.run(Command::SetPitch { track, step, pitch });
                self.status_msg = format!("{name} step {} pitch: {pitch}", step + 1);
            }
        }
    }

    pub fn length_up(&mut self) { self.length_nudge(1); }

    pub fn length_down(&mut self) { self.length_nudge(-1); }

    fn length_nudge(&mut self, delta: i64) {
        let track = self.selected_id();
        let len = (self.clip_len() as i64 + delta).max(1) as usize;
        if self.run(Command::SetLength { track, len }) {
            self.status_msg = format!("Clip length: {len}");
        }
    }

    /// Spreads as many hits as the cursor column number.
    pub fn euclid(&mut self) {
        let track = self.selected_id();
        let hits = self.step_cursor + 1;
        if self.run(Command::Euclid { track, hits }) {
            self.status_msg = format!("Euclid: {hits}/{}", self.clip_len());
        }
    }

    pub fn audition(&mut self) {
        let track = self.selected_id();
        if !self.session.audition(&track) {
            self.status_msg = format!("{track} is muted");
        }
    }

    // ── Clips ─────────────────────────────────────────────────────────────

    fn active_clip_index(&self) -> usize {
        self.selected_track().map_or(0, |t| t.active_clip_index())
    }

    pub fn create_clip(&mut self) {
        let track = self.selected_id();
        if self.run(Command::CreateClip { track }) {
            self.status_msg = format!("Clip {} created", self.active_clip_index() + 1);
        } else {
            self.status_msg = format!("Track already has {MAX_CLIPS} clips");
        }
    }

    pub fn duplicate_clip(&mut self) {
        let track = self.selected_id();
        let clip = self.active_clip_index();
        if self.run(Command::DuplicateClip { track, clip }) {
            self.status_msg = format!("Clip {} duplicated", clip + 1);
        } else {
            self.status_msg = format!("Track already has {MAX_CLIPS} clips");
        }
    }

    pub fn clear_clip(&mut self) {
        let track = self.selected_id();
        let clip = self.active_clip_index();
        self.run(Command::ClearClip { track, clip });
        self.status_msg = format!("Clip {} cleared", clip + 1);
    }

    pub fn delete_clip(&mut self) {
        let track = self.selected_id();
        let clip = self.active_clip_index();
        if self.run(Command::DeleteClip { track, clip }) {
            self.status_msg = format!("Clip {} deleted", clip + 1);
        }
    }

    pub fn launch_clip(&mut self, clip: usize) {
        let track = self.selected_id();
        if self.run(Command::LaunchClip { track, clip }) {
            self.status_msg = format!("Clip {} launched", clip + 1);
        }
    }

    // ── Mixer ─────────────────────────────────────────────────────────────

    pub fn toggle_mute(&mut self) {
        let track = self.selected_id();
        self.run(Command::Mute { track, on: None });
        if let Some(t) = self.selected_track() {
            self.status_msg = format!("{} {}", t.name, if t.mute { "muted" } else { "unmuted" });
        }
    }

    pub fn toggle_solo(&mut self) {
        let track = self.selected_id();
        self.run(Command::Solo { track, on: None });
        if let Some(t) = self.selected_track() {
            self.status_msg = format!("{} solo {}", t.name, if t.solo { "on" } else { "off" });
        }
    }

    pub fn mixer_param_toggle(&mut self) {
        self.mixer_param = match self.mixer_param {
            MixerParam::Volume => MixerParam::Cutoff,
            MixerParam::Cutoff => MixerParam::Volume,
        };
    }

    pub fn mixer_adjust(&mut self, up: bool) {
        let Some(t) = self.selected_track() else { return };
        let track = t.id.clone();
        let name = t.name.clone();
        let delta = if up { 0.05 } else { -0.05 };
        match self.mixer_param {
            MixerParam::Volume => {
                let volume = (t.volume + delta).clamp(0.0, 1.0);
                self.run(Command::SetVolume { track, volume });
                self.status_msg = format!("{name} vol: {}%", (volume * 100.0).round() as u32);
            }
            MixerParam::Cutoff => {
                let frequency = (t.frequency + delta).clamp(0.0, 1.0);
                self.run(Command::SetCutoff { track, frequency });
                self.status_msg = format!("{name} cutoff: {}%", (frequency * 100.0).round() as u32);
            }
        }
    }

    // ── Master ────────────────────────────────────────────────────────────

    pub fn master_sel_toggle(&mut self) {
        self.master_sel = match self.master_sel {
            MasterParam::Air     => MasterParam::Ceiling,
            MasterParam::Ceiling => MasterParam::Air,
        };
    }

    pub fn master_adjust(&mut self, up: bool) {
        let param = self.master_sel;
        let current = self.session.master().get(param);
        let value = (current + if up { 0.05 } else { -0.05 }).clamp(0.0, 1.0);
        self.run(Command::Master(param, value));
        self.status_msg = format!("{}: {:.0}%", param.name(), value * 100.0);
    }
}
