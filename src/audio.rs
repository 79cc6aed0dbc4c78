use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::dispatch::VoiceSink;
use crate::mastering::{MasterBus, MasterLevels, MasterParam};
use crate::voice::{VoicePool, VoiceSpec};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_VOICES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioSettings {
    pub queue_capacity: usize,
    pub max_voices:     usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { queue_capacity: DEFAULT_QUEUE_CAPACITY, max_voices: DEFAULT_MAX_VOICES }
    }
}

/// Messages from the control thread to the render callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    Voice(VoiceSpec),
    SetMaster(MasterParam, f32),
}

// ── Render engine ─────────────────────────────────────────────────────────────

/// Everything that lives on the audio thread: the voice pool and the master
/// bus, created together with the stream and dropped with it.
pub struct Engine {
    pool: VoicePool,
    bus:  MasterBus,
}

impl Engine {
    pub fn new(sample_rate: f32, max_voices: usize, levels: MasterLevels) -> Self {
        Self {
            pool: VoicePool::new(sample_rate, max_voices),
            bus:  MasterBus::new(sample_rate, levels),
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Voice(spec)           => self.pool.trigger(&spec),
            AudioCommand::SetMaster(param, v)   => { self.bus.set_parameter(param, v); }
        }
    }

    pub fn active_voices(&self) -> usize { self.pool.len() }

    /// Fills an interleaved buffer; the mono mix is copied to every channel.
    pub fn render_block(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks_mut(channels) {
            let s = self.bus.process(self.pool.next_sample());
            frame.fill(s);
        }
    }
}

// ── Device ────────────────────────────────────────────────────────────────────

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    _stream: cpal::Stream,
}

impl AudioHandle {
    /// Never blocks; a full queue drops the command.
    pub fn send(&self, cmd: AudioCommand) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("audio queue full, dropped {cmd:?}");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

pub fn start_audio(settings: AudioSettings, levels: MasterLevels) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(settings.queue_capacity.max(1));

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;
    log::info!(
        "opening output '{}' at {} Hz, {} channels",
        device.name().unwrap_or_else(|_| "unknown".into()),
        sample_rate,
        channels,
    );

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let engine = Engine::new(sample_rate, settings.max_voices, levels);
            let stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            stream.play().context("failed to play output stream")?;
            Ok(AudioHandle { tx, _stream: stream })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported)"),
    }
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }
            engine.render_block(data, channels);
        },
        err_fn,
        None,
    )
    .context("failed to build output stream")?;

    Ok(stream)
}

// ── Lazy output ───────────────────────────────────────────────────────────────

/// Voice sink backed by the default output device.
///
/// The device is only opened on `wake()` (transport start or a manual
/// audition).  Until then, and after a failed attempt, voices are dropped;
/// the next `wake()` retries.
pub struct AudioOutput {
    settings: AudioSettings,
    levels:   MasterLevels,
    handle:   Option<AudioHandle>,
}

impl AudioOutput {
    pub fn new(settings: AudioSettings, levels: MasterLevels) -> Self {
        Self { settings, levels, handle: None }
    }

    pub fn is_open(&self) -> bool { self.handle.is_some() }
}

impl VoiceSink for AudioOutput {
    fn play(&mut self, voice: VoiceSpec) {
        if let Some(h) = &self.handle {
            h.send(AudioCommand::Voice(voice));
        }
    }

    fn set_master(&mut self, param: MasterParam, value: f32) {
        self.levels.set(param, value);
        if let Some(h) = &self.handle {
            h.send(AudioCommand::SetMaster(param, value));
        }
    }

    fn wake(&mut self) {
        if self.handle.is_some() { return; }
        match start_audio(self.settings, self.levels) {
            Ok(h) => self.handle = Some(h),
            Err(e) => log::warn!("audio unavailable, continuing silent: {e:#}"),
        }
    }
}
