use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::audio::AudioSettings;
use crate::mastering::MasterLevels;
use crate::scale::{RootNote, Scale};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    mastering: MasteringConfig,
    #[serde(default)]
    audio: AudioConfig,
    #[serde(default)]
    remote: RemoteConfig,
    #[serde(default)]
    log: LogConfig,
}

#[derive(Deserialize, Default)]
struct SessionConfig {
    bpm: Option<f32>,
    root: Option<String>,
    scale: Option<String>,
}

#[derive(Deserialize, Default)]
struct MasteringConfig {
    air: Option<f32>,
    ceiling: Option<f32>,
}

#[derive(Deserialize, Default)]
struct AudioConfig {
    queue_capacity: Option<usize>,
    max_voices: Option<usize>,
}

#[derive(Deserialize, Default)]
struct RemoteConfig {
    commands: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct LogConfig {
    level: Option<String>,
}

/// Embedded defaults with the user's file layered on top.
pub struct Config {
    file: ConfigFile,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(user_config_path().as_deref())
    }

    pub fn load_from(user_path: Option<&Path>) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!(target: "config", "embedded config.toml is invalid: {e}");
            ConfigFile::default()
        });

        if let Some(path) = user_path.filter(|p| p.exists()) {
            match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                    Ok(user) => merge(&mut base, user),
                    Err(e) => {
                        log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                    }
                },
                Err(e) => {
                    log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                }
            }
        }

        Config { file: base }
    }

    pub fn bpm(&self) -> f32 {
        self.file.session.bpm.unwrap_or(124.0)
    }

    pub fn root(&self) -> RootNote {
        self.file.session.root.as_deref().and_then(RootNote::parse).unwrap_or_default()
    }

    pub fn scale(&self) -> Scale {
        self.file.session.scale.as_deref().and_then(Scale::parse).unwrap_or(Scale::Minor)
    }

    pub fn master(&self) -> MasterLevels {
        let fallback = MasterLevels::default();
        MasterLevels {
            air:     self.file.mastering.air.unwrap_or(fallback.air).clamp(0.0, 1.0),
            ceiling: self.file.mastering.ceiling.unwrap_or(fallback.ceiling).clamp(0.0, 1.0),
        }
    }

    pub fn audio(&self) -> AudioSettings {
        let fallback = AudioSettings::default();
        AudioSettings {
            queue_capacity: self.file.audio.queue_capacity.unwrap_or(fallback.queue_capacity).max(1),
            max_voices:     self.file.audio.max_voices.unwrap_or(fallback.max_voices).clamp(1, 256),
        }
    }

    pub fn commands_path(&self) -> Option<&Path> {
        self.file.remote.commands.as_deref()
    }

    /// Configured log level; `None` if unset or unrecognised.
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.file.log.level.as_deref().and_then(|l| l.parse().ok())
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("lyraflex")
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lyraflex").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    fn take<T>(slot: &mut Option<T>, user: Option<T>) {
        if user.is_some() {
            *slot = user;
        }
    }
    take(&mut base.session.bpm, user.session.bpm);
    take(&mut base.session.root, user.session.root);
    take(&mut base.session.scale, user.session.scale);
    take(&mut base.mastering.air, user.mastering.air);
    take(&mut base.mastering.ceiling, user.mastering.ceiling);
    take(&mut base.audio.queue_capacity, user.audio.queue_capacity);
    take(&mut base.audio.max_voices, user.audio.max_voices);
    take(&mut base.remote.commands, user.remote.commands);
    take(&mut base.log.level, user.log.level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_defaults() {
        let c = Config::load_from(None);
        assert_eq!(c.bpm(), 124.0);
        assert_eq!(c.root(), RootNote(0));
        assert_eq!(c.scale(), Scale::Minor);
        assert_eq!(c.master(), MasterLevels::default());
        assert_eq!(c.audio(), AudioSettings::default());
        assert_eq!(c.commands_path(), None);
        assert_eq!(c.log_level(), Some(log::LevelFilter::Warn));
    }

    #[test]
    fn user_file_overrides_only_given_keys() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[session]\nroot = \"F#\"\n[mastering]\nceiling = 2.0\n[remote]\ncommands = \"/tmp/feed\"").unwrap();
        let c = Config::load_from(Some(f.path()));
        assert_eq!(c.root(), RootNote(6));
        assert_eq!(c.bpm(), 124.0);
        assert_eq!(c.master().ceiling, 1.0);
        assert_eq!(c.master().air, 0.30);
        assert_eq!(c.commands_path(), Some(Path::new("/tmp/feed")));
    }

    #[test]
    fn malformed_user_file_is_ignored() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[session\nbpm = fast").unwrap();
        let c = Config::load_from(Some(f.path()));
        assert_eq!(c.bpm(), 124.0);
        assert_eq!(c.scale(), Scale::Minor);
    }
}
