use std::fmt;
use std::str::FromStr;

use crate::mastering::MasterParam;
use crate::scale::{RootNote, Scale};

/// Every mutation the session accepts, whether typed at the prompt, bound to
/// a key, or read from the external feed.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Play,
    Stop,
    TogglePlay,
    SetBpm(f32),
    SetRoot(RootNote),
    SetScale(Scale),
    SetVolume { track: String, volume: f32 },
    /// `None` toggles.
    Mute { track: String, on: Option<bool> },
    Solo { track: String, on: Option<bool> },
    SetCutoff { track: String, frequency: f32 },
    ToggleStep { track: String, step: usize },
    CreateClip { track: String },
    DuplicateClip { track: String, clip: usize },
    ClearClip { track: String, clip: usize },
    LaunchClip { track: String, clip: usize },
    DeleteClip { track: String, clip: usize },
    SetLength { track: String, len: usize },
    Euclid { track: String, hits: usize },
    SetVelocity { track: String, step: usize, value: f32 },
    SetProbability { track: String, step: usize, value: f32 },
    SetPitch { track: String, step: usize, pitch: u8 },
    Master(MasterParam, f32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownVerb(String),
    MissingArgument { verb: &'static str, name: &'static str },
    InvalidNumber { name: &'static str, value: String },
    InvalidSwitch(String),
    InvalidName { name: &'static str, value: String },
    TrailingInput(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty                        => write!(f, "empty command"),
            Self::UnknownVerb(v)               => write!(f, "unknown command '{v}'"),
            Self::MissingArgument { verb, name } => write!(f, "'{verb}' needs <{name}>"),
            Self::InvalidNumber { name, value } => write!(f, "<{name}> is not a number: '{value}'"),
            Self::InvalidSwitch(v)             => write!(f, "expected on|off, got '{v}'"),
            Self::InvalidName { name, value }  => write!(f, "unknown {name} '{value}'"),
            Self::TrailingInput(v)             => write!(f, "unexpected '{v}'"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Cursor over the whitespace-separated words of one command line.
struct Args<'a> {
    verb:  &'static str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn word(&mut self, name: &'static str) -> Result<&'a str, ParseError> {
        self.words.next().ok_or(ParseError::MissingArgument { verb: self.verb, name })
    }

    fn track(&mut self) -> Result<String, ParseError> {
        Ok(self.word("track")?.to_string())
    }

    fn number<T: FromStr>(&mut self, name: &'static str) -> Result<T, ParseError> {
        let w = self.word(name)?;
        w.parse().map_err(|_| ParseError::InvalidNumber { name, value: w.to_string() })
    }

    fn named<T>(&mut self, name: &'static str, parse: impl Fn(&str) -> Option<T>) -> Result<T, ParseError> {
        let w = self.word(name)?;
        parse(w).ok_or_else(|| ParseError::InvalidName { name, value: w.to_string() })
    }

    fn switch(&mut self) -> Result<Option<bool>, ParseError> {
        match self.words.next() {
            None => Ok(None),
            Some(w) => match w.to_ascii_lowercase().as_str() {
                "on" | "true" | "1"   => Ok(Some(true)),
                "off" | "false" | "0" => Ok(Some(false)),
                _ => Err(ParseError::InvalidSwitch(w.to_string())),
            },
        }
    }

    fn finish(mut self, cmd: Command) -> Result<Command, ParseError> {
        match self.words.next() {
            None => Ok(cmd),
            Some(extra) => Err(ParseError::TrailingInput(extra.to_string())),
        }
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else { return Err(ParseError::Empty) };
        let lower = first.to_ascii_lowercase();

        let verb: &'static str = match lower.as_str() {
            "play"               => "play",
            "stop"               => "stop",
            "toggle"             => "toggle",
            "bpm" | "tempo"      => "bpm",
            "root" | "key"       => "root",
            "scale"              => "scale",
            "volume" | "vol"     => "volume",
            "mute"               => "mute",
            "solo"               => "solo",
            "cutoff" | "freq"    => "cutoff",
            "step"               => "step",
            "create" | "new"     => "create",
            "duplicate" | "dup"  => "duplicate",
            "clear"              => "clear",
            "launch"             => "launch",
            "delete" | "del"     => "delete",
            "length" | "len"     => "length",
            "euclid"             => "euclid",
            "velocity" | "vel"   => "velocity",
            "prob"               => "prob",
            "pitch"              => "pitch",
            "air"                => "air",
            "ceiling"            => "ceiling",
            _ => return Err(ParseError::UnknownVerb(first.to_string())),
        };
        let mut a = Args { verb, words };

        let cmd = match verb {
            "play"      => Command::Play,
            "stop"      => Command::Stop,
            "toggle"    => Command::TogglePlay,
            "bpm"       => Command::SetBpm(a.number("bpm")?),
            "root"      => Command::SetRoot(a.named("note", RootNote::parse)?),
            "scale"     => Command::SetScale(a.named("scale", Scale::parse)?),
            "volume"    => Command::SetVolume { track: a.track()?, volume: a.number("value")? },
            "mute"      => Command::Mute { track: a.track()?, on: a.switch()? },
            "solo"      => Command::Solo { track: a.track()?, on: a.switch()? },
            "cutoff"    => Command::SetCutoff { track: a.track()?, frequency: a.number("value")? },
            "step"      => Command::ToggleStep { track: a.track()?, step: a.number("step")? },
            "create"    => Command::CreateClip { track: a.track()? },
            "duplicate" => Command::DuplicateClip { track: a.track()?, clip: a.number("clip")? },
            "clear"     => Command::ClearClip { track: a.track()?, clip: a.number("clip")? },
            "launch"    => Command::LaunchClip { track: a.track()?, clip: a.number("clip")? },
            "delete"    => Command::DeleteClip { track: a.track()?, clip: a.number("clip")? },
            "length"    => Command::SetLength { track: a.track()?, len: a.number("steps")? },
            "euclid"    => Command::Euclid { track: a.track()?, hits: a.number("hits")? },
            "velocity"  => Command::SetVelocity { track: a.track()?, step: a.number("step")?, value: a.number("value")? },
            "prob"      => Command::SetProbability { track: a.track()?, step: a.number("step")?, value: a.number("value")? },
            "pitch"     => Command::SetPitch { track: a.track()?, step: a.number("step")?, pitch: a.number("semitones")? },
            "air"       => Command::Master(MasterParam::Air, a.number("value")?),
            _           => Command::Master(MasterParam::Ceiling, a.number("value")?),
        };
        a.finish(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let switch = |on: &Option<bool>| match on {
            Some(true)  => " on",
            Some(false) => " off",
            None        => "",
        };
        match self {
            Self::Play                                  => write!(f, "play"),
            Self::Stop                                  => write!(f, "stop"),
            Self::TogglePlay                            => write!(f, "toggle"),
            Self::SetBpm(v)                             => write!(f, "bpm {v}"),
            Self::SetRoot(root)                         => write!(f, "root {}", root.name()),
            Self::SetScale(scale)                       => write!(f, "scale {}", scale.name()),
            Self::SetVolume { track, volume }           => write!(f, "volume {track} {volume}"),
            Self::Mute { track, on }                    => write!(f, "mute {track}{}", switch(on)),
            Self::Solo { track, on }                    => write!(f, "solo {track}{}", switch(on)),
            Self::SetCutoff { track, frequency }        => write!(f, "cutoff {track} {frequency}"),
            Self::ToggleStep { track, step }            => write!(f, "step {track} {step}"),
            Self::CreateClip { track }                  => write!(f, "create {track}"),
            Self::DuplicateClip { track, clip }         => write!(f, "duplicate {track} {clip}"),
            Self::ClearClip { track, clip }             => write!(f, "clear {track} {clip}"),
            Self::LaunchClip { track, clip }            => write!(f, "launch {track} {clip}"),
            Self::DeleteClip { track, clip }            => write!(f, "delete {track} {clip}"),
            Self::SetLength { track, len }              => write!(f, "length {track} {len}"),
            Self::Euclid { track, hits }                => write!(f, "euclid {track} {hits}"),
            Self::SetVelocity { track, step, value }    => write!(f, "velocity {track} {step} {value}"),
            Self::SetProbability { track, step, value } => write!(f, "prob {track} {step} {value}"),
            Self::SetPitch { track, step, pitch }       => write!(f, "pitch {track} {step} {pitch}"),
            Self::Master(param, v)                      => write!(f, "{} {v}", param.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, ParseError> { s.parse() }

    #[test]
    fn parses_transport_and_tempo() {
        assert_eq!(parse("play"), Ok(Command::Play));
        assert_eq!(parse("  STOP "), Ok(Command::Stop));
        assert_eq!(parse("toggle"), Ok(Command::TogglePlay));
        assert_eq!(parse("bpm 128.5"), Ok(Command::SetBpm(128.5)));
        assert_eq!(parse("root F#"), Ok(Command::SetRoot(RootNote(6))));
        assert_eq!(parse("scale major"), Ok(Command::SetScale(Scale::Major)));
    }

    #[test]
    fn parses_track_commands() {
        assert_eq!(parse("vol bd 0.5"), Ok(Command::SetVolume { track: "bd".into(), volume: 0.5 }));
        assert_eq!(parse("mute sn"), Ok(Command::Mute { track: "sn".into(), on: None }));
        assert_eq!(parse("solo hh off"), Ok(Command::Solo { track: "hh".into(), on: Some(false) }));
        assert_eq!(parse("dup bd 0"), Ok(Command::DuplicateClip { track: "bd".into(), clip: 0 }));
        assert_eq!(
            parse("pitch bs 3 19"),
            Ok(Command::SetPitch { track: "bs".into(), step: 3, pitch: 19 })
        );
        assert_eq!(parse("ceiling 0.9"), Ok(Command::Master(MasterParam::Ceiling, 0.9)));
    }

    #[test]
    fn unknown_ids_still_parse() {
        assert_eq!(parse("step nope 99"), Ok(Command::ToggleStep { track: "nope".into(), step: 99 }));
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("dance"), Err(ParseError::UnknownVerb("dance".into())));
        assert_eq!(parse("bpm"), Err(ParseError::MissingArgument { verb: "bpm", name: "bpm" }));
        assert_eq!(
            parse("step bd x"),
            Err(ParseError::InvalidNumber { name: "step", value: "x".into() })
        );
        assert_eq!(parse("step bd -1"), Err(ParseError::InvalidNumber { name: "step", value: "-1".into() }));
        assert_eq!(parse("mute bd maybe"), Err(ParseError::InvalidSwitch("maybe".into())));
        assert_eq!(parse("play now"), Err(ParseError::TrailingInput("now".into())));
        assert_eq!(parse("root H"), Err(ParseError::InvalidName { name: "note", value: "H".into() }));
    }

    #[test]
    fn display_parses_back() {
        for line in ["volume bd 0.5", "mute sn on", "solo hh", "euclid tm 5", "air 0.3", "prob oh 2 0.25"] {
            let cmd = parse(line).unwrap();
            assert_eq!(cmd.to_string(), line);
            assert_eq!(parse(&cmd.to_string()), Ok(cmd));
        }
    }
}
