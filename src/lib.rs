//! Terminal step sequencer and drum machine.
//!
//! A fixed kit of tracks, each holding up to four clips, is clocked on a
//! sixteenth-note grid and rendered through a small synthesis and mastering
//! chain.  Everything mutable lives in [`session::Session`]; UI keys, the
//! command prompt and the external feed all reach it as [`command::Command`]s.

pub mod audio;
pub mod clock;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod effects;
pub mod mastering;
pub mod remote;
pub mod resolver;
pub mod scale;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod voice;
