use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::command::{Command, ParseError};

pub const FEED_CAPACITY: usize = 256;

/// Parses one feed line.  Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Option<Result<Command, ParseError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.parse())
}

/// Forwards every well-formed command from `reader` until it ends or the
/// receiving side hangs up.  Returns the number of commands sent.
pub fn read_commands<R: BufRead>(reader: R, tx: &Sender<Command>) -> usize {
    let mut sent = 0;
    for (n, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::warn!("command feed read error after line {n}: {e}");
                break;
            }
        };
        match parse_line(&line) {
            None => {}
            Some(Ok(cmd)) => {
                if tx.send(cmd).is_err() { break; }
                sent += 1;
            }
            Some(Err(e)) => log::warn!("command feed line {}: {e}: '{}'", n + 1, line.trim()),
        }
    }
    sent
}

/// Reads commands from a file (or named pipe) on a background thread.
///
/// The returned receiver is drained by the session owner between ticks.  A
/// feed that cannot be opened is logged and simply never produces anything.
pub fn spawn_feed(path: PathBuf) -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::bounded(FEED_CAPACITY);
    let spawned = thread::Builder::new()
        .name("command-feed".into())
        .spawn(move || {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    log::warn!("cannot open command feed {}: {e}", path.display());
                    return;
                }
            };
            log::info!("reading commands from {}", path.display());
            let sent = read_commands(BufReader::new(file), &tx);
            log::info!("command feed {} finished after {sent} commands", path.display());
        });
    if let Err(e) = spawned {
        log::warn!("cannot start command feed thread: {e}");
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_comments_and_malformed_lines() {
        let feed = "# warm-up\n\nplay\nbogus 1\nvol bd 0.5\n   # indented comment\nstep bd\n";
        let (tx, rx) = crossbeam_channel::unbounded();
        assert_eq!(read_commands(Cursor::new(feed), &tx), 2);
        let got: Vec<Command> = rx.try_iter().collect();
        assert_eq!(got, vec![
            Command::Play,
            Command::SetVolume { track: "bd".into(), volume: 0.5 },
        ]);
    }

    #[test]
    fn stops_when_receiver_is_gone() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        assert_eq!(read_commands(Cursor::new("play\nstop\n"), &tx), 0);
    }

    #[test]
    fn missing_feed_yields_nothing() {
        let rx = spawn_feed(PathBuf::from("/nonexistent/lyraflex/feed.txt"));
        assert!(rx.recv().is_err());
    }
}
