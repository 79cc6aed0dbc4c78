mod app;
mod ui;

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use app::{App, AppMode, InputMode};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use lyraflex::audio::AudioOutput;
use lyraflex::config::{config_dir, Config};
use lyraflex::dispatch::{NullSink, VoiceSink};
use lyraflex::remote::spawn_feed;
use lyraflex::resolver::XorShift;
use lyraflex::session::Session;
use lyraflex::store::SequencerState;

/// Upper bound on how long the loop waits for input between redraws.
const FRAME: Duration = Duration::from_millis(16);

#[derive(Default)]
struct Args {
    verbose:  bool,
    snapshot: bool,
    commands: Option<PathBuf>,
    seed:     Option<u32>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            "--snapshot"       => args.snapshot = true,
            "--commands" => {
                let path = it.next().context("--commands needs a path")?;
                args.commands = Some(PathBuf::from(path));
            }
            "--seed" => {
                let n = it.next().context("--seed needs a number")?;
                args.seed = Some(n.parse().with_context(|| format!("bad --seed '{n}'"))?);
            }
            other => anyhow::bail!("unknown argument '{other}' (try -v, --commands <path>, --snapshot, --seed <n>)"),
        }
    }
    Ok(args)
}

fn init_logging(level: log::LevelFilter) {
    use simplelog::{Config as LogConfig, WriteLogger};

    let log_path = config_dir().join("lyraflex.log");
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = File::create(&log_path)
        .or_else(|_| File::create(std::env::temp_dir().join("lyraflex.log")));
    match file {
        Ok(f) => {
            if WriteLogger::init(level, LogConfig::default(), f).is_err() {
                eprintln!("logger already initialised");
            }
        }
        Err(e) => eprintln!("cannot create log file: {e}"),
    }

    log::info!("lyraflex starting (log level: {:?})", level);
}

fn build_session<S: VoiceSink>(config: &Config, sink: S, seed: Option<u32>) -> Session<S> {
    let state = SequencerState::initial_kit();
    let state = SequencerState::new(config.bpm(), config.root(), config.scale(), state.tracks);
    match seed {
        Some(s) => Session::with_rng(state, config.master(), sink, Box::new(XorShift::new(s))),
        None    => Session::new(state, config.master(), sink),
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = Config::load();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        config.log_level().unwrap_or(log::LevelFilter::Warn)
    };
    init_logging(level);

    if args.snapshot {
        let session = build_session(&config, NullSink, args.seed);
        let snap = session.snapshot();
        print!("{}", snap.to_text());
        println!("{}", snap.to_json().context("failed to encode snapshot")?);
        return Ok(());
    }

    let sink = AudioOutput::new(config.audio(), config.master());
    let session = build_session(&config, sink, args.seed);
    let feed = args.commands.or_else(|| config.commands_path().map(PathBuf::from)).map(spawn_feed);
    let mut app = App::new(session, feed);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    if let Err(e) = &result {
        log::error!("fatal: {e:#}");
    }
    result
}

fn run<S: VoiceSink>(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App<S>) -> Result<()> {
    loop {
        app.drain_feed();
        app.pump(Instant::now());
        terminal.draw(|f| ui::draw(f, app))?;

        // Sleep no longer than the next step deadline.
        let wait = app.session.time_until_due(Instant::now()).map_or(FRAME, |d| d.min(FRAME));
        if !event::poll(wait)? {
            continue;
        }
        let Event::Key(key) = event::read()? else { continue };
        if key.kind == KeyEventKind::Release {
            continue;
        }

        // ── Input mode: intercept all keys for the command prompt ─────────
        if app.input_mode != InputMode::None {
            match key.code {
                KeyCode::Esc       => app.cancel_prompt(),
                KeyCode::Enter     => app.commit_input(),
                KeyCode::Backspace => { app.input_buf.pop(); }
                KeyCode::Char(c)   => app.input_buf.push(c),
                _ => {}
            }
            continue;
        }

        match key.code {
            // Global
            KeyCode::Esc => break,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char(':') => app.open_prompt(),
            KeyCode::Tab | KeyCode::F(2) => app.toggle_mode(),
            KeyCode::Enter | KeyCode::F(3) => app.toggle_play(),
            KeyCode::PageUp   => app.bpm_up(),
            KeyCode::PageDown => app.bpm_down(),
            KeyCode::F(6)     => app.cycle_scale(),
            KeyCode::F(7)     => app.cycle_root(),
            KeyCode::Char('a') => app.audition(),

            // ── Grid focus ────────────────────────────────────────────────
            KeyCode::Up    if app.mode == AppMode::Grid => app.track_up(),
            KeyCode::Down  if app.mode == AppMode::Grid => app.track_down(),
            KeyCode::Left  if app.mode == AppMode::Grid => app.step_left(),
            KeyCode::Right if app.mode == AppMode::Grid => app.step_right(),
            KeyCode::Char(' ') if app.mode == AppMode::Grid => app.toggle_step(),
            KeyCode::Char('v') if app.mode == AppMode::Grid => app.cycle_edit_mode(),
            KeyCode::Char('=') if app.mode == AppMode::Grid => app.grid_adjust(true),
            KeyCode::Char('-') if app.mode == AppMode::Grid => app.grid_adjust(false),
            KeyCode::Char(']') if app.mode == AppMode::Grid => app.length_up(),
            KeyCode::Char('[') if app.mode == AppMode::Grid => app.length_down(),
            KeyCode::Char('e') if app.mode == AppMode::Grid => app.euclid(),
            KeyCode::Char('n') if app.mode == AppMode::Grid => app.create_clip(),
            KeyCode::Char('d') if app.mode == AppMode::Grid => app.duplicate_clip(),
            KeyCode::Char('X') if app.mode == AppMode::Grid => app.delete_clip(),
            KeyCode::Backspace | KeyCode::Delete if app.mode == AppMode::Grid => app.clear_clip(),
            KeyCode::Char(c @ '1'..='4') if app.mode == AppMode::Grid => {
                app.launch_clip(c as usize - '1' as usize)
            }

            // ── Mixer focus ───────────────────────────────────────────────
            KeyCode::Up    if app.mode == AppMode::Mixer => app.track_up(),
            KeyCode::Down  if app.mode == AppMode::Mixer => app.track_down(),
            KeyCode::Left | KeyCode::Right if app.mode == AppMode::Mixer => app.mixer_param_toggle(),
            KeyCode::Char('=') if app.mode == AppMode::Mixer => app.mixer_adjust(true),
            KeyCode::Char('-') if app.mode == AppMode::Mixer => app.mixer_adjust(false),

            // ── Master focus ──────────────────────────────────────────────
            KeyCode::Up | KeyCode::Down if app.mode == AppMode::Master => app.master_sel_toggle(),
            KeyCode::Char('=') if app.mode == AppMode::Master => app.master_adjust(true),
            KeyCode::Char('-') if app.mode == AppMode::Master => app.master_adjust(false),

            // Mute / solo from any focus
            KeyCode::Char('\\') => app.toggle_mute(),
            KeyCode::Char('s')  => app.toggle_solo(),

            _ => {}
        }
        if app.should_quit { break; }
    }

    log::info!("lyraflex exiting");
    Ok(())
}
