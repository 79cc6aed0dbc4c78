use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use lyraflex::dispatch::VoiceSink;
use lyraflex::mastering::{air_to_db, ceiling_to_threshold_db, MasterParam};
use lyraflex::scale::{pitch_name, REFERENCE_PITCH};
use lyraflex::store::{Clip, MAX_CLIPS};

use crate::app::{App, AppMode, EditMode, InputMode, MixerParam};

// ── Top-level routing ─────────────────────────────────────────────────────────

/// Draw all panels simultaneously.  `app.mode` controls which panel has
/// keyboard focus (highlighted border), not what is visible.
pub fn draw<S: VoiceSink>(f: &mut Frame, app: &App<S>) {
    let area = f.area();
    let tracks = app.session.state().tracks.len() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),          // title bar   chunks[0]
            Constraint::Length(tracks + 4), // step grid   chunks[1]
            Constraint::Length(tracks + 2), // mixer row   chunks[2]
            Constraint::Length(4),          // status      chunks[3]
            Constraint::Min(0),             // help        chunks[4]
        ])
        .split(area);

    let row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[2]);

    draw_title(f, chunks[0], app);
    draw_grid(f, chunks[1], app);
    draw_mixer(f, row[0], app);
    draw_master(f, row[1], app);
    draw_status(f, chunks[3], app);
    draw_help(f, chunks[4], app);
}

fn focus_style(focused: bool) -> Style {
    if focused { Style::default().fg(Color::Cyan) } else { Style::default().fg(Color::DarkGray) }
}

fn track_color(name: &str) -> Color {
    match name {
        "emerald" => Color::Green,
        "fuchsia" => Color::Magenta,
        "amber"   => Color::Yellow,
        "cyan"    => Color::Cyan,
        "sky"     => Color::LightBlue,
        "indigo"  => Color::Blue,
        "rose"    => Color::LightRed,
        "red"     => Color::Red,
        "violet"  => Color::LightMagenta,
        _         => Color::White,
    }
}

// ── Title bar ─────────────────────────────────────────────────────────────────

fn draw_title<S: VoiceSink>(f: &mut Frame, area: Rect, app: &App<S>) {
    let focus_label = match app.mode {
        AppMode::Grid   => "Grid",
        AppMode::Mixer  => "Mixer",
        AppMode::Master => "Master",
    };
    let state = app.session.state();
    let play_ind = if app.session.clock().is_playing() { "  ▶PLAY" } else { "  ■STOP" };

    let text = format!(
        "  LyraFlex  ─  Focus: {}{}  ─  {:.0} BPM  {} {}  ─  Tab: cycle focus  Enter/F3: play  :  command",
        focus_label, play_ind, state.bpm, state.root_note.name(), state.scale.name(),
    );
    f.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

// ── Step grid ─────────────────────────────────────────────────────────────────

/// Shade for a 0.0–1.0 value.
fn shade(v: f32) -> &'static str {
    match (v * 100.0).round() as u32 {
        0       => "·",
        1..=33  => "░",
        34..=66 => "▒",
        67..=99 => "▓",
        _       => "█",
    }
}

fn cell_char(clip: &Clip, step: usize, edit: EditMode) -> &'static str {
    if !clip.gate(step) {
        return "·";
    }
    match edit {
        EditMode::Gate | EditMode::Velocity => shade(clip.velocity(step)),
        EditMode::Probability => shade(clip.probability(step)),
        EditMode::Pitch => {
            let p = clip.pitch(step);
            if p > REFERENCE_PITCH { "↑" } else if p < REFERENCE_PITCH { "↓" } else { "●" }
        }
    }
}

fn draw_grid<S: VoiceSink>(f: &mut Frame, area: Rect, app: &App<S>) {
    let focused = app.mode == AppMode::Grid;
    let title = if focused {
        " ► Grid — [↑↓] Track  [←→] Step  [Space] Toggle  [v] Edit mode  [-=] Adjust  [a] Audition "
    } else {
        " Grid "
    };

    let state    = app.session.state();
    let position = app.session.clock().position();
    let global   = app.session.current_step();
    let grid_len = state.grid_len();

    let mut lines: Vec<Line> = Vec::new();

    let (status_str, status_color) = if app.session.clock().is_playing() {
        ("▶ PLAYING", Color::Green)
    } else {
        ("■ STOPPED", Color::DarkGray)
    };
    lines.push(Line::from(vec![
        Span::styled("Step: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            global.map_or("--".to_string(), |s| format!("{:>2}", s + 1)),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("/{grid_len}"), Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled(status_str, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled("Edit: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.edit.name(), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    ]));

    {
        let mut s = vec![Span::styled("                 ", Style::default())];
        for i in 0..grid_len {
            let is_ph = global == Some(i);
            let label = if i % 4 == 0 { format!("{:>2}", i + 1) } else { " .".to_string() };
            let sty = if is_ph { Style::default().fg(Color::Green).add_modifier(Modifier::BOLD) }
                      else     { Style::default().fg(Color::DarkGray) };
            if i > 0 && i % 4 == 0 { s.push(Span::raw(" ")); }
            s.push(Span::styled(label, sty));
        }
        lines.push(Line::from(s));
    }

    for (ti, track) in state.tracks.iter().enumerate() {
        let is_selected = ti == app.track_cursor;
        let color = track_color(track.color);
        let clip = track.active_clip();
        let playhead = position.map(|p| clip.step_at(p));
        let silent = track.mute || (state.any_solo() && !track.solo);

        let name_style = if is_selected && !silent {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if is_selected {
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD)
        } else if silent {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(color)
        };

        let mut row: Vec<Span> = vec![
            Span::styled(format!(" {:<12}", track.name), name_style),
            Span::styled(format!("{:>2}", clip.len()), Style::default().fg(Color::DarkGray)),
            Span::styled(" │", Style::default().fg(Color::DarkGray)),
        ];

        for i in 0..clip.len() {
            let is_ph = playhead == Some(i);
            let is_cu = is_selected && i == app.step_cursor;

            let sty = if is_ph && is_cu {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else if is_ph {
                Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
            } else if is_cu {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else if clip.gate(i) && !silent {
                Style::default().fg(color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            if i > 0 && i % 4 == 0 {
                row.push(Span::styled("┆", Style::default().fg(Color::DarkGray)));
            }
            row.push(Span::styled(format!("{} ", cell_char(clip, i, app.edit)), sty));
        }

        lines.push(Line::from(row));
    }

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default().title(title).borders(Borders::ALL).border_style(focus_style(focused)),
        ),
        area,
    );
}

// ── Mixer ─────────────────────────────────────────────────────────────────────

/// 8-character progress bar.
fn pbar(v: f32, max: f32) -> String {
    let pct    = (v / max).clamp(0.0, 1.0);
    let filled = ((pct * 8.0).round() as usize).min(8);
    format!("{}{}", "█".repeat(filled), "░".repeat(8 - filled))
}

fn draw_mixer<S: VoiceSink>(f: &mut Frame, area: Rect, app: &App<S>) {
    let focused = app.mode == AppMode::Mixer;
    let title = if focused {
        " ► Mixer — [↑↓] Track  [←→] Vol/Cutoff  [-=] Adjust  [\\] Mute  [s] Solo "
    } else {
        " Mixer "
    };

    let fired = app.session.last_fired();
    let mut lines: Vec<Line> = Vec::new();

    for (ti, track) in app.session.state().tracks.iter().enumerate() {
        let is_selected = ti == app.track_cursor;
        let hit = fired.iter().any(|e| e.track_index == ti);
        let param_style = |p: MixerParam| {
            if focused && is_selected && app.mixer_param == p {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            }
        };

        let slots: String = (0..MAX_CLIPS)
            .map(|c| {
                if c == track.active_clip_index() { '■' }
                else if c < track.clips().len()  { '□' }
                else                             { '·' }
            })
            .collect();

        lines.push(Line::from(vec![
            Span::styled(if hit { "●" } else { " " }, Style::default().fg(track_color(track.color))),
            Span::styled(
                format!(" {:<4}", track.id),
                if is_selected { Style::default().fg(Color::White).add_modifier(Modifier::BOLD) }
                else           { Style::default().fg(Color::DarkGray) },
            ),
            Span::styled(format!("{:<6}", track.engine.name()), Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("Vol [{}] {:>3}%  ", pbar(track.volume, 1.0), (track.volume * 100.0).round() as u32),
                param_style(MixerParam::Volume),
            ),
            Span::styled(
                format!("Cut [{}] {:>3}%  ", pbar(track.frequency, 1.0), (track.frequency * 100.0).round() as u32),
                param_style(MixerParam::Cutoff),
            ),
            Span::styled(
                if track.mute { "M" } else { "·" },
                if track.mute { Style::default().fg(Color::Red).add_modifier(Modifier::BOLD) }
                else          { Style::default().fg(Color::DarkGray) },
            ),
            Span::styled(
                if track.solo { "S " } else { "· " },
                if track.solo { Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD) }
                else          { Style::default().fg(Color::DarkGray) },
            ),
            Span::styled(slots, Style::default().fg(Color::Cyan)),
        ]));
    }

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default().title(title).borders(Borders::ALL).border_style(focus_style(focused)),
        ),
        area,
    );
}

// ── Master + telemetry ────────────────────────────────────────────────────────

fn draw_master<S: VoiceSink>(f: &mut Frame, area: Rect, app: &App<S>) {
    let focused = app.mode == AppMode::Master;
    let title = if focused { " ► Master — [↑↓] Select  [-=] Adjust " } else { " Master " };

    let levels = app.session.master();
    let row = |param: MasterParam, label: &str, value: f32, detail: String| {
        let sty = if focused && app.master_sel == param {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Line::from(Span::styled(
            format!("{label} [{}] {:>3}%  {detail}", pbar(value, 1.0), (value * 100.0).round() as u32),
            sty,
        ))
    };

    let root = app.session.state().root_note;
    let step_info = app.selected_track().map(|t| {
        let clip = t.active_clip();
        let s = app.step_cursor.min(clip.len() - 1);
        format!(
            "{} step {}: vel {:.0}%  prob {:.0}%  {}",
            t.id, s + 1, clip.velocity(s) * 100.0, clip.probability(s) * 100.0,
            pitch_name(clip.pitch(s), root, 4),
        )
    }).unwrap_or_default();

    let lines = vec![
        row(MasterParam::Air, "Air    ", levels.air, format!("+{:.1} dB @10k", air_to_db(levels.air))),
        row(MasterParam::Ceiling, "Ceiling", levels.ceiling, format!("{:.1} dB", ceiling_to_threshold_db(levels.ceiling))),
        Line::raw(""),
        Line::from(vec![
            Span::styled("Position: ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.session.clock().position().map_or("idle".to_string(), |p| p.to_string())),
            Span::styled("  Voices sent: ", Style::default().fg(Color::DarkGray)),
            Span::raw(app.session.dispatched().to_string()),
        ]),
        Line::from(Span::styled(step_info, Style::default().fg(Color::Gray))),
    ];

    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(title).borders(Borders::ALL).border_style(focus_style(focused)))
            .wrap(Wrap { trim: true }),
        area,
    );
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status<S: VoiceSink>(f: &mut Frame, area: Rect, app: &App<S>) {
    let text = if app.input_mode == InputMode::Command {
        vec![Line::from(vec![
            Span::styled(":", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled(app.input_buf.as_str(), Style::default().fg(Color::White)),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ])]
    } else {
        let state = app.session.state();
        vec![
            Line::from(vec![
                Span::styled("BPM: ", Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{:.0}", state.bpm), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::raw("  │  "),
                Span::styled("Key: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{} {}", state.root_note.name(), state.scale.name()),
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                ),
                Span::raw("  │  "),
                Span::styled(app.status_msg.as_str(), Style::default().fg(Color::Yellow)),
            ]),
        ]
    };

    f.render_widget(
        Paragraph::new(text)
            .block(Block::default().title(" Status ").borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        area,
    );
}

// ── Unified help panel ────────────────────────────────────────────────────────

fn draw_help<S: VoiceSink>(f: &mut Frame, area: Rect, app: &App<S>) {
    let w = Style::default().fg(Color::White);
    let d = Style::default().fg(Color::DarkGray);

    let global = Line::from(vec![
        Span::styled("[Tab/F2] ",  w), Span::raw("Cycle focus  │  "),
        Span::styled("[Enter/F3] ", w), Span::raw("Play/stop  │  "),
        Span::styled("[PgUp/Dn] ", w), Span::raw("BPM  │  "),
        Span::styled("[F6/F7] ",   w), Span::raw("Scale/root  │  "),
        Span::styled("[:] ",       w), Span::raw("Command  │  "),
        Span::styled("[Esc] ",     w), Span::raw("Quit"),
    ]);

    let focus_line = match app.mode {
        AppMode::Grid => Line::from(vec![
            Span::styled("Clips: ", d),
            Span::styled("[1-4] ", w), Span::raw("Launch  │  "),
            Span::styled("[n] ",   w), Span::raw("New  │  "),
            Span::styled("[d] ",   w), Span::raw("Duplicate  │  "),
            Span::styled("[Del] ", w), Span::raw("Clear  │  "),
            Span::styled("[X] ",   w), Span::raw("Delete  │  "),
            Span::styled("[[ ]] ", w), Span::raw("Length  │  "),
            Span::styled("[e] ",   w), Span::raw("Euclid (cursor = hits)"),
        ]),
        AppMode::Mixer => Line::from(vec![
            Span::styled("[↑↓] ", w), Span::raw("Track  │  "),
            Span::styled("[←→] ", w), Span::raw("Volume / cutoff  │  "),
            Span::styled("[-=] ", w), Span::raw("Adjust 5%  │  "),
            Span::styled("[\\] ", w), Span::raw("Mute  │  "),
            Span::styled("[s] ",  w), Span::raw("Solo  │  "),
            Span::styled("[a] ",  w), Span::raw("Audition"),
        ]),
        AppMode::Master => Line::from(vec![
            Span::styled("[↑↓] ", w), Span::raw("Air / ceiling  │  "),
            Span::styled("[-=] ", w), Span::raw("Adjust 5%  │  "),
            Span::styled("Changes ramp in over ~100 ms", d),
        ]),
    };

    f.render_widget(
        Paragraph::new(vec![global, focus_line])
            .block(Block::default().title(" Help ").borders(Borders::ALL))
            .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}
