use std::time::{Duration, Instant};

pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 300.0;

/// Sixteenth-note grid: four steps per beat.
pub const STEPS_PER_BEAT: f32 = 4.0;

pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_nan() { return MIN_BPM; }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Milliseconds between two step advances at `bpm`.
pub fn step_duration_ms(bpm: f32) -> f64 {
    (60_000.0 / clamp_bpm(bpm) as f64) / STEPS_PER_BEAT as f64
}

pub fn step_duration(bpm: f32) -> Duration {
    Duration::from_secs_f64(step_duration_ms(bpm) / 1000.0)
}

/// Transport clock.
///
/// Holds the single authoritative transport position.  The position is an
/// ever-increasing tick count while playing and `None` while stopped; each
/// track derives its own step index from it (`position % clip length`), so
/// clips of different lengths phase against each other.
///
/// The clock never fires on its own: the owner asks `is_due(now)` and calls
/// `advance(now)`, which moves the position by exactly one tick.  A late
/// caller gets one tick, not a burst.
pub struct Clock {
    bpm:       f32,
    playing:   bool,
    position:  Option<u64>,
    next_due:  Option<Instant>,
    last_tick: Option<Instant>,
}

impl Clock {
    pub fn new(bpm: f32) -> Self {
        Self {
            bpm:       clamp_bpm(bpm),
            playing:   false,
            position:  None,
            next_due:  None,
            last_tick: None,
        }
    }

    pub fn bpm(&self) -> f32 { self.bpm }

    pub fn is_playing(&self) -> bool { self.playing }

    pub fn position(&self) -> Option<u64> { self.position }

    pub fn step_duration(&self) -> Duration { step_duration(self.bpm) }

    /// Arms the transport at step 0; the first advance is one step away.
    /// Returns `false` if already playing.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.playing { return false; }
        self.playing   = true;
        self.position  = Some(0);
        self.last_tick = Some(now);
        self.next_due  = Some(now + self.step_duration());
        true
    }

    /// Cancels the pending advance and resets the position to idle.
    /// Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        let was_playing = self.playing;
        self.playing   = false;
        self.position  = None;
        self.next_due  = None;
        self.last_tick = None;
        was_playing
    }

    /// Clamps and applies a new tempo.  While playing, the pending deadline is
    /// re-derived from the last tick so the phase slips by at most one step.
    pub fn set_bpm(&mut self, bpm: f32, now: Instant) -> f32 {
        self.bpm = clamp_bpm(bpm);
        if self.playing {
            let anchor = self.last_tick.unwrap_or(now);
            let due = anchor + self.step_duration();
            self.next_due = Some(if due < now { now } else { due });
        }
        self.bpm
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.next_due, Some(due) if now >= due)
    }

    /// Time left until the next advance, `None` while stopped.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// Moves the transport one tick forward and schedules the next one.
    /// Returns the new position, or `None` while stopped.
    pub fn advance(&mut self, now: Instant) -> Option<u64> {
        if !self.playing { return None; }
        let pos = self.position.map_or(0, |p| p + 1);
        self.position = Some(pos);

        let interval = self.step_duration();
        let scheduled = self.next_due.unwrap_or(now);
        // Keep the cadence anchored to the schedule unless we fell a whole
        // step behind; then re-anchor to now and drop the missed ticks.
        let tick_time = if now.saturating_duration_since(scheduled) >= interval { now } else { scheduled };
        self.last_tick = Some(tick_time);
        self.next_due  = Some(tick_time + interval);
        Some(pos)
    }

    /// Global grid step for display (`position % grid_len`), `None` when idle.
    pub fn current_step(&self, grid_len: usize) -> Option<usize> {
        let len = grid_len.max(1) as u64;
        self.position.map(|p| (p % len) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_is_clamped() {
        assert_eq!(clamp_bpm(10.0), 40.0);
        assert_eq!(clamp_bpm(999.0), 300.0);
        assert_eq!(clamp_bpm(124.0), 124.0);
        assert_eq!(clamp_bpm(f32::NAN), 40.0);
    }

    #[test]
    fn step_duration_matches_sixteenth_grid() {
        for bpm in [40.0_f32, 60.0, 120.0, 124.0, 300.0] {
            let expected = (60_000.0 / bpm as f64) / 4.0;
            assert!((step_duration_ms(bpm) - expected).abs() < 1e-9);
            let d = step_duration(bpm).as_secs_f64() * 1000.0;
            assert!((d - expected).abs() < 1e-3, "bpm {bpm}: {d} vs {expected}");
        }
        assert_eq!(step_duration(120.0), Duration::from_millis(125));
    }

    #[test]
    fn start_arms_and_stop_cancels() {
        let t0 = Instant::now();
        let mut c = Clock::new(120.0);
        assert_eq!(c.position(), None);
        assert!(c.start(t0));
        assert!(!c.start(t0));
        assert_eq!(c.position(), Some(0));
        assert!(!c.is_due(t0));
        assert!(c.is_due(t0 + Duration::from_millis(125)));

        assert!(c.stop());
        assert_eq!(c.position(), None);
        assert!(!c.is_due(t0 + Duration::from_secs(10)));
        assert_eq!(c.time_until_due(t0), None);
        assert_eq!(c.advance(t0), None);
    }

    #[test]
    fn late_pump_yields_one_tick_not_a_burst() {
        let t0 = Instant::now();
        let mut c = Clock::new(120.0);
        c.start(t0);
        let late = t0 + Duration::from_millis(1000);
        assert!(c.is_due(late));
        assert_eq!(c.advance(late), Some(1));
        // Re-anchored: next tick is a full step after `late`.
        assert!(!c.is_due(late));
        assert_eq!(c.time_until_due(late), Some(Duration::from_millis(125)));
    }

    #[test]
    fn on_time_ticks_keep_schedule() {
        let t0 = Instant::now();
        let mut c = Clock::new(120.0);
        c.start(t0);
        let t1 = t0 + Duration::from_millis(130);
        c.advance(t1);
        // Slightly late tick does not push the grid.
        assert_eq!(c.time_until_due(t1), Some(Duration::from_millis(120)));
    }

    #[test]
    fn bpm_change_keeps_phase_within_one_tick() {
        let t0 = Instant::now();
        let mut c = Clock::new(60.0); // 250 ms
        c.start(t0);
        let t1 = t0 + Duration::from_millis(250);
        c.advance(t1);
        let t2 = t1 + Duration::from_millis(50);
        c.set_bpm(120.0, t2); // 125 ms
        assert_eq!(c.time_until_due(t2), Some(Duration::from_millis(75)));

        // Slowing down past the already-elapsed time never schedules in the past.
        let t3 = t1 + Duration::from_millis(200);
        c.set_bpm(240.0, t3); // 62.5 ms, already overdue
        assert_eq!(c.time_until_due(t3), Some(Duration::ZERO));
        assert!(c.is_due(t3));
    }

    #[test]
    fn current_step_wraps_on_grid() {
        let t0 = Instant::now();
        let mut c = Clock::new(124.0);
        c.start(t0);
        for _ in 0..15 { c.advance(t0); }
        assert_eq!(c.current_step(16), Some(15));
        c.advance(t0);
        assert_eq!(c.current_step(16), Some(0));
        assert_eq!(c.position(), Some(16));
    }
}
