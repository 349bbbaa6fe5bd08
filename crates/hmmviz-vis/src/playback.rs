//! Playback controls for the training-iteration timeline.
//!
//! The controller owns the only temporal state in the diagram: which
//! iteration is shown, whether it is advancing, and how fast. It does not own
//! the snapshots themselves; the caller keeps it informed of the buffer
//! length through [`Playback::load`] and [`Playback::extend`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current state of playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No snapshots loaded
    Empty,
    /// Playback is stopped at the first iteration
    Stopped,
    /// Playback is advancing
    Playing,
    /// Playback is paused
    Paused,
    /// Playback reached the last iteration
    Complete,
}

/// What a call to [`Playback::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// Iterations advanced during this tick
    pub advanced: usize,
    /// The tick moved playback into `Complete`
    pub completed: bool,
}

/// Whether an operation moved the timeline in a way that invalidates
/// particle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    /// Position and phase continuity preserved
    None,
    /// Position jumped; particle state must be reset
    Reset,
}

/// Playback controller for the iteration timeline.
#[derive(Debug, Clone)]
pub struct Playback {
    len: usize,
    current: usize,
    state: PlaybackState,
    speed: f64,
    time_scale: f64,
    iteration_interval: Duration,
    /// Scaled time accumulated toward the next advance
    pending: Duration,
}

impl Playback {
    /// Create a controller with nothing loaded.
    ///
    /// `time_scale` multiplies every tick in addition to the speed; zero
    /// freezes progression.
    pub fn new(iteration_interval: Duration, time_scale: f64) -> Self {
        Self {
            len: 0,
            current: 0,
            state: PlaybackState::Empty,
            speed: 1.0,
            time_scale: time_scale.max(0.0),
            iteration_interval: iteration_interval.max(Duration::from_millis(1)),
            pending: Duration::ZERO,
        }
    }

    /// Get the current iteration position (0-based).
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Get the number of iterations available.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Get the current speed multiplier.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Combined multiplier applied to tick durations.
    pub fn effective_speed(&self) -> f64 {
        self.speed * self.time_scale
    }

    /// Time between autonomous advances at the current speed, if finite
    /// and representable.
    pub fn advance_interval(&self) -> Option<Duration> {
        let scale = self.effective_speed();
        if scale <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(self.iteration_interval.as_secs_f64() / scale).ok()
    }

    fn last(&self) -> usize {
        self.len.saturating_sub(1)
    }

    /// Start over with a freshly loaded run of `len` iterations.
    pub fn load(&mut self, len: usize) {
        self.len = len;
        self.current = 0;
        self.pending = Duration::ZERO;
        self.state = if len == 0 {
            PlaybackState::Empty
        } else {
            PlaybackState::Stopped
        };
    }

    /// More iterations arrived. The current view is left alone; a run that
    /// had completed resumes playing toward the new end.
    pub fn extend(&mut self, len: usize) {
        if len <= self.len {
            return;
        }
        self.len = len;
        match self.state {
            PlaybackState::Empty => self.state = PlaybackState::Stopped,
            PlaybackState::Complete => {
                self.pending = Duration::ZERO;
                self.state = PlaybackState::Playing;
            }
            _ => {}
        }
    }

    /// Start playback. From `Complete` this restarts at the first iteration.
    pub fn play(&mut self) -> Jump {
        match self.state {
            PlaybackState::Empty | PlaybackState::Playing => Jump::None,
            PlaybackState::Complete => {
                self.current = 0;
                self.pending = Duration::ZERO;
                self.state = PlaybackState::Playing;
                Jump::Reset
            }
            PlaybackState::Stopped | PlaybackState::Paused => {
                self.pending = Duration::ZERO;
                self.state = PlaybackState::Playing;
                Jump::None
            }
        }
    }

    /// Pause playback. Time accumulated toward the next advance is discarded.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.pending = Duration::ZERO;
            self.state = PlaybackState::Paused;
        }
    }

    /// Stop playback and return to the first iteration.
    pub fn reset(&mut self) -> Jump {
        if self.state == PlaybackState::Empty {
            return Jump::None;
        }
        self.current = 0;
        self.pending = Duration::ZERO;
        self.state = PlaybackState::Stopped;
        Jump::Reset
    }

    /// Set the speed multiplier. Takes effect on the next tick.
    pub fn set_speed(&mut self, multiplier: f64) -> Result<()> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(Error::configuration(format!(
                "speed multiplier must be positive, got {multiplier}"
            )));
        }
        self.speed = multiplier;
        Ok(())
    }

    /// Step forward one iteration. Stepping from the last iteration completes
    /// playback. Ignored while playing.
    pub fn step_forward(&mut self) {
        match self.state {
            PlaybackState::Empty | PlaybackState::Playing => {}
            _ if self.current < self.last() => {
                self.current += 1;
                self.state = PlaybackState::Paused;
            }
            _ => self.state = PlaybackState::Complete,
        }
    }

    /// Step backward one iteration. Ignored while playing.
    pub fn step_back(&mut self) {
        match self.state {
            PlaybackState::Empty | PlaybackState::Playing => {}
            PlaybackState::Stopped => {}
            _ => {
                self.current = self.current.saturating_sub(1);
                self.state = PlaybackState::Paused;
            }
        }
    }

    /// Jump to the first iteration.
    pub fn go_first(&mut self) -> Jump {
        if self.state == PlaybackState::Empty {
            return Jump::None;
        }
        self.jump_to(0);
        Jump::Reset
    }

    /// Jump to the last iteration.
    pub fn go_last(&mut self) -> Jump {
        if self.state == PlaybackState::Empty {
            return Jump::None;
        }
        self.jump_to(self.last());
        Jump::Reset
    }

    /// Seek to a specific iteration. Out-of-range indices leave the position
    /// untouched.
    pub fn seek_to(&mut self, index: usize) -> Result<Jump> {
        if index >= self.len {
            return Err(Error::Range {
                index,
                len: self.len,
            });
        }
        self.jump_to(index);
        Ok(Jump::Reset)
    }

    fn jump_to(&mut self, index: usize) {
        self.current = index;
        self.pending = Duration::ZERO;
        self.state = match self.state {
            PlaybackState::Complete if index != self.last() => PlaybackState::Paused,
            PlaybackState::Stopped if index != 0 => PlaybackState::Paused,
            state => state,
        };
    }

    /// Advance the clock by `dt` of wall time.
    ///
    /// While playing, scaled time accumulates and every full iteration
    /// interval advances one iteration, in order. Reaching the last iteration
    /// completes playback; leftover time is discarded.
    pub fn tick(&mut self, dt: Duration) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.state != PlaybackState::Playing {
            return outcome;
        }
        if self.current >= self.last() {
            self.complete(&mut outcome);
            return outcome;
        }
        let scale = self.effective_speed();
        if scale <= 0.0 {
            return outcome;
        }

        // Saturates at extreme speeds. The loop is bounded by the remaining
        // iterations.
        let secs = dt.as_secs_f64() * scale;
        let scaled = if secs.is_nan() {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        };
        self.pending = self.pending.saturating_add(scaled);
        while self.pending >= self.iteration_interval {
            self.pending -= self.iteration_interval;
            self.current += 1;
            outcome.advanced += 1;
            if self.current >= self.last() {
                self.complete(&mut outcome);
                break;
            }
        }
        outcome
    }

    fn complete(&mut self, outcome: &mut TickOutcome) {
        self.pending = Duration::ZERO;
        self.state = PlaybackState::Complete;
        outcome.completed = true;
    }

    /// Calculate progress as a fraction (0.0 - 1.0).
    pub fn progress(&self) -> f64 {
        if self.len <= 1 {
            if self.state == PlaybackState::Complete {
                1.0
            } else {
                0.0
            }
        } else {
            self.current as f64 / self.last() as f64
        }
    }
}

/// Playback status snapshot for control surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub current_index: usize,
    pub total: usize,
    pub state: PlaybackState,
    pub speed: f64,
    pub progress: f64,
}

impl From<&Playback> for PlaybackStatus {
    fn from(playback: &Playback) -> Self {
        Self {
            current_index: playback.current,
            total: playback.len,
            state: playback.state,
            speed: playback.speed,
            progress: playback.progress(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn loaded(len: usize) -> Playback {
        let mut playback = Playback::new(INTERVAL, 1.0);
        playback.load(len);
        playback
    }

    fn run_to_completion(playback: &mut Playback) -> (usize, usize) {
        let mut advances = 0;
        let mut completions = 0;
        for _ in 0..10_000 {
            let outcome = playback.tick(Duration::from_millis(16));
            advances += outcome.advanced;
            completions += usize::from(outcome.completed);
            if playback.state() == PlaybackState::Complete {
                break;
            }
        }
        (advances, completions)
    }

    #[test]
    fn playback_starts_empty() {
        let mut playback = Playback::new(INTERVAL, 1.0);
        assert_eq!(playback.state(), PlaybackState::Empty);
        assert_eq!(playback.play(), Jump::None);
        assert_eq!(playback.state(), PlaybackState::Empty);
        assert_eq!(playback.go_last(), Jump::None);
        assert_eq!(playback.seek_to(0).unwrap_err().kind(), ErrorKind::Range);
    }

    #[test]
    fn load_stops_at_zero() {
        let playback = loaded(10);
        assert_eq!(playback.current_index(), 0);
        assert_eq!(playback.state(), PlaybackState::Stopped);
    }

    #[test]
    fn play_reaches_complete_after_len_minus_one_advances() {
        for len in [1usize, 2, 5, 10] {
            let mut playback = loaded(len);
            playback.play();
            let (advances, completions) = run_to_completion(&mut playback);
            assert_eq!(advances, len - 1, "len {len}");
            assert_eq!(completions, 1);
            assert_eq!(playback.current_index(), len - 1);
        }
    }

    #[test]
    fn large_tick_advances_in_order_and_stops_at_end() {
        let mut playback = loaded(5);
        playback.play();
        let outcome = playback.tick(Duration::from_secs(60));
        assert_eq!(outcome.advanced, 4);
        assert!(outcome.completed);
        assert_eq!(playback.tick(Duration::from_secs(60)), TickOutcome::default());
    }

    #[test]
    fn pause_discards_pending_time() {
        let mut playback = loaded(5);
        playback.play();
        playback.tick(Duration::from_millis(90));
        playback.pause();
        playback.play();
        playback.tick(Duration::from_millis(20));
        assert_eq!(playback.current_index(), 0);
    }

    #[test]
    fn ticks_after_pause_are_ignored() {
        let mut playback = loaded(5);
        playback.play();
        playback.pause();
        assert_eq!(playback.tick(Duration::from_secs(1)).advanced, 0);
        assert_eq!(playback.state(), PlaybackState::Paused);
    }

    #[test]
    fn play_from_complete_restarts() {
        let mut playback = loaded(3);
        playback.play();
        run_to_completion(&mut playback);
        assert_eq!(playback.play(), Jump::Reset);
        assert_eq!(playback.current_index(), 0);
        assert_eq!(playback.state(), PlaybackState::Playing);
    }

    #[test]
    fn steps_are_ignored_while_playing() {
        let mut playback = loaded(5);
        playback.play();
        playback.step_forward();
        playback.step_back();
        assert_eq!(playback.current_index(), 0);
        assert_eq!(playback.state(), PlaybackState::Playing);
    }

    #[test]
    fn step_forward_past_end_completes() {
        let mut playback = loaded(3);
        playback.step_forward();
        assert_eq!(playback.state(), PlaybackState::Paused);
        playback.step_forward();
        assert_eq!(playback.current_index(), 2);
        assert_eq!(playback.state(), PlaybackState::Paused);
        playback.step_forward();
        assert_eq!(playback.current_index(), 2);
        assert_eq!(playback.state(), PlaybackState::Complete);
    }

    #[test]
    fn step_back_clamps_at_zero() {
        let mut playback = loaded(3);
        playback.go_last();
        playback.step_back();
        playback.step_back();
        playback.step_back();
        assert_eq!(playback.current_index(), 0);
        assert_eq!(playback.state(), PlaybackState::Paused);
    }

    #[test]
    fn seek_out_of_range_keeps_position() {
        let mut playback = loaded(10);
        playback.seek_to(4).unwrap();
        let err = playback.seek_to(10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(playback.current_index(), 4);
    }

    #[test]
    fn seek_from_complete_pauses_unless_targeting_last() {
        let mut playback = loaded(4);
        playback.play();
        run_to_completion(&mut playback);

        playback.seek_to(3).unwrap();
        assert_eq!(playback.state(), PlaybackState::Complete);
        playback.seek_to(1).unwrap();
        assert_eq!(playback.state(), PlaybackState::Paused);
    }

    #[test]
    fn seek_while_playing_keeps_playing() {
        let mut playback = loaded(10);
        playback.play();
        playback.seek_to(6).unwrap();
        assert_eq!(playback.state(), PlaybackState::Playing);
        assert_eq!(playback.current_index(), 6);
    }

    #[test]
    fn non_positive_speed_is_rejected() {
        let mut playback = loaded(3);
        playback.set_speed(2.0).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(playback.set_speed(bad).unwrap_err().kind(), ErrorKind::Configuration);
        }
        assert_eq!(playback.speed(), 2.0);
    }

    #[test]
    fn speed_shortens_advance_interval() {
        let mut playback = loaded(10);
        playback.set_speed(4.0).unwrap();
        let interval = playback.advance_interval().unwrap();
        assert!((interval.as_secs_f64() - 0.025).abs() < 1e-6);
        playback.play();
        playback.tick(Duration::from_millis(100));
        assert_eq!(playback.current_index(), 4);
    }

    #[test]
    fn zero_time_scale_freezes() {
        let mut playback = Playback::new(INTERVAL, 0.0);
        playback.load(3);
        playback.play();
        assert_eq!(playback.tick(Duration::from_secs(5)).advanced, 0);
        assert_eq!(playback.advance_interval(), None);
    }

    #[test]
    fn reset_returns_to_stopped() {
        let mut playback = loaded(5);
        playback.seek_to(3).unwrap();
        assert_eq!(playback.reset(), Jump::Reset);
        assert_eq!(playback.state(), PlaybackState::Stopped);
        assert_eq!(playback.current_index(), 0);
        assert_eq!(playback.len(), 5);
    }

    #[test]
    fn extend_resumes_completed_run() {
        let mut playback = Playback::new(INTERVAL, 1.0);
        playback.extend(2);
        assert_eq!(playback.state(), PlaybackState::Stopped);

        playback.play();
        run_to_completion(&mut playback);
        playback.extend(4);
        assert_eq!(playback.state(), PlaybackState::Playing);
        assert_eq!(playback.current_index(), 1);

        let (advances, completions) = run_to_completion(&mut playback);
        assert_eq!((advances, completions), (2, 1));
    }

    #[test]
    fn progress_calculation() {
        let mut playback = loaded(11);
        assert_eq!(playback.progress(), 0.0);
        playback.seek_to(5).unwrap();
        assert_eq!(playback.progress(), 0.5);
        playback.go_last();
        assert_eq!(playback.progress(), 1.0);
    }

    #[test]
    fn status_conversion() {
        let mut playback = loaded(10);
        playback.seek_to(3).unwrap();
        playback.set_speed(2.0).unwrap();

        let status: PlaybackStatus = (&playback).into();
        assert_eq!(status.current_index, 3);
        assert_eq!(status.total, 10);
        assert_eq!(status.state, PlaybackState::Paused);
        assert_eq!(status.speed, 2.0);
    }

    #[test]
    fn huge_speed_completes_without_overflow() {
        let mut playback = loaded(10);
        playback.set_speed(1e300).unwrap();
        playback.play();
        let outcome = playback.tick(Duration::from_millis(16));
        assert_eq!(outcome.advanced, 9);
        assert!(outcome.completed);
        assert_eq!(playback.current_index(), 9);
        assert_eq!(playback.advance_interval(), Some(Duration::ZERO));
    }

    #[test]
    fn infinite_combined_scale_ignores_empty_ticks() {
        let mut playback = Playback::new(INTERVAL, 1e300);
        playback.load(4);
        playback.set_speed(1e300).unwrap();
        assert!(playback.effective_speed().is_infinite());
        playback.play();
        assert_eq!(playback.tick(Duration::ZERO).advanced, 0);
        assert!(playback.tick(Duration::from_millis(1)).completed);
    }

    #[test]
    fn tiny_speed_never_advances_and_has_no_interval() {
        let mut playback = loaded(10);
        playback.set_speed(1e-300).unwrap();
        assert_eq!(playback.advance_interval(), None);
        playback.play();
        for _ in 0..100 {
            assert_eq!(playback.tick(Duration::from_secs(60)).advanced, 0);
        }
        assert_eq!(playback.state(), PlaybackState::Playing);
    }
}
