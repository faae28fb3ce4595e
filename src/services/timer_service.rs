//! Countdown driver: one-second ticks, the ten-second warning and the expiry deadline.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::{
    error::ServiceError,
    services::{audio::SoundId, sse_events},
    state::{
        SharedState,
        game::{Session, TimerState},
        store::SessionPatch,
        timer::{RunId, TimerRegistry, warning_offset},
    },
};

const TICK: Duration = Duration::from_secs(1);

/// Start a countdown of `duration` seconds, replacing any running one.
///
/// Stops every cue and reopens listening. Schedules the ticks, the expiry and,
/// for 60/120/180 second runs, the warning cue.
pub fn start_timer(state: &SharedState, duration: u32) -> Result<TimerState, ServiceError> {
    if duration == 0 {
        return Err(ServiceError::InvalidInput(
            "timer duration must be at least one second".into(),
        ));
    }

    let mut timers = state.timers();
    let run = timers.begin();
    state.audio().stop_all();

    let session = {
        let mut store = state.store();
        let mut race = store.session().buzzer.clone();
        race.listening = true;
        store.update_state(
            SessionPatch::default()
                .timer(TimerState::running(duration))
                .buzzer(race),
        );
        store.get_state()
    };

    let started = Instant::now();
    let mut tasks = Vec::with_capacity(3);
    tasks.push(tokio::spawn(run_ticks(state.clone(), run, started)));
    if let Some(offset) = warning_offset(duration) {
        tasks.push(tokio::spawn(run_warning(state.clone(), run, started + offset)));
    }
    let deadline = started + Duration::from_secs(u64::from(duration));
    tasks.push(tokio::spawn(run_expiry(state.clone(), run, deadline)));
    timers.attach(run, tasks);
    drop(timers);

    info!(duration, run, "countdown started");
    sse_events::broadcast_timer_tick(state, &session);
    Ok(session.timer)
}

/// Stop the countdown: timer idle, listening off, end cue.
///
/// Locks the buzzers even when no countdown is running. Returns whether one was.
pub fn stop_timer(state: &SharedState) -> bool {
    let mut timers = state.timers();
    let was_running = timers.cancel();
    if !was_running {
        debug!("stop requested without a running countdown");
    }
    end_countdown(state);
    drop(timers);
    was_running
}

/// Cancel the countdown without the end cue, reopen listening and silence every cue.
pub fn reset_timer(state: &SharedState) {
    let mut timers = state.timers();
    if timers.cancel() {
        debug!("countdown cancelled by reset");
    }
    {
        let mut store = state.store();
        let mut race = store.session().buzzer.clone();
        race.listening = true;
        store.update_state(
            SessionPatch::default()
                .timer(TimerState::idle())
                .buzzer(race),
        );
    }
    drop(timers);
    state.audio().stop_all();
}

async fn run_ticks(state: SharedState, run: RunId, started: Instant) {
    let mut ticker = time::interval_at(started + TICK, TICK);
    loop {
        ticker.tick().await;
        if !tick(&state, run) {
            break;
        }
    }
}

async fn run_warning(state: SharedState, run: RunId, at: Instant) {
    time::sleep_until(at).await;
    let timers = state.timers();
    if !timers.is_live(run) {
        return;
    }
    let session = state.snapshot();
    state.audio().play(SoundId::Warning);
    drop(timers);
    sse_events::broadcast_timer_warning(&state, &session);
}

async fn run_expiry(state: SharedState, run: RunId, deadline: Instant) {
    time::sleep_until(deadline).await;
    let mut timers = state.timers();
    finish_run(&state, &mut timers, run);
}

/// Count one second down. Returns whether the run goes on.
fn tick(state: &SharedState, run: RunId) -> bool {
    let mut timers = state.timers();
    if !timers.is_live(run) {
        return false;
    }

    let mut store = state.store();
    let mut timer = store.session().timer;
    timer.remaining = timer.remaining.saturating_sub(1);
    if timer.remaining == 0 {
        drop(store);
        finish_run(state, &mut timers, run);
        return false;
    }

    store.update_state(SessionPatch::default().timer(timer));
    let session = store.get_state();
    drop(store);
    drop(timers);
    sse_events::broadcast_timer_tick(state, &session);
    true
}

/// End `run` if it is still live. Exactly one caller per run gets past the registry check.
fn finish_run(state: &SharedState, timers: &mut TimerRegistry, run: RunId) -> bool {
    if !timers.finish(run) {
        return false;
    }
    info!(run, "countdown finished");
    end_countdown(state);
    true
}

/// Idle the timer, close listening and play the end cue. Callers hold the timer registry.
fn end_countdown(state: &SharedState) {
    let session: Session = {
        let mut store = state.store();
        let mut race = store.session().buzzer.clone();
        race.listening = false;
        store.update_state(
            SessionPatch::default()
                .timer(TimerState::idle())
                .buzzer(race),
        );
        store.get_state()
    };
    state.audio().play(SoundId::End);
    sse_events::broadcast_timer_finished(state, &session);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv_store::MemoryStore,
        services::audio::{AudioCall, RecordingAudio},
        state::{AppState, arbitration::ManualClock},
    };

    fn setup() -> (SharedState, Arc<RecordingAudio>) {
        let audio = Arc::new(RecordingAudio::new());
        let state = AppState::with_collaborators(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
            audio.clone(),
        )
        .unwrap();
        (state, audio)
    }

    async fn wait(seconds: f64) {
        time::sleep(Duration::from_secs_f64(seconds)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_finishes_once() {
        let (state, audio) = setup();
        start_timer(&state, 60).unwrap();

        wait(30.5).await;
        let session = state.snapshot();
        assert!(session.timer.active);
        assert_eq!(session.timer.remaining, 30);
        assert!(session.buzzer.listening);

        wait(30.0).await;
        let session = state.snapshot();
        assert_eq!(session.timer, TimerState::idle());
        assert!(!session.buzzer.listening);
        assert_eq!(audio.plays_of(SoundId::Warning), 1);
        assert_eq!(audio.plays_of(SoundId::End), 1);

        wait(120.0).await;
        assert_eq!(audio.plays_of(SoundId::End), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_plays_ten_seconds_before_the_end() {
        let (state, audio) = setup();
        start_timer(&state, 120).unwrap();

        wait(109.5).await;
        assert_eq!(audio.plays_of(SoundId::Warning), 0);
        wait(1.0).await;
        assert_eq!(audio.plays_of(SoundId::Warning), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_standard_duration_has_no_warning() {
        let (state, audio) = setup();
        start_timer(&state, 45).unwrap();

        wait(46.0).await;
        assert_eq!(audio.plays_of(SoundId::Warning), 0);
        assert_eq!(audio.plays_of(SoundId::End), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_cancels_the_previous_run() {
        let (state, audio) = setup();
        start_timer(&state, 120).unwrap();
        wait(5.0).await;
        start_timer(&state, 60).unwrap();

        wait(2.5).await;
        assert_eq!(state.snapshot().timer.remaining, 58);

        wait(130.0).await;
        assert_eq!(audio.plays_of(SoundId::Warning), 1);
        assert_eq!(audio.plays_of(SoundId::End), 1);
        assert_eq!(state.snapshot().timer, TimerState::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_ends_the_run() {
        let (state, audio) = setup();
        start_timer(&state, 60).unwrap();
        wait(10.5).await;

        assert!(stop_timer(&state));
        let session = state.snapshot();
        assert_eq!(session.timer, TimerState::idle());
        assert!(!session.buzzer.listening);
        assert_eq!(audio.plays_of(SoundId::End), 1);

        wait(60.0).await;
        assert_eq!(audio.plays_of(SoundId::End), 1);
        assert_eq!(audio.plays_of(SoundId::Warning), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_countdown_still_locks_buzzers() {
        let (state, audio) = setup();
        assert!(state.snapshot().buzzer.listening);

        assert!(!stop_timer(&state));
        let session = state.snapshot();
        assert_eq!(session.timer, TimerState::idle());
        assert!(!session.buzzer.listening);
        assert_eq!(audio.plays_of(SoundId::End), 1);

        start_timer(&state, 60).unwrap();
        wait(5.5).await;
        assert!(stop_timer(&state));
        assert!(!stop_timer(&state));
        assert_eq!(audio.plays_of(SoundId::End), 3);

        wait(60.0).await;
        assert_eq!(audio.plays_of(SoundId::End), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_without_end_cue() {
        let (state, audio) = setup();
        start_timer(&state, 60).unwrap();
        wait(3.5).await;

        reset_timer(&state);
        let session = state.snapshot();
        assert_eq!(session.timer, TimerState::idle());
        assert!(session.buzzer.listening);
        assert_eq!(audio.calls().last(), Some(&AudioCall::StopAll));

        wait(70.0).await;
        assert_eq!(audio.plays_of(SoundId::End), 0);
        assert_eq!(state.snapshot().timer, TimerState::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_is_rejected() {
        let (state, _audio) = setup();
        assert!(matches!(
            start_timer(&state, 0),
            Err(ServiceError::InvalidInput(_))
        ));
        assert_eq!(state.snapshot().timer, TimerState::idle());
    }
}
