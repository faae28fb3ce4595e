//! End-to-end run of a game through the library API: buzz, award, navigate, time, restore.

use std::sync::Arc;

use brain_ring_back::{
    config::AppConfig,
    dao::kv_store::{FileStore, KeyValueStore, MemoryStore},
    services::{
        admin_service,
        audio::{AudioCall, RecordingAudio, SoundId},
        buzzer_service, statistics, timer_service,
    },
    state::{
        AppState, SharedState,
        arbitration::{ManualClock, PointsAward, SignalOutcome},
        game::{ScoreTableKind, TeamColor},
    },
};
use tokio::time::{self, Duration};

fn build(backend: Arc<dyn KeyValueStore>) -> (SharedState, Arc<ManualClock>, Arc<RecordingAudio>) {
    let clock = Arc::new(ManualClock::new(10_000));
    let audio = Arc::new(RecordingAudio::new());
    let state =
        AppState::with_collaborators(AppConfig::default(), backend, clock.clone(), audio.clone())
            .expect("standard token table is valid");
    (state, clock, audio)
}

#[tokio::test(start_paused = true)]
async fn a_question_from_buzz_to_statistics() {
    let (state, clock, audio) = build(Arc::new(MemoryStore::new()));

    timer_service::start_timer(&state, 60).unwrap();

    let SignalOutcome::Accepted(first) = buzzer_service::handle_signal(&state, "и") else {
        panic!("first signal should be accepted");
    };
    assert_eq!((first.team, first.rank, first.label.as_str()), (TeamColor::Blue, 1, "First"));

    clock.advance_ms(420);
    let SignalOutcome::Accepted(second) = buzzer_service::handle_signal(&state, "R") else {
        panic!("second signal should be accepted");
    };
    assert_eq!(second.label, "+0.42 s");
    assert_eq!(
        buzzer_service::handle_signal(&state, "b"),
        SignalOutcome::AlreadyClicked(TeamColor::Blue)
    );

    let award = buzzer_service::add_points(&state, TeamColor::Blue, 1.0);
    assert!(matches!(award, PointsAward::Written { .. }));

    assert!(timer_service::stop_timer(&state));
    assert!(!state.snapshot().buzzer.listening);
    assert_eq!(
        buzzer_service::handle_signal(&state, "g"),
        SignalOutcome::NotListening
    );
    assert_eq!(audio.plays_of(SoundId::End), 1);

    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(audio.plays_of(SoundId::End), 1);
    assert_eq!(audio.plays_of(SoundId::Warning), 0);

    admin_service::change_question(&state, 1);
    let session = state.snapshot();
    assert_eq!(session.current_question, 2);
    assert!(session.buzzer.listening);
    assert!(session.buzzer.clicked_teams.is_empty());
    assert_eq!(audio.calls().last(), Some(&AudioCall::StopAll));

    let rows = statistics::statistics(&session);
    let simple = rows
        .iter()
        .find(|row| row.label == "Simple 1-10")
        .expect("simple block row");
    assert_eq!((simple.correct, simple.incorrect), (1, 9));
    assert_eq!(session.teams[&TeamColor::Blue].total_points, 1.0);
}

#[tokio::test(start_paused = true)]
async fn warning_and_expiry_fire_once() {
    let (state, _clock, audio) = build(Arc::new(MemoryStore::new()));
    timer_service::start_timer(&state, 60).unwrap();

    time::sleep(Duration::from_millis(50_500)).await;
    assert_eq!(audio.plays_of(SoundId::Warning), 1);
    assert_eq!(audio.plays_of(SoundId::End), 0);
    assert!(state.snapshot().timer.active);

    time::sleep(Duration::from_secs(10)).await;
    let timer = state.snapshot().timer;
    assert!(!timer.active);
    assert_eq!(timer.remaining, 0);
    assert_eq!(audio.plays_of(SoundId::End), 1);
}

#[tokio::test]
async fn session_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let session_id = {
        let (state, _clock, _audio) = build(Arc::new(FileStore::new(dir.path())));
        admin_service::change_round(&state, 1);
        admin_service::rename_team(&state, TeamColor::Yellow, "Bees").unwrap();
        buzzer_service::add_points(&state, TeamColor::Yellow, 3.0);
        state.snapshot().session_id
    };

    let (state, _clock, _audio) = build(Arc::new(FileStore::new(dir.path())));
    let session = state.snapshot();
    assert_eq!(session.session_id, session_id);
    assert_eq!(session.current_round, 3);
    assert_eq!(session.teams[&TeamColor::Yellow].name, "Bees");
    assert_eq!(
        session.teams[&TeamColor::Yellow].column(ScoreTableKind::Hard)[0],
        Some(3.0)
    );
    assert_eq!(session.teams[&TeamColor::Yellow].total_points, 3.0);
}

#[tokio::test]
async fn failed_saves_keep_the_game_running() {
    let backend = Arc::new(MemoryStore::new());
    let (state, _clock, _audio) = build(backend.clone());

    backend.set_unavailable(true);
    let outcome = buzzer_service::handle_signal(&state, "w");
    assert!(matches!(outcome, SignalOutcome::Accepted(_)));
    assert!(state.is_degraded());
    assert_eq!(state.snapshot().buzzer.clicked_teams.len(), 1);

    backend.set_unavailable(false);
    buzzer_service::reset_output(&state);
    assert!(!state.is_degraded());
}
