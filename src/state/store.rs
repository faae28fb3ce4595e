//! Single authoritative session store: load, merge, persist, notify.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    dao::{kv_store::KeyValueStore, storage::StorageError},
    state::game::{
        BuzzerRace, FIRST_ROUND, LAST_ROUND, MAX_QUESTION, QuestionRow, Session, Teams, TimerState, session_id_for,
    },
};

/// Callback invoked with the merged session after every update.
pub type Listener = Box<dyn Fn(&Session) + Send + Sync>;

/// Callback invoked after every persistence attempt.
pub type PersistObserver = Box<dyn Fn(Result<(), &StorageError>) + Send + Sync>;

/// Partial update shallow-merged into the session. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub teams: Option<Teams>,
    pub current_round: Option<u8>,
    pub current_question: Option<usize>,
    pub timer: Option<TimerState>,
    pub buzzer: Option<BuzzerRace>,
    pub muted: Option<bool>,
    pub answer_visible: Option<bool>,
    pub questions: Option<Vec<QuestionRow>>,
    pub question_index: Option<usize>,
}

impl SessionPatch {
    pub fn teams(mut self, teams: Teams) -> Self {
        self.teams = Some(teams);
        self
    }

    pub fn round(mut self, round: u8) -> Self {
        self.current_round = Some(round);
        self
    }

    pub fn question(mut self, question: usize) -> Self {
        self.current_question = Some(question);
        self
    }

    pub fn timer(mut self, timer: TimerState) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn buzzer(mut self, buzzer: BuzzerRace) -> Self {
        self.buzzer = Some(buzzer);
        self
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.muted = Some(muted);
        self
    }

    pub fn answer_visible(mut self, visible: bool) -> Self {
        self.answer_visible = Some(visible);
        self
    }

    pub fn questions(mut self, questions: Vec<QuestionRow>, index: usize) -> Self {
        self.questions = Some(questions);
        self.question_index = Some(index);
        self
    }

    pub fn question_index(mut self, index: usize) -> Self {
        self.question_index = Some(index);
        self
    }
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`StateStore::subscribe`].
#[must_use = "dropping the handle keeps the listener registered; call `unsubscribe` to remove it"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the listener. Has no effect once the store is gone.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut guard = listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.entries.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owns the live [`Session`] and mirrors it to a [`KeyValueStore`] after every change.
///
/// Listeners run synchronously inside [`StateStore::update_state`]; they must not call
/// back into the store.
pub struct StateStore {
    session: Session,
    backend: Arc<dyn KeyValueStore>,
    key: String,
    listeners: Arc<Mutex<Listeners>>,
    persist_observer: Option<PersistObserver>,
    last_persist_failed: bool,
}

impl StateStore {
    /// Load the session stored under `key`, falling back to a fresh one when the
    /// blob is missing, unreadable or malformed.
    pub fn open(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let session = load_session(backend.as_ref(), &key);
        Self {
            session,
            backend,
            key,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            persist_observer: None,
            last_persist_failed: false,
        }
    }

    /// Borrow the live session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Copy of the live session, safe to hold after the store moves on.
    pub fn get_state(&self) -> Session {
        self.session.clone()
    }

    /// Whether the most recent write to the backend failed.
    pub fn last_persist_failed(&self) -> bool {
        self.last_persist_failed
    }

    /// Install the callback reporting persistence outcomes.
    pub fn on_persist(&mut self, observer: PersistObserver) {
        self.persist_observer = Some(observer);
    }

    /// Merge `patch`, stamp the modification time, persist, then notify listeners.
    ///
    /// A failed write keeps the in-memory change; the failure goes to the persist observer.
    /// Rounds are clamped to `FIRST_ROUND..=LAST_ROUND`.
    pub fn update_state(&mut self, patch: SessionPatch) {
        let round = patch.current_round.map(|round| {
            let clamped = round.clamp(FIRST_ROUND, LAST_ROUND);
            if clamped != round {
                debug!(round, clamped, "round outside the playable range");
            }
            clamped
        });
        let round_changed = round.is_some_and(|round| round != self.session.current_round);
        let session = &mut self.session;

        if let Some(teams) = patch.teams {
            session.teams = teams;
        }
        if let Some(round) = round {
            session.current_round = round;
        }
        match patch.current_question {
            Some(question) => session.current_question = question.clamp(1, MAX_QUESTION),
            None if round_changed => session.current_question = 1,
            None => {}
        }
        if let Some(timer) = patch.timer {
            session.timer = timer;
        }
        if let Some(buzzer) = patch.buzzer {
            session.buzzer = buzzer;
        }
        if let Some(muted) = patch.muted {
            session.muted = muted;
        }
        if let Some(visible) = patch.answer_visible {
            session.answer_visible = visible;
        }
        if let Some(questions) = patch.questions {
            session.questions = questions;
        }
        if let Some(index) = patch.question_index {
            session.question_index = index;
        }

        self.touch();
        self.persist();
        self.notify();
    }

    /// Replace the whole session with a fresh one, keeping session ids unique.
    pub fn reset(&mut self, now: OffsetDateTime) {
        let mut fresh = Session::new(now);
        if self.session.session_id.starts_with(&fresh.session_id) {
            fresh.session_id = next_session_id(&self.session.session_id);
        }
        info!(session_id = %fresh.session_id, "starting a new session");
        self.session = fresh;
        self.persist();
        self.notify();
    }

    /// Register a listener invoked with the merged session after every update.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.next_id += 1;
        let id = guard.next_id;
        guard.entries.push((id, Box::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    fn touch(&mut self) {
        let now = OffsetDateTime::now_utc();
        self.session.last_modified = now.max(self.session.created_at);
    }

    fn persist(&mut self) {
        let outcome = serde_json::to_string(&self.session)
            .map_err(|err| StorageError::malformed("failed to encode session".into(), err))
            .and_then(|blob| self.backend.set(&self.key, &blob));

        match &outcome {
            Ok(()) if self.last_persist_failed => info!("session persistence recovered"),
            Ok(()) => {}
            Err(err) => warn!(error = %err, key = %self.key, "failed to persist session"),
        }
        self.last_persist_failed = outcome.is_err();
        if let Some(observer) = &self.persist_observer {
            observer(outcome.as_ref().map(|_| ()));
        }
    }

    fn notify(&self) {
        let guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, listener) in &guard.entries {
            listener(&self.session);
        }
    }
}

fn load_session(backend: &dyn KeyValueStore, key: &str) -> Session {
    let blob = match backend.get(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            info!(key, "no stored session; starting fresh");
            return Session::default();
        }
        Err(err) => {
            warn!(key, error = %err, "failed to read stored session; starting fresh");
            return Session::default();
        }
    };

    match serde_json::from_str::<Session>(&blob).map(Session::sanitize) {
        Ok(Ok(session)) => {
            info!(session_id = %session.session_id, "restored stored session");
            session
        }
        Ok(Err(err)) => {
            warn!(key, error = %err, "stored session has an invalid shape; starting fresh");
            Session::default()
        }
        Err(err) => {
            warn!(key, error = %err, "stored session is not valid JSON; starting fresh");
            Session::default()
        }
    }
}

/// Bump a numeric suffix so a reset within the same second gets a distinct id.
fn next_session_id(previous: &str) -> String {
    let base = session_id_for(OffsetDateTime::UNIX_EPOCH).len();
    debug!(previous, "session id collision; adding suffix");
    let suffix = previous
        .get(base..)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|suffix| suffix.parse::<u32>().ok());
    match suffix {
        Some(n) => format!("{}_{}", &previous[..base], n + 1),
        None => format!("{previous}_2"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        dao::kv_store::MemoryStore,
        state::game::{ScoreTableKind, TeamColor},
    };

    const KEY: &str = "brainRingState";

    fn memory() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn missing_blob_yields_defaults() {
        let store = StateStore::open(memory(), KEY);
        let session = store.get_state();

        assert_eq!(session.teams.len(), 6);
        assert!(session.buzzer.listening);
        assert!(session.session_id.starts_with("session_"));
    }

    #[test]
    fn corrupt_blob_yields_defaults() {
        let backend = memory();
        backend.set(KEY, "{not json").unwrap();
        let store = StateStore::open(backend.clone(), KEY);
        assert_eq!(store.session().current_round, 2);

        backend
            .set(KEY, r#"{"teams":{"red":{"name":"x","visible":true,"yesNo":[],"simple":[],"hard":[],"cap":[]}}}"#)
            .unwrap();
        let store = StateStore::open(backend, KEY);
        assert_eq!(store.session().teams[&TeamColor::Red].name, "Red Team");
    }

    #[test]
    fn updates_survive_reopen() {
        let backend = memory();
        let mut store = StateStore::open(backend.clone(), KEY);
        let mut teams = store.session().teams.clone();
        teams[&TeamColor::Blue].hard[4] = Some(1.0);
        store.update_state(SessionPatch::default().teams(teams).round(3).muted(true));

        let reopened = StateStore::open(backend, KEY);
        let session = reopened.session();
        assert_eq!(session.teams[&TeamColor::Blue].hard[4], Some(1.0));
        assert_eq!(session.current_round, 3);
        assert!(session.muted);
        assert_eq!(session.session_id, store.session().session_id);
    }

    #[test]
    fn partial_blob_is_merged_over_defaults() {
        let backend = memory();
        backend.set(KEY, r#"{"currentRound":4,"muted":true}"#).unwrap();

        let store = StateStore::open(backend, KEY);
        assert_eq!(store.session().current_round, 4);
        assert!(store.session().muted);
        assert_eq!(
            store.session().teams[&TeamColor::White]
                .column(ScoreTableKind::Captain)
                .len(),
            10
        );
    }

    #[test]
    fn round_change_resets_question() {
        let mut store = StateStore::open(memory(), KEY);
        store.update_state(SessionPatch::default().question(17));
        assert_eq!(store.session().current_question, 17);

        store.update_state(SessionPatch::default().round(3));
        assert_eq!(store.session().current_question, 1);
    }

    #[test]
    fn out_of_range_round_is_clamped_and_reloads() {
        let backend = memory();
        let mut store = StateStore::open(backend.clone(), KEY);
        let mut teams = store.session().teams.clone();
        teams[&TeamColor::Green].simple[0] = Some(1.0);
        store.update_state(SessionPatch::default().teams(teams).round(7));
        assert_eq!(store.session().current_round, LAST_ROUND);

        let reopened = StateStore::open(backend, KEY);
        assert_eq!(reopened.session().current_round, LAST_ROUND);
        assert_eq!(reopened.session().teams[&TeamColor::Green].simple[0], Some(1.0));
        assert_eq!(reopened.session().session_id, store.session().session_id);

        store.update_state(SessionPatch::default().round(0));
        assert_eq!(store.session().current_round, FIRST_ROUND);
    }

    #[test]
    fn modification_time_never_precedes_creation() {
        let mut store = StateStore::open(memory(), KEY);
        store.update_state(SessionPatch::default().answer_visible(true));
        let session = store.session();
        assert!(session.last_modified >= session.created_at);
    }

    #[test]
    fn listeners_see_merged_state_until_unsubscribed() {
        let store_backend = memory();
        let mut store = StateStore::open(store_backend, KEY);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let subscription = store.subscribe(move |session| {
            assert!(session.muted);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.update_state(SessionPatch::default().muted(true));
        store.update_state(SessionPatch::default().muted(true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        store.update_state(SessionPatch::default().muted(false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_write_keeps_memory_state_and_reports() {
        let backend = memory();
        let mut store = StateStore::open(backend.clone(), KEY);
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        store.on_persist(Box::new(move |outcome| {
            if outcome.is_err() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        backend.set_unavailable(true);
        store.update_state(SessionPatch::default().round(4));
        assert_eq!(store.session().current_round, 4);
        assert!(store.last_persist_failed());
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        backend.set_unavailable(false);
        store.update_state(SessionPatch::default().round(4));
        assert!(!store.last_persist_failed());
    }

    #[test]
    fn reset_produces_distinct_session_id() {
        let mut store = StateStore::open(memory(), KEY);
        let created = store.session().created_at;
        let previous = store.session().session_id.clone();

        store.reset(created);
        assert_ne!(store.session().session_id, previous);
        let bumped = store.session().session_id.clone();
        store.reset(created);
        assert_ne!(store.session().session_id, bumped);
        assert!(store.session().session_id.ends_with("_3"));
    }
}
