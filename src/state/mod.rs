pub mod arbitration;
pub mod game;
pub mod scores;
mod sse;
pub mod store;
pub mod timer;
pub mod tokens;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::{
    config::AppConfig,
    dao::kv_store::KeyValueStore,
    services::{
        audio::{AudioSink, SseAudio},
        sse_events,
    },
    state::{
        arbitration::{BuzzerArbiter, Clock, SystemClock},
        game::Session,
        store::{StateStore, Subscription},
        timer::TimerRegistry,
        tokens::{TokenTable, TokenTableError},
    },
};

pub use self::sse::{AdminSseState, SseHub};
use self::sse::SseState;

pub type SharedState = Arc<AppState>;

const PUBLIC_SSE_CAPACITY: usize = 64;
const ADMIN_SSE_CAPACITY: usize = 64;

/// Central application state: the session store, the countdown, the arbiter and
/// the event hubs.
///
/// Lock order: `timers` before `store`. Neither lock is held across an `.await`.
pub struct AppState {
    config: AppConfig,
    store: Mutex<StateStore>,
    timers: Mutex<TimerRegistry>,
    arbiter: BuzzerArbiter,
    clock: Arc<dyn Clock>,
    audio: Arc<dyn AudioSink>,
    sse: SseState,
    degraded: Arc<watch::Sender<bool>>,
    _snapshot_feed: Subscription,
}

impl AppState {
    /// Build the production state: wall clock and cues broadcast on the public stream.
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn KeyValueStore>,
    ) -> Result<SharedState, TokenTableError> {
        let sse = SseState::new(PUBLIC_SSE_CAPACITY, ADMIN_SSE_CAPACITY);
        let audio = Arc::new(SseAudio::new(sse.public().clone(), config.clone()));
        Self::assemble(config, backend, Arc::new(SystemClock), audio, sse)
    }

    /// Build the state around caller-provided clock and audio sink.
    pub fn with_collaborators(
        config: AppConfig,
        backend: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioSink>,
    ) -> Result<SharedState, TokenTableError> {
        let sse = SseState::new(PUBLIC_SSE_CAPACITY, ADMIN_SSE_CAPACITY);
        Self::assemble(config, backend, clock, audio, sse)
    }

    fn assemble(
        config: AppConfig,
        backend: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        audio: Arc<dyn AudioSink>,
        sse: SseState,
    ) -> Result<SharedState, TokenTableError> {
        let arbiter = BuzzerArbiter::new(TokenTable::standard()?);
        let mut store = StateStore::open(backend, config.storage_key());
        audio.set_muted(store.session().muted);

        let (degraded_tx, _rx) = watch::channel(false);
        let degraded = Arc::new(degraded_tx);

        let public = sse.public().clone();
        let admin = sse.admin().hub().clone();
        let snapshot_feed = store.subscribe(move |session: &Session| {
            sse_events::publish_snapshot(&public, &admin, session);
        });

        let admin = sse.admin().hub().clone();
        let watcher = degraded.clone();
        store.on_persist(Box::new(move |outcome| {
            let failed = outcome.is_err();
            if let Err(err) = outcome {
                sse_events::publish_storage_failure(&admin, err);
            }
            let flipped = watcher.send_if_modified(|degraded| {
                let changed = *degraded != failed;
                *degraded = failed;
                changed
            });
            if flipped {
                sse_events::publish_system_status(&admin, failed);
            }
        }));

        Ok(Arc::new(Self {
            config,
            store: Mutex::new(store),
            timers: Mutex::new(TimerRegistry::new()),
            arbiter,
            clock,
            audio,
            sse,
            degraded,
            _snapshot_feed: snapshot_feed,
        }))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Lock the session store.
    pub fn store(&self) -> MutexGuard<'_, StateStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the countdown registry. Take it before [`AppState::store`] when both are needed.
    pub fn timers(&self) -> MutexGuard<'_, TimerRegistry> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.store().get_state()
    }

    pub fn arbiter(&self) -> &BuzzerArbiter {
        &self.arbiter
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn audio(&self) -> &dyn AudioSink {
        self.audio.as_ref()
    }

    /// Whether the last write to storage failed.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Moderator stream bundle: hub plus the token of its single subscriber.
    pub fn admin_stream(&self) -> &AdminSseState {
        self.sse.admin()
    }
}
