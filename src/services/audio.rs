//! Audio cue sink. The backend never plays sound itself; cues are pushed to the
//! connected frontends, which own the speakers.

use std::{
    fmt,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, warn};

use crate::{
    config::AppConfig,
    dto::sse::{AudioEvent, ServerEvent},
    state::{SseHub, game::TeamColor},
};

const EVENT_AUDIO_PLAY: &str = "audio.play";
const EVENT_AUDIO_STOP: &str = "audio.stop";

/// Identifies one audio cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundId {
    /// Per-team buzz cue.
    Team(TeamColor),
    /// Played ten seconds before the end of a standard countdown.
    Warning,
    /// Played when a countdown finishes.
    End,
}

impl SoundId {
    /// Key used in configuration and events.
    pub fn key(self) -> &'static str {
        match self {
            SoundId::Team(team) => team.as_str(),
            SoundId::Warning => "warning",
            SoundId::End => "end",
        }
    }

    /// Reverse of [`SoundId::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "warning" => Some(SoundId::Warning),
            "end" => Some(SoundId::End),
            other => TeamColor::from_name(other).map(SoundId::Team),
        }
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Best-effort audio output. Implementations swallow their own failures.
pub trait AudioSink: Send + Sync {
    /// Start `sound` from the beginning. Ignored while muted.
    fn play(&self, sound: SoundId);
    /// Stop every cue.
    fn stop_all(&self);
    /// Mirror the session's mute flag.
    fn set_muted(&self, muted: bool);
}

/// Broadcasts cues on the public SSE stream for the display to play.
pub struct SseAudio {
    hub: SseHub,
    config: AppConfig,
    muted: AtomicBool,
}

impl SseAudio {
    pub fn new(hub: SseHub, config: AppConfig) -> Self {
        Self {
            hub,
            config,
            muted: AtomicBool::new(false),
        }
    }

    fn send(&self, name: &str, payload: &AudioEvent) {
        match ServerEvent::json(Some(name.to_string()), payload) {
            Ok(event) => self.hub.broadcast(event),
            Err(err) => warn!(event = name, error = %err, "failed to serialize audio event"),
        }
    }
}

impl AudioSink for SseAudio {
    fn play(&self, sound: SoundId) {
        if self.muted.load(Ordering::SeqCst) {
            debug!(%sound, "muted; cue skipped");
            return;
        }
        let payload = AudioEvent {
            sound: Some(sound.key().to_string()),
            asset: Some(self.config.sound_asset(sound)),
        };
        self.send(EVENT_AUDIO_PLAY, &payload);
    }

    fn stop_all(&self) {
        self.send(
            EVENT_AUDIO_STOP,
            &AudioEvent {
                sound: None,
                asset: None,
            },
        );
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }
}

/// Something that happened on a [`RecordingAudio`] sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCall {
    Play(SoundId),
    StopAll,
}

/// Sink that remembers the cues it would have played, for headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    calls: Mutex<Vec<AudioCall>>,
    muted: AtomicBool,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded call, oldest first.
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times `sound` was played.
    pub fn plays_of(&self, sound: SoundId) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| *call == AudioCall::Play(sound))
            .count()
    }

    fn record(&self, call: AudioCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl AudioSink for RecordingAudio {
    fn play(&self, sound: SoundId) {
        if !self.muted.load(Ordering::SeqCst) {
            self.record(AudioCall::Play(sound));
        }
    }

    fn stop_all(&self) {
        self.record(AudioCall::StopAll);
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sound_keys_round_trip() {
        for sound in [
            SoundId::Team(TeamColor::Yellow),
            SoundId::Warning,
            SoundId::End,
        ] {
            assert_eq!(SoundId::from_key(sound.key()), Some(sound));
        }
        assert_eq!(SoundId::from_key("siren"), None);
    }

    #[tokio::test]
    async fn sse_audio_respects_mute() {
        let hub = SseHub::new(8);
        let mut receiver = hub.subscribe();
        let audio = SseAudio::new(hub, AppConfig::default());

        audio.set_muted(true);
        audio.play(SoundId::End);
        audio.set_muted(false);
        audio.play(SoundId::Team(TeamColor::Green));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_AUDIO_PLAY));
        assert!(event.data.contains("\"green\""));
        assert!(event.data.contains("sounds/green.mp3"));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn recording_audio_skips_muted_plays() {
        let audio = RecordingAudio::new();
        audio.play(SoundId::Warning);
        audio.set_muted(true);
        audio.play(SoundId::Warning);
        audio.stop_all();

        assert_eq!(
            audio.calls(),
            vec![AudioCall::Play(SoundId::Warning), AudioCall::StopAll]
        );
    }
}
