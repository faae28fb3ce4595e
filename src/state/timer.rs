//! Bookkeeping for the scheduled callbacks of a countdown run.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Durations (seconds) that get a warning cue ten seconds before the end.
const WARNED_DURATIONS: [u32; 3] = [60, 120, 180];
const WARNING_LEAD: u32 = 10;

/// Offset from the start of a run at which the warning cue plays, if any.
pub fn warning_offset(duration_secs: u32) -> Option<Duration> {
    WARNED_DURATIONS
        .contains(&duration_secs)
        .then(|| Duration::from_secs(u64::from(duration_secs - WARNING_LEAD)))
}

/// Identifier of a countdown run. Callbacks carry it so a stale one can tell it lost.
pub type RunId = u64;

/// Tracks at most one live countdown run and the tasks driving it.
///
/// Starting a run cancels the previous one. A run ends exactly once: the first
/// caller of [`TimerRegistry::finish`] wins and later callers get `false`.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    last_run: RunId,
    live: Option<RunId>,
    tasks: Vec<JoinHandle<()>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any live run and allocate the id of a new one.
    pub fn begin(&mut self) -> RunId {
        self.cancel();
        self.last_run += 1;
        self.live = Some(self.last_run);
        self.last_run
    }

    /// Attach the tasks driving `run`. Tasks for a run that is no longer live are aborted.
    pub fn attach(&mut self, run: RunId, tasks: Vec<JoinHandle<()>>) {
        if self.is_live(run) {
            self.tasks.extend(tasks);
        } else {
            tasks.iter().for_each(JoinHandle::abort);
        }
    }

    /// Whether `run` is the live run.
    pub fn is_live(&self, run: RunId) -> bool {
        self.live == Some(run)
    }

    /// The live run, if any.
    pub fn live(&self) -> Option<RunId> {
        self.live
    }

    /// End `run` if it is still live. Returns `true` only for the first caller.
    pub fn finish(&mut self, run: RunId) -> bool {
        if !self.is_live(run) {
            return false;
        }
        self.cancel();
        true
    }

    /// Abort every task of the live run. Returns whether a run was live.
    pub fn cancel(&mut self) -> bool {
        // aborting the calling task itself is fine: it only takes effect at its next await
        self.tasks.drain(..).for_each(|task| task.abort());
        self.live.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_only_for_standard_durations() {
        assert_eq!(warning_offset(60), Some(Duration::from_secs(50)));
        assert_eq!(warning_offset(120), Some(Duration::from_secs(110)));
        assert_eq!(warning_offset(180), Some(Duration::from_secs(170)));
        assert_eq!(warning_offset(90), None);
        assert_eq!(warning_offset(5), None);
    }

    #[test]
    fn a_run_finishes_once() {
        let mut registry = TimerRegistry::new();
        let run = registry.begin();

        assert!(registry.finish(run));
        assert!(!registry.finish(run));
        assert_eq!(registry.live(), None);
    }

    #[test]
    fn starting_again_invalidates_the_previous_run() {
        let mut registry = TimerRegistry::new();
        let first = registry.begin();
        let second = registry.begin();

        assert_ne!(first, second);
        assert!(!registry.is_live(first));
        assert!(!registry.finish(first));
        assert!(registry.finish(second));
    }

    #[tokio::test]
    async fn cancel_aborts_attached_tasks() {
        let mut registry = TimerRegistry::new();
        let run = registry.begin();
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        registry.attach(run, vec![task]);

        assert!(registry.cancel());
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }
}
