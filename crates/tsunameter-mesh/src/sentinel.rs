//! External stop sentinel.
//!
//! An operator stops a run by writing `0` into a small text file. Any other
//! number keeps the run going; a missing file or garbage is ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::signal::{StopCause, TerminationSignal};

/// What the sentinel file currently says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelState {
    Stop,
    Continue,
    /// Missing, empty or not a number
    Unreadable,
}

/// Interpret sentinel file contents.
pub fn parse_sentinel(contents: &str) -> SentinelState {
    match contents.trim().parse::<i64>() {
        Ok(0) => SentinelState::Stop,
        Ok(_) => SentinelState::Continue,
        Err(_) => SentinelState::Unreadable,
    }
}

async fn read_sentinel(path: &Path) -> SentinelState {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_sentinel(&contents),
        Err(e) => {
            debug!("Sentinel {} not readable: {}", path.display(), e);
            SentinelState::Unreadable
        }
    }
}

/// Poll `path` every `interval` and raise `UserRequested` once it reads `0`.
///
/// Returns when the signal is set, by this watcher or anyone else.
pub async fn watch_sentinel_file(path: PathBuf, interval: Duration, signal: TerminationSignal) {
    info!("Watching {} for stop requests", path.display());
    while !signal.is_set() {
        if read_sentinel(&path).await == SentinelState::Stop {
            info!("Stop requested via {}", path.display());
            signal.trigger(StopCause::UserRequested);
            break;
        }
        if !signal.sleep(interval).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_states() {
        assert_eq!(parse_sentinel("0"), SentinelState::Stop);
        assert_eq!(parse_sentinel("  0\n"), SentinelState::Stop);
        assert_eq!(parse_sentinel("1"), SentinelState::Continue);
        assert_eq!(parse_sentinel("-3"), SentinelState::Continue);
        assert_eq!(parse_sentinel(""), SentinelState::Unreadable);
        assert_eq!(parse_sentinel("stop"), SentinelState::Unreadable);
    }

    #[tokio::test]
    async fn missing_file_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("use.txt");
        let signal = TerminationSignal::new();
        let watcher = tokio::spawn(watch_sentinel_file(
            path,
            Duration::from_millis(5),
            signal.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!signal.is_set());

        signal.trigger(StopCause::IterationBudgetExhausted);
        watcher.await.unwrap();
        assert_eq!(signal.cause(), Some(StopCause::IterationBudgetExhausted));
    }

    #[tokio::test]
    async fn zero_requests_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("use.txt");
        std::fs::write(&path, "1\n").unwrap();

        let signal = TerminationSignal::new();
        let watcher = tokio::spawn(watch_sentinel_file(
            path.clone(),
            Duration::from_millis(5),
            signal.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!signal.is_set());

        std::fs::write(&path, "0\n").unwrap();
        watcher.await.unwrap();
        assert_eq!(signal.cause(), Some(StopCause::UserRequested));
    }
}
