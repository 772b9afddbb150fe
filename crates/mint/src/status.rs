//! Mint loop status published over a watch channel.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where the mint loop is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintPhase {
    /// Not started.
    #[default]
    Idle,
    /// Building the attempt for the current nonce.
    Building,
    /// Checking the attempt hash against the target.
    Hashing,
    /// Running the contract verifier on a match.
    Verifying,
    /// Handing the match to the chain service.
    Broadcasting,
    /// Broadcast went through.
    Done,
    /// Nonce space ran out.
    Exhausted,
    /// Stopped through the cancel token.
    Cancelled,
    /// Stopped on an error.
    Failed,
}

/// Snapshot of the mint loop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintStatus {
    /// Current phase.
    pub phase: MintPhase,

    /// Nonce of the current or last attempt.
    pub nonce: u32,

    /// Attempts built so far.
    pub attempts: u64,

    /// Hash of the last attempt.
    pub last_hash: Option<String>,
}

/// Read side of the status channel.
#[derive(Clone, Debug)]
pub struct MintMonitor {
    status_rx: watch::Receiver<MintStatus>,
}

impl MintMonitor {
    pub(crate) fn new(status_rx: watch::Receiver<MintStatus>) -> Self {
        Self { status_rx }
    }

    /// Returns a clone of the current status.
    pub fn get_current(&self) -> MintStatus {
        self.status_rx.borrow().clone()
    }

    /// Returns the current status as JSON.
    pub fn fetch_status_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&*self.status_rx.borrow())
    }

    /// Waits for the next status change.
    pub async fn changed(&mut self) -> Result<MintStatus, watch::error::RecvError> {
        self.status_rx.changed().await?;
        Ok(self.get_current())
    }
}

/// Write side of the status channel.
#[derive(Debug)]
pub(crate) struct StatusPublisher {
    status_tx: watch::Sender<MintStatus>,
}

impl StatusPublisher {
    pub(crate) fn new() -> (Self, MintMonitor) {
        let (status_tx, status_rx) = watch::channel(MintStatus::default());
        (Self { status_tx }, MintMonitor::new(status_rx))
    }

    pub(crate) fn phase(&self, phase: MintPhase) {
        self.status_tx.send_modify(|s| s.phase = phase);
    }

    pub(crate) fn attempt(&self, nonce: u32, attempts: u64, hash: &str) {
        self.status_tx.send_modify(|s| {
            s.phase = MintPhase::Hashing;
            s.nonce = nonce;
            s.attempts = attempts;
            s.last_hash = Some(hash.to_owned());
        });
    }

    pub(crate) fn reset(&self) {
        self.status_tx.send_replace(MintStatus::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish() {
        let (publisher, monitor) = StatusPublisher::new();
        assert_eq!(monitor.get_current().phase, MintPhase::Idle);

        publisher.phase(MintPhase::Building);
        publisher.attempt(7, 8, "20ab");
        let status = monitor.get_current();
        assert_eq!(status.phase, MintPhase::Hashing);
        assert_eq!(status.nonce, 7);
        assert_eq!(status.attempts, 8);

        let json = monitor.fetch_status_json().unwrap();
        assert_eq!(json["phase"], "hashing");
        assert_eq!(json["last_hash"], "20ab");

        publisher.reset();
        assert_eq!(monitor.get_current(), MintStatus::default());
    }
}
