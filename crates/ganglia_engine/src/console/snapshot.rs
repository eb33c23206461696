use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Millis;

use super::config::PollConfig;

/// Authoritative record published by the remote game server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerState {
    pub weapon_id: Option<u32>,
    pub energy_id: Option<u8>,
    pub is_game_won: bool,
    pub is_game_lost: bool,
    pub is_game_started: bool,
}

impl ServerState {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Locally displayed copy of the server record. Loading until the first
/// snapshot lands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerView {
    pub state: ServerState,
    pub loaded: bool,
    pub merged_at: Option<Millis>,
}

impl ServerView {
    pub fn merge(&mut self, state: ServerState, now: Millis) {
        self.state = state;
        self.loaded = true;
        self.merged_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotVerdict {
    Accepted,
    /// Reply for the in-flight request, but after the timeout.
    Late,
    /// Reply for a request that is no longer in flight.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    seq: u64,
    sent_at: Millis,
}

/// Decides when to ask the remote authority for a snapshot and which
/// replies to trust. At most one request is in flight.
#[derive(Debug, Clone)]
pub struct SnapshotPoll {
    config: PollConfig,
    next_seq: u64,
    next_due: Millis,
    in_flight: Option<InFlight>,
}

impl SnapshotPoll {
    /// The first request is due immediately.
    pub fn new(config: PollConfig, now: Millis) -> Self {
        Self {
            config,
            next_seq: 1,
            next_due: now,
            in_flight: None,
        }
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight.map(|request| request.seq)
    }

    /// Sequence number of a new request when one is due.
    pub fn poll_due(&mut self, now: Millis) -> Option<u64> {
        if now < self.next_due {
            return None;
        }
        if let Some(previous) = self.in_flight.take() {
            warn!(
                seq = previous.seq,
                sent_at = previous.sent_at,
                timeout_ms = self.config.timeout_ms,
                "snapshot_poll_timed_out"
            );
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.next_due = now.saturating_add(self.config.interval_ms);
        self.in_flight = Some(InFlight { seq, sent_at: now });
        debug!(seq, next_due = self.next_due, "snapshot_poll_requested");
        Some(seq)
    }

    pub fn accept(&mut self, seq: u64, now: Millis) -> SnapshotVerdict {
        match self.in_flight {
            Some(request) if request.seq == seq => {
                self.in_flight = None;
                if now.saturating_sub(request.sent_at) > self.config.timeout_ms {
                    SnapshotVerdict::Late
                } else {
                    SnapshotVerdict::Accepted
                }
            }
            _ => SnapshotVerdict::Stale,
        }
    }
}
