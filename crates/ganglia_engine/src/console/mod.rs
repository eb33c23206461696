mod command;
mod config;
mod cooldown;
mod driver;
mod scheduler;
mod shield;
mod snapshot;

pub use command::{
    BayId, BayKind, CommandSink, ConsoleCommand, Movement, PropulsionMode, RecordingSink,
};
pub use config::{
    ConfigError, ConsoleConfig, PollConfig, ShieldTimings, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SHIELD_ACTIVE_MS, DEFAULT_SHIELD_CANCEL_COOLDOWN_MS,
    DEFAULT_SHIELD_EXPIRY_COOLDOWN_MS,
};
pub use cooldown::CooldownPhase;
pub use driver::{BayConfig, BayDump, Console, ConsoleDump, ConsoleError, ConsoleEvent};
pub use scheduler::{FiredTimer, Scheduler, TimerId};
pub use shield::ShieldPhase;
pub use snapshot::{ServerState, ServerView, SnapshotPoll, SnapshotVerdict};
