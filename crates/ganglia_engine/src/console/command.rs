use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::SubsystemId;
use crate::panel::WireColor;

use super::cooldown::CooldownPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BayId(pub u32);

impl fmt::Display for BayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which outbound command a bay's resolved level drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BayKind {
    Weapons,
    Propulsion,
    Repair,
    Communications,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropulsionMode {
    #[default]
    Off,
    Slow,
    Fast,
}

impl PropulsionMode {
    pub fn from_level(level: Option<SubsystemId>) -> Self {
        match level.map(|id| id.0) {
            None | Some(0) => PropulsionMode::Off,
            Some(1) => PropulsionMode::Slow,
            Some(_) => PropulsionMode::Fast,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            PropulsionMode::Off => "off",
            PropulsionMode::Slow => "slow",
            PropulsionMode::Fast => "fast",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    #[default]
    Stop,
    Up,
    Down,
    Left,
    Right,
}

impl Movement {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stop" => Some(Movement::Stop),
            "up" => Some(Movement::Up),
            "down" => Some(Movement::Down),
            "left" => Some(Movement::Left),
            "right" => Some(Movement::Right),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Movement::Stop => "stop",
            Movement::Up => "up",
            Movement::Down => "down",
            Movement::Left => "left",
            Movement::Right => "right",
        }
    }
}

/// Fire-and-forget command for the remote authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ConsoleCommand {
    SubsystemLevel {
        bay: BayId,
        level: Option<SubsystemId>,
    },
    Shield {
        on: bool,
    },
    PropulsionMode {
        bay: BayId,
        mode: PropulsionMode,
    },
    Movement {
        movement: Movement,
    },
    RegenLevel {
        bay: BayId,
        level: u32,
    },
    Energy {
        wire: WireColor,
    },
    Cooldown {
        bay: BayId,
        phase: CooldownPhase,
    },
}

impl ConsoleCommand {
    /// Command a bay of `kind` sends for its resolved `level`.
    pub fn for_bay(kind: BayKind, bay: BayId, level: Option<SubsystemId>) -> Self {
        match kind {
            BayKind::Weapons | BayKind::Communications => {
                ConsoleCommand::SubsystemLevel { bay, level }
            }
            BayKind::Propulsion => ConsoleCommand::PropulsionMode {
                bay,
                mode: PropulsionMode::from_level(level),
            },
            BayKind::Repair => ConsoleCommand::RegenLevel {
                bay,
                level: level.map_or(0, |id| id.0),
            },
        }
    }
}

impl fmt::Display for ConsoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleCommand::SubsystemLevel { bay, level } => match level {
                Some(level) => write!(f, "subsystem_level bay:{bay} level:{level}"),
                None => write!(f, "subsystem_level bay:{bay} level:none"),
            },
            ConsoleCommand::Shield { on } => {
                write!(f, "shield {}", if *on { "on" } else { "off" })
            }
            ConsoleCommand::PropulsionMode { bay, mode } => {
                write!(f, "propulsion_mode bay:{bay} mode:{}", mode.as_str())
            }
            ConsoleCommand::Movement { movement } => write!(f, "movement {}", movement.as_str()),
            ConsoleCommand::RegenLevel { bay, level } => {
                write!(f, "regen_level bay:{bay} level:{level}")
            }
            ConsoleCommand::Energy { wire } => write!(f, "energy wire:{}", wire.0),
            ConsoleCommand::Cooldown { bay, phase } => {
                write!(f, "cooldown bay:{bay} phase:{}", phase.as_str())
            }
        }
    }
}

/// Outbound boundary to the remote authority. Implementations must not
/// block; failures are theirs to log.
pub trait CommandSink {
    fn emit(&mut self, command: &ConsoleCommand);

    fn request_snapshot(&mut self, _seq: u64) {}
}

impl<S: CommandSink + ?Sized> CommandSink for &mut S {
    fn emit(&mut self, command: &ConsoleCommand) {
        (**self).emit(command);
    }

    fn request_snapshot(&mut self, seq: u64) {
        (**self).request_snapshot(seq);
    }
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn emit(&mut self, command: &ConsoleCommand) {
        (**self).emit(command);
    }

    fn request_snapshot(&mut self, seq: u64) {
        (**self).request_snapshot(seq);
    }
}

/// Sink that buffers everything until the owner drains it.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    commands: Vec<ConsoleCommand>,
    snapshot_requests: Vec<u64>,
}

impl RecordingSink {
    pub fn commands(&self) -> &[ConsoleCommand] {
        &self.commands
    }

    pub fn snapshot_requests(&self) -> &[u64] {
        &self.snapshot_requests
    }

    pub fn take_commands(&mut self) -> Vec<ConsoleCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn take_snapshot_requests(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.snapshot_requests)
    }
}

impl CommandSink for RecordingSink {
    fn emit(&mut self, command: &ConsoleCommand) {
        self.commands.push(*command);
    }

    fn request_snapshot(&mut self, seq: u64) {
        self.snapshot_requests.push(seq);
    }
}
