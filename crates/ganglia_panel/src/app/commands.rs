use std::collections::HashMap;

use ganglia_engine::{BayId, ConsoleEvent, Movement, PortId, ServerState, WireCatalog, WireColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalAction {
    Help,
    Sync,
    DumpState,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedCommand {
    Local(LocalAction),
    Event(ConsoleEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }

    pub(crate) fn reply_line(&self) -> String {
        format!("error: {} (usage: {})", self.reason, self.usage)
    }
}

/// Parsers see the raw remainder of the line after the command name.
type ParseFn = dyn Fn(&str, &WireCatalog) -> Result<ParsedCommand, CommandParseError> + Send + Sync;
type BuiltinParser = fn(&str, &WireCatalog) -> Result<ParsedCommand, CommandParseError>;

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

/// What one inbound line turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineOutcome {
    Blank,
    Parsed(ParsedCommand),
    Rejected(String),
}

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_panel_builtins() -> Self {
        let builtins: [(&str, &str, &str, BuiltinParser); 11] = [
            ("help", "List commands", "", parse_help_command),
            (
                "plug",
                "Plug a wire into a port",
                "<bay:u32> <port:usize> <color>",
                parse_plug_command,
            ),
            (
                "unplug",
                "Remove the wire from a port",
                "<bay:u32> <port:usize>",
                parse_unplug_command,
            ),
            (
                "cycle",
                "Advance a port to the next wire color",
                "<bay:u32> <port:usize>",
                parse_cycle_command,
            ),
            ("shield", "Toggle the shield", "", parse_shield_command),
            (
                "move",
                "Hold a movement direction",
                "<up|down|left|right|stop>",
                parse_move_command,
            ),
            (
                "energy",
                "Route an energy type to the weapons",
                "<color>",
                parse_energy_command,
            ),
            (
                "snapshot",
                "Deliver a server snapshot reply",
                "<seq:u64> <json>",
                parse_snapshot_command,
            ),
            (
                "dump.state",
                "Print console state as JSON",
                "",
                parse_dump_state_command,
            ),
            (
                "sync",
                "Reply once earlier commands are processed",
                "",
                parse_sync_command,
            ),
            ("quit", "Shut the panel down", "", parse_quit_command),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            registry
                .register(name, help, arg_schema, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&str, &WireCatalog) -> Result<ParsedCommand, CommandParseError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let index = self
            .lookup_by_lower_name
            .get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index)
    }

    /// Registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    pub(crate) fn parse_line(&self, raw_line: &str, wires: &WireCatalog) -> LineOutcome {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return LineOutcome::Blank;
        }
        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };
        let Some(spec) = self.lookup(name) else {
            return LineOutcome::Rejected(format!("error: unknown command '{name}'. try: help"));
        };
        match (spec.parse)(rest, wires) {
            Ok(command) => LineOutcome::Parsed(command),
            Err(error) => LineOutcome::Rejected(error.reply_line()),
        }
    }
}

fn parse_help_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(rest, "help")?;
    Ok(ParsedCommand::Local(LocalAction::Help))
}

fn parse_plug_command(rest: &str, wires: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "plug <bay> <port> <color>";
    let [bay, port, color] = exact_args::<3>(rest, USAGE)?;
    Ok(ParsedCommand::Event(ConsoleEvent::PlugWire {
        bay: parse_bay(bay, USAGE)?,
        port: parse_port(port, USAGE)?,
        wire: parse_color(color, wires, USAGE)?,
    }))
}

fn parse_unplug_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "unplug <bay> <port>";
    let [bay, port] = exact_args::<2>(rest, USAGE)?;
    Ok(ParsedCommand::Event(ConsoleEvent::UnplugWire {
        bay: parse_bay(bay, USAGE)?,
        port: parse_port(port, USAGE)?,
    }))
}

fn parse_cycle_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "cycle <bay> <port>";
    let [bay, port] = exact_args::<2>(rest, USAGE)?;
    Ok(ParsedCommand::Event(ConsoleEvent::CycleWire {
        bay: parse_bay(bay, USAGE)?,
        port: parse_port(port, USAGE)?,
    }))
}

fn parse_shield_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(rest, "shield")?;
    Ok(ParsedCommand::Event(ConsoleEvent::ToggleShield))
}

fn parse_move_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "move <up|down|left|right|stop>";
    let [direction] = exact_args::<1>(rest, USAGE)?;
    let movement = Movement::from_name(direction).ok_or_else(|| {
        CommandParseError::new(format!("unknown direction '{direction}'"), USAGE)
    })?;
    Ok(ParsedCommand::Event(ConsoleEvent::HoldMovement(movement)))
}

fn parse_energy_command(
    rest: &str,
    wires: &WireCatalog,
) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "energy <color>";
    let [color] = exact_args::<1>(rest, USAGE)?;
    Ok(ParsedCommand::Event(ConsoleEvent::SelectEnergy(
        parse_color(color, wires, USAGE)?,
    )))
}

fn parse_snapshot_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    const USAGE: &str = "snapshot <seq> <json>";
    let Some((seq, json)) = rest.split_once(char::is_whitespace) else {
        return Err(CommandParseError::new(
            "expected a sequence number followed by a JSON object",
            USAGE,
        ));
    };
    let seq = seq.parse::<u64>().map_err(|_| {
        CommandParseError::new(format!("invalid sequence number '{seq}' (expected u64)"), USAGE)
    })?;
    let state = ServerState::from_json(json.trim())
        .map_err(|err| CommandParseError::new(format!("invalid snapshot json: {err}"), USAGE))?;
    Ok(ParsedCommand::Event(ConsoleEvent::Snapshot { seq, state }))
}

fn parse_dump_state_command(
    rest: &str,
    _: &WireCatalog,
) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(rest, "dump.state")?;
    Ok(ParsedCommand::Local(LocalAction::DumpState))
}

fn parse_sync_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(rest, "sync")?;
    Ok(ParsedCommand::Local(LocalAction::Sync))
}

fn parse_quit_command(rest: &str, _: &WireCatalog) -> Result<ParsedCommand, CommandParseError> {
    require_no_args(rest, "quit")?;
    Ok(ParsedCommand::Local(LocalAction::Quit))
}

fn exact_args<'a, const N: usize>(
    rest: &'a str,
    usage: &str,
) -> Result<[&'a str; N], CommandParseError> {
    let args = rest.split_whitespace().collect::<Vec<_>>();
    <[&str; N]>::try_from(args.as_slice()).map_err(|_| {
        CommandParseError::new(
            format!("expected {N} argument(s), got {}", args.len()),
            usage,
        )
    })
}

fn require_no_args(rest: &str, usage: &str) -> Result<(), CommandParseError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("expected no arguments", usage))
    }
}

fn parse_bay(raw: &str, usage: &str) -> Result<BayId, CommandParseError> {
    raw.parse::<u32>().map(BayId).map_err(|_| {
        CommandParseError::new(format!("invalid bay id '{raw}' (expected u32)"), usage)
    })
}

fn parse_port(raw: &str, usage: &str) -> Result<PortId, CommandParseError> {
    raw.parse::<PortId>().map_err(|_| {
        CommandParseError::new(format!("invalid port id '{raw}' (expected usize)"), usage)
    })
}

/// Accepts a color name or its numeric identifier.
fn parse_color(
    raw: &str,
    wires: &WireCatalog,
    usage: &str,
) -> Result<WireColor, CommandParseError> {
    if let Some(color) = wires.color_by_name(raw) {
        return Ok(color);
    }
    match raw.parse::<u8>().map(WireColor) {
        Ok(color) if wires.contains(color) => Ok(color),
        _ => Err(CommandParseError::new(
            format!("unknown wire color '{raw}'"),
            usage,
        )),
    }
}
