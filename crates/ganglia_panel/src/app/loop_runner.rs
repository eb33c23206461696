use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use ganglia_engine::{CommandSink, Console, Millis};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::commands::{CommandRegistry, LineOutcome, LocalAction, ParsedCommand};
use super::panel_port::{ClientId, InboundLine, OutboundLines};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Line(String),
    Lines(Vec<String>),
    Sync,
    DumpState,
}

#[derive(Debug, Default)]
struct StepOutput {
    broadcasts: Vec<String>,
    replies: Vec<(ClientId, String)>,
    quit: bool,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut console,
        registry,
        mut port,
    } = app;
    let tick = Duration::from_millis(config.tick_ms);
    let started = Instant::now();
    let mut inbound = Vec::new();
    info!(
        port = port.bound_port(),
        tick_ms = config.tick_ms,
        bays = console.bay_ids().len(),
        "panel_loop_started"
    );

    loop {
        let step_started = Instant::now();
        let now = elapsed_millis(started, step_started);

        port.poll_lines(&mut inbound);
        let output = run_step(&mut console, &registry, inbound.drain(..), now);
        for line in &output.broadcasts {
            port.broadcast(line);
        }
        for (client, line) in &output.replies {
            port.send_reply(*client, line);
        }
        port.flush();

        if output.quit {
            info!(now, "panel_quit_requested");
            break;
        }

        let sleep = remaining_tick(step_started.elapsed(), tick);
        if sleep > Duration::ZERO {
            thread::sleep(sleep);
        }
    }

    info!(clients = port.client_count(), "panel_shutdown");
    ExitCode::SUCCESS
}

/// One fixed step: queue parsed events, pump the console, then render
/// replies so `sync` and `dump.state` observe the pumped state.
fn run_step(
    console: &mut Console<OutboundLines>,
    registry: &CommandRegistry,
    lines: impl IntoIterator<Item = InboundLine>,
    now: Millis,
) -> StepOutput {
    let mut output = StepOutput::default();
    let mut pending = Vec::new();

    for InboundLine { client, line } in lines {
        match registry.parse_line(&line, console.wires()) {
            LineOutcome::Blank => {}
            LineOutcome::Rejected(reply) => pending.push((client, Reply::Line(reply))),
            LineOutcome::Parsed(ParsedCommand::Event(event)) => console.push(event),
            LineOutcome::Parsed(ParsedCommand::Local(action)) => match action {
                LocalAction::Help => pending.push((client, Reply::Lines(registry.help_lines()))),
                LocalAction::Sync => pending.push((client, Reply::Sync)),
                LocalAction::DumpState => pending.push((client, Reply::DumpState)),
                LocalAction::Quit => {
                    pending.push((client, Reply::Line("ok: quit".to_string())));
                    output.quit = true;
                }
            },
        }
    }

    console.pump(now);
    output.broadcasts = console.sink_mut().take_lines();

    for (client, reply) in pending {
        match reply {
            Reply::Line(line) => output.replies.push((client, line)),
            Reply::Lines(lines) => {
                output
                    .replies
                    .extend(lines.into_iter().map(|line| (client, line)));
            }
            Reply::Sync => output.replies.push((client, "ok: sync".to_string())),
            Reply::DumpState => output.replies.push((client, render_dump(console))),
        }
    }
    output
}

fn render_dump<S: CommandSink>(console: &Console<S>) -> String {
    match serde_json::to_string(&console.dump()) {
        Ok(json) => format!("dump.state {json}"),
        Err(err) => {
            error!(error = %err, "dump_state_encode_failed");
            format!("error: failed to encode state: {err}")
        }
    }
}

fn elapsed_millis(started: Instant, now: Instant) -> Millis {
    Millis::try_from(now.saturating_duration_since(started).as_millis()).unwrap_or(Millis::MAX)
}

fn remaining_tick(elapsed: Duration, tick: Duration) -> Duration {
    tick.saturating_sub(elapsed)
}
