use std::path::PathBuf;
use std::str::FromStr;

use ganglia_engine::{Console, ConsoleConfig, ConsoleError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::commands::CommandRegistry;
use super::layout::{builtin_layout, load_layout, LayoutError};
use super::panel_port::{ready_line_text, OutboundLines, PanelPort};

const PANEL_PORT_ENV_VAR: &str = "GANGLIA_PANEL_PORT";
const TICK_MS_ENV_VAR: &str = "GANGLIA_TICK_MS";
const LAYOUT_ENV_VAR: &str = "GANGLIA_LAYOUT";
const EXCLUSIVE_WIRES_ENV_VAR: &str = "GANGLIA_EXCLUSIVE_WIRES";
const SHIELD_ACTIVE_ENV_VAR: &str = "GANGLIA_SHIELD_ACTIVE_MS";
const SHIELD_CANCEL_COOLDOWN_ENV_VAR: &str = "GANGLIA_SHIELD_CANCEL_COOLDOWN_MS";
const SHIELD_EXPIRY_COOLDOWN_ENV_VAR: &str = "GANGLIA_SHIELD_EXPIRY_COOLDOWN_MS";
const POLL_INTERVAL_ENV_VAR: &str = "GANGLIA_POLL_INTERVAL_MS";
const POLL_TIMEOUT_ENV_VAR: &str = "GANGLIA_POLL_TIMEOUT_MS";

pub(crate) const DEFAULT_PANEL_PORT: u16 = 46101;
pub(crate) const DEFAULT_TICK_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PanelConfig {
    pub(crate) port: u16,
    pub(crate) tick_ms: u64,
    pub(crate) layout_path: Option<PathBuf>,
    pub(crate) console: ConsoleConfig,
}

impl PanelConfig {
    fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ConsoleConfig::default();
        let mut console = defaults;
        console.exclusive_wires = parse_enabled_flag(lookup(EXCLUSIVE_WIRES_ENV_VAR).as_deref());
        console.shield.active_ms = parse_or_default(
            SHIELD_ACTIVE_ENV_VAR,
            lookup(SHIELD_ACTIVE_ENV_VAR).as_deref(),
            defaults.shield.active_ms,
        );
        console.shield.cancel_cooldown_ms = parse_or_default(
            SHIELD_CANCEL_COOLDOWN_ENV_VAR,
            lookup(SHIELD_CANCEL_COOLDOWN_ENV_VAR).as_deref(),
            defaults.shield.cancel_cooldown_ms,
        );
        console.shield.expiry_cooldown_ms = parse_or_default(
            SHIELD_EXPIRY_COOLDOWN_ENV_VAR,
            lookup(SHIELD_EXPIRY_COOLDOWN_ENV_VAR).as_deref(),
            defaults.shield.expiry_cooldown_ms,
        );
        console.poll.interval_ms = parse_or_default(
            POLL_INTERVAL_ENV_VAR,
            lookup(POLL_INTERVAL_ENV_VAR).as_deref(),
            defaults.poll.interval_ms,
        );
        console.poll.timeout_ms = parse_or_default(
            POLL_TIMEOUT_ENV_VAR,
            lookup(POLL_TIMEOUT_ENV_VAR).as_deref(),
            defaults.poll.timeout_ms,
        );

        let mut tick_ms = parse_or_default(
            TICK_MS_ENV_VAR,
            lookup(TICK_MS_ENV_VAR).as_deref(),
            DEFAULT_TICK_MS,
        );
        if tick_ms == 0 {
            warn!(fallback = DEFAULT_TICK_MS, "panel_zero_tick_using_default");
            tick_ms = DEFAULT_TICK_MS;
        }

        Self {
            port: parse_or_default(
                PANEL_PORT_ENV_VAR,
                lookup(PANEL_PORT_ENV_VAR).as_deref(),
                DEFAULT_PANEL_PORT,
            ),
            tick_ms,
            layout_path: lookup(LAYOUT_ENV_VAR)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from),
            console,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to build console: {0}")]
    Console(#[from] ConsoleError),
    #[error("failed to bind panel port 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) struct AppWiring {
    pub(crate) config: PanelConfig,
    pub(crate) console: Console<OutboundLines>,
    pub(crate) registry: CommandRegistry,
    pub(crate) port: PanelPort,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Ganglia Panel Startup ===");

    let config = PanelConfig::from_env();
    let layout = match &config.layout_path {
        Some(path) => load_layout(path)?,
        None => builtin_layout(),
    };
    info!(
        source = %config
            .layout_path
            .as_ref()
            .map_or_else(|| "builtin".to_string(), |path| path.display().to_string()),
        wires = layout.wires.len(),
        bays = layout.bays.len(),
        "layout_loaded"
    );

    let mut console = Console::new(layout.wires, config.console, OutboundLines::default(), 0)?;
    for bay in layout.bays {
        console.mount_bay(bay)?;
    }

    let port = PanelPort::bind_localhost(config.port).map_err(|source| StartupError::Bind {
        port: config.port,
        source,
    })?;
    info!(line = %ready_line_text(port.bound_port()), "panel_port_bound");

    Ok(AppWiring {
        config,
        console,
        registry: CommandRegistry::with_panel_builtins(),
        port,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_enabled_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1"))
}

fn parse_or_default<T>(var: &'static str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(value) = raw else {
        return default;
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(var, value, fallback = %default, "panel_invalid_env_using_default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> PanelConfig {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        PanelConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.port, DEFAULT_PANEL_PORT);
        assert_eq!(config.tick_ms, DEFAULT_TICK_MS);
        assert_eq!(config.layout_path, None);
        assert_eq!(config.console, ConsoleConfig::default());
    }

    #[test]
    fn environment_overrides_each_setting() {
        let config = config_from(&[
            (PANEL_PORT_ENV_VAR, "46200"),
            (TICK_MS_ENV_VAR, "20"),
            (LAYOUT_ENV_VAR, "  /tmp/layout.json "),
            (EXCLUSIVE_WIRES_ENV_VAR, "1"),
            (SHIELD_ACTIVE_ENV_VAR, "5000"),
            (POLL_TIMEOUT_ENV_VAR, "400"),
        ]);
        assert_eq!(config.port, 46200);
        assert_eq!(config.tick_ms, 20);
        assert_eq!(config.layout_path, Some(PathBuf::from("/tmp/layout.json")));
        assert!(config.console.exclusive_wires);
        assert_eq!(config.console.shield.active_ms, 5_000);
        assert_eq!(config.console.poll.timeout_ms, 400);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            (PANEL_PORT_ENV_VAR, "not-a-port"),
            (TICK_MS_ENV_VAR, "0"),
            (EXCLUSIVE_WIRES_ENV_VAR, "yes"),
            (POLL_INTERVAL_ENV_VAR, "-5"),
        ]);
        assert_eq!(config.port, DEFAULT_PANEL_PORT);
        assert_eq!(config.tick_ms, DEFAULT_TICK_MS);
        assert!(!config.console.exclusive_wires);
        assert_eq!(
            config.console.poll.interval_ms,
            ConsoleConfig::default().poll.interval_ms
        );
    }

    #[test]
    fn parse_helpers_handle_missing_and_padded_values() {
        assert_eq!(parse_or_default("X", None, 7u64), 7);
        assert_eq!(parse_or_default("X", Some(" 9 "), 7u64), 9);
        assert!(parse_enabled_flag(Some("1")));
        assert!(!parse_enabled_flag(Some("0")));
        assert!(!parse_enabled_flag(None));
    }
}
