mod bootstrap;
mod commands;
mod layout;
mod loop_runner;
mod panel_port;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
