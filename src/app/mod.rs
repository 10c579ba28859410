//! Application runtime composition modules.

pub(crate) mod audit_command;
pub(crate) mod collect_command;
pub(crate) mod exit_handler;
pub(crate) mod progress_manager;
pub(crate) mod runtime;
pub(crate) mod terminal;
pub(crate) mod upload_command;
