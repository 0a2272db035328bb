//! CLI command implementations.
//!
//! Each subcommand lives in its own module; `run.rs` calls the re-exported
//! `execute_*` functions.

mod common;
mod config;
mod generate;
mod history;
mod refine;
mod show;

pub use config::execute_config_command;
pub use generate::execute_generate_command;
pub use history::execute_history_command;
pub use refine::execute_refine_command;
pub use show::execute_show_command;
