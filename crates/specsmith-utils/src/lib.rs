pub mod atomic_write;
pub mod error;
pub mod exit_codes;
pub mod input;
pub mod logging;
pub mod trace_id;
pub mod types;
