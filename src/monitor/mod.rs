pub mod config;
pub mod poll_loop;
pub mod state;

pub use config::MonitorConfig;
pub use poll_loop::{run, Monitor};
pub use state::{MonitorPhase, RunState};
