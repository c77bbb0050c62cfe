#![warn(clippy::pedantic)]
// Noisy doc/signature lints - would require annotating most pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference - keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Module structure - handlers::reboot::run etc. by design
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod classify;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod logsink;
pub mod netconf;
pub mod notify;
pub mod router;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
