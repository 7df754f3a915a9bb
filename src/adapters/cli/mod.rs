//! CLI Adapter
//!
//! Command-line interface for the quotewatch monitor.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    init_logging, CliApp, Command, ExplainCmd, ParamOverrides, QuoteCmd, ReplayCmd, RunCmd,
};

/// Parse the process arguments
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
