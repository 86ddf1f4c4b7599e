mod app_logic;
mod core;

use crate::app_logic::console_controls;
use crate::app_logic::ProjectTranslator;
use crate::app_logic::handler::{APP_NAME, default_workspace};
use crate::core::{CoreConfigManager, RunControl};
use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Translates a source tree into one or more language-tagged destination trees.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Workspace directory holding the configuration and the translation ledger
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Configuration file to use instead of the workspace or user configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Console log level
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Also write a debug log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not read pause/resume/stop commands from stdin
    #[arg(long)]
    no_console_controls: bool,
}

fn init_logging(args: &Args) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        args.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(log_file) = &args.log_file {
        match File::create(log_file) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
            Err(e) => eprintln!("Failed to create log file {log_file:?}: {e}"),
        }
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let workspace = args.workspace.clone().unwrap_or_else(default_workspace);
    log::debug!("main: Workspace {workspace:?}");

    let translator = ProjectTranslator::new(
        Arc::new(CoreConfigManager::new(APP_NAME)),
        workspace,
        args.config.clone(),
    );

    let control = RunControl::new();
    if !args.no_console_controls {
        if let Err(e) = console_controls::spawn_console_controls(control.clone()) {
            log::warn!("main: Console controls unavailable: {e}");
        }
    }

    let report = translator.run(&control);
    report.log_summary();
    ExitCode::from(report.exit_code() as u8)
}
