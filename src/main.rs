mod app_logic;
mod core;

use app_logic::{Cli, ProjectManagerLogic};
use clap::Parser;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::process::ExitCode;
use std::sync::Arc;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Off)
        .build();
    // Fails only if a logger is already installed.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("Main: Starting with {cli:?}");

    let settings_manager = Arc::new(core::CoreSettingsManager::new());
    let ledger = Arc::new(core::CoreVersionLedger::new());
    let logic = ProjectManagerLogic::new(settings_manager, ledger);

    let result = logic
        .apply_label_overrides(&cli)
        .and_then(|()| logic.run(&cli));
    match result {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Main: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
