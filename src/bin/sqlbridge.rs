use sqlbridge::config::{self, Config};
use sqlbridge::{transport, Bridge};
use std::io;
use std::process::ExitCode;
use tracing::{error, info, Level};

fn main() -> ExitCode {
    // Optional single argument: path to a TOML configuration file
    let args: Vec<String> = std::env::args().collect();
    let config = match load(args.get(1).map(String::as_str)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // stdout carries the protocol, so logs go to stderr
    let level = config.log_level().parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    info!("Starting sqlbridge...");
    let bridge = Bridge::new(config.bridge_options());

    let stdin = io::stdin();
    let result = transport::serve(&bridge, stdin.lock(), io::stdout());
    bridge.shutdown();

    match result {
        Ok(()) => {
            info!("Input closed, exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Transport failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: Option<&str>) -> Result<Config, String> {
    if let Some(path) = path {
        return config::load_config(path);
    }
    match config::default_config_path() {
        Some(path) if path.exists() => config::load_config(path),
        _ => Ok(Config::default()),
    }
}
