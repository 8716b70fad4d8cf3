//! `atm-native-host`: started by the browser, relays between the extension and `atm`.
//!
//! Stdout carries framed messages, so every diagnostic goes to the log file.

use std::process::ExitCode;

use atcoder_tools_mini::{
    bridge::{self, Bridge},
    configuration::{home_dir, Configuration},
    logger::init_logger,
};
use tracing::{error, info};

const LOG_FILE: &str = ".atcoder_tools_mini_native.log";

fn main() -> ExitCode {
    let log_path = home_dir().unwrap_or_default().join(LOG_FILE);
    // the host still works without a log
    let _ = init_logger(&log_path);

    let config = Configuration::from_env();
    info!("native host starting");
    let listener = match bridge::bind(config.bridge_addr()) {
        Ok(listener) => listener,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match Bridge::new().run(std::io::stdin(), std::io::stdout(), listener) {
        Ok(exit) => {
            info!(?exit, "native host stopping");
            ExitCode::from(exit.exit_code() as u8)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
