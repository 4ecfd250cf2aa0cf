use error_stack::{Report, ResultExt};
use log::LevelFilter;

use crate::error::AdapterError;

/// Install a stderr logger for hosts that do not bring their own.
///
/// Lines are formatted as `<rfc3339 timestamp>  <LEVEL> <target> <message>`.
///
/// # Errors
///
/// Fails when a global logger has already been installed.
pub fn init_logger(level: LevelFilter) -> Result<(), Report<AdapterError>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .change_context(AdapterError::Configuration {
            message: "failed to initialize logger".to_string(),
        })
}

/// Log level helper to determine if debug logging is enabled
#[must_use]
pub fn is_debug_enabled() -> bool {
    log::log_enabled!(log::Level::Debug)
}
