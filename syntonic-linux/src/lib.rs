//! Linux platform layer for the `syntonic` PTP clock core: adjtimex
//! based timekeepers, the Unix-datagram management endpoint and TOML
//! configuration.

pub mod clock;
pub mod config;
pub mod uds;

use fern::colors::Color;

pub fn setup_logger(level: log::LevelFilter) -> Result<(), fern::InitError> {
    let colors = fern::colors::ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightGreen)
        .debug(Color::BrightBlue)
        .trace(Color::BrightBlack);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            use std::time::{SystemTime, UNIX_EPOCH};

            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();

            out.finish(format_args!(
                "[{}.{:03}][{}][{}] {}",
                now.as_secs(),
                now.subsec_millis(),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
